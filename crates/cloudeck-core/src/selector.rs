//! Next/previous track selection over the filtered view.
//!
//! Pure functions of their inputs: the caller passes the view length, the
//! current track's position in the view (if it is visible at all) and an RNG.

use rand::Rng;

use crate::protocol::RepeatMode;

/// A chosen view position.  `wrapped` is set when sequential order ran off the
/// end and came back to 0, so the caller can stop instead under repeat-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub wrapped: bool,
}

impl Selection {
    fn at(index: usize) -> Self {
        Self {
            index,
            wrapped: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Previous {
    /// Seek the current track back to 0.
    Restart,
    Index(usize),
}

pub fn next<R: Rng + ?Sized>(
    view_len: usize,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: &mut R,
) -> Option<Selection> {
    if view_len == 0 {
        return None;
    }
    let current = current.filter(|&c| c < view_len);

    if repeat == RepeatMode::One {
        if let Some(c) = current {
            return Some(Selection::at(c));
        }
    }

    if shuffle {
        if view_len == 1 {
            return Some(Selection::at(0));
        }
        let index = match current {
            // Draw from the other len-1 slots and shift past the current one.
            Some(c) => {
                let r = rng.gen_range(0..view_len - 1);
                if r >= c {
                    r + 1
                } else {
                    r
                }
            }
            None => rng.gen_range(0..view_len),
        };
        return Some(Selection::at(index));
    }

    Some(match current {
        Some(c) if c + 1 >= view_len => Selection {
            index: 0,
            wrapped: true,
        },
        Some(c) => Selection::at(c + 1),
        None => Selection::at(0),
    })
}

/// `elapsed` is the playback position of the loaded track, `None` when
/// nothing is loaded.
pub fn previous(
    view_len: usize,
    current: Option<usize>,
    elapsed: Option<f64>,
    seekable: bool,
    restart_threshold: f64,
) -> Option<Previous> {
    if seekable && elapsed.is_some_and(|t| t > restart_threshold) {
        return Some(Previous::Restart);
    }
    if view_len == 0 {
        return None;
    }
    Some(Previous::Index(match current.filter(|&c| c < view_len) {
        Some(c) => (c + view_len - 1) % view_len,
        None => view_len - 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_empty_view_selects_nothing() {
        assert_eq!(next(0, None, false, RepeatMode::Off, &mut rng()), None);
        assert_eq!(next(0, None, true, RepeatMode::All, &mut rng()), None);
        assert_eq!(previous(0, None, None, true, 3.0), None);
    }

    #[test]
    fn test_repeat_all_wraps_to_first() {
        let sel = next(3, Some(2), false, RepeatMode::All, &mut rng()).unwrap();
        assert_eq!(sel.index, 0);
        assert!(sel.wrapped);
    }

    #[test]
    fn test_repeat_one_replays_current() {
        let sel = next(5, Some(3), true, RepeatMode::One, &mut rng()).unwrap();
        assert_eq!(sel, Selection::at(3));
    }

    #[test]
    fn test_shuffle_single_track_returns_it() {
        let sel = next(1, Some(0), true, RepeatMode::Off, &mut rng()).unwrap();
        assert_eq!(sel.index, 0);
    }

    #[test]
    fn test_shuffle_never_repeats_current() {
        let mut rng = rng();
        for current in 0..4 {
            for _ in 0..200 {
                let sel = next(4, Some(current), true, RepeatMode::Off, &mut rng).unwrap();
                assert_ne!(sel.index, current);
                assert!(sel.index < 4);
            }
        }
    }

    #[test]
    fn test_shuffle_reaches_every_other_track() {
        let mut rng = rng();
        let mut seen = [false; 5];
        for _ in 0..500 {
            seen[next(5, Some(2), true, RepeatMode::Off, &mut rng).unwrap().index] = true;
        }
        assert_eq!(seen, [true, true, false, true, true]);
    }

    #[test]
    fn test_current_outside_view() {
        assert_eq!(
            next(4, None, false, RepeatMode::Off, &mut rng()),
            Some(Selection::at(0))
        );
        assert_eq!(previous(4, None, Some(0.5), true, 3.0), Some(Previous::Index(3)));
    }

    #[test]
    fn test_next_then_previous_round_trip() {
        for len in 1..6 {
            for start in 0..len {
                let sel = next(len, Some(start), false, RepeatMode::Off, &mut rng()).unwrap();
                if sel.wrapped {
                    assert_eq!(start, len - 1);
                    continue;
                }
                let back = previous(len, Some(sel.index), Some(0.0), true, 3.0).unwrap();
                assert_eq!(back, Previous::Index(start));
            }
        }
    }

    #[test]
    fn test_previous_restarts_after_threshold() {
        assert_eq!(previous(3, Some(1), Some(3.5), true, 3.0), Some(Previous::Restart));
        assert_eq!(previous(3, Some(1), Some(3.0), true, 3.0), Some(Previous::Index(0)));
        // Remote streams cannot seek, so step back instead.
        assert_eq!(previous(3, Some(1), Some(40.0), false, 3.0), Some(Previous::Index(0)));
        assert_eq!(previous(3, Some(0), Some(1.0), true, 3.0), Some(Previous::Index(2)));
    }
}
