//! Local folder scanning.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::format::format_bytes;
use crate::protocol::Track;

pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus", "wma"];

#[derive(Debug)]
pub struct LocalFolder {
    pub name: String,
    pub tracks: Vec<Track>,
}

pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Collect every supported audio file under `dir`, sorted by name.
pub fn scan_folder(dir: &Path) -> Result<LocalFolder> {
    let mut tracks = Vec::new();
    collect(dir, &mut tracks)
        .with_context(|| format!("cannot read folder {}", dir.display()))?;
    tracks.sort_by_cached_key(|t: &Track| t.name.to_lowercase());

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Local".to_string());
    debug!("local: {} audio files in {}", tracks.len(), dir.display());
    Ok(LocalFolder { name, tracks })
}

fn collect(dir: &Path, out: &mut Vec<Track>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            // Unreadable subfolders are skipped rather than failing the scan.
            if let Err(e) = collect(&path, out) {
                debug!("local: skipping {}: {}", path.display(), e);
            }
            continue;
        }
        if !file_type.is_file() || !is_supported_audio(&path) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let mut track = Track::local(name, &path);
        if let Ok(meta) = entry.metadata() {
            track.size_bytes = Some(meta.len());
            track.size = Some(format_bytes(meta.len()));
        }
        out.push(track);
    }
    Ok(())
}
