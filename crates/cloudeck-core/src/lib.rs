//! cloudeck-core: playback, playlist and persistence logic shared by the
//! terminal front end.  Nothing in here touches the terminal or spawns mpv.

pub mod analytics;
pub mod config;
pub mod controller;
pub mod drive;
pub mod filter;
pub mod format;
pub mod library;
pub mod local;
pub mod platform;
pub mod protocol;
pub mod schedule;
pub mod selector;
pub mod session;
pub mod state;
pub mod store;
pub mod transfer;
