pub mod folder_browser;
pub mod help_overlay;
pub mod now_playing;
pub mod playlist;
