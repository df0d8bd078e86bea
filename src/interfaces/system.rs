use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKey {
    Mute,
    Unmute,
    VolumeUp,
    VolumeDown,
}

/// Operating-system actions used by automation and speech playback.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open_url(&self, url: &str) -> Result<()>;
    async fn open_app(&self, name: &str) -> Result<()>;
    async fn close_app(&self, name: &str) -> Result<()>;
    async fn open_file(&self, path: &Path) -> Result<()>;
    async fn open_in_editor(&self, path: &Path) -> Result<()>;
    async fn system_key(&self, key: SystemKey) -> Result<()>;
    async fn play_audio(&self, path: &Path) -> Result<()>;
}
