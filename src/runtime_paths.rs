use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

pub const CHAT_LOG_FILE: &str = "ChatLog.json";
pub const FOLDER_CONTEXT_FILE: &str = "FolderContext.json";
pub const TELEGRAM_STATE_FILE: &str = "TelegramState.json";
pub const SPEECH_FILE: &str = "speech.mp3";

fn app_root_override_lock() -> &'static RwLock<Option<PathBuf>> {
    static OVERRIDE: OnceLock<RwLock<Option<PathBuf>>> = OnceLock::new();
    OVERRIDE.get_or_init(|| RwLock::new(None))
}

fn app_root_override() -> Option<PathBuf> {
    let lock = app_root_override_lock();
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn set_app_root_override(path: Option<PathBuf>) {
    let lock = app_root_override_lock();
    match lock.write() {
        Ok(mut guard) => *guard = path,
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            *guard = path;
        }
    }
}

fn platform_app_root() -> PathBuf {
    if let Some(project_dirs) = ProjectDirs::from("", "", "pixie") {
        return project_dirs.data_dir().to_path_buf();
    }

    if let Some(base_dirs) = BaseDirs::new() {
        return base_dirs.data_local_dir().join("pixie");
    }

    std::env::temp_dir().join("pixie")
}

pub fn app_root() -> PathBuf {
    app_root_override().unwrap_or_else(platform_app_root)
}

pub fn default_env_path() -> PathBuf {
    let local = PathBuf::from(".env");
    if local.is_file() {
        return local;
    }
    app_root().join(".env")
}

pub fn default_data_dir() -> PathBuf {
    app_root().join("data")
}
