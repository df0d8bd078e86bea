//! Optional local folder whose text files are fed to the realtime search
//! conversation as extra system context.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "log", "json", "yaml", "yml", "toml", "ini", "cfg", "env", "py", "js",
    "ts", "tsx", "jsx", "java", "cs", "cpp", "c", "h", "hpp", "go", "rs", "php", "rb", "swift",
    "kt", "kts", "scala", "sh", "ps1", "bat", "cmd", "html", "css", "scss", "sql", "xml", "csv",
];

const SKIP_DIR_NAMES: &[&str] = &[
    ".git",
    ".venv",
    "venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    "node_modules",
    "dist",
    "build",
    ".next",
    ".idea",
    ".vscode",
];

pub const MAX_FILES: usize = 120;
pub const MAX_FILE_CHARS: usize = 1800;
pub const MAX_TOTAL_CHARS: usize = 36_000;
pub const MAX_FILE_SIZE_BYTES: u64 = 512 * 1024;
const CACHE_TTL: Duration = Duration::from_secs(20);
const BINARY_SNIFF_BYTES: usize = 2048;

const CLEAR_COMMANDS: &[&str] = &[
    "clear folder context",
    "disable folder context",
    "stop folder context",
];
const REPORT_COMMANDS: &[&str] = &["which folder", "active folder", "current folder context"];
// Longer prefixes first so "set folder path x" does not resolve to "path x".
const SET_PREFIXES: &[&str] = &[
    "set folder path ",
    "use this folder ",
    "work with folder ",
    "work on folder ",
    "focus on folder ",
    "use folder ",
    "set folder ",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct FolderState {
    active_folder: Option<String>,
}

struct CachedContext {
    folder: PathBuf,
    text: String,
    built_at: Instant,
}

pub struct FolderContext {
    state_path: PathBuf,
    cache: Mutex<Option<CachedContext>>,
}

impl FolderContext {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            cache: Mutex::new(None),
        }
    }

    fn load_state(&self) -> FolderState {
        fs::read_to_string(&self.state_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save_state(&self, state: &FolderState) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.state_path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }

    fn reset_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    pub fn active_folder(&self) -> Option<PathBuf> {
        self.load_state()
            .active_folder
            .filter(|folder| !folder.is_empty())
            .map(PathBuf::from)
    }

    /// Validates and stores a new active folder, returning the user-facing message.
    pub fn set_active_folder(&self, path_text: &str) -> Result<String> {
        let normalized = normalize_path(path_text);
        if normalized.is_empty() {
            return Ok("Please provide a folder path.".to_string());
        }
        let path = PathBuf::from(&normalized);
        let resolved = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        if !resolved.exists() {
            return Ok(format!("Folder not found: {}", resolved.display()));
        }
        if !resolved.is_dir() {
            return Ok(format!("That path is not a folder: {}", resolved.display()));
        }
        let resolved = fs::canonicalize(&resolved).unwrap_or(resolved);

        self.save_state(&FolderState {
            active_folder: Some(resolved.display().to_string()),
        })?;
        self.reset_cache();
        info!(folder = %resolved.display(), "Folder context enabled");
        Ok(format!("Folder context enabled: {}", resolved.display()))
    }

    pub fn clear_active_folder(&self) -> Result<String> {
        self.save_state(&FolderState::default())?;
        self.reset_cache();
        Ok("Folder context cleared.".to_string())
    }

    /// Handles folder commands. `None` means the query is not a folder command.
    pub fn handle_command(&self, query: &str) -> Result<Option<String>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let lower = trimmed.to_lowercase();

        if CLEAR_COMMANDS.contains(&lower.as_str()) {
            return self.clear_active_folder().map(Some);
        }
        if REPORT_COMMANDS.contains(&lower.as_str()) {
            let message = match self.active_folder() {
                Some(folder) => format!("Active folder context: {}", folder.display()),
                None => "No folder context is active.".to_string(),
            };
            return Ok(Some(message));
        }
        for prefix in SET_PREFIXES {
            if lower.starts_with(prefix) {
                let rest = trimmed.get(prefix.len()..).unwrap_or_default();
                return self.set_active_folder(rest.trim()).map(Some);
            }
        }
        Ok(None)
    }

    /// Context block for the active folder, rebuilt at most every 20 seconds.
    pub fn context_message(&self) -> Option<String> {
        let folder = self.active_folder()?;
        if !folder.is_dir() {
            return None;
        }

        let mut cache = match self.cache.lock() {
            Ok(cache) => cache,
            Err(_) => {
                warn!("Folder context cache poisoned; rebuilding without cache");
                return Some(build_context_text(&folder));
            }
        };
        if let Some(cached) = cache.as_ref() {
            if cached.folder == folder && cached.built_at.elapsed() < CACHE_TTL {
                return Some(cached.text.clone());
            }
        }

        let text = build_context_text(&folder);
        *cache = Some(CachedContext {
            folder,
            text: text.clone(),
            built_at: Instant::now(),
        });
        Some(text)
    }
}

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Trims quotes and trailing punctuation, then expands `~` and `$VARS`.
/// Unknown variables are left untouched.
pub fn normalize_path(path_text: &str) -> String {
    let quotes = |c: char| c == '"' || c == '\'';
    let mut path = path_text
        .trim()
        .trim_matches(quotes)
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',') || c.is_whitespace())
        .trim_matches(quotes)
        .to_string();

    if path == "~" || path.starts_with("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
            path = format!("{}{}", home.display(), &path[1..]);
        }
    }

    ENV_VAR_RE
        .replace_all(&path, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn looks_binary(path: &Path) -> bool {
    let mut sample = [0u8; BINARY_SNIFF_BYTES];
    match fs::File::open(path).and_then(|mut file| file.read(&mut sample)) {
        Ok(read) => sample[..read].contains(&0),
        Err(_) => true,
    }
}

fn candidate_files(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !SKIP_DIR_NAMES.contains(&entry.file_name().to_string_lossy().as_ref())
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        })
        .filter(|entry| {
            entry
                .metadata()
                .map(|meta| meta.len() <= MAX_FILE_SIZE_BYTES)
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .filter(|path| !looks_binary(path))
        .take(MAX_FILES)
        .collect()
}

pub fn build_context_text(folder: &Path) -> String {
    let mut blocks = String::new();
    let mut total_chars = 0usize;
    let mut file_count = 0usize;

    for path in candidate_files(folder) {
        if total_chars >= MAX_TOTAL_CHARS {
            break;
        }
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        let raw = String::from_utf8_lossy(&bytes);
        let snippet: String = raw.trim().chars().take(MAX_FILE_CHARS).collect();
        if snippet.is_empty() {
            continue;
        }
        let relative = path.strip_prefix(folder).unwrap_or(&path);
        let block = format!("\n[FILE] {}\n{}\n", relative.display(), snippet);
        let block_chars = block.chars().count();
        if total_chars + block_chars > MAX_TOTAL_CHARS {
            break;
        }
        blocks.push_str(&block);
        total_chars += block_chars;
        file_count += 1;
    }
    debug!(folder = %folder.display(), file_count, total_chars, "Built folder context");

    if file_count == 0 {
        return format!(
            "Local folder context is enabled for: {}\nNo readable text/code files were found in this folder.",
            folder.display()
        );
    }
    format!(
        "Local folder context is enabled for: {}\nLoaded {} text/code files (truncated snippets).\nUse this context when relevant. If missing details, say what file/content is needed.{}",
        folder.display(),
        file_count,
        blocks
    )
}
