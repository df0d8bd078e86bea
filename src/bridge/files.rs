use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PixieError, Result};
use crate::folder_context::normalize_path;

/// Largest file a bot may upload.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Source bytes read into one folder archive before further files are skipped.
pub const MAX_ZIP_SOURCE_BYTES: u64 = 350 * 1024 * 1024;

const MB: f64 = 1024.0 * 1024.0;

const SKIP_DIR_NAMES: &[&str] = &[
    ".git",
    ".venv",
    "venv",
    "__pycache__",
    "node_modules",
    "dist",
    "build",
];

/// Bot API method and multipart field used to upload a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Video,
    Audio,
    Voice,
    Document,
}

impl UploadKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" => UploadKind::Photo,
            "mp4" | "mov" | "mkv" | "webm" | "avi" => UploadKind::Video,
            "mp3" | "wav" | "m4a" | "aac" | "flac" => UploadKind::Audio,
            "ogg" | "oga" | "opus" => UploadKind::Voice,
            _ => UploadKind::Document,
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            UploadKind::Photo => "sendPhoto",
            UploadKind::Video => "sendVideo",
            UploadKind::Audio => "sendAudio",
            UploadKind::Voice => "sendVoice",
            UploadKind::Document => "sendDocument",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            UploadKind::Photo => "photo",
            UploadKind::Video => "video",
            UploadKind::Audio => "audio",
            UploadKind::Voice => "voice",
            UploadKind::Document => "document",
        }
    }
}

/// Strips quotes, expands `~` and environment variables, and requires an
/// existing path. The error text is meant for the chat.
pub fn resolve_user_path(raw: &str) -> std::result::Result<PathBuf, String> {
    let clean = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if clean.is_empty() {
        return Err("Missing path.".to_string());
    }
    let path = PathBuf::from(normalize_path(clean));
    let path = path.canonicalize().unwrap_or(path);
    if !path.exists() {
        return Err(format!("Not found: {}", path.display()));
    }
    Ok(path)
}

/// Refusal text for files the bot cannot upload, if any.
pub fn upload_refusal(path: &Path) -> Option<String> {
    if !path.is_file() {
        return Some(format!("Not a file: {}", path.display()));
    }
    let size = path.metadata().map(|meta| meta.len()).unwrap_or(0);
    if size > MAX_UPLOAD_BYTES {
        return Some(format!(
            "File too large for Telegram upload: {:.1} MB (max 50 MB).",
            size as f64 / MB
        ));
    }
    None
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ZipSummary {
    pub files: usize,
    pub skipped: usize,
    pub source_bytes: u64,
    pub zip_bytes: u64,
}

impl ZipSummary {
    pub fn describe(&self) -> String {
        format!(
            "{} files, {:.1} MB source, {:.1} MB zip, {} skipped",
            self.files,
            self.source_bytes as f64 / MB,
            self.zip_bytes as f64 / MB,
            self.skipped
        )
    }
}

fn zip_error(err: zip::result::ZipError) -> PixieError {
    PixieError::Runtime(format!("Unable to zip folder: {err}"))
}

/// Writes `folder` into a deflated archive at `dest`, skipping tool and
/// dependency directories and files past the source budget.
pub fn zip_folder(folder: &Path, dest: &Path, max_source_bytes: u64) -> Result<ZipSummary> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut summary = ZipSummary::default();

    let entries = WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !SKIP_DIR_NAMES.contains(&entry.file_name().to_string_lossy().as_ref())
        });
    for entry in entries {
        let Ok(entry) = entry else {
            summary.skipped += 1;
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        if summary.source_bytes + size > max_source_bytes {
            summary.skipped += 1;
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(folder) else {
            summary.skipped += 1;
            continue;
        };
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Ok(mut source) = File::open(entry.path()) else {
            summary.skipped += 1;
            continue;
        };
        writer.start_file(name, options).map_err(zip_error)?;
        io::copy(&mut source, &mut writer)?;
        summary.files += 1;
        summary.source_bytes += size;
    }

    writer.finish().map_err(zip_error)?;
    summary.zip_bytes = std::fs::metadata(dest)?.len();
    Ok(summary)
}
