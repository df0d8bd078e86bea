use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::files::{
    resolve_user_path, upload_refusal, zip_folder, UploadKind, MAX_UPLOAD_BYTES,
    MAX_ZIP_SOURCE_BYTES,
};
use crate::assistant::Assistant;
use crate::config::TelegramConfig;
use crate::error::{PixieError, Result};
use crate::interfaces::status::TracingStatusSink;
use crate::text::chunk_text;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const MESSAGE_CHUNK_CHARS: usize = 4000;
const POLL_TIMEOUT_SECS: u64 = 50;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const NOT_LINKED: &str = "No Telegram chat is linked yet. Send /start to your bot first.";
const HELP_TEXT: &str = "Commands:\n/start - link this chat\n/help - show this message\n/clear - forget the conversation\n/voice <text> - reply with a voice note\n/sendfile <absolute_path>\n/sendfolder <absolute_folder_path>\nAny other text or a voice note = ask Pixie";
const START_TEXT: &str =
    "Pixie Telegram bridge connected.\nTry /help, /sendfile <absolute_path>, or ask a normal question.";
const FILES_DISABLED: &str =
    "File transfer is disabled. Set TELEGRAM_ALLOWED_CHAT_ID to this chat's id to enable it.";
const NO_VOICE: &str = "Voice replies need SpeechAPIKey or GroqAPIKey.";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TelegramState {
    #[serde(default)]
    pub last_update_id: i64,
    #[serde(default)]
    pub primary_chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
    pub voice: Option<Voice>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Voice {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    file_path: Option<String>,
}

fn command_argument<'a>(raw: &'a str, command: &str) -> &'a str {
    raw.get(command.len()..).unwrap_or_default().trim()
}

/// Long-polling bridge that lets a Telegram chat talk to the assistant.
pub struct TelegramBridge {
    token: String,
    api_base: String,
    default_chat_id: String,
    allowed_chat_id: Option<String>,
    state_path: PathBuf,
    work_dir: PathBuf,
    assistant: Arc<Assistant>,
    http: reqwest::Client,
}

impl TelegramBridge {
    pub fn new(
        config: &TelegramConfig,
        state_path: impl Into<PathBuf>,
        assistant: Arc<Assistant>,
    ) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                PixieError::Config(
                    "Missing Telegram bot token. Set TELEGRAM_BOT_TOKEN in .env.".to_string(),
                )
            })?;
        let state_path = state_path.into();
        let work_dir = state_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("TelegramFiles");
        Ok(Self {
            token: token.trim().to_string(),
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            default_chat_id: config.chat_id.clone().unwrap_or_default(),
            allowed_chat_id: config.allowed_chat_id.clone().filter(|id| !id.is_empty()),
            state_path,
            work_dir,
            assistant,
            http: reqwest::Client::new(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn load_state(&self) -> TelegramState {
        let mut state: TelegramState = fs::read_to_string(&self.state_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        if state.primary_chat_id.trim().is_empty() {
            state.primary_chat_id = self.default_chat_id.clone();
        }
        state
    }

    fn save_state(&self, state: &TelegramState) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.state_path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }

    fn set_primary_chat(&self, chat_id: &str) -> Result<()> {
        let mut state = self.load_state();
        if state.primary_chat_id != chat_id {
            state.primary_chat_id = chat_id.to_string();
            self.save_state(&state)?;
        }
        Ok(())
    }

    pub fn is_allowed_chat(&self, chat_id: &str) -> bool {
        match &self.allowed_chat_id {
            Some(allowed) => allowed == chat_id,
            None => true,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        method: &str,
        sent: reqwest::Result<reqwest::Response>,
    ) -> Result<T> {
        let response =
            sent.map_err(|e| PixieError::Http(format!("Telegram {method} failed: {e}")))?;
        let status = response.status();
        let body = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            PixieError::Serialization(format!("Telegram {method} ({status}) decode failed: {e}"))
        })?;
        if !parsed.ok {
            return Err(PixieError::Http(format!(
                "Telegram {method} rejected: {}",
                parsed.description.unwrap_or(body)
            )));
        }
        parsed
            .result
            .ok_or_else(|| PixieError::Http(format!("Telegram {method} returned no result")))
    }

    async fn api<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<T> {
        let sent = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await;
        Self::decode(method, sent).await
    }

    async fn upload(
        &self,
        method: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
        fields: &[(&str, &str)],
    ) -> Result<()> {
        let mut form = Form::new();
        for (key, value) in fields {
            form = form.text(key.to_string(), value.to_string());
        }
        form = form.part(
            field.to_string(),
            Part::bytes(bytes).file_name(file_name.to_string()),
        );
        let sent = self
            .http
            .post(self.method_url(method))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await;
        let _: Value = Self::decode(method, sent).await?;
        Ok(())
    }

    fn target_chat(&self, chat_id: Option<&str>) -> Option<String> {
        let target = match chat_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.load_state().primary_chat_id,
        };
        (!target.trim().is_empty()).then_some(target)
    }

    /// Sends `text` to `chat_id`, or to the linked primary chat when `None`.
    pub async fn send_text(&self, text: &str, chat_id: Option<&str>) -> Result<String> {
        let Some(target) = self.target_chat(chat_id) else {
            return Ok(NOT_LINKED.to_string());
        };
        let text = if text.trim().is_empty() { "(empty reply)" } else { text };
        for chunk in chunk_text(text, MESSAGE_CHUNK_CHARS) {
            let _: Value = self
                .api(
                    "sendMessage",
                    &json!({ "chat_id": target, "text": chunk }),
                    Duration::from_secs(40),
                )
                .await?;
        }
        Ok("Sent to Telegram.".to_string())
    }

    async fn send_path(&self, path: &Path, target: &str, caption: Option<&str>) -> Result<String> {
        let kind = UploadKind::for_path(path);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let bytes = tokio::fs::read(path).await?;
        let mut fields = vec![("chat_id", target)];
        if let Some(caption) = caption {
            fields.push(("caption", caption));
        }
        self.upload(kind.method(), kind.field(), &file_name, bytes, &fields)
            .await?;
        info!(file = %file_name, method = kind.method(), "Sent file to Telegram");
        Ok(format!("Sent file: {file_name}"))
    }

    /// Uploads a local file as a photo, video, audio, voice note or document.
    pub async fn send_file(&self, raw_path: &str, chat_id: Option<&str>) -> Result<String> {
        let Some(target) = self.target_chat(chat_id) else {
            return Ok(NOT_LINKED.to_string());
        };
        let path = match resolve_user_path(raw_path) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };
        if let Some(refusal) = upload_refusal(&path) {
            return Ok(refusal);
        }
        self.send_path(&path, &target, None).await
    }

    /// Zips a local folder and uploads the archive as a document.
    pub async fn send_folder(&self, raw_path: &str, chat_id: Option<&str>) -> Result<String> {
        let Some(target) = self.target_chat(chat_id) else {
            return Ok(NOT_LINKED.to_string());
        };
        let folder = match resolve_user_path(raw_path) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };
        if !folder.is_dir() {
            return Ok(format!("Not a folder: {}", folder.display()));
        }
        let name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "folder".to_string());
        let stamp = chrono::Local::now().timestamp_millis();
        let archive = self.work_dir.join(format!("{name}_{stamp}.zip"));

        let (source, dest) = (folder.clone(), archive.clone());
        let summary = tokio::task::spawn_blocking(move || {
            zip_folder(&source, &dest, MAX_ZIP_SOURCE_BYTES)
        })
        .await
        .map_err(|e| PixieError::Runtime(format!("Folder zip task failed: {e}")))??;

        let result = if summary.files == 0 {
            Ok("No files were added to zip (folder empty or everything skipped).".to_string())
        } else if summary.zip_bytes > MAX_UPLOAD_BYTES {
            Ok(format!(
                "Zip created but too large to send via bot: {:.1} MB. Max is 50 MB. Try a smaller subfolder.",
                summary.zip_bytes as f64 / (1024.0 * 1024.0)
            ))
        } else {
            self.send_path(&archive, &target, Some(&format!("Folder ZIP: {name}")))
                .await
                .map(|sent| format!("{sent} | {}", summary.describe()))
        };
        if let Err(err) = tokio::fs::remove_file(&archive).await {
            debug!(path = %archive.display(), error = %err, "Could not remove folder zip");
        }
        result
    }

    /// Speaks `text` and sends it as a voice note, falling back to an audio
    /// upload when the voice upload is rejected.
    pub async fn send_voice_note(&self, text: &str, chat_id: Option<&str>) -> Result<String> {
        let Some(target) = self.target_chat(chat_id) else {
            return Ok(NOT_LINKED.to_string());
        };
        let Some(speech) = self.assistant.speech() else {
            return Ok(NO_VOICE.to_string());
        };
        let audio = speech.synthesize(text).await?;
        let voice = self
            .upload(
                "sendVoice",
                "voice",
                "reply.mp3",
                audio.clone(),
                &[("chat_id", target.as_str())],
            )
            .await;
        if let Err(err) = voice {
            debug!(error = %err, "sendVoice rejected; sending as audio");
            self.upload(
                "sendAudio",
                "audio",
                "reply.mp3",
                audio,
                &[("chat_id", target.as_str()), ("title", "Pixie reply")],
            )
            .await?;
        }
        Ok("Sent voice reply to Telegram.".to_string())
    }

    /// Sends `text` as a voice note when speech is configured, otherwise as text.
    async fn reply_spoken(&self, text: &str, chat_id: &str) -> Result<()> {
        if self.assistant.speech().is_some() {
            match self.send_voice_note(text, Some(chat_id)).await {
                Ok(_) => return Ok(()),
                Err(err) => warn!(error = %err, "Voice reply failed; sending text"),
            }
        }
        self.send_text(text, Some(chat_id)).await.map(|_| ())
    }

    fn files_enabled(&self) -> bool {
        self.allowed_chat_id.is_some()
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.api(
            "getUpdates",
            &json!({ "timeout": POLL_TIMEOUT_SECS, "offset": offset }),
            Duration::from_secs(POLL_TIMEOUT_SECS + 10),
        )
        .await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let remote: RemoteFile = self
            .api(
                "getFile",
                &json!({ "file_id": file_id }),
                Duration::from_secs(40),
            )
            .await?;
        let file_path = remote.file_path.ok_or_else(|| {
            PixieError::Http("Unable to resolve Telegram file path.".to_string())
        })?;
        let url = format!(
            "{}/file/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            file_path
        );
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(40))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PixieError::Http(format!(
                "Telegram file download failed ({})",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Answers `prompt` through chat or realtime search. Remote chats never
    /// trigger desktop automation.
    async fn answer(&self, prompt: &str) -> String {
        match self.assistant.converse(prompt).await {
            Ok(outcome) => outcome.answer.unwrap_or_else(|| "Done.".to_string()),
            Err(err) => {
                warn!(error = %err, "Telegram turn failed");
                format!("Error: {err}")
            }
        }
    }

    pub async fn handle_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let raw = text.trim();
        let lower = raw.to_lowercase();
        let reply = match lower.as_str() {
            "/start" => {
                self.set_primary_chat(chat_id)?;
                START_TEXT.to_string()
            }
            "/help" => HELP_TEXT.to_string(),
            "/clear" => {
                self.assistant.chat_log().clear()?;
                "Conversation cleared.".to_string()
            }
            _ if lower.starts_with("/voice ") => {
                let message = self
                    .send_voice_note(command_argument(raw, "/voice "), Some(chat_id))
                    .await?;
                if message == NO_VOICE {
                    message
                } else {
                    return Ok(());
                }
            }
            _ if lower.starts_with("/sendfile ") => {
                if !self.files_enabled() {
                    FILES_DISABLED.to_string()
                } else {
                    self.send_file(command_argument(raw, "/sendfile "), Some(chat_id))
                        .await?
                }
            }
            _ if lower.starts_with("/sendfolder ") => {
                if !self.files_enabled() {
                    FILES_DISABLED.to_string()
                } else {
                    self.send_text(
                        "Preparing folder ZIP... this can take a bit for large folders.",
                        Some(chat_id),
                    )
                    .await?;
                    self.send_folder(command_argument(raw, "/sendfolder "), Some(chat_id))
                        .await?
                }
            }
            _ => self.answer(raw).await,
        };
        self.send_text(&reply, Some(chat_id)).await.map(|_| ())
    }

    pub async fn handle_voice(&self, chat_id: &str, file_id: &str) -> Result<()> {
        let Some(speech) = self.assistant.speech() else {
            self.send_text(
                "I received your voice message. Please add a Groq API key for transcription.",
                Some(chat_id),
            )
            .await?;
            return Ok(());
        };
        let audio = self.download_file(file_id).await?;
        let transcript = speech.listen(audio, "ogg", &TracingStatusSink).await?;
        if transcript.is_empty() {
            self.send_text("I could not understand that voice message.", Some(chat_id))
                .await?;
            return Ok(());
        }
        let answer = self.answer(&transcript).await;
        self.reply_spoken(&answer, chat_id).await?;
        self.send_text(&format!("Transcript: {transcript}"), Some(chat_id))
            .await?;
        Ok(())
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let Some(message) = update.message.or(update.edited_message) else {
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        if !self.is_allowed_chat(&chat_id) {
            debug!(chat_id = %chat_id, "Ignoring message from unlisted chat");
            return Ok(());
        }
        self.set_primary_chat(&chat_id)?;

        if let Some(text) = message.text.filter(|text| !text.trim().is_empty()) {
            return self.handle_text(&chat_id, &text).await;
        }
        if let Some(voice) = message.voice {
            return self.handle_voice(&chat_id, &voice.file_id).await;
        }
        self.send_text("Supported: text and voice messages.", Some(&chat_id))
            .await
            .map(|_| ())
    }

    /// Fetches and handles one batch of updates, persisting the offset.
    /// Returns the next offset.
    pub async fn poll_once(&self, offset: i64) -> Result<i64> {
        let mut next = offset;
        for update in self.get_updates(offset).await? {
            let update_id = update.update_id;
            if update_id >= next {
                next = update_id + 1;
                let mut state = self.load_state();
                state.last_update_id = update_id;
                self.save_state(&state)?;
            }
            if let Err(err) = self.handle_update(update).await {
                warn!(update_id, error = %err, "Telegram update failed");
            }
        }
        Ok(next)
    }

    /// Polls until `stop` flips to true.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut offset = self.load_state().last_update_id + 1;
        info!(offset, "Telegram bridge polling");
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                result = self.poll_once(offset) => match result {
                    Ok(next) => offset = next,
                    Err(err) => {
                        warn!(error = %err, "Telegram poll failed");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                },
                _ = stop.changed() => {}
            }
        }
        info!("Telegram bridge stopped");
        Ok(())
    }
}
