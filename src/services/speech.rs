use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::chat_log::ChatMessage;
use crate::config::SpeechConfig;
use crate::error::{PixieError, Result};
use crate::interfaces::providers::{CompletionOptions, LlmProvider, SpeechProvider};
use crate::interfaces::status::{AssistantStatus, StatusSink};
use crate::interfaces::system::Launcher;
use crate::text::query_modifier;

const TRANSLATE_PROMPT: &str =
    "Translate the user's message into English. Reply with the translation only, without quotes or notes.";

fn is_english(language: &str) -> bool {
    let lang = language.trim().to_ascii_lowercase();
    lang.is_empty() || lang == "en" || lang.starts_with("en-") || lang == "english"
}

/// Audio format hint for the transcription endpoint, taken from the file extension.
pub fn audio_format(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "wav".to_string())
}

/// Speech in both directions: recorded audio to a normalized query, and
/// answers to spoken audio.
pub struct SpeechService {
    provider: Arc<dyn SpeechProvider>,
    translator: Option<Arc<dyn LlmProvider>>,
    launcher: Option<Arc<dyn Launcher>>,
    voice: String,
    input_language: String,
    output_path: PathBuf,
}

impl SpeechService {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        config: &SpeechConfig,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            translator: None,
            launcher: None,
            voice: config.voice.clone(),
            input_language: config.input_language.clone(),
            output_path: output_path.into(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn LlmProvider>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn needs_translation(&self) -> bool {
        !is_english(&self.input_language)
    }

    pub async fn transcribe_bytes(&self, bytes: Vec<u8>, format: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(PixieError::Runtime("Audio input is empty".to_string()));
        }
        let text = self.provider.transcribe_audio(bytes, format).await?;
        debug!(chars = text.len(), "Transcribed audio");
        Ok(text)
    }

    pub async fn translate(&self, text: &str) -> Result<String> {
        let translator = self.translator.as_ref().ok_or_else(|| {
            PixieError::Config("Translation needs a chat model (GroqAPIKey)".to_string())
        })?;
        let options = CompletionOptions {
            temperature: 0.0,
            ..CompletionOptions::default()
        };
        let translated = translator
            .complete(
                vec![ChatMessage::system(TRANSLATE_PROMPT), ChatMessage::user(text)],
                &options,
            )
            .await?;
        Ok(translated.trim().to_string())
    }

    /// Turns recorded audio into a query the assistant can route, reporting
    /// `Listening...` and, for non-English input, `Translating...`.
    pub async fn listen(
        &self,
        bytes: Vec<u8>,
        format: &str,
        status: &dyn StatusSink,
    ) -> Result<String> {
        status.set_status(AssistantStatus::Listening);
        let text = self.transcribe_bytes(bytes, format).await?;
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        if self.needs_translation() {
            status.set_status(AssistantStatus::Translating);
            let translated = self.translate(&text).await?;
            return Ok(query_modifier(&translated));
        }
        Ok(query_modifier(&text))
    }

    pub async fn listen_file(&self, path: &Path, status: &dyn StatusSink) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        self.listen(bytes, &audio_format(path), status).await
    }

    /// MP3 audio for `text` in the configured voice.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(PixieError::Runtime("Nothing to speak".to_string()));
        }
        self.provider.tts(text, &self.voice, "mp3").await
    }

    /// Synthesizes `text` to the speech file and plays it when a launcher is set.
    pub async fn speak(&self, text: &str) -> Result<PathBuf> {
        let audio = self.synthesize(text).await?;
        if let Some(parent) = self.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output_path, audio).await?;
        info!(path = %self.output_path.display(), "Saved speech audio");
        if let Some(launcher) = &self.launcher {
            launcher.play_audio(&self.output_path).await?;
        }
        Ok(self.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_variants_skip_translation() {
        assert!(is_english("en"));
        assert!(is_english("en-US"));
        assert!(is_english(""));
        assert!(!is_english("hi"));
        assert!(!is_english("fr-FR"));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(audio_format(Path::new("/tmp/note.OGG")), "ogg");
        assert_eq!(audio_format(Path::new("/tmp/recording")), "wav");
    }
}
