use async_trait::async_trait;

use crate::chat_log::ChatMessage;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<String>;
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn transcribe_audio(&self, audio_bytes: Vec<u8>, input_format: &str) -> Result<String>;
    async fn tts(&self, text: &str, voice: &str, response_format: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns raw image bytes for one text-to-image request.
    async fn text_to_image(&self, inputs: &str) -> Result<Vec<u8>>;
}
