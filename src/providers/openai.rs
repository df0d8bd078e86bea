use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use async_openai::{
    config::OpenAIConfig,
    types::{
        audio::{
            AudioInput, AudioResponseFormat, CreateSpeechRequestArgs,
            CreateTranscriptionRequestArgs, SpeechModel, SpeechResponseFormat, Voice,
        },
        chat::{
            ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
            ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
            ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
            CreateChatCompletionRequestArgs,
        },
        InputSource,
    },
    Client,
};

use crate::chat_log::{ChatMessage, Role};
use crate::config::{ProviderConfig, SpeechConfig};
use crate::error::{PixieError, Result};
use crate::interfaces::providers::{CompletionOptions, LlmProvider, SpeechProvider};

/// Client for OpenAI-compatible endpoints (Groq by default).
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    client: Client<OpenAIConfig>,
    api_key: String,
    base_url: String,
    transcription_model: String,
    tts_model: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(base_url.clone());
        Self {
            model,
            client: Client::with_config(config),
            api_key,
            base_url,
            transcription_model: crate::config::DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            tts_model: crate::config::DEFAULT_TTS_MODEL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_chat_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            PixieError::Config(
                "Missing Groq API key. Set 'GroqAPIKey' or 'GROQ_API_KEY' in .env or environment variables."
                    .to_string(),
            )
        })?;
        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    pub fn from_speech_config(config: &SpeechConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            PixieError::Config("Missing speech API key (SpeechAPIKey or GroqAPIKey)".to_string())
        })?;
        let mut provider = Self::new(api_key, String::new(), config.base_url.clone());
        provider.transcription_model = config.transcription_model.clone();
        provider.tts_model = config.tts_model.clone();
        Ok(provider)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn raw_chat_completion(&self, request: &CreateChatCompletionRequest) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        for attempt in 0..3 {
            let response = self
                .http
                .post(url.clone())
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| PixieError::Http(format!("Chat completion transport failed: {e}")))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| PixieError::Http(format!("Chat completion read failed: {e}")))?;

            if status == StatusCode::OK {
                return serde_json::from_str(&body).map_err(|e| {
                    PixieError::Serialization(format!("Chat completion decode failed: {e}"))
                });
            }

            let lower = body.to_ascii_lowercase();
            let retryable_json_truncation = status.is_server_error()
                && (lower.contains("unexpected end of json")
                    || lower.contains("unexpected end of input")
                    || lower.contains("unexpected eof"));

            if retryable_json_truncation && attempt < 2 {
                warn!(attempt, %status, "Retrying truncated chat completion");
                tokio::time::sleep(Duration::from_millis(150 * (attempt + 1) as u64)).await;
                continue;
            }

            return Err(PixieError::Http(format!(
                "Chat completion failed ({status}): {body}"
            )));
        }

        Err(PixieError::Http(
            "Chat completion failed after retries".to_string(),
        ))
    }

    fn extract_text_from_value(response: &Value) -> Option<String> {
        response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|text| text.to_string())
    }

    fn build_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let built = match message.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map_err(|e| PixieError::Runtime(e.to_string()))?,
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        message.content.clone(),
                    ))
                    .build()
                    .map_err(|e| PixieError::Runtime(e.to_string()))?,
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.as_str())
                    .build()
                    .map_err(|e| PixieError::Runtime(e.to_string()))?,
            ),
        };
        Ok(built)
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CreateChatCompletionRequest> {
        let request_messages = messages
            .iter()
            .filter(|message| !(message.role == Role::System && message.content.is_empty()))
            .map(Self::build_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(request_messages);
        builder.temperature(options.temperature);
        builder.top_p(options.top_p);
        if let Some(max_tokens) = options.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
        builder
            .build()
            .map_err(|e| PixieError::Runtime(e.to_string()))
    }

    fn voice_from_str(voice: &str) -> Voice {
        match voice.to_lowercase().as_str() {
            "alloy" => Voice::Alloy,
            "ash" => Voice::Ash,
            "ballad" => Voice::Ballad,
            "coral" => Voice::Coral,
            "echo" => Voice::Echo,
            "fable" => Voice::Fable,
            "onyx" => Voice::Onyx,
            "nova" => Voice::Nova,
            "sage" => Voice::Sage,
            "shimmer" => Voice::Shimmer,
            "verse" => Voice::Verse,
            _ => Voice::Other(voice.to_string()),
        }
    }

    fn speech_model_from_str(model: &str) -> SpeechModel {
        match model {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }

    fn speech_format_from_str(format: &str) -> SpeechResponseFormat {
        match format.to_lowercase().as_str() {
            "opus" => SpeechResponseFormat::Opus,
            "aac" => SpeechResponseFormat::Aac,
            "flac" => SpeechResponseFormat::Flac,
            "wav" => SpeechResponseFormat::Wav,
            "pcm" | "pcm16" => SpeechResponseFormat::Pcm,
            _ => SpeechResponseFormat::Mp3,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<String> {
        let request = self.build_request(&messages, options)?;
        debug!(model = %self.model, messages = messages.len(), "Sending chat completion");
        let raw = self.raw_chat_completion(&request).await?;
        Self::extract_text_from_value(&raw)
            .ok_or_else(|| PixieError::Runtime("Empty chat response".to_string()))
    }
}

#[async_trait]
impl SpeechProvider for OpenAiProvider {
    async fn transcribe_audio(&self, audio_bytes: Vec<u8>, input_format: &str) -> Result<String> {
        let file = AudioInput {
            source: InputSource::VecU8 {
                filename: format!("audio.{}", input_format),
                vec: audio_bytes,
            },
        };

        let request = CreateTranscriptionRequestArgs::default()
            .file(file)
            .model(self.transcription_model.clone())
            .response_format(AudioResponseFormat::Json)
            .build()
            .map_err(|e| PixieError::Runtime(e.to_string()))?;

        let response = self
            .client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e| PixieError::Http(e.to_string()))?;

        Ok(response.text.trim().to_string())
    }

    async fn tts(&self, text: &str, voice: &str, response_format: &str) -> Result<Vec<u8>> {
        let request = CreateSpeechRequestArgs::default()
            .model(Self::speech_model_from_str(&self.tts_model))
            .input(text)
            .voice(Self::voice_from_str(voice))
            .response_format(Self::speech_format_from_str(response_format))
            .build()
            .map_err(|e| PixieError::Runtime(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e| PixieError::Http(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}
