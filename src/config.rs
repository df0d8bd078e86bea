use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PixieError, Result};
use crate::runtime_paths;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_COHERE_BASE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_COHERE_MODEL: &str = "command-r-08-2024";
pub const DEFAULT_HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";
pub const DEFAULT_TTS_MODEL: &str = "playai-tts";
pub const DEFAULT_VOICE: &str = "Fritz-PlayAI";

/// Key/value source for configuration: the `.env` file first, then the
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    values: HashMap<String, String>,
    use_process_env: bool,
}

impl EnvLookup {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut values = HashMap::new();
        if path.is_file() {
            let iter = dotenv::from_path_iter(path).map_err(|e| {
                PixieError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| {
                    PixieError::Config(format!("failed to parse {}: {e}", path.display()))
                })?;
                values.insert(key, value);
            }
        } else {
            tracing::debug!(path = %path.display(), "No .env file found; using process environment");
        }
        Ok(Self {
            values,
            use_process_env: true,
        })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            use_process_env: false,
        }
    }

    /// First non-empty value among `keys`, checking the file before the
    /// process environment.
    pub fn get(&self, keys: &[&str]) -> Option<String> {
        let from_file = keys
            .iter()
            .filter_map(|key| self.values.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string);
        if from_file.is_some() || !self.use_process_env {
            return from_file;
        }
        keys.iter()
            .filter_map(|key| std::env::var(key).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub transcription_model: String,
    pub tts_model: String,
    pub voice: String,
    pub input_language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub network_allow: Vec<String>,
    pub default_deny: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub allowed_chat_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub username: String,
    pub assistant_name: String,
    pub groq: ProviderConfig,
    pub cohere: ProviderConfig,
    pub images: ImageConfig,
    pub speech: SpeechConfig,
    pub search: SearchConfig,
    pub telegram: TelegramConfig,
    pub data_dir: PathBuf,
    pub audio_player: Option<String>,
}

impl Config {
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let lookup = EnvLookup::from_file(path)?;
        Ok(Self::from_lookup(&lookup))
    }

    pub fn from_lookup(env: &EnvLookup) -> Self {
        let groq_key = env.get(&["GroqAPIKey", "GROQ_API_KEY"]);
        let groq_base = env
            .get(&["GroqBaseUrl", "GROQ_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string());

        let groq = ProviderConfig {
            api_key: groq_key.clone(),
            model: env
                .get(&["GroqModel", "GROQ_MODEL"])
                .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            base_url: groq_base.clone(),
        };

        let cohere = ProviderConfig {
            api_key: env.get(&["CohereAPIKey", "COHERE_API_KEY"]),
            model: env
                .get(&["CohereModel", "COHERE_MODEL"])
                .unwrap_or_else(|| DEFAULT_COHERE_MODEL.to_string()),
            base_url: env
                .get(&["CohereBaseUrl", "COHERE_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_COHERE_BASE_URL.to_string()),
        };

        let images = ImageConfig {
            api_key: env.get(&["HuggingFaceAPIKey", "HUGGINGFACE_API_KEY"]),
            model: env.get(&["HuggingFaceModel", "HUGGINGFACE_MODEL"]),
            base_url: env
                .get(&["HuggingFaceBaseUrl", "HUGGINGFACE_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_HUGGINGFACE_BASE_URL.to_string()),
        };

        let speech = SpeechConfig {
            api_key: env.get(&["SpeechAPIKey", "SPEECH_API_KEY"]).or(groq_key),
            base_url: env
                .get(&["SpeechBaseUrl", "SPEECH_BASE_URL"])
                .unwrap_or(groq_base),
            transcription_model: env
                .get(&["TranscriptionModel", "TRANSCRIPTION_MODEL"])
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            tts_model: env
                .get(&["TtsModel", "TTS_MODEL"])
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            voice: env
                .get(&["AssistantVoice", "ASSISTANT_VOICE"])
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            input_language: env
                .get(&["InputLanguage", "INPUT_LANGUAGE"])
                .unwrap_or_else(|| "en".to_string()),
        };

        let search = SearchConfig {
            provider: env
                .get(&["SearchProvider", "SEARCH_PROVIDER"])
                .unwrap_or_else(|| "duckduckgo".to_string())
                .to_ascii_lowercase(),
            api_key: env.get(&["SearchAPIKey", "SEARCH_API_KEY"]),
            model: env.get(&["SearchModel", "SEARCH_MODEL"]),
            network_allow: env
                .get(&["SearchNetworkAllow", "SEARCH_NETWORK_ALLOW"])
                .map(|raw| {
                    raw.split(',')
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            default_deny: env
                .get(&["SearchDefaultDeny", "SEARCH_DEFAULT_DENY"])
                .map(|raw| matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let telegram = TelegramConfig {
            bot_token: env.get(&["TelegramBotToken", "TELEGRAM_BOT_TOKEN"]),
            chat_id: env.get(&["TelegramChatID", "TELEGRAM_CHAT_ID"]),
            allowed_chat_id: env.get(&["TelegramAllowedChatID", "TELEGRAM_ALLOWED_CHAT_ID"]),
        };

        Self {
            username: env
                .get(&["Username", "USERNAME_PIXIE"])
                .unwrap_or_else(|| "User".to_string()),
            assistant_name: env
                .get(&["Assistantname", "ASSISTANT_NAME"])
                .unwrap_or_else(|| "Pixie".to_string()),
            groq,
            cohere,
            images,
            speech,
            search,
            telegram,
            data_dir: env
                .get(&["DataDir", "PIXIE_DATA_DIR"])
                .map(PathBuf::from)
                .unwrap_or_else(runtime_paths::default_data_dir),
            audio_player: env.get(&["AudioPlayer", "AUDIO_PLAYER"]),
        }
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn require_groq_key(&self) -> Result<String> {
        self.groq.api_key.clone().ok_or_else(|| {
            PixieError::Config(
                "Missing Groq API key. Set 'GroqAPIKey' or 'GROQ_API_KEY' in .env or environment variables."
                    .to_string(),
            )
        })
    }

    pub fn chat_log_path(&self) -> PathBuf {
        self.data_dir.join(runtime_paths::CHAT_LOG_FILE)
    }

    pub fn folder_context_path(&self) -> PathBuf {
        self.data_dir.join(runtime_paths::FOLDER_CONTEXT_FILE)
    }

    pub fn telegram_state_path(&self) -> PathBuf {
        self.data_dir.join(runtime_paths::TELEGRAM_STATE_FILE)
    }

    pub fn speech_output_path(&self) -> PathBuf {
        self.data_dir.join(runtime_paths::SPEECH_FILE)
    }

    pub fn is_english_input(&self) -> bool {
        let lang = self.speech.input_language.to_ascii_lowercase();
        lang == "en" || lang.starts_with("en-")
    }
}
