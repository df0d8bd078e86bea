use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::{PixieError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohereTurn {
    pub role: String,
    pub message: String,
}

impl CohereTurn {
    pub fn chatbot(message: &str) -> Self {
        Self {
            role: "Chatbot".to_string(),
            message: message.to_string(),
        }
    }

    pub fn user(message: &str) -> Self {
        Self {
            role: "User".to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CohereChatRequest<'a> {
    pub message: &'a str,
    pub preamble: &'a str,
    pub chat_history: &'a [CohereTurn],
    pub temperature: f32,
}

/// Minimal client for Cohere's v1 chat endpoint.
#[derive(Clone)]
pub struct CohereClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl CohereClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    pub async fn chat(&self, request: CohereChatRequest<'_>) -> Result<String> {
        let url = format!("{}/v1/chat", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "message": request.message,
            "temperature": request.temperature,
            "chat_history": request.chat_history,
            "prompt_truncation": "OFF",
            "preamble": request.preamble,
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PixieError::Http(format!("Cohere chat transport failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PixieError::Http(format!(
                "Cohere chat failed ({status}): {body}"
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PixieError::Serialization(format!("Cohere chat decode failed: {e}")))?;
        data.get("text")
            .and_then(|v| v.as_str())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| PixieError::Runtime("Cohere response missing text".to_string()))
    }
}
