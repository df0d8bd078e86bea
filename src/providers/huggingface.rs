use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ImageConfig;
use crate::error::{PixieError, Result};
use crate::interfaces::providers::ImageProvider;

pub const DEFAULT_IMAGE_MODELS: &[&str] = &[
    "black-forest-labs/FLUX.1-schnell",
    "stabilityai/stable-diffusion-3.5-large",
    "black-forest-labs/FLUX.1-dev",
    "stabilityai/stable-diffusion-xl-base-1.0",
];

/// Hugging Face inference router client. Each request walks the model list
/// until one returns image bytes.
#[derive(Clone)]
pub struct HuggingFaceImageProvider {
    api_key: String,
    base_url: String,
    models: Vec<String>,
    http: reqwest::Client,
}

impl HuggingFaceImageProvider {
    pub fn new(api_key: String, base_url: String, preferred_model: Option<String>) -> Self {
        Self {
            api_key,
            base_url,
            models: model_candidates(preferred_model.as_deref()),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            PixieError::Config(
                "Missing Hugging Face API key. Set HuggingFaceAPIKey in .env.".to_string(),
            )
        })?;
        Ok(Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
        ))
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    async fn query_model(&self, model: &str, inputs: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/hf-inference/models/{}",
            self.base_url.trim_end_matches('/'),
            model
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(std::time::Duration::from_secs(60))
            .json(&json!({ "inputs": inputs }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PixieError::Http(format!(
                "Model '{model}' failed ({status}): {}",
                truncate(&body, 500)
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("image") {
            let body = response.text().await.unwrap_or_default();
            return Err(PixieError::Runtime(format!(
                "Model '{model}' did not return an image. Response: {}",
                truncate(&body, 500)
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceImageProvider {
    async fn text_to_image(&self, inputs: &str) -> Result<Vec<u8>> {
        let mut last_error = None;
        for model in &self.models {
            match self.query_model(model, inputs).await {
                Ok(bytes) => {
                    debug!(model = %model, size = bytes.len(), "Image model returned image");
                    return Ok(bytes);
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "Image model failed; trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(PixieError::Runtime(format!(
            "All image models failed. Last error: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no models configured".to_string())
        )))
    }
}

pub fn model_candidates(preferred: Option<&str>) -> Vec<String> {
    let mut models = Vec::new();
    if let Some(model) = preferred.map(str::trim).filter(|m| !m.is_empty()) {
        models.push(model.to_string());
    }
    for model in DEFAULT_IMAGE_MODELS {
        if !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }
    models
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_model_goes_first_without_duplicates() {
        let models = model_candidates(Some("black-forest-labs/FLUX.1-dev"));
        assert_eq!(models[0], "black-forest-labs/FLUX.1-dev");
        assert_eq!(models.len(), DEFAULT_IMAGE_MODELS.len());

        let custom = model_candidates(Some("me/custom"));
        assert_eq!(custom.len(), DEFAULT_IMAGE_MODELS.len() + 1);
        assert_eq!(model_candidates(None).len(), DEFAULT_IMAGE_MODELS.len());
    }
}
