use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use rand::rngs::SysRng;
use rand::TryRng;
use tracing::{info, warn};

use crate::error::{PixieError, Result};
use crate::interfaces::providers::ImageProvider;
use crate::interfaces::system::Launcher;

pub const IMAGES_PER_PROMPT: usize = 4;
const MAX_SEED: u32 = 1_000_000;

const DIAGRAM_KEYWORDS: &[&str] = &[
    "diagram",
    "flowchart",
    "chart",
    "graph",
    "infographic",
    "mind map",
    "architecture diagram",
    "org chart",
];
const DIAGRAM_STYLE: &str = "clean white background, 2D vector style, clear labels, readable typography, presentation-ready layout";

/// Drops a leading routing prefix and steers diagram requests to a flat style.
pub fn normalize_prompt(raw: &str) -> String {
    let mut prompt = raw.trim().to_string();
    if prompt.to_lowercase().starts_with("generate image") {
        prompt = prompt["generate image".len()..]
            .trim_matches(|c| matches!(c, ' ' | ':' | ',' | '-'))
            .to_string();
    }
    let lower = prompt.to_lowercase();
    if DIAGRAM_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        prompt = format!("{prompt}, {DIAGRAM_STYLE}");
    }
    prompt
}

pub fn prompt_slug(prompt: &str) -> String {
    prompt
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

fn random_seed() -> Result<u32> {
    let mut bytes = [0u8; 4];
    SysRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| PixieError::Runtime(e.to_string()))?;
    Ok(u32::from_le_bytes(bytes) % (MAX_SEED + 1))
}

fn request_inputs(prompt: &str, seed: u32) -> String {
    format!(
        "{prompt}, quality=4K, sharpness=maximum, Ultra High details, high resolution, seed={seed}"
    )
}

/// Generates a batch of images for one prompt, saves them, then opens them.
pub struct ImageGenerator {
    provider: Arc<dyn ImageProvider>,
    output_dir: PathBuf,
    launcher: Option<Arc<dyn Launcher>>,
}

impl ImageGenerator {
    pub fn new(provider: Arc<dyn ImageProvider>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            output_dir: output_dir.into(),
            launcher: None,
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Runs the four requests concurrently; any failed request fails the batch.
    pub async fn generate(&self, raw_prompt: &str) -> Result<Vec<PathBuf>> {
        let prompt = normalize_prompt(raw_prompt);
        if prompt.is_empty() {
            return Err(PixieError::Runtime("Empty image prompt.".to_string()));
        }
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut requests = Vec::with_capacity(IMAGES_PER_PROMPT);
        for _ in 0..IMAGES_PER_PROMPT {
            let inputs = request_inputs(&prompt, random_seed()?);
            let provider = Arc::clone(&self.provider);
            requests.push(async move { provider.text_to_image(&inputs).await });
        }
        let images = try_join_all(requests).await?;

        let slug = prompt_slug(&prompt);
        let mut saved = Vec::with_capacity(images.len());
        for (idx, bytes) in images.into_iter().enumerate() {
            let path = self.output_dir.join(format!("{slug}{}.jpg", idx + 1));
            tokio::fs::write(&path, bytes).await?;
            saved.push(path);
        }
        info!(count = saved.len(), prompt = %prompt, "Saved generated images");

        if let Some(launcher) = &self.launcher {
            for path in &saved {
                if let Err(err) = launcher.open_file(path).await {
                    warn!(path = %path.display(), error = %err, "Unable to open image");
                }
            }
        }
        Ok(saved)
    }
}
