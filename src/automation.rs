//! Desktop task execution for `open`, `close`, `play`, `system`, `content`,
//! `google search` and `youtube search` intents.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{info, warn};

use crate::error::{PixieError, Result};
use crate::interfaces::system::{Launcher, SystemKey};
use crate::router::Intent;
use crate::services::content::ContentWriter;
use crate::system::launcher::process_name;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.75 Safari/537.36";

static VIDEO_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""videoId":"([A-Za-z0-9_-]{11})""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationOutcome {
    pub intent: Intent,
    pub success: bool,
    pub detail: String,
}

impl AutomationOutcome {
    fn done(intent: &Intent, detail: impl Into<String>) -> Self {
        Self {
            intent: intent.clone(),
            success: true,
            detail: detail.into(),
        }
    }

    fn failed(intent: &Intent, detail: impl Into<String>) -> Self {
        Self {
            intent: intent.clone(),
            success: false,
            detail: detail.into(),
        }
    }
}

pub fn parse_system_command(command: &str) -> Option<SystemKey> {
    let lower = command.to_lowercase();
    if lower.contains("unmute") {
        Some(SystemKey::Unmute)
    } else if lower.contains("mute") {
        Some(SystemKey::Mute)
    } else if lower.contains("volume up") {
        Some(SystemKey::VolumeUp)
    } else if lower.contains("volume down") {
        Some(SystemKey::VolumeDown)
    } else {
        None
    }
}

pub fn first_video_id(html: &str) -> Option<String> {
    VIDEO_ID_RE.captures(html).map(|caps| caps[1].to_string())
}

pub struct Automation {
    launcher: Arc<dyn Launcher>,
    content: Option<Arc<ContentWriter>>,
    http: Client,
    google_base: String,
    youtube_base: String,
}

impl Automation {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            content: None,
            http: Client::new(),
            google_base: "https://www.google.com".to_string(),
            youtube_base: "https://www.youtube.com".to_string(),
        }
    }

    pub fn with_content_writer(mut self, writer: Arc<ContentWriter>) -> Self {
        self.content = Some(writer);
        self
    }

    pub fn with_youtube_base(mut self, base: impl Into<String>) -> Self {
        self.youtube_base = base.into();
        self
    }

    fn url(&self, base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/{}", base.trim_end_matches('/'), path);
        Url::parse_with_params(&raw, params)
            .map_err(|e| PixieError::Runtime(format!("Invalid URL {raw}: {e}")))
    }

    pub fn google_search_url(&self, topic: &str) -> Result<Url> {
        self.url(&self.google_base, "search", &[("q", topic)])
    }

    pub fn youtube_search_url(&self, topic: &str) -> Result<Url> {
        self.url(&self.youtube_base, "results", &[("search_query", topic)])
    }

    /// Resolves the first video for `query`, falling back to the results page.
    pub async fn youtube_play_url(&self, query: &str) -> Result<Url> {
        let results = self.youtube_search_url(query)?;
        let page = self
            .http
            .get(results.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        let html = match page {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                warn!(status = %response.status(), "YouTube results request rejected");
                String::new()
            }
            Err(err) => {
                warn!(error = %err, "YouTube results request failed");
                String::new()
            }
        };
        match first_video_id(&html) {
            Some(id) => self.url(&self.youtube_base, "watch", &[("v", id.as_str())]),
            None => Ok(results),
        }
    }

    async fn open_app_or_website(&self, intent: &Intent, app: &str) -> Result<AutomationOutcome> {
        let app = app.trim().to_lowercase();
        match self.launcher.open_app(&app).await {
            Ok(()) => Ok(AutomationOutcome::done(intent, format!("Opened {app}"))),
            Err(err) => {
                info!(app = %app, error = %err, "Application not found; opening website");
                let query = format!("{app} official website");
                let url = self.url(
                    &self.google_base,
                    "search",
                    &[("q", query.as_str()), ("btnI", "1")],
                )?;
                self.launcher.open_url(url.as_str()).await?;
                Ok(AutomationOutcome::done(
                    intent,
                    format!("Opened the website for {app}"),
                ))
            }
        }
    }

    async fn run(&self, intent: &Intent) -> Result<AutomationOutcome> {
        match intent {
            Intent::GoogleSearch(topic) => {
                let url = self.google_search_url(topic.trim())?;
                self.launcher.open_url(url.as_str()).await?;
                Ok(AutomationOutcome::done(intent, format!("Searched Google for {topic}")))
            }
            Intent::YoutubeSearch(topic) => {
                let url = self.youtube_search_url(topic.trim())?;
                self.launcher.open_url(url.as_str()).await?;
                Ok(AutomationOutcome::done(intent, format!("Searched YouTube for {topic}")))
            }
            Intent::Play(query) => {
                let url = self.youtube_play_url(query.trim()).await?;
                self.launcher.open_url(url.as_str()).await?;
                Ok(AutomationOutcome::done(intent, format!("Playing {query}")))
            }
            Intent::Open(app) => self.open_app_or_website(intent, app).await,
            Intent::Close(app) => {
                if app.split_whitespace().any(|word| word.eq_ignore_ascii_case("all")) {
                    return Ok(AutomationOutcome::failed(
                        intent,
                        "Refusing to close every application",
                    ));
                }
                if let Err(err) = process_name(app) {
                    return Ok(AutomationOutcome::failed(intent, err.to_string()));
                }
                self.launcher.close_app(app).await?;
                Ok(AutomationOutcome::done(intent, format!("Closed {app}")))
            }
            Intent::System(command) => match parse_system_command(command) {
                Some(key) => {
                    self.launcher.system_key(key).await?;
                    Ok(AutomationOutcome::done(intent, format!("Done: {command}")))
                }
                None => Ok(AutomationOutcome::failed(
                    intent,
                    format!("Unknown system task: {command}"),
                )),
            },
            Intent::Content(topic) => {
                let writer = self.content.as_ref().ok_or_else(|| {
                    PixieError::Config("Content writing needs a chat model (GroqAPIKey)".to_string())
                })?;
                let path = writer.write(topic).await?;
                self.launcher.open_in_editor(&path).await?;
                Ok(AutomationOutcome::done(
                    intent,
                    format!("Wrote {}", path.display()),
                ))
            }
            other => Ok(AutomationOutcome::failed(
                other,
                format!("'{}' is not an automation task", other.kind()),
            )),
        }
    }

    /// Executes one intent; failures become unsuccessful outcomes.
    pub async fn execute(&self, intent: &Intent) -> AutomationOutcome {
        match self.run(intent).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(intent = %intent, error = %err, "Automation task failed");
                AutomationOutcome::failed(intent, err.to_string())
            }
        }
    }

    /// Runs the automation intents of a decision one at a time, in decision order.
    pub async fn execute_all(&self, intents: &[Intent]) -> Vec<AutomationOutcome> {
        let mut outcomes = Vec::new();
        for intent in intents.iter().filter(|intent| intent.is_automation()) {
            outcomes.push(self.execute(intent).await);
        }
        outcomes
    }
}
