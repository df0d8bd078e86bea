//! One conversational turn: folder commands, intent classification, task
//! execution, background image jobs, then a chat or realtime answer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::automation::{Automation, AutomationOutcome};
use crate::chat_log::{default_greeting, ChatLog};
use crate::error::{PixieError, Result};
use crate::folder_context::FolderContext;
use crate::interfaces::services::IntentClassifier;
use crate::interfaces::status::{AssistantStatus, StatusSink};
use crate::router::{merged_query, Intent};
use crate::services::chatbot::ChatBot;
use crate::services::images::ImageGenerator;
use crate::services::search::RealtimeSearchEngine;
use crate::services::speech::SpeechService;
use crate::text::query_modifier;

const FAREWELL_QUERY: &str = "Okay, Bye!";

/// Everything a turn produced. Image jobs keep running after the turn returns.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub intents: Vec<Intent>,
    pub answer: Option<String>,
    pub automation: Vec<AutomationOutcome>,
    pub image_jobs: Vec<JoinHandle<Result<Vec<PathBuf>>>>,
    pub exit: bool,
}

impl TurnOutcome {
    fn answered(answer: String) -> Self {
        Self {
            answer: Some(answer),
            ..Self::default()
        }
    }

    /// Waits for background image jobs, returning the saved files.
    pub async fn wait_for_images(&mut self) -> Result<Vec<PathBuf>> {
        let mut saved = Vec::new();
        for job in self.image_jobs.drain(..) {
            let paths = job
                .await
                .map_err(|e| PixieError::Runtime(format!("Image job panicked: {e}")))??;
            saved.extend(paths);
        }
        Ok(saved)
    }
}

pub struct AssistantParts {
    pub username: String,
    pub assistant_name: String,
    pub log: Arc<ChatLog>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub chatbot: ChatBot,
    pub search: RealtimeSearchEngine,
    pub automation: Automation,
    pub folder: Arc<FolderContext>,
    pub images: Option<Arc<ImageGenerator>>,
    pub speech: Option<Arc<SpeechService>>,
    pub status: Arc<dyn StatusSink>,
}

pub struct Assistant {
    username: String,
    assistant_name: String,
    log: Arc<ChatLog>,
    classifier: Arc<dyn IntentClassifier>,
    chatbot: ChatBot,
    search: RealtimeSearchEngine,
    automation: Automation,
    folder: Arc<FolderContext>,
    images: Option<Arc<ImageGenerator>>,
    speech: Option<Arc<SpeechService>>,
    status: Arc<dyn StatusSink>,
    speak_replies: bool,
}

impl Assistant {
    pub fn new(parts: AssistantParts) -> Self {
        Self {
            username: parts.username,
            assistant_name: parts.assistant_name,
            log: parts.log,
            classifier: parts.classifier,
            chatbot: parts.chatbot,
            search: parts.search,
            automation: parts.automation,
            folder: parts.folder,
            images: parts.images,
            speech: parts.speech,
            status: parts.status,
            speak_replies: false,
        }
    }

    pub fn with_spoken_replies(mut self, enabled: bool) -> Self {
        self.speak_replies = enabled;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    pub fn chat_log(&self) -> &Arc<ChatLog> {
        &self.log
    }

    pub fn speech(&self) -> Option<&Arc<SpeechService>> {
        self.speech.as_ref()
    }

    /// The greeting for a fresh log, otherwise the formatted conversation so far.
    pub fn initial_transcript(&self) -> Result<String> {
        if self.log.is_fresh() {
            return Ok(default_greeting(&self.username, &self.assistant_name));
        }
        self.log.transcript(&self.username, &self.assistant_name)
    }

    async fn deliver(&self, answer: &str) {
        self.status
            .show_text(&format!("{} : {}", self.assistant_name, answer));
        self.status.set_status(AssistantStatus::Answering);
        if !self.speak_replies {
            return;
        }
        if let Some(speech) = &self.speech {
            if let Err(err) = speech.speak(answer).await {
                warn!(error = %err, "Text to speech failed");
            }
        }
    }

    fn spawn_image_job(&self, prompt: &str) -> Option<JoinHandle<Result<Vec<PathBuf>>>> {
        let Some(images) = self.images.clone() else {
            warn!("Image generation requested but HuggingFaceAPIKey is not configured");
            return None;
        };
        let prompt = prompt.to_string();
        info!(prompt = %prompt, "Starting image generation");
        Some(tokio::spawn(async move {
            let result = images.generate(&prompt).await;
            if let Err(err) = &result {
                warn!(error = %err, "Image generation failed");
            }
            result
        }))
    }

    async fn classify(&self, query: &str) -> Vec<Intent> {
        let intents = match self.classifier.classify(query).await {
            Ok(intents) => intents,
            Err(err) => {
                warn!(error = %err, "Intent classification failed; treating as general chat");
                Vec::new()
            }
        };
        if intents.is_empty() {
            return vec![Intent::General(query.to_string())];
        }
        intents
    }

    /// Runs one turn for a typed or transcribed query.
    pub async fn handle_turn(&self, query: &str) -> Result<TurnOutcome> {
        let raw = query.trim();
        if raw.is_empty() {
            self.status.set_status(AssistantStatus::Available);
            return Ok(TurnOutcome::default());
        }

        // Folder paths are case-sensitive, so commands see the raw text.
        if let Some(reply) = self.folder.handle_command(raw)? {
            self.status
                .show_text(&format!("{} : {}", self.username, raw));
            self.deliver(&reply).await;
            self.status.set_status(AssistantStatus::Available);
            return Ok(TurnOutcome::answered(reply));
        }

        let query = query_modifier(raw);
        let query = query.as_str();
        self.status
            .show_text(&format!("{} : {}", self.username, query));

        self.status.set_status(AssistantStatus::Thinking);
        let intents = self.classify(query).await;
        info!(decision = ?intents.iter().map(ToString::to_string).collect::<Vec<_>>(), "Decision");

        let mut outcome = TurnOutcome {
            intents: intents.clone(),
            ..TurnOutcome::default()
        };

        for intent in &intents {
            if let Intent::GenerateImage(prompt) = intent {
                outcome.image_jobs.extend(self.spawn_image_job(prompt));
            }
            if let Intent::Reminder(details) = intent {
                debug!(details = %details, "Reminder intents are recognised but not scheduled");
            }
        }

        if intents.iter().any(Intent::is_automation) {
            outcome.automation = self.automation.execute_all(&intents).await;
        }

        if intents.iter().any(|intent| matches!(intent, Intent::Realtime(_))) {
            self.status.set_status(AssistantStatus::Searching);
            let answer = self
                .search
                .answer(&query_modifier(&merged_query(&intents)))
                .await;
            self.deliver(&answer).await;
            outcome.answer = Some(answer);
            self.status.set_status(AssistantStatus::Available);
            return Ok(outcome);
        }

        for intent in &intents {
            match intent {
                Intent::General(payload) => {
                    self.status.set_status(AssistantStatus::Thinking);
                    let answer = self.chatbot.reply(&query_modifier(payload)).await;
                    self.deliver(&answer).await;
                    outcome.answer = Some(answer);
                    break;
                }
                Intent::Exit => {
                    let answer = self.chatbot.reply(&query_modifier(FAREWELL_QUERY)).await;
                    self.deliver(&answer).await;
                    outcome.answer = Some(answer);
                    outcome.exit = true;
                    break;
                }
                _ => {}
            }
        }

        self.status.set_status(AssistantStatus::Available);
        Ok(outcome)
    }

    /// Answers a message from a remote chat with general chat or realtime
    /// search only. Automation, image and folder requests are not acted on.
    pub async fn converse(&self, prompt: &str) -> Result<TurnOutcome> {
        let cleaned = query_modifier(prompt);
        if cleaned.is_empty() {
            return Ok(TurnOutcome::default());
        }
        self.status.set_status(AssistantStatus::Thinking);
        let intents = self.classify(&cleaned).await;
        let ignored: Vec<String> = intents
            .iter()
            .filter(|intent| !matches!(intent, Intent::General(_) | Intent::Realtime(_)))
            .map(ToString::to_string)
            .collect();
        if !ignored.is_empty() {
            info!(?ignored, "Remote conversation ignores non-chat intents");
        }

        let answer = if intents.iter().any(|intent| matches!(intent, Intent::Realtime(_))) {
            self.status.set_status(AssistantStatus::Searching);
            let merged = merged_query(&intents);
            let query = if merged.trim().is_empty() {
                cleaned.as_str()
            } else {
                merged.as_str()
            };
            self.search.answer(&query_modifier(query)).await
        } else {
            let general = intents.iter().find_map(|intent| match intent {
                Intent::General(payload) => Some(payload.as_str()),
                _ => None,
            });
            match general {
                Some(payload) => self.chatbot.reply(&query_modifier(payload)).await,
                None => self.chatbot.reply(&cleaned).await,
            }
        };

        self.status.set_status(AssistantStatus::Available);
        Ok(TurnOutcome {
            intents,
            answer: Some(answer),
            ..TurnOutcome::default()
        })
    }

    /// Transcribes a recorded utterance and runs a turn with it.
    pub async fn handle_audio_file(&self, path: &Path) -> Result<TurnOutcome> {
        let speech = self.speech.as_ref().ok_or_else(|| {
            PixieError::Config("Speech input needs SpeechAPIKey or GroqAPIKey".to_string())
        })?;
        let query = speech.listen_file(path, self.status.as_ref()).await?;
        self.handle_turn(&query).await
    }

    pub async fn handle_audio(&self, bytes: Vec<u8>, format: &str) -> Result<TurnOutcome> {
        let speech = self.speech.as_ref().ok_or_else(|| {
            PixieError::Config("Speech input needs SpeechAPIKey or GroqAPIKey".to_string())
        })?;
        let query = speech.listen(bytes, format, self.status.as_ref()).await?;
        self.handle_turn(&query).await
    }
}
