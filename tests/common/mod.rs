#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pixie::assistant::{Assistant, AssistantParts};
use pixie::automation::Automation;
use pixie::chat_log::{ChatLog, ChatMessage};
use pixie::config::SpeechConfig;
use pixie::error::{PixieError, Result};
use pixie::folder_context::FolderContext;
use pixie::interfaces::providers::{CompletionOptions, ImageProvider, LlmProvider, SpeechProvider};
use pixie::interfaces::search::{SearchHit, WebSearch};
use pixie::interfaces::services::IntentClassifier;
use pixie::interfaces::status::{AssistantStatus, StatusSink};
use pixie::interfaces::system::{Launcher, SystemKey};
use pixie::router::Intent;
use pixie::services::chatbot::ChatBot;
use pixie::services::images::ImageGenerator;
use pixie::services::search::RealtimeSearchEngine;
use pixie::services::speech::SpeechService;

/// Replies with a fixed answer (or fails) and records every conversation.
#[derive(Default)]
pub struct ScriptedLlm {
    pub reply: Option<String>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(messages);
        self.reply
            .clone()
            .ok_or_else(|| PixieError::Http("model offline".to_string()))
    }
}

pub struct FixedClassifier {
    pub intents: Option<Vec<Intent>>,
    pub calls: Mutex<usize>,
}

impl FixedClassifier {
    pub fn returning(intents: Vec<Intent>) -> Arc<Self> {
        Arc::new(Self {
            intents: Some(intents),
            calls: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            intents: None,
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _query: &str) -> Result<Vec<Intent>> {
        *self.calls.lock().unwrap() += 1;
        self.intents
            .clone()
            .ok_or_else(|| PixieError::Http("classifier offline".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub actions: Mutex<Vec<String>>,
    pub missing_apps: Vec<String>,
}

impl RecordingLauncher {
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn open_url(&self, url: &str) -> Result<()> {
        self.record(format!("url {url}"));
        Ok(())
    }

    async fn open_app(&self, name: &str) -> Result<()> {
        if self.missing_apps.iter().any(|app| app == name) {
            return Err(PixieError::Runtime(format!("{name} is not installed")));
        }
        self.record(format!("open {name}"));
        Ok(())
    }

    async fn close_app(&self, name: &str) -> Result<()> {
        self.record(format!("close {name}"));
        Ok(())
    }

    async fn open_file(&self, path: &Path) -> Result<()> {
        self.record(format!("file {}", path.display()));
        Ok(())
    }

    async fn open_in_editor(&self, path: &Path) -> Result<()> {
        self.record(format!("edit {}", path.display()));
        Ok(())
    }

    async fn system_key(&self, key: SystemKey) -> Result<()> {
        self.record(format!("key {key:?}"));
        Ok(())
    }

    async fn play_audio(&self, path: &Path) -> Result<()> {
        self.record(format!("play {}", path.display()));
        Ok(())
    }
}

/// Transcribes every clip to the same text and records what it was asked to speak.
pub struct ScriptedSpeech {
    pub transcript: String,
    pub spoken: Mutex<Vec<String>>,
}

impl ScriptedSpeech {
    pub fn hearing(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            spoken: Mutex::new(Vec::new()),
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedSpeech {
    async fn transcribe_audio(&self, _audio_bytes: Vec<u8>, _input_format: &str) -> Result<String> {
        Ok(self.transcript.clone())
    }

    async fn tts(&self, text: &str, _voice: &str, _response_format: &str) -> Result<Vec<u8>> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(b"ID3-fake-mp3".to_vec())
    }
}

pub fn speech_config(input_language: &str) -> SpeechConfig {
    SpeechConfig {
        api_key: Some("gsk-test".to_string()),
        base_url: "http://127.0.0.1:9".to_string(),
        transcription_model: "whisper-large-v3".to_string(),
        tts_model: "playai-tts".to_string(),
        voice: "Celeste-PlayAI".to_string(),
        input_language: input_language.to_string(),
    }
}

pub struct StaticSearch {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl WebSearch for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

pub struct TinyImages;

#[async_trait]
impl ImageProvider for TinyImages {
    async fn text_to_image(&self, inputs: &str) -> Result<Vec<u8>> {
        Ok(inputs.as_bytes().to_vec())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub statuses: Mutex<Vec<AssistantStatus>>,
    pub lines: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn statuses(&self) -> Vec<AssistantStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, status: AssistantStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn show_text(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub llm: Arc<ScriptedLlm>,
    pub classifier: Arc<FixedClassifier>,
    pub launcher: Arc<RecordingLauncher>,
    pub status: Arc<RecordingStatus>,
    pub log: Arc<ChatLog>,
    pub assistant: Arc<Assistant>,
}

impl Harness {
    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

pub fn harness(llm: Arc<ScriptedLlm>, classifier: Arc<FixedClassifier>, with_images: bool) -> Harness {
    build_harness(llm, classifier, with_images, None)
}

pub fn harness_with_speech(
    llm: Arc<ScriptedLlm>,
    classifier: Arc<FixedClassifier>,
    speech: Arc<ScriptedSpeech>,
) -> Harness {
    build_harness(llm, classifier, false, Some(speech))
}

fn build_harness(
    llm: Arc<ScriptedLlm>,
    classifier: Arc<FixedClassifier>,
    with_images: bool,
    speech: Option<Arc<ScriptedSpeech>>,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ChatLog::open(dir.path().join("ChatLog.json")).unwrap());
    let launcher = Arc::new(RecordingLauncher::default());
    let status = Arc::new(RecordingStatus::default());
    let web = Arc::new(StaticSearch {
        hits: vec![SearchHit {
            title: "Launch news".to_string(),
            description: "The rocket launched at noon.".to_string(),
            url: Some("https://example.com/launch".to_string()),
        }],
    });
    let folder = Arc::new(FolderContext::new(dir.path().join("FolderContext.json")));

    let llm_dyn: Arc<dyn LlmProvider> = llm.clone();
    let launcher_dyn: Arc<dyn Launcher> = launcher.clone();
    let images = with_images.then(|| {
        Arc::new(
            ImageGenerator::new(Arc::new(TinyImages), dir.path().join("images"))
                .with_launcher(Arc::clone(&launcher_dyn)),
        )
    });

    let speech = speech.map(|provider| {
        Arc::new(
            SpeechService::new(provider, &speech_config("en-US"), dir.path().join("speech.mp3"))
                .with_translator(Arc::clone(&llm_dyn)),
        )
    });

    let assistant = Assistant::new(AssistantParts {
        username: "Ada".to_string(),
        assistant_name: "Pixie".to_string(),
        log: Arc::clone(&log),
        classifier: classifier.clone(),
        chatbot: ChatBot::new(Arc::clone(&llm_dyn), Arc::clone(&log), "Ada", "Pixie"),
        search: RealtimeSearchEngine::new(llm_dyn, Arc::clone(&log), web, "Ada", "Pixie")
            .with_folder_context(Arc::clone(&folder)),
        automation: Automation::new(launcher_dyn),
        folder,
        images,
        speech,
        status: status.clone(),
    });

    Harness {
        dir,
        llm,
        classifier,
        launcher,
        status,
        log,
        assistant: Arc::new(assistant),
    }
}
