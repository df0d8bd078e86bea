use std::sync::Arc;

use tracing::info;

use crate::assistant::{Assistant, AssistantParts};
use crate::automation::Automation;
use crate::chat_log::ChatLog;
use crate::config::Config;
use crate::error::Result;
use crate::folder_context::FolderContext;
use crate::interfaces::providers::LlmProvider;
use crate::interfaces::services::IntentClassifier;
use crate::interfaces::status::StatusSink;
use crate::interfaces::system::Launcher;
use crate::providers::cohere::CohereClient;
use crate::providers::huggingface::HuggingFaceImageProvider;
use crate::providers::openai::OpenAiProvider;
use crate::router::{CohereClassifier, KeywordClassifier};
use crate::services::chatbot::ChatBot;
use crate::services::content::ContentWriter;
use crate::services::images::ImageGenerator;
use crate::services::search::RealtimeSearchEngine;
use crate::services::speech::SpeechService;
use crate::system::SystemLauncher;
use crate::tools::search_internet::SearchInternetTool;

pub fn build_launcher(config: &Config) -> Arc<dyn Launcher> {
    Arc::new(SystemLauncher::new(config.audio_player.clone()))
}

pub fn build_llm(config: &Config) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(OpenAiProvider::from_chat_config(&config.groq)?))
}

pub fn build_classifier(config: &Config) -> Arc<dyn IntentClassifier> {
    match CohereClient::from_config(&config.cohere) {
        Some(client) => Arc::new(CohereClassifier::new(client)),
        None => {
            info!("CohereAPIKey not set; using keyword intent classifier");
            Arc::new(KeywordClassifier)
        }
    }
}

/// `None` when no Hugging Face key is configured.
pub fn build_image_generator(
    config: &Config,
    launcher: Arc<dyn Launcher>,
) -> Option<Arc<ImageGenerator>> {
    let provider = HuggingFaceImageProvider::from_config(&config.images).ok()?;
    Some(Arc::new(
        ImageGenerator::new(Arc::new(provider), config.data_dir.clone()).with_launcher(launcher),
    ))
}

/// `None` when neither a speech nor a Groq key is configured.
pub fn build_speech(
    config: &Config,
    translator: Option<Arc<dyn LlmProvider>>,
    launcher: Arc<dyn Launcher>,
) -> Option<Arc<SpeechService>> {
    let provider = OpenAiProvider::from_speech_config(&config.speech).ok()?;
    let mut speech = SpeechService::new(
        Arc::new(provider),
        &config.speech,
        config.speech_output_path(),
    )
    .with_launcher(launcher);
    if let Some(translator) = translator {
        speech = speech.with_translator(translator);
    }
    Some(Arc::new(speech))
}

/// Wires the assistant from configuration. Only the Groq key is mandatory.
pub fn build_assistant(config: &Config, status: Arc<dyn StatusSink>) -> Result<Assistant> {
    let log = Arc::new(ChatLog::open(config.chat_log_path())?);
    let llm = build_llm(config)?;
    let launcher = build_launcher(config);
    let folder = Arc::new(FolderContext::new(config.folder_context_path()));
    let web = Arc::new(SearchInternetTool::from_config(&config.search));
    info!(
        provider = web.provider().name(),
        data_dir = %config.data_dir.display(),
        "Building assistant"
    );

    let chatbot = ChatBot::new(
        Arc::clone(&llm),
        Arc::clone(&log),
        &config.username,
        &config.assistant_name,
    );
    let search = RealtimeSearchEngine::new(
        Arc::clone(&llm),
        Arc::clone(&log),
        web,
        &config.username,
        &config.assistant_name,
    )
    .with_folder_context(Arc::clone(&folder));
    let writer = Arc::new(ContentWriter::new(
        Arc::clone(&llm),
        &config.username,
        config.data_dir.clone(),
    ));
    let automation = Automation::new(Arc::clone(&launcher)).with_content_writer(writer);

    Ok(Assistant::new(AssistantParts {
        username: config.username.clone(),
        assistant_name: config.assistant_name.clone(),
        log,
        classifier: build_classifier(config),
        chatbot,
        search,
        automation,
        folder,
        images: build_image_generator(config, Arc::clone(&launcher)),
        speech: build_speech(config, Some(Arc::clone(&llm)), launcher),
        status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvLookup;
    use crate::interfaces::status::TracingStatusSink;

    #[test]
    fn assistant_requires_groq_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_lookup(&EnvLookup::from_pairs([("DataDir", "unused")]))
            .with_data_dir(Some(dir.path().to_path_buf()));
        let err = build_assistant(&config, Arc::new(TracingStatusSink)).err().unwrap();
        assert!(matches!(err, crate::error::PixieError::Config(_)));
    }

    #[test]
    fn optional_services_follow_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_lookup(&EnvLookup::from_pairs([
            ("GroqAPIKey", "gsk-test"),
            ("CohereAPIKey", "co-test"),
        ]))
        .with_data_dir(Some(dir.path().to_path_buf()));
        let launcher = build_launcher(&config);
        assert!(build_image_generator(&config, Arc::clone(&launcher)).is_none());
        assert!(build_speech(&config, None, launcher).is_some());

        let assistant = build_assistant(&config, Arc::new(TracingStatusSink)).unwrap();
        assert_eq!(assistant.assistant_name(), "Pixie");
        assert!(dir.path().join("ChatLog.json").exists());
    }
}
