use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::chat_log::ChatMessage;
use crate::error::{PixieError, Result};
use crate::interfaces::providers::{CompletionOptions, LlmProvider};
use crate::text::strip_stop_tokens;

/// Writes letters, code and other long-form content to text files. Keeps its
/// own running conversation, separate from the chat log.
pub struct ContentWriter {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    output_dir: PathBuf,
    messages: Mutex<Vec<ChatMessage>>,
}

impl ContentWriter {
    pub fn new(llm: Arc<dyn LlmProvider>, username: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            system_prompt: format!(
                "Hello, I am {username}, You're a content writer. You have to write content like letters."
            ),
            output_dir: output_dir.into(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn output_path(&self, topic: &str) -> PathBuf {
        let stem: String = topic
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '/' && *c != '\\')
            .collect();
        self.output_dir.join(format!("{stem}.txt"))
    }

    fn history(&self) -> Result<Vec<ChatMessage>> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .map_err(|_| PixieError::Runtime("content writer history poisoned".to_string()))
    }

    fn remember(&self, topic: &str, answer: &str) -> Result<()> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| PixieError::Runtime("content writer history poisoned".to_string()))?;
        messages.push(ChatMessage::user(topic));
        messages.push(ChatMessage::assistant(answer));
        Ok(())
    }

    /// Generates content for `topic` and saves it, returning the file path.
    pub async fn write(&self, topic: &str) -> Result<PathBuf> {
        let mut topic = topic.trim();
        if topic
            .get(..8)
            .is_some_and(|head| head.eq_ignore_ascii_case("content "))
        {
            topic = topic[8..].trim();
        }
        if topic.is_empty() {
            return Err(PixieError::Runtime("Content topic is empty".to_string()));
        }

        let mut conversation = vec![ChatMessage::system(self.system_prompt.clone())];
        conversation.extend(self.history()?);
        conversation.push(ChatMessage::user(topic));

        let options = CompletionOptions::default().with_max_tokens(2048);
        let answer = strip_stop_tokens(&self.llm.complete(conversation, &options).await?);
        self.remember(topic, &answer)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_path(topic);
        tokio::fs::write(&path, answer.as_bytes()).await?;
        info!(path = %path.display(), "Wrote content");
        Ok(path)
    }
}
