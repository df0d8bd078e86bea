use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error};

use crate::chat_log::{ChatLog, ChatMessage};
use crate::error::Result;
use crate::interfaces::providers::{CompletionOptions, LlmProvider};
use crate::text::{answer_modifier, realtime_information, strip_stop_tokens, ClockStyle};

pub const CHAT_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";
const REALTIME_HEADER: &str = "Please use this real-time information if needed,";

pub fn chat_system_prompt(username: &str, assistant_name: &str) -> String {
    format!(
        "Hello, I am {username}, You are a very accurate and advanced AI chatbot named {assistant_name} which has real-time up-to-date information.\n\
*** Do not tell time until I ask, do not talk too much, just answer the question. ***\n\
*** Reply in only English, even if the question is in another language, reply in English. ***\n\
*** Do not provide notes in the output, just answer the question and never mention your training data. ***"
    )
}

/// General conversation over the persisted chat log.
pub struct ChatBot {
    llm: Arc<dyn LlmProvider>,
    log: Arc<ChatLog>,
    system_prompt: String,
}

impl ChatBot {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        log: Arc<ChatLog>,
        username: &str,
        assistant_name: &str,
    ) -> Self {
        Self {
            llm,
            log,
            system_prompt: chat_system_prompt(username, assistant_name),
        }
    }

    /// Answers `query`. Failures are logged and turned into a generic apology,
    /// leaving the chat log untouched.
    pub async fn reply(&self, query: &str) -> String {
        match self.try_reply(query).await {
            Ok(answer) => answer,
            Err(err) => {
                error!(error = %err, "Chat completion failed");
                CHAT_ERROR_REPLY.to_string()
            }
        }
    }

    async fn try_reply(&self, query: &str) -> Result<String> {
        let history = self.log.messages()?;
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.push(ChatMessage::system(realtime_information(
            Local::now(),
            REALTIME_HEADER,
            ClockStyle::Colon,
        )));
        messages.extend(history);
        messages.push(ChatMessage::user(query));
        debug!(messages = messages.len(), "Sending chat turn");

        let raw = self
            .llm
            .complete(messages, &CompletionOptions::default())
            .await?;
        let answer = strip_stop_tokens(&raw);
        self.log.append_turn(query, &answer)?;
        Ok(answer_modifier(&answer))
    }
}
