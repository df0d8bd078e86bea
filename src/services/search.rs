use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};

use crate::chat_log::{ChatLog, ChatMessage};
use crate::folder_context::FolderContext;
use crate::interfaces::providers::{CompletionOptions, LlmProvider};
use crate::interfaces::search::{SearchHit, WebSearch};
use crate::services::finance::FinanceSnapshot;
use crate::text::{answer_modifier, realtime_information, strip_stop_tokens, ClockStyle};

const SEARCH_RESULT_LIMIT: usize = 5;
const RECENT_MESSAGES: usize = 12;
const REALTIME_HEADER: &str = "Use This Real-time Information if needed:";

pub fn search_system_prompt(username: &str, assistant_name: &str) -> String {
    format!(
        "Hello, I am {username}, You are a very accurate and advanced AI chatbot named {assistant_name} which has real-time up-to-date information from the internet.\n\
*** Provide Answers In a Professional Way, make sure to add full stops, commas, question marks, and use proper grammar.***\n\
*** Prefer web results when available. If web results are missing, answer from general knowledge and clearly say if a fact may have changed. ***\n\
*** If live values are provided in system context, use them directly and do not claim data is unavailable. ***"
    )
}

/// Formats hits into the `[start] .. [end]` block handed to the model.
pub fn format_search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!(
            "No live web results were found for '{query}'. Use your general knowledge and mention uncertainty for time-sensitive facts."
        );
    }
    let mut out = format!("The search results for '{query}' are:\n[start]\n");
    for hit in hits {
        out.push_str(&format!(
            "Title: {}\nDescription: {}\n\n",
            hit.title, hit.description
        ));
    }
    out.push_str("[end]");
    out
}

fn search_unavailable(query: &str) -> String {
    format!(
        "Live search is currently unavailable for '{query}'. Use your general knowledge and mention uncertainty for time-sensitive facts."
    )
}

/// Answers questions that need current information by grounding the model
/// in live web results.
pub struct RealtimeSearchEngine {
    llm: Arc<dyn LlmProvider>,
    log: Arc<ChatLog>,
    search: Arc<dyn WebSearch>,
    finance: FinanceSnapshot,
    folder: Option<Arc<FolderContext>>,
    system_prompt: String,
}

impl RealtimeSearchEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        log: Arc<ChatLog>,
        search: Arc<dyn WebSearch>,
        username: &str,
        assistant_name: &str,
    ) -> Self {
        Self {
            llm,
            log,
            search,
            finance: FinanceSnapshot::default(),
            folder: None,
            system_prompt: search_system_prompt(username, assistant_name),
        }
    }

    pub fn with_finance(mut self, finance: FinanceSnapshot) -> Self {
        self.finance = finance;
        self
    }

    pub fn with_folder_context(mut self, folder: Arc<FolderContext>) -> Self {
        self.folder = Some(folder);
        self
    }

    pub async fn search_context(&self, query: &str) -> String {
        match self.search.search(query, SEARCH_RESULT_LIMIT).await {
            Ok(hits) => format_search_results(query, &hits),
            Err(err) => {
                warn!(provider = self.search.name(), error = %err, "Web search failed");
                search_unavailable(query)
            }
        }
    }

    /// Builds the full conversation for `prompt`, including the new user message.
    pub async fn build_conversation(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut history = match self.log.messages() {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, "Chat log unreadable; answering without history");
                Vec::new()
            }
        };
        history.push(ChatMessage::user(prompt));
        let start = history.len().saturating_sub(RECENT_MESSAGES);

        let mut conversation = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello, how can I help you?"),
            ChatMessage::system(self.search_context(prompt).await),
        ];
        if let Some(folder) = self.folder.as_ref().and_then(|f| f.context_message()) {
            conversation.push(ChatMessage::system(folder));
        }
        if let Some(finance) = self.finance.snapshot(prompt).await {
            conversation.push(ChatMessage::system(finance));
        }
        conversation.push(ChatMessage::system(realtime_information(
            Local::now(),
            REALTIME_HEADER,
            ClockStyle::Comma,
        )));
        conversation.extend(history.drain(start..));
        conversation
    }

    /// Model failures are returned as the answer text and are not persisted.
    pub async fn answer(&self, prompt: &str) -> String {
        let conversation = self.build_conversation(prompt).await;
        debug!(messages = conversation.len(), "Sending realtime search turn");

        let options = CompletionOptions::default().with_max_tokens(2048);
        let raw = match self.llm.complete(conversation, &options).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Realtime model request failed");
                return answer_modifier(&format!("Model request failed: {err}"));
            }
        };

        let answer = strip_stop_tokens(raw.trim());
        if let Err(err) = self.log.append_turn(prompt, &answer) {
            warn!(error = %err, "Failed to persist realtime turn");
        }
        answer_modifier(&answer)
    }
}
