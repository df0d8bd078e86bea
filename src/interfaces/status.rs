use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantStatus {
    Listening,
    Thinking,
    Searching,
    Answering,
    Translating,
    Available,
}

impl AssistantStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AssistantStatus::Listening => "Listening...",
            AssistantStatus::Thinking => "Thinking...",
            AssistantStatus::Searching => "Searching...",
            AssistantStatus::Answering => "Answering...",
            AssistantStatus::Translating => "Translating...",
            AssistantStatus::Available => "Available ...",
        }
    }
}

impl fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Front-end surface the assistant reports to.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: AssistantStatus);
    fn show_text(&self, text: &str);
}

/// Sink that only traces; used by headless front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn set_status(&self, status: AssistantStatus) {
        tracing::debug!(%status, "assistant status");
    }

    fn show_text(&self, text: &str) {
        tracing::debug!(text, "assistant transcript");
    }
}
