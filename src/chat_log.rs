use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::error::{PixieError, Result};
use crate::text::answer_modifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation log persisted as a pretty JSON array.
pub struct ChatLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ChatLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = Self {
            path,
            write_lock: Mutex::new(()),
        };
        if log.read_messages().is_err() {
            tracing::warn!(path = %log.path.display(), "Chat log missing or unreadable; starting empty");
            log.write_messages(&[])?;
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_messages(&self) -> Result<Vec<ChatMessage>> {
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            PixieError::Serialization(format!("chat log {}: {e}", self.path.display()))
        })
    }

    fn write_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        messages.serialize(&mut serializer)?;
        fs::write(&self.path, buf)?;
        Ok(())
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>> {
        self.read_messages()
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>> {
        let messages = self.read_messages()?;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    pub fn append(&self, message: ChatMessage) -> Result<()> {
        let _guard = self.lock()?;
        let mut messages = self.read_messages()?;
        messages.push(message);
        self.write_messages(&messages)
    }

    pub fn append_turn(&self, user: &str, assistant: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut messages = self.read_messages()?;
        messages.push(ChatMessage::user(user));
        messages.push(ChatMessage::assistant(assistant));
        self.write_messages(&messages)
    }

    pub fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        let _guard = self.lock()?;
        self.write_messages(messages)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }

    /// True when the log holds no conversation yet (raw file shorter than 5 bytes).
    pub fn is_fresh(&self) -> bool {
        fs::read_to_string(&self.path)
            .map(|raw| raw.len() < 5)
            .unwrap_or(true)
    }

    pub fn transcript(&self, username: &str, assistant_name: &str) -> Result<String> {
        let messages = self.read_messages()?;
        let mut out = String::new();
        for message in messages {
            let speaker = match message.role {
                Role::User => username,
                Role::Assistant => assistant_name,
                Role::System => continue,
            };
            out.push_str(&format!("{speaker} : {}\n", message.content));
        }
        Ok(answer_modifier(&out))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PixieError::Runtime("chat log lock poisoned".to_string()))
    }
}

pub fn default_greeting(username: &str, assistant_name: &str) -> String {
    format!(
        "{username} : Hello {assistant_name}, How are you?\n{assistant_name} : Welcome {username}. I am doing well. How may i help you?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_empty_log_and_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::open(dir.path().join("nested").join("ChatLog.json")).unwrap();
        assert!(log.messages().unwrap().is_empty());
        assert!(log.is_fresh());
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "[]");
    }

    #[test]
    fn corrupt_log_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ChatLog.json");
        fs::write(&path, "{not json").unwrap();
        let log = ChatLog::open(&path).unwrap();
        assert!(log.messages().unwrap().is_empty());
    }

    #[test]
    fn append_turn_persists_with_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::open(dir.path().join("ChatLog.json")).unwrap();
        log.append_turn("hi", "hello").unwrap();
        let raw = fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains("\n    {\n        \"role\": \"user\""));
        assert!(!log.is_fresh());

        let reopened = ChatLog::open(log.path()).unwrap();
        assert_eq!(
            reopened.messages().unwrap(),
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]
        );
    }

    #[test]
    fn recent_returns_tail_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::open(dir.path().join("ChatLog.json")).unwrap();
        for i in 0..5 {
            log.append(ChatMessage::user(format!("q{i}"))).unwrap();
        }
        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "q3");
        assert_eq!(log.recent(50).unwrap().len(), 5);
    }

    #[test]
    fn transcript_uses_names_and_drops_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::open(dir.path().join("ChatLog.json")).unwrap();
        log.append_turn("who are you?", "I am Pixie.\n\nHow can I help?")
            .unwrap();
        let transcript = log.transcript("Ada", "Pixie").unwrap();
        assert_eq!(
            transcript,
            "Ada : who are you?\nPixie : I am Pixie.\nHow can I help?"
        );
        log.clear().unwrap();
        assert_eq!(log.transcript("Ada", "Pixie").unwrap(), "");
    }

    #[test]
    fn greeting_mentions_both_names() {
        let greeting = default_greeting("Ada", "Pixie");
        assert!(greeting.starts_with("Ada : Hello Pixie, How are you?"));
        assert!(greeting.ends_with("How may i help you?"));
    }
}
