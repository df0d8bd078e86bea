//! Intent classification: turns one user query into the list of actions the
//! assistant should take.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::interfaces::services::IntentClassifier;
use crate::providers::cohere::{CohereChatRequest, CohereClient, CohereTurn};

mod preamble;

pub use preamble::DECISION_PREAMBLE;

/// Recognised decision prefixes, in match order.
pub const FUNCTION_PREFIXES: &[&str] = &[
    "call",
    "general",
    "realtime",
    "open",
    "close",
    "play",
    "generate image",
    "system",
    "content",
    "google search",
    "youtube search",
    "reminder",
    "exit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    General(String),
    Realtime(String),
    Open(String),
    Close(String),
    Play(String),
    GenerateImage(String),
    Reminder(String),
    System(String),
    Content(String),
    GoogleSearch(String),
    YoutubeSearch(String),
    Call(String),
    Exit,
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::General(_) => "general",
            Intent::Realtime(_) => "realtime",
            Intent::Open(_) => "open",
            Intent::Close(_) => "close",
            Intent::Play(_) => "play",
            Intent::GenerateImage(_) => "generate image",
            Intent::Reminder(_) => "reminder",
            Intent::System(_) => "system",
            Intent::Content(_) => "content",
            Intent::GoogleSearch(_) => "google search",
            Intent::YoutubeSearch(_) => "youtube search",
            Intent::Call(_) => "call",
            Intent::Exit => "exit",
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Intent::General(p)
            | Intent::Realtime(p)
            | Intent::Open(p)
            | Intent::Close(p)
            | Intent::Play(p)
            | Intent::GenerateImage(p)
            | Intent::Reminder(p)
            | Intent::System(p)
            | Intent::Content(p)
            | Intent::GoogleSearch(p)
            | Intent::YoutubeSearch(p)
            | Intent::Call(p) => Some(p.as_str()),
            Intent::Exit => None,
        }
    }

    /// Intents executed by the automation layer.
    pub fn is_automation(&self) -> bool {
        matches!(
            self,
            Intent::Open(_)
                | Intent::Close(_)
                | Intent::Play(_)
                | Intent::System(_)
                | Intent::Content(_)
                | Intent::GoogleSearch(_)
                | Intent::YoutubeSearch(_)
        )
    }

    fn from_parts(prefix: &str, payload: String) -> Self {
        match prefix {
            "call" => Intent::Call(payload),
            "general" => Intent::General(payload),
            "realtime" => Intent::Realtime(payload),
            "open" => Intent::Open(payload),
            "close" => Intent::Close(payload),
            "play" => Intent::Play(payload),
            "generate image" => Intent::GenerateImage(payload),
            "system" => Intent::System(payload),
            "content" => Intent::Content(payload),
            "google search" => Intent::GoogleSearch(payload),
            "youtube search" => Intent::YoutubeSearch(payload),
            "reminder" => Intent::Reminder(payload),
            _ => Intent::Exit,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload() {
            Some(payload) if !payload.is_empty() => write!(f, "{} {}", self.kind(), payload),
            _ => f.write_str(self.kind()),
        }
    }
}

/// Parses a comma-separated decision such as `open chrome, general who is he?`.
/// Items that do not start with a recognised prefix are dropped.
pub fn parse_decision(text: &str) -> Vec<Intent> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let lower = item.to_lowercase();
            let prefix = FUNCTION_PREFIXES
                .iter()
                .find(|prefix| lower.starts_with(*prefix))?;
            let payload = item
                .get(prefix.len()..)
                .unwrap_or_default()
                .trim()
                .trim_matches(|c| c == '(' || c == ')')
                .trim()
                .to_string();
            Some(Intent::from_parts(prefix, payload))
        })
        .collect()
}

/// Payloads of the `general` and `realtime` intents joined with " and ".
pub fn merged_query(intents: &[Intent]) -> String {
    intents
        .iter()
        .filter_map(|intent| match intent {
            Intent::General(q) | Intent::Realtime(q) => Some(q.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn few_shot_history() -> Vec<CohereTurn> {
    vec![
        CohereTurn::user("how are you?"),
        CohereTurn::chatbot("general how are you?"),
        CohereTurn::user("do you like pizza?"),
        CohereTurn::chatbot("general do you like pizza?"),
        CohereTurn::user("open chrome and tell me about mizin."),
        CohereTurn::chatbot("open chrome, general tell me about mizin."),
        CohereTurn::user("open chrome and firefox"),
        CohereTurn::chatbot("open chrome, open firefox"),
        CohereTurn::user(
            "what is today's date and by the way remind me that i have a dancing performance on 5th aug at 11pm",
        ),
        CohereTurn::chatbot(
            "general what is today's date, reminder 11:00pm 5th aug dancing performance",
        ),
        CohereTurn::user("chat with me."),
        CohereTurn::chatbot("general chat with me."),
    ]
}

/// Decision-making model backed by Cohere chat.
pub struct CohereClassifier {
    client: CohereClient,
    history: Vec<CohereTurn>,
    max_retries: usize,
}

impl CohereClassifier {
    pub fn new(client: CohereClient) -> Self {
        Self {
            client,
            history: few_shot_history(),
            max_retries: 2,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl IntentClassifier for CohereClassifier {
    async fn classify(&self, query: &str) -> Result<Vec<Intent>> {
        let mut attempt = 0;
        loop {
            let text = self
                .client
                .chat(CohereChatRequest {
                    message: query,
                    preamble: DECISION_PREAMBLE,
                    chat_history: &self.history,
                    temperature: 0.3,
                })
                .await?;
            let intents = parse_decision(&text);
            debug!(raw = %text, parsed = intents.len(), "Decision model replied");

            // The model occasionally echoes the template placeholder instead of deciding.
            if intents.is_empty() && text.contains("(query)") && attempt < self.max_retries {
                attempt += 1;
                warn!(attempt, "Decision model echoed placeholder; asking again");
                continue;
            }
            return Ok(intents);
        }
    }
}

/// Offline rule-based classifier used when no decision model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

const EXIT_PHRASES: &[&str] = &["bye", "goodbye", "good bye", "exit", "quit", "see you later"];
const REALTIME_CUES: &[&str] = &[
    "news",
    "headline",
    "latest",
    "current",
    "recent",
    "today's",
    "who is",
    "who won",
    "price of",
    "weather",
    "score",
    "stock",
];
const CLOCK_CUES: &[&str] = &[
    "time",
    "date",
    "day is it",
    "which day",
    "what day",
    "month",
    "year",
];
const ACTION_PREFIXES: &[(&str, &str)] = &[
    ("google search ", "google search"),
    ("search google for ", "google search"),
    ("youtube search ", "youtube search"),
    ("search youtube for ", "youtube search"),
    ("generate image of ", "generate image"),
    ("generate image ", "generate image"),
    ("generate an image of ", "generate image"),
    ("create an image of ", "generate image"),
    ("draw ", "generate image"),
    ("open ", "open"),
    ("close ", "close"),
    ("play ", "play"),
    ("write ", "content"),
    ("content ", "content"),
    ("remind me ", "reminder"),
    ("set a reminder ", "reminder"),
    ("call ", "call"),
];

impl KeywordClassifier {
    fn action_prefix(lower: &str) -> Option<(&'static str, &'static str)> {
        ACTION_PREFIXES
            .iter()
            .copied()
            .find(|(prefix, _)| lower.starts_with(prefix))
    }

    fn classify_clause(clause: &str) -> Option<Intent> {
        let clause = clause.trim().trim_end_matches(&['.', '!', '?'][..]).trim();
        if clause.is_empty() {
            return None;
        }
        let lower = clause.to_lowercase();

        if EXIT_PHRASES
            .iter()
            .any(|phrase| lower == *phrase || lower.starts_with(&format!("{phrase} ")))
        {
            return Some(Intent::Exit);
        }
        if let Some((prefix, kind)) = Self::action_prefix(&lower) {
            let payload = clause.get(prefix.len()..).unwrap_or_default().trim();
            return Some(Intent::from_parts(kind, payload.to_string()));
        }
        for key in ["unmute", "mute", "volume up", "volume down"] {
            if lower.contains(key) {
                return Some(Intent::System(key.to_string()));
            }
        }

        let query = crate::text::query_modifier(clause).to_lowercase();
        let asks_clock =
            lower.starts_with("what") && CLOCK_CUES.iter().any(|cue| lower.contains(cue));
        if !asks_clock && REALTIME_CUES.iter().any(|cue| lower.contains(cue)) {
            return Some(Intent::Realtime(query));
        }
        Some(Intent::General(query))
    }

    /// Splits compound requests only when they open with an action. A bare
    /// object such as "firefox" in "open chrome and firefox" inherits the
    /// previous verb.
    fn split_clauses(query: &str) -> Vec<String> {
        let fragments: Vec<&str> = query
            .split(',')
            .flat_map(|part| part.split(" and "))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        let Some(first) = fragments.first() else {
            return Vec::new();
        };
        if fragments.len() < 2 || Self::action_prefix(&first.to_lowercase()).is_none() {
            return vec![query.trim().to_string()];
        }

        let mut clauses = Vec::with_capacity(fragments.len());
        let mut last_verb: Option<&'static str> = None;
        for fragment in fragments {
            let lower = fragment.to_lowercase();
            if let Some((prefix, _)) = Self::action_prefix(&lower) {
                last_verb = Some(prefix);
                clauses.push(fragment.to_string());
            } else if let Some(verb) =
                last_verb.filter(|_| fragment.split_whitespace().count() <= 2)
            {
                clauses.push(format!("{verb}{fragment}"));
            } else {
                last_verb = None;
                clauses.push(fragment.to_string());
            }
        }
        clauses
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, query: &str) -> Result<Vec<Intent>> {
        Ok(Self::split_clauses(query)
            .iter()
            .filter_map(|clause| Self::classify_clause(clause))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_recognised_items_in_order() {
        let intents = parse_decision("open chrome, general tell me about mizin., banana split");
        assert_eq!(
            intents,
            vec![
                Intent::Open("chrome".to_string()),
                Intent::General("tell me about mizin.".to_string()),
            ]
        );
    }

    #[test]
    fn parse_handles_multiword_prefixes_and_case() {
        let intents = parse_decision(
            "Generate Image a lion in the savanna, google search rust async, youtube search lofi, exit",
        );
        assert_eq!(
            intents,
            vec![
                Intent::GenerateImage("a lion in the savanna".to_string()),
                Intent::GoogleSearch("rust async".to_string()),
                Intent::YoutubeSearch("lofi".to_string()),
                Intent::Exit,
            ]
        );
        assert_eq!(
            parse_decision("reminder 9:00pm 25th june business meeting"),
            vec![Intent::Reminder("9:00pm 25th june business meeting".to_string())]
        );
    }

    #[test]
    fn parse_strips_placeholder_parentheses() {
        assert_eq!(
            parse_decision("general (who is he?)"),
            vec![Intent::General("who is he?".to_string())]
        );
        assert!(parse_decision("").is_empty());
    }

    #[test]
    fn merged_query_joins_general_and_realtime() {
        let intents = vec![
            Intent::General("what's the time?".to_string()),
            Intent::Open("chrome".to_string()),
            Intent::Realtime("who won the match".to_string()),
        ];
        assert_eq!(merged_query(&intents), "what's the time? and who won the match");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let intent = Intent::YoutubeSearch("rust tutorials".to_string());
        assert_eq!(intent.to_string(), "youtube search rust tutorials");
        assert_eq!(parse_decision(&intent.to_string()), vec![intent]);
        assert_eq!(Intent::Exit.to_string(), "exit");
    }

    #[test]
    fn automation_flag_matches_task_functions() {
        assert!(Intent::Content("letter".to_string()).is_automation());
        assert!(Intent::System("mute".to_string()).is_automation());
        assert!(!Intent::GenerateImage("cat".to_string()).is_automation());
        assert!(!Intent::Reminder("x".to_string()).is_automation());
        assert!(!Intent::Exit.is_automation());
    }

    #[tokio::test]
    async fn keyword_classifier_routes_common_requests() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier.classify("open chrome and firefox").await.unwrap(),
            vec![
                Intent::Open("chrome".to_string()),
                Intent::Open("firefox".to_string())
            ]
        );
        assert_eq!(
            classifier
                .classify("open chrome and tell me about mizin")
                .await
                .unwrap(),
            vec![
                Intent::Open("chrome".to_string()),
                Intent::General("tell me about mizin.".to_string())
            ]
        );
        assert_eq!(
            classifier.classify("Goodbye.").await.unwrap(),
            vec![Intent::Exit]
        );
        assert_eq!(
            classifier.classify("what is today's news?").await.unwrap(),
            vec![Intent::Realtime("what is today's news?".to_string())]
        );
        assert_eq!(
            classifier.classify("what is today's date?").await.unwrap(),
            vec![Intent::General("what is today's date?".to_string())]
        );
        assert_eq!(
            classifier.classify("tell me about tom and jerry").await.unwrap(),
            vec![Intent::General("tell me about tom and jerry.".to_string())]
        );
        assert_eq!(
            classifier.classify("please turn the volume up").await.unwrap(),
            vec![Intent::System("volume up".to_string())]
        );
        assert_eq!(
            classifier.classify("generate image of a red fox").await.unwrap(),
            vec![Intent::GenerateImage("a red fox".to_string())]
        );
    }
}
