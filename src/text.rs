use chrono::{DateTime, Local};

const QUESTION_WORDS: &[&str] = &[
    "how", "what", "who", "where", "when", "why", "which", "whose", "whom", "can you", "what's",
    "where's", "how's",
];

/// Normalizes a spoken or typed query: lowercase, terminal punctuation fixed
/// to `?` for questions and `.` otherwise, first letter capitalized.
pub fn query_modifier(query: &str) -> String {
    let mut normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return String::new();
    }

    let is_question = QUESTION_WORDS.iter().any(|word| {
        normalized == *word || normalized.starts_with(&format!("{word} "))
    });
    let terminal = if is_question { '?' } else { '.' };

    if normalized.ends_with(&['.', '?', '!'][..]) {
        normalized.pop();
    }
    normalized.push(terminal);
    capitalize(&normalized)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn answer_modifier(answer: &str) -> String {
    answer
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn strip_stop_tokens(answer: &str) -> String {
    answer.replace("</s>", "")
}

/// How the hour, minute and second fields are joined on the `Time:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStyle {
    /// `21 hours :05 minutes :09 seconds.`
    Colon,
    /// `21 hours, 05 minutes, 09 seconds.`
    Comma,
}

impl ClockStyle {
    fn separator(self) -> &'static str {
        match self {
            ClockStyle::Colon => " :",
            ClockStyle::Comma => ", ",
        }
    }
}

/// Date/time block handed to the model as a system message.
pub fn realtime_information(now: DateTime<Local>, header: &str, clock: ClockStyle) -> String {
    let mut data = String::new();
    data.push_str(header);
    data.push('\n');
    data.push_str(&format!("Day: {}\n", now.format("%A")));
    data.push_str(&format!("Date: {}\n", now.format("%d")));
    data.push_str(&format!("Month: {}\n", now.format("%B")));
    data.push_str(&format!("Year: {}\n", now.format("%Y")));
    let sep = clock.separator();
    data.push_str(&format!(
        "Time: {} hours{sep}{} minutes{sep}{} seconds.\n",
        now.format("%H"),
        now.format("%M"),
        now.format("%S")
    ));
    data
}

/// Splits text into chunks no longer than `limit` characters, preferring
/// line boundaries.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
