pub mod chatbot;
pub mod content;
pub mod finance;
pub mod images;
pub mod search;
pub mod speech;
