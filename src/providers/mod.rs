pub mod cohere;
pub mod huggingface;
pub mod openai;
