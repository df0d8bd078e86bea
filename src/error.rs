use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixieError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub use crate::Result;

impl From<std::io::Error> for PixieError {
    fn from(err: std::io::Error) -> Self {
        PixieError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PixieError {
    fn from(err: serde_json::Error) -> Self {
        PixieError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for PixieError {
    fn from(err: reqwest::Error) -> Self {
        PixieError::Http(err.to_string())
    }
}
