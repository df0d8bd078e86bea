pub mod assistant;
pub mod automation;
pub mod bridge;
pub mod chat_log;
pub mod config;
pub mod error;
pub mod factory;
pub mod folder_context;
pub mod interfaces;
pub mod logging;
pub mod providers;
pub mod router;
pub mod runtime_paths;
pub mod services;
pub mod system;
pub mod text;
pub mod tools;
pub mod ui;

pub type Result<T> = std::result::Result<T, error::PixieError>;
