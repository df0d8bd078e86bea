pub mod files;
pub mod telegram;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{PixieError, Result};
use telegram::TelegramBridge;

/// Runs a [`TelegramBridge`] in the background next to another front end.
pub struct BridgeRunner {
    handle: Option<JoinHandle<Result<()>>>,
    stop: Option<watch::Sender<bool>>,
}

impl BridgeRunner {
    pub fn start(bridge: Arc<TelegramBridge>) -> Self {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { bridge.run(rx).await });
        Self {
            handle: Some(handle),
            stop: Some(tx),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(true);
        }
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| PixieError::Runtime(format!("Telegram bridge task failed: {e}")))?,
            None => Ok(()),
        }
    }
}
