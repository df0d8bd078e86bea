use async_trait::async_trait;

use crate::error::Result;
use crate::router::Intent;

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<Vec<Intent>>;
}
