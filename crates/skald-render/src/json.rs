//! JSON-per-line console output, for machine-consumed stdout.

use async_trait::async_trait;
use serde::Serialize;
use skald::{Appender, Result};

/// Prints each event as one JSON object per line on stdout.
pub struct JsonConsoleAppender {
    name: String,
}

impl JsonConsoleAppender {
    pub fn new() -> Self {
        Self {
            name: "json-console".to_string(),
        }
    }
}

impl Default for JsonConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Serialize + Send + Sync> Appender<E> for JsonConsoleAppender {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, event: &E) -> Result<()> {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    }
}
