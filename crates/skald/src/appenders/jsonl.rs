//! JSONL file persistence, one serialized event per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::appenders::Appender;
use crate::error::Result;

/// Appends events to a JSONL file, flushing after every line so records
/// survive a crash. The file is opened lazily on first append.
///
/// Thread-safe via internal mutex.
pub struct JsonlAppender<E> {
    name: String,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    _marker: PhantomData<fn(E)>,
}

impl<E: Serialize + Send + Sync> JsonlAppender<E> {
    /// Creates the appender, ensuring the parent directory exists.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            name: name.into(),
            path,
            writer: Mutex::new(None),
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, event: &E) -> Result<()> {
        let mut guard = self.writer.lock().unwrap();
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(BufWriter::new(file));
        }
        if let Some(ref mut writer) = *guard {
            let line = serde_json::to_string(event)?;
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        Ok(())
    }
}

/// Reads every event back from a JSONL file. Blank lines are skipped.
pub fn read_jsonl<E: DeserializeOwned>(path: &Path) -> Result<Vec<E>> {
    let content = fs::read_to_string(path)?;
    let events: std::result::Result<Vec<E>, _> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect();
    Ok(events?)
}

#[async_trait]
impl<E: Serialize + Send + Sync> Appender<E> for JsonlAppender<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, event: &E) -> Result<()> {
        self.write_line(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        id: u32,
        message: String,
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let appender = JsonlAppender::new("file", &path).unwrap();

        for id in 0..3 {
            appender
                .append(&Entry {
                    id,
                    message: format!("event {id}"),
                })
                .await
                .unwrap();
        }

        let entries: Vec<Entry> = read_jsonl(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].id, 2);
        assert_eq!(entries[2].message, "event 2");
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("events.jsonl");
        let appender = JsonlAppender::new("file", &path).unwrap();
        appender
            .append(&Entry {
                id: 1,
                message: "hello".to_string(),
            })
            .await
            .unwrap();
        assert!(path.exists());
    }
}
