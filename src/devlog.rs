//! Development-only JSON-lines file logging.
//!
//! Entries go to `{dir}/enrichment-YYYY-MM-DD.json`, one `{timestamp, label,
//! data}` object per line. Writes happen on a spawned task and failures are
//! only logged.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Default)]
pub struct DevLogger {
    dir: Option<PathBuf>,
}

impl DevLogger {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn file_name(date: NaiveDate) -> String {
        format!("enrichment-{}.json", date.format("%Y-%m-%d"))
    }

    /// Fire-and-forget append. No-op when disabled.
    pub fn log<T: Serialize>(&self, label: &str, data: &T) {
        let Some(dir) = self.dir.clone() else {
            return;
        };
        let line = match entry_line(label, data) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Dev log entry '{}' not serializable: {}", label, e);
                return;
            }
        };

        tokio::spawn(async move {
            if let Err(e) = append(&dir, &line).await {
                tracing::warn!("Dev log write failed in {}: {}", dir.display(), e);
            }
        });
    }

    /// Awaitable append, used by `log` and by tests.
    pub async fn write<T: Serialize>(&self, label: &str, data: &T) -> std::io::Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let line = entry_line(label, data).map_err(std::io::Error::other)?;
        append(dir, &line).await
    }
}

fn entry_line<T: Serialize>(label: &str, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&json!({
        "timestamp": Utc::now().to_rfc3339(),
        "label": label,
        "data": data,
    }))
}

async fn append(dir: &Path, line: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(DevLogger::file_name(Utc::now().date_naive()));
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(format!("{}\n", line).as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(DevLogger::file_name(date), "enrichment-2024-03-07.json");
    }

    #[tokio::test]
    async fn test_write_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("devlog-{}", uuid::Uuid::new_v4()));
        let logger = DevLogger::new(&dir);

        logger.write("first", &json!({"n": 1})).await.unwrap();
        logger.write("second", &json!({"n": 2})).await.unwrap();

        let path = dir.join(DevLogger::file_name(Utc::now().date_naive()));
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["label"], "first");
        assert_eq!(lines[1]["data"]["n"], 2);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let logger = DevLogger::disabled();
        assert!(!logger.is_enabled());
        logger.write("x", &1).await.unwrap();
        logger.log("x", &1);
    }
}
