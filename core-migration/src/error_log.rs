//! Append-only log of failed entries, one line per failure:
//!
//! ```text
//! 2024-05-01 10:00:00 - Backup/Docs/Plan.docx - File not found. It may have been deleted or moved.
//! ```
//!
//! Timestamps are local time.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::error::{MigrationError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub path: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn now(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Render as a single log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            SEPARATOR,
            self.path,
            SEPARATOR,
            self.message.replace(['\r', '\n'], " ")
        )
    }

    /// Parse a line written by [`to_line`](Self::to_line).
    ///
    /// The path ends at the first separator after the timestamp.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (stamp, rest) = line.split_once(SEPARATOR)?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let (path, message) = rest.split_once(SEPARATOR)?;

        Some(Self {
            timestamp,
            path: path.to_string(),
            message: message.to_string(),
        })
    }
}

pub struct ErrorLog {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: PathBuf) -> Self {
        Self { fs, path }
    }

    pub async fn append(&self, path: &str, message: &str) -> Result<ErrorRecord> {
        let record = ErrorRecord::now(path, message);
        let line = format!("{}\n", record.to_line());

        self.fs
            .append_file(&self.path, Bytes::from(line))
            .await
            .map_err(|e| {
                MigrationError::ErrorLog(format!("Failed to append to {}: {}", self.path.display(), e))
            })?;

        Ok(record)
    }

    /// Every well-formed record in the log, oldest first.
    pub async fn read_records(&self) -> Result<Vec<ErrorRecord>> {
        if !self.fs.exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let data = self.fs.read_file(&self.path).await?;
        let text = String::from_utf8_lossy(&data);

        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let record = ErrorRecord::parse_line(line);
                if record.is_none() {
                    warn!("Skipping malformed error log line");
                }
                record
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn log() -> ErrorLog {
        let path = std::env::temp_dir()
            .join(format!("core-migration-errors-{}", Uuid::new_v4()))
            .join("migration_errors.txt");
        ErrorLog::new(Arc::new(TokioFileSystem::new()), path)
    }

    #[test]
    fn test_line_format() {
        let record = ErrorRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 3, 7)
                .unwrap(),
            path: "Backup/Plan.docx".to_string(),
            message: "first\nsecond".to_string(),
        };

        assert_eq!(
            record.to_line(),
            "2024-05-01 09:03:07 - Backup/Plan.docx - first second"
        );
    }

    #[test]
    fn test_message_may_contain_separator() {
        let line = "2024-05-01 09:03:07 - a/b.txt - Remote error - try later";
        let record = ErrorRecord::parse_line(line).unwrap();

        assert_eq!(record.path, "a/b.txt");
        assert_eq!(record.message, "Remote error - try later");
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert!(ErrorRecord::parse_line("garbage").is_none());
        assert!(ErrorRecord::parse_line("yesterday - a - b").is_none());
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let log = log();
        assert!(log.read_records().await.unwrap().is_empty());

        log.append("Docs/a.pdf", "File not found.").await.unwrap();
        log.append("Docs/b.pdf", "Permission denied.").await.unwrap();

        let records = log.read_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "Docs/a.pdf");
        assert_eq!(records[1].message, "Permission denied.");
    }
}
