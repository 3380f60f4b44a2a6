use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    apply_entry, is_recent, sort_newest_first, window_dates, LedgerError, SummaryDocument,
    UsageLedger, UsageLogEntry, UserSummary,
};

pub const SUMMARY_FILE_NAME: &str = "user_summaries.json";

/// Ledger backed by one NDJSON file per UTC date plus a single summary
/// document, all under one directory.
///
/// Summary updates hold `summary_lock` across the whole read-modify-write and
/// replace the document through a temporary file, so concurrent completions
/// never drop an update and readers never see a partial document.
pub struct FileLedger {
    directory: PathBuf,
    summary_lock: Mutex<()>,
    log_lock: Mutex<()>,
}

impl FileLedger {
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        debug!(directory = %directory.display(), "opened file ledger");
        Ok(Self {
            directory,
            summary_lock: Mutex::new(()),
            log_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn log_path(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("usage-{}.jsonl", date.format("%Y-%m-%d")))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.directory.join(SUMMARY_FILE_NAME)
    }

    /// A missing or unreadable document is an empty one.
    async fn read_summaries(&self) -> Result<SummaryDocument, LedgerError> {
        let path = self.summary_path();
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SummaryDocument::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(document) => Ok(document),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "summary document is corrupt, starting from empty");
                Ok(SummaryDocument::new())
            }
        }
    }

    async fn write_summaries(&self, document: &SummaryDocument) -> Result<(), LedgerError> {
        let path = self.summary_path();
        let temp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(document)?;

        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn read_log_partition(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<UsageLogEntry>, LedgerError> {
        let path = self.log_path(date);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<UsageLogEntry>(line) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unparsable log line");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl UsageLedger for FileLedger {
    async fn append_log(&self, entry: &UsageLogEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.log_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(entry.log_date()))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn update_summary(&self, entry: &UsageLogEntry) -> Result<UserSummary, LedgerError> {
        let _guard = self.summary_lock.lock().await;
        let mut document = self.read_summaries().await?;
        let summary = apply_entry(&mut document, entry);
        self.write_summaries(&document).await?;
        Ok(summary)
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserSummary>, LedgerError> {
        Ok(self.read_summaries().await?.remove(user_id))
    }

    async fn all_user_stats(&self) -> Result<SummaryDocument, LedgerError> {
        self.read_summaries().await
    }

    async fn recent_logs_at(
        &self,
        now: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<UsageLogEntry>, LedgerError> {
        let mut entries = Vec::new();
        for date in window_dates(now) {
            entries.extend(
                self.read_log_partition(date)
                    .await?
                    .into_iter()
                    .filter(|entry| is_recent(entry, now, hours)),
            );
        }
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}
