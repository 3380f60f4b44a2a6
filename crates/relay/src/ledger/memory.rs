use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    apply_entry, is_recent, sort_newest_first, window_dates, LedgerError, SummaryDocument,
    UsageLedger, UsageLogEntry, UserSummary,
};

/// In-memory ledger with the same semantics as the file ledger, nothing
/// persisted.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    logs: Arc<RwLock<Vec<UsageLogEntry>>>,
    summaries: Arc<RwLock<SummaryDocument>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append, dropping entries whose partition has left the query window
    /// as of `now`.
    pub async fn append_log_at(&self, now: DateTime<Utc>, entry: &UsageLogEntry) {
        let dates = window_dates(now);
        let mut logs = self.logs.write().await;
        logs.retain(|kept| dates.contains(&kept.log_date()));
        if dates.contains(&entry.log_date()) {
            logs.push(entry.clone());
        }
    }

    #[cfg(test)]
    async fn retained_logs(&self) -> usize {
        self.logs.read().await.len()
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn append_log(&self, entry: &UsageLogEntry) -> Result<(), LedgerError> {
        self.append_log_at(Utc::now(), entry).await;
        Ok(())
    }

    async fn update_summary(&self, entry: &UsageLogEntry) -> Result<UserSummary, LedgerError> {
        let mut summaries = self.summaries.write().await;
        Ok(apply_entry(&mut summaries, entry))
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserSummary>, LedgerError> {
        Ok(self.summaries.read().await.get(user_id).cloned())
    }

    async fn all_user_stats(&self) -> Result<SummaryDocument, LedgerError> {
        Ok(self.summaries.read().await.clone())
    }

    async fn recent_logs_at(
        &self,
        now: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<UsageLogEntry>, LedgerError> {
        let dates = window_dates(now);
        let mut entries: Vec<UsageLogEntry> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|entry| dates.contains(&entry.log_date()) && is_recent(entry, now, hours))
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support::{at, entry};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let ledger = MemoryLedger::new();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .update_summary(&entry("carol", at(2026, 10, 16, 12), 2, 1, 0.0))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = ledger.user_stats("carol").await.unwrap().unwrap();
        assert_eq!(summary.total_requests, 50);
        assert_eq!(summary.total_tokens, 150);
    }

    #[tokio::test]
    async fn test_recent_logs_honor_three_day_window() {
        let ledger = MemoryLedger::new();
        let now = at(2026, 10, 16, 12);
        let recent = entry("alice", now - Duration::hours(10), 1, 1, 0.0);
        let old = entry("alice", now - Duration::days(4), 1, 1, 0.0);
        // Appended as of the old entry's day so it is stored at all.
        ledger.append_log_at(old.timestamp, &old).await;
        ledger.logs.write().await.push(recent.clone());

        assert!(ledger.recent_logs_at(now, 1).await.unwrap().is_empty());
        assert_eq!(ledger.recent_logs_at(now, 24).await.unwrap(), vec![recent.clone()]);
        assert_eq!(ledger.recent_logs_at(now, 100).await.unwrap(), vec![recent]);
    }

    #[tokio::test]
    async fn test_append_evicts_entries_outside_window() {
        let ledger = MemoryLedger::new();
        let start = at(2026, 10, 10, 12);
        for day in 0..3 {
            let timestamp = start + Duration::days(day);
            ledger
                .append_log_at(timestamp, &entry("alice", timestamp, 1, 1, 0.0))
                .await;
        }
        assert_eq!(ledger.retained_logs().await, 3);

        let now = start + Duration::days(5);
        ledger
            .append_log_at(now, &entry("alice", now, 1, 1, 0.0))
            .await;
        assert_eq!(ledger.retained_logs().await, 1);

        let stale = entry("bob", now - Duration::days(4), 1, 1, 0.0);
        ledger.append_log_at(now, &stale).await;
        assert_eq!(ledger.retained_logs().await, 1);
        assert_eq!(ledger.recent_logs_at(now, 72).await.unwrap().len(), 1);
    }
}
