use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use unillm::Usage;

pub mod file;
pub mod memory;

/// Number of daily log partitions consulted for recent-log queries: today and
/// the two preceding UTC days.
pub const LOG_WINDOW_DAYS: i64 = 3;

/// One completed call. Written once and never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub endpoint: String,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    pub cost: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageLogEntry {
    /// The total is recomputed from its parts, and a negative or non-finite
    /// cost is stored as zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        user_id: impl Into<String>,
        endpoint: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        usage: Usage,
        cost: f64,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            user_id: user_id.into(),
            endpoint: endpoint.into(),
            provider: provider.into(),
            model: model.into(),
            usage: Usage::new(usage.prompt_tokens, usage.completion_tokens),
            cost: if cost.is_finite() && cost > 0.0 { cost } else { 0.0 },
            success: error.is_none(),
            error,
        }
    }

    /// UTC calendar date that selects the log partition for this entry.
    pub fn log_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    #[serde(default)]
    pub endpoint_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub model_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub provider_counts: BTreeMap<String, u64>,
}

impl UserSummary {
    pub fn first(entry: &UsageLogEntry) -> Self {
        let mut summary = Self {
            first_seen: entry.timestamp,
            last_seen: entry.timestamp,
            total_requests: 0,
            total_tokens: 0,
            total_cost: 0.0,
            endpoint_counts: BTreeMap::new(),
            model_counts: BTreeMap::new(),
            provider_counts: BTreeMap::new(),
        };
        summary.record(entry);
        summary
    }

    pub fn record(&mut self, entry: &UsageLogEntry) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.total_tokens = self.total_tokens.saturating_add(entry.usage.total_tokens);
        self.total_cost += entry.cost;
        // Entries can land slightly out of order under concurrency.
        if entry.timestamp > self.last_seen {
            self.last_seen = entry.timestamp;
        }
        if entry.timestamp < self.first_seen {
            self.first_seen = entry.timestamp;
        }
        *self.endpoint_counts.entry(entry.endpoint.clone()).or_default() += 1;
        *self.model_counts.entry(entry.model.clone()).or_default() += 1;
        *self.provider_counts.entry(entry.provider.clone()).or_default() += 1;
    }
}

/// Every user summary, keyed by user id.
pub type SummaryDocument = BTreeMap<String, UserSummary>;

pub fn apply_entry(document: &mut SummaryDocument, entry: &UsageLogEntry) -> UserSummary {
    document
        .entry(entry.user_id.clone())
        .and_modify(|summary| summary.record(entry))
        .or_insert_with(|| UserSummary::first(entry))
        .clone()
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable record of completed calls and the per-user summaries derived from
/// them.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Append one entry to the log partition of its UTC date.
    async fn append_log(&self, entry: &UsageLogEntry) -> Result<(), LedgerError>;

    /// Fold one entry into its user's summary and persist the result.
    async fn update_summary(&self, entry: &UsageLogEntry) -> Result<UserSummary, LedgerError>;

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserSummary>, LedgerError>;

    async fn all_user_stats(&self) -> Result<SummaryDocument, LedgerError>;

    /// Entries at most `hours` old as of `now`, newest first. Only the last
    /// three daily partitions are read, whatever `hours` asks for.
    async fn recent_logs_at(
        &self,
        now: DateTime<Utc>,
        hours: i64,
    ) -> Result<Vec<UsageLogEntry>, LedgerError>;

    async fn recent_logs(&self, hours: i64) -> Result<Vec<UsageLogEntry>, LedgerError> {
        self.recent_logs_at(Utc::now(), hours).await
    }
}

/// Dates of the partitions a recent-log query may read, newest first.
pub fn window_dates(now: DateTime<Utc>) -> Vec<NaiveDate> {
    let today = now.date_naive();
    (0..LOG_WINDOW_DAYS)
        .filter_map(|offset| today.checked_sub_signed(Duration::days(offset)))
        .collect()
}

pub fn is_recent(entry: &UsageLogEntry, now: DateTime<Utc>, hours: i64) -> bool {
    now.signed_duration_since(entry.timestamp) <= Duration::hours(hours)
}

pub fn sort_newest_first(entries: &mut [UsageLogEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
