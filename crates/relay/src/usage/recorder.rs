use chrono::{DateTime, Utc};
use common::pricing::PricingTable;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};
use unillm::Usage;

use crate::ledger::{UsageLedger, UsageLogEntry};

/// What the HTTP layer knows about a call once it has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub user_id: String,
    pub endpoint: String,
    pub provider: String,
    pub model: String,
    /// Absent when the call failed before the provider reported usage.
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

/// Turns completed calls into log entries and summary updates. Ledger
/// failures are logged and swallowed.
pub struct UsageRecorder {
    ledger: Arc<dyn UsageLedger>,
    pricing: Arc<PricingTable>,
}

impl UsageRecorder {
    pub fn new(ledger: Arc<dyn UsageLedger>, pricing: Arc<PricingTable>) -> Self {
        Self { ledger, pricing }
    }

    pub fn build_entry(&self, call: &CompletedCall, timestamp: DateTime<Utc>) -> UsageLogEntry {
        let cost = self
            .pricing
            .cost_for_usage(&call.model, &call.provider, call.usage.as_ref());

        UsageLogEntry::new(
            timestamp,
            call.user_id.as_str(),
            call.endpoint.as_str(),
            call.provider.as_str(),
            call.model.as_str(),
            call.usage.unwrap_or_default(),
            cost,
            call.error.clone(),
        )
    }

    pub async fn record(&self, call: CompletedCall) -> UsageLogEntry {
        let entry = self.build_entry(&call, Utc::now());

        if let Err(err) = self.ledger.append_log(&entry).await {
            warn!(user_id = %entry.user_id, error = %err, "failed to append usage log entry");
        }

        match self.ledger.update_summary(&entry).await {
            Ok(summary) => debug!(
                user_id = %entry.user_id,
                total_requests = summary.total_requests,
                cost = entry.cost,
                "recorded usage"
            ),
            Err(err) => {
                warn!(user_id = %entry.user_id, error = %err, "failed to update user summary")
            }
        }

        entry
    }

    /// Record on a background task so the caller's response is never held up.
    pub fn spawn_record(self: &Arc<Self>, call: CompletedCall) -> JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(
            async move {
                recorder.record(call).await;
            }
            .in_current_span(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use crate::ledger::{LedgerError, SummaryDocument, UserSummary};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn recorder(ledger: Arc<dyn UsageLedger>) -> Arc<UsageRecorder> {
        Arc::new(UsageRecorder::new(
            ledger,
            Arc::new(PricingTable::builtin().unwrap()),
        ))
    }

    fn call(usage: Option<Usage>, error: Option<&str>) -> CompletedCall {
        CompletedCall {
            user_id: "alice".to_string(),
            endpoint: "/v1/chat".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            usage,
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_successful_call_is_priced_and_stored() {
        let ledger = Arc::new(MemoryLedger::new());
        let recorder = recorder(ledger.clone());

        let entry = recorder
            .record(call(Some(Usage::new(1_000_000, 0)), None))
            .await;

        assert!(entry.success);
        assert_eq!(entry.cost, 2.5);
        assert_eq!(entry.usage.total_tokens, 1_000_000);

        let summary = ledger.user_stats("alice").await.unwrap().unwrap();
        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.total_cost, 2.5);
        assert_eq!(ledger.recent_logs(24).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_failed_call_is_zeroed() {
        let ledger = Arc::new(MemoryLedger::new());
        let recorder = recorder(ledger.clone());

        recorder
            .spawn_record(call(None, Some("Unsupported provider 'foo'")))
            .await
            .unwrap();

        let logs = ledger.recent_logs(24).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].success);
        assert_eq!(logs[0].cost, 0.0);
        assert_eq!(logs[0].usage, Usage::default());
        assert_eq!(logs[0].error.as_deref(), Some("Unsupported provider 'foo'"));
    }

    struct BrokenLedger;

    #[async_trait]
    impl UsageLedger for BrokenLedger {
        async fn append_log(&self, _entry: &UsageLogEntry) -> Result<(), LedgerError> {
            Err(std::io::Error::other("disk full").into())
        }

        async fn update_summary(&self, _entry: &UsageLogEntry) -> Result<UserSummary, LedgerError> {
            Err(std::io::Error::other("disk full").into())
        }

        async fn user_stats(&self, _user_id: &str) -> Result<Option<UserSummary>, LedgerError> {
            Ok(None)
        }

        async fn all_user_stats(&self) -> Result<SummaryDocument, LedgerError> {
            Ok(SummaryDocument::new())
        }

        async fn recent_logs_at(
            &self,
            _now: DateTime<Utc>,
            _hours: i64,
        ) -> Result<Vec<UsageLogEntry>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_ledger_failures_do_not_propagate() {
        let recorder = recorder(Arc::new(BrokenLedger));
        let entry = recorder.record(call(Some(Usage::new(5, 5)), None)).await;
        assert_eq!(entry.usage.total_tokens, 10);
    }
}
