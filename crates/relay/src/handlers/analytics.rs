use chrono::{DateTime, Utc};
use common::consts::{ANALYTICS_USERS_PATH, DEFAULT_RECENT_LOG_HOURS, MAX_RECENT_LOG_HOURS};
use common::errors::GatewayError;
use hyper::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::app::AppContext;
use crate::handlers::utils::{json_response, query_param, HttpResponse};
use crate::ledger::{LedgerError, SummaryDocument, UsageLogEntry};

const SUMMARY_ACTIVITY_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub users: usize,
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

impl Totals {
    pub fn from_summaries(summaries: &SummaryDocument) -> Self {
        summaries.values().fold(
            Totals {
                users: summaries.len(),
                ..Totals::default()
            },
            |mut totals, summary| {
                totals.requests = totals.requests.saturating_add(summary.total_requests);
                totals.tokens = totals.tokens.saturating_add(summary.total_tokens);
                totals.cost += summary.total_cost;
                totals
            },
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub hours: i64,
    pub requests: usize,
    pub failures: usize,
    pub tokens: u64,
    pub cost: f64,
}

impl Activity {
    pub fn from_logs(hours: i64, logs: &[UsageLogEntry]) -> Self {
        logs.iter().fold(
            Activity {
                hours,
                requests: logs.len(),
                ..Activity::default()
            },
            |mut activity, entry| {
                if !entry.success {
                    activity.failures += 1;
                }
                activity.tokens = activity.tokens.saturating_add(entry.usage.total_tokens);
                activity.cost += entry.cost;
                activity
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTotals {
    pub user_id: String,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub totals: Totals,
    pub recent_activity: Activity,
    pub model_counts: BTreeMap<String, u64>,
    pub users: Vec<UserTotals>,
}

impl SummaryReport {
    pub fn build(summaries: &SummaryDocument, recent: &[UsageLogEntry]) -> Self {
        let mut model_counts = BTreeMap::new();
        for summary in summaries.values() {
            for (model, count) in &summary.model_counts {
                *model_counts.entry(model.clone()).or_insert(0) += count;
            }
        }

        let mut users: Vec<UserTotals> = summaries
            .iter()
            .map(|(user_id, summary)| UserTotals {
                user_id: user_id.clone(),
                total_requests: summary.total_requests,
                total_tokens: summary.total_tokens,
                total_cost: summary.total_cost,
                last_seen: summary.last_seen,
            })
            .collect();
        users.sort_by(|a, b| {
            b.total_requests
                .cmp(&a.total_requests)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Self {
            totals: Totals::from_summaries(summaries),
            recent_activity: Activity::from_logs(SUMMARY_ACTIVITY_HOURS, recent),
            model_counts,
            users,
        }
    }
}

/// `hours` query value, defaulting to 24 and clamped to 72.
pub fn parse_hours(query: Option<&str>) -> i64 {
    query_param(query, "hours")
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|hours| *hours >= 0)
        .unwrap_or(DEFAULT_RECENT_LOG_HOURS)
        .min(MAX_RECENT_LOG_HOURS)
}

/// Percent-decoded user id from `/v1/analytics/users/{id}`. An encoded `/`
/// (`%2F`) stays part of the id; a literal one does not match the route.
pub fn user_id_from_path(path: &str) -> Option<String> {
    let segment = path
        .strip_prefix(ANALYTICS_USERS_PATH)?
        .strip_prefix('/')
        .filter(|segment| !segment.is_empty() && !segment.contains('/'))?;
    urlencoding::decode(segment)
        .ok()
        .map(|id| id.into_owned())
        .filter(|id| !id.is_empty())
}

fn ledger_failure(err: LedgerError) -> HttpResponse {
    GatewayError::Internal(err.to_string()).into_response()
}

pub async fn user_stats(ctx: &AppContext, user_id: &str) -> HttpResponse {
    match ctx.ledger.user_stats(user_id).await {
        Ok(Some(summary)) => json_response(StatusCode::OK, &summary),
        Ok(None) => GatewayError::NotFound(format!("user '{}'", user_id)).into_response(),
        Err(err) => ledger_failure(err),
    }
}

#[derive(Serialize)]
struct AllUsers<'a> {
    users: &'a SummaryDocument,
    totals: Totals,
}

pub async fn all_users(ctx: &AppContext) -> HttpResponse {
    match ctx.ledger.all_user_stats().await {
        Ok(summaries) => json_response(
            StatusCode::OK,
            &AllUsers {
                users: &summaries,
                totals: Totals::from_summaries(&summaries),
            },
        ),
        Err(err) => ledger_failure(err),
    }
}

#[derive(Serialize)]
struct RecentLogs {
    hours: i64,
    count: usize,
    logs: Vec<UsageLogEntry>,
}

pub async fn recent_logs(ctx: &AppContext, query: Option<&str>) -> HttpResponse {
    let hours = parse_hours(query);
    match ctx.ledger.recent_logs(hours).await {
        Ok(logs) => json_response(
            StatusCode::OK,
            &RecentLogs {
                hours,
                count: logs.len(),
                logs,
            },
        ),
        Err(err) => ledger_failure(err),
    }
}

pub async fn summary(ctx: &AppContext) -> HttpResponse {
    let summaries = match ctx.ledger.all_user_stats().await {
        Ok(summaries) => summaries,
        Err(err) => return ledger_failure(err),
    };
    let recent = match ctx.ledger.recent_logs(SUMMARY_ACTIVITY_HOURS).await {
        Ok(recent) => recent,
        Err(err) => return ledger_failure(err),
    };
    json_response(StatusCode::OK, &SummaryReport::build(&summaries, &recent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::dispatcher::Dispatcher;
    use crate::ledger::memory::MemoryLedger;
    use crate::ledger::{apply_entry, UsageLedger};
    use common::configuration::{Configuration, UpstreamConfig};
    use common::pricing::PricingTable;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::Arc;
    use unillm::Usage;

    fn entry(user_id: &str, model: &str, minutes_ago: i64, success: bool) -> UsageLogEntry {
        UsageLogEntry::new(
            Utc::now() - chrono::Duration::minutes(minutes_ago),
            user_id,
            "/v1/chat",
            "openai",
            model,
            Usage::new(10, 5),
            0.5,
            if success { None } else { Some("boom".to_string()) },
        )
    }

    async fn context_with(entries: &[UsageLogEntry]) -> AppContext {
        let ledger = Arc::new(MemoryLedger::new());
        for e in entries {
            ledger.append_log(e).await.unwrap();
            ledger.update_summary(e).await.unwrap();
        }
        let providers = Configuration::default().resolved_providers().unwrap();
        AppContext::new(
            Dispatcher::new(providers, &UpstreamConfig::default()).unwrap(),
            ledger,
            PricingTable::builtin().unwrap(),
            Authenticator::default(),
            1024,
        )
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_hours(None), 24);
        assert_eq!(parse_hours(Some("hours=6")), 6);
        assert_eq!(parse_hours(Some("hours=500")), 72);
        assert_eq!(parse_hours(Some("hours=-3")), 24);
        assert_eq!(parse_hours(Some("hours=soon")), 24);
    }

    #[test]
    fn test_user_id_from_path() {
        assert_eq!(
            user_id_from_path("/v1/analytics/users/alice"),
            Some("alice".to_string())
        );
        assert_eq!(user_id_from_path("/v1/analytics/users/"), None);
        assert_eq!(user_id_from_path("/v1/analytics/users"), None);
        assert_eq!(user_id_from_path("/v1/analytics/users/a/b"), None);
        assert_eq!(user_id_from_path("/v1/analytics/usersalice"), None);
    }

    #[test]
    fn test_user_id_from_path_decodes_segment() {
        assert_eq!(
            user_id_from_path("/v1/analytics/users/alice%40example.com"),
            Some("alice@example.com".to_string())
        );
        assert_eq!(
            user_id_from_path("/v1/analytics/users/team%2Fops%20bot"),
            Some("team/ops bot".to_string())
        );
        assert_eq!(
            user_id_from_path("/v1/analytics/users/100%25"),
            Some("100%".to_string())
        );
        // invalid UTF-8 once decoded
        assert_eq!(user_id_from_path("/v1/analytics/users/%FF"), None);
    }

    #[test]
    fn test_summary_report_aggregates() {
        let mut summaries = SummaryDocument::new();
        let recent = vec![
            entry("alice", "gpt-4o", 5, true),
            entry("alice", "gpt-4o-mini", 10, false),
            entry("bob", "gpt-4o", 15, true),
        ];
        for e in &recent {
            apply_entry(&mut summaries, e);
        }

        let report = SummaryReport::build(&summaries, &recent);

        assert_eq!(report.totals.users, 2);
        assert_eq!(report.totals.requests, 3);
        assert_eq!(report.totals.tokens, 45);
        assert_eq!(report.recent_activity.requests, 3);
        assert_eq!(report.recent_activity.failures, 1);
        assert_eq!(report.model_counts["gpt-4o"], 2);
        assert_eq!(report.model_counts["gpt-4o-mini"], 1);
        assert_eq!(report.users[0].user_id, "alice");
        assert_eq!(report.users[1].user_id, "bob");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let ctx = context_with(&[entry("alice", "gpt-4o", 1, true)]).await;

        let response = user_stats(&ctx, "nobody").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = user_stats(&ctx, "alice").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["totalRequests"], 1);
    }

    #[tokio::test]
    async fn test_encoded_user_id_is_found() {
        let ctx = context_with(&[entry("alice@example.com", "gpt-4o", 1, true)]).await;

        let user_id = user_id_from_path("/v1/analytics/users/alice%40example.com").unwrap();
        let response = user_stats(&ctx, &user_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["totalRequests"], 1);
    }

    #[tokio::test]
    async fn test_all_users_includes_totals() {
        let ctx = context_with(&[
            entry("alice", "gpt-4o", 1, true),
            entry("bob", "gpt-4o", 2, true),
        ])
        .await;

        let body = body_json(all_users(&ctx).await).await;
        assert_eq!(body["totals"]["users"], 2);
        assert_eq!(body["totals"]["requests"], 2);
        assert_eq!(body["users"]["bob"]["totalTokens"], 15);
    }

    #[tokio::test]
    async fn test_recent_logs_respects_hours() {
        let ctx = context_with(&[
            entry("alice", "gpt-4o", 30, true),
            entry("alice", "gpt-4o", 5 * 60, true),
        ])
        .await;

        let body = body_json(recent_logs(&ctx, Some("hours=1")).await).await;
        assert_eq!(body["hours"], 1);
        assert_eq!(body["count"], 1);

        let body = body_json(recent_logs(&ctx, None).await).await;
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_empty_store_summary() {
        let ctx = context_with(&[]).await;
        let body = body_json(summary(&ctx).await).await;
        assert_eq!(body["totals"]["users"], 0);
        assert_eq!(body["recentActivity"]["requests"], 0);
        assert_eq!(body["users"], serde_json::json!([]));
    }
}
