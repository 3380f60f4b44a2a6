pub const UNIFIED_CHAT_PATH: &str = "/v1/chat";
pub const OPENAI_NATIVE_PATH: &str = "/v1/openai/chat/completions";
pub const ANTHROPIC_NATIVE_PATH: &str = "/v1/anthropic/messages";
pub const GOOGLE_NATIVE_PATH: &str = "/v1/google/generate";

pub const ANALYTICS_USERS_PATH: &str = "/v1/analytics/users";
pub const ANALYTICS_LOGS_PATH: &str = "/v1/analytics/logs";
pub const ANALYTICS_SUMMARY_PATH: &str = "/v1/analytics/summary";
pub const HEALTH_PATH: &str = "/health";

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const ANONYMOUS_USER_ID: &str = "anonymous";

pub const DEFAULT_RECENT_LOG_HOURS: i64 = 24;
pub const MAX_RECENT_LOG_HOURS: i64 = 72;
