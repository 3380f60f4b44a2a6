use common::consts::{
    ANALYTICS_LOGS_PATH, ANALYTICS_SUMMARY_PATH, ANALYTICS_USERS_PATH, HEALTH_PATH,
    REQUEST_ID_HEADER,
};
use hyper::body::Incoming;
use hyper::{Method, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

use crate::app::AppContext;
use crate::handlers::chat::ChatRoute;
use crate::handlers::utils::{cors_preflight, json_response, not_found, read_body, HttpResponse};

pub mod analytics;
pub mod chat;
pub mod utils;

/// Entry point for every inbound request. Runs the request inside a span
/// tagged with its request id.
pub async fn route(
    request: Request<Incoming>,
    ctx: Arc<AppContext>,
) -> Result<HttpResponse, hyper::Error> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = info_span!("request", request_id = %request_id);
    Ok(handle(request, ctx).instrument(span).await)
}

async fn handle(request: Request<Incoming>, ctx: Arc<AppContext>) -> HttpResponse {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    debug!(method = %method, path = %path, "received request");

    if method == Method::OPTIONS && path.starts_with("/v1/") {
        return cors_preflight();
    }
    if method == Method::GET && path == HEALTH_PATH {
        return json_response(StatusCode::OK, &json!({ "status": "ok" }));
    }
    if !path.starts_with("/v1/") {
        debug!(method = %method, path = %path, "no route found");
        return not_found();
    }

    let user_id = match ctx.authenticator.identify(request.headers()) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    if method == Method::POST {
        if let Some(chat_route) = ChatRoute::from_path(&path) {
            return match read_body(request, ctx.max_request_bytes).await {
                Ok(body) => chat::chat(&ctx, chat_route, &user_id, &body).await,
                Err(err) => err.into_response(),
            };
        }
    }

    match (&method, path.as_str()) {
        (&Method::GET, ANALYTICS_USERS_PATH) => analytics::all_users(&ctx).await,
        (&Method::GET, ANALYTICS_LOGS_PATH) => {
            analytics::recent_logs(&ctx, request.uri().query()).await
        }
        (&Method::GET, ANALYTICS_SUMMARY_PATH) => analytics::summary(&ctx).await,
        (&Method::GET, users_path) => match analytics::user_id_from_path(users_path) {
            Some(requested_user) => analytics::user_stats(&ctx, &requested_user).await,
            None => not_found(),
        },
        _ => {
            debug!(method = %method, path = %path, "no route found");
            not_found()
        }
    }
}
