use bytes::Bytes;
use common::errors::GatewayError;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

pub type HttpResponse = Response<BoxBody<Bytes, hyper::Error>>;

pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";

pub fn json_bytes_response(status: StatusCode, body: Bytes) -> HttpResponse {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => json_bytes_response(status, Bytes::from(body)),
        Err(err) => {
            GatewayError::Internal(format!("failed to serialize response: {}", err)).into_response()
        }
    }
}

pub fn not_found() -> HttpResponse {
    let mut not_found = Response::new(empty());
    *not_found.status_mut() = StatusCode::NOT_FOUND;
    not_found
        .headers_mut()
        .insert(ALLOW_ORIGIN, HeaderValue::from_static("*"));
    not_found
}

pub fn cors_preflight() -> HttpResponse {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert("Allow", HeaderValue::from_static("GET, POST, OPTIONS"));
    headers.insert(ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Authorization, Content-Type, X-User-Id, X-Request-Id"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Collect the request body, rejecting anything over `limit` bytes.
pub async fn read_body(request: Request<Incoming>, limit: usize) -> Result<Bytes, GatewayError> {
    Limited::new(request.into_body(), limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|err| {
            if err.is::<http_body_util::LengthLimitError>() {
                GatewayError::InvalidRequest(format!("request body exceeds {} bytes", limit))
            } else {
                GatewayError::InvalidRequest(format!("failed to read request body: {}", err))
            }
        })
}

/// Value of `name` in a raw query string, if present.
pub fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
