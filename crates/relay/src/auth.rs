use common::consts::{ANONYMOUS_USER_ID, USER_ID_HEADER};
use common::errors::GatewayError;
use hyper::header::{HeaderMap, AUTHORIZATION};
use std::collections::HashMap;

/// Maps an inbound request to the user id its usage is recorded under.
///
/// With no tokens configured the caller names itself via `x-user-id`;
/// otherwise a known bearer token is required.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    tokens: HashMap<String, String>,
}

impl Authenticator {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn identify(&self, headers: &HeaderMap) -> Result<String, GatewayError> {
        if self.tokens.is_empty() {
            return Ok(headers
                .get(USER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(ANONYMOUS_USER_ID)
                .to_string());
        }

        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token.trim()))
            .cloned()
            .ok_or(GatewayError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use pretty_assertions::assert_eq;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_open_mode_uses_user_header() {
        let auth = Authenticator::default();
        assert_eq!(auth.identify(&headers(&[("x-user-id", "alice")])).unwrap(), "alice");
        assert_eq!(auth.identify(&headers(&[("x-user-id", "  ")])).unwrap(), "anonymous");
        assert_eq!(auth.identify(&HeaderMap::new()).unwrap(), "anonymous");
    }

    #[test]
    fn test_token_mode_requires_known_bearer() {
        let auth = Authenticator::new(HashMap::from([(
            "token-abc".to_string(),
            "alice".to_string(),
        )]));

        assert_eq!(
            auth.identify(&headers(&[("authorization", "Bearer token-abc")]))
                .unwrap(),
            "alice"
        );
        // the user header cannot override a token identity
        assert_eq!(
            auth.identify(&headers(&[
                ("authorization", "Bearer token-abc"),
                ("x-user-id", "mallory")
            ]))
            .unwrap(),
            "alice"
        );
        assert!(matches!(
            auth.identify(&headers(&[("authorization", "Bearer nope")])),
            Err(GatewayError::Unauthorized)
        ));
        assert!(matches!(
            auth.identify(&headers(&[("x-user-id", "alice")])),
            Err(GatewayError::Unauthorized)
        ));
    }
}
