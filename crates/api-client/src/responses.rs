use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /auth/refresh`.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Represents an error response from the backend, e.g. `{"detail": "Session not found"}`.
///
/// Validation failures carry a structured `detail` (a list of field errors), so it is kept untyped.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub detail: Value,
}

/// Pulls a human-readable detail out of an error body.
///
/// Falls back to the raw text when the body is not the backend's JSON error shape.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(ApiErrorResponse {
            detail: Value::String(detail),
        }) => Some(detail),
        Ok(ApiErrorResponse { detail: Value::Null }) => None,
        Ok(ApiErrorResponse { detail }) => Some(detail.to_string()),
        Err(_) => Some(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_string_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Session not found"}"#).as_deref(),
            Some("Session not found")
        );
    }

    #[test]
    fn keeps_structured_detail_as_json() {
        let detail = error_detail(r#"{"detail": [{"loc": ["body", "username"], "msg": "field required"}]}"#)
            .unwrap();
        assert!(detail.contains("field required"));
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(error_detail("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_detail("   "), None);
    }
}
