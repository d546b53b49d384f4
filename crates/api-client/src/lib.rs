use crate::responses::{error_detail, RefreshRequest};
use configuration::ApiConfig;
use core_types::{Credential, TokenResponse};
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

mod auth;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod responses;

// --- Public API ---
pub use connection::{ConnectionManager, ConnectionState, DEFAULT_RECONNECT_DELAY};
pub use credentials::CredentialStore;
pub use error::{ConnectionError, CredentialError, RequestError};
pub use reqwest::Method;
pub use responses::ApiErrorResponse;

const REFRESH_PATH: &str = "/auth/refresh";

/// Authentication lifecycle notifications for UI collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The credential pair was rejected and could not be refreshed; the user must log in again.
    SessionExpired,
}

/// An HTTP client for the backend REST API that survives access-token expiry.
///
/// Every call carries the current access token. A 401 triggers at most one token refresh
/// and one resubmission of that call; concurrent 401s share a single refresh.
#[derive(Clone)]
pub struct RequestClient {
    client: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    refresh_lock: Arc<Mutex<()>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl RequestClient {
    pub fn new(config: &ApiConfig, credentials: CredentialStore) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(client, &config.base_url, credentials))
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        credentials: CredentialStore,
    ) -> Self {
        let (auth_events, _) = broadcast::channel(16);
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            refresh_lock: Arc::new(Mutex::new(())),
            auth_events,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Subscribes to session-expiry notifications.
    pub fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    /// Sends a request and returns the decoded JSON body (`Value::Null` for an empty body).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        self.request_json(method, path, body).await
    }

    /// Sends a request and decodes the JSON body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, RequestError> {
        let mut token = self.credentials.access_token();
        let mut retried = false;

        loop {
            let response = self
                .execute(method.clone(), path, body, token.as_deref())
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return decode_response(response).await;
            }

            if retried {
                tracing::warn!(path, "Request rejected again after a token refresh.");
                return Err(self.expire_session());
            }

            token = Some(self.recover_from_unauthorized(token.as_deref()).await?);
            retried = true;
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, RequestError> {
        let url = self.url(path)?;
        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn url(&self, path: &str) -> Result<String, RequestError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Err(RequestError::InvalidUrl(format!(
                "expected a path relative to the API base, got '{}'",
                path
            )));
        }
        let separator = if path.starts_with('/') { "" } else { "/" };
        Ok(format!("{}{}{}", self.base_url, separator, path))
    }

    /// Produces a usable access token after `rejected` was refused, or expires the session.
    ///
    /// Serialized on `refresh_lock`: if another call already replaced the rejected token,
    /// its result is reused instead of refreshing again.
    async fn recover_from_unauthorized(
        &self,
        rejected: Option<&str>,
    ) -> Result<String, RequestError> {
        let _guard = self.refresh_lock.lock().await;

        let current = match self.credentials.get() {
            Some(current) => current,
            None => {
                tracing::warn!("Unauthorized and no refresh token is available.");
                return Err(self.expire_session());
            }
        };

        if rejected != Some(current.access_token.as_str()) {
            tracing::debug!("Access token was already refreshed by another request.");
            return Ok(current.access_token);
        }

        match self.refresh(&current.refresh_token).await {
            Ok(credential) => {
                let access_token = credential.access_token.clone();
                if let Err(e) = self.credentials.set(credential) {
                    tracing::warn!(error = %e, "Refreshed credentials could not be persisted.");
                }
                tracing::info!("Access token refreshed.");
                Ok(access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed.");
                Err(self.expire_session())
            }
        }
    }

    /// Exchanges a refresh token for a new pair. Never goes through the retry path.
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, RequestError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH)?)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let tokens: TokenResponse = decode_response(response).await?;
        Credential::try_from(tokens).map_err(|e| RequestError::Deserialization(e.to_string()))
    }

    /// Drops the credential pair and tells collaborators to send the user to login.
    fn expire_session(&self) -> RequestError {
        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "Failed to clear credentials.");
        }
        // Nobody listening is fine; the caller still gets the error.
        let _ = self.auth_events.send(AuthEvent::SessionExpired);
        RequestError::SessionExpired
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str::<T>(body).map_err(|e| RequestError::Deserialization(e.to_string()))
    } else {
        Err(RequestError::Status {
            status,
            detail: error_detail(&text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with(access: &str, refresh: &str) -> CredentialStore {
        let store = CredentialStore::in_memory();
        store.set(Credential::new(access, refresh).unwrap()).unwrap();
        store
    }

    fn client_for(server: &MockServer, store: CredentialStore) -> RequestClient {
        RequestClient::with_client(
            reqwest::Client::new(),
            &format!("{}/api/v1", server.uri()),
            store,
        )
    }

    fn tokens(access: &str, refresh: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer"
        }))
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/accounts"))
            .and(header("Authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, store_with("a1", "r1"));
        let body = client.request(Method::GET, "/accounts", None).await.unwrap();
        assert_eq!(body, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn sends_unauthenticated_without_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/market/popular"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server, CredentialStore::in_memory());
        client.request(Method::GET, "market/popular", None).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn refreshes_once_and_resubmits_with_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/trading/start"))
            .and(header("Authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .and(body_json(json!({"refresh_token": "r-old"})))
            .respond_with(tokens("new", "r-new"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/trading/start"))
            .and(header("Authorization", "Bearer new"))
            .and(body_json(json!({"stock_code": "005930"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with("old", "r-old");
        let client = client_for(&server, store.clone());
        let body = client
            .request(
                Method::POST,
                "/trading/start",
                Some(&json!({"stock_code": "005930"})),
            )
            .await
            .unwrap();

        assert_eq!(body, json!({"id": 7}));
        assert_eq!(store.get(), Some(Credential::new("new", "r-new").unwrap()));
    }

    #[tokio::test]
    async fn second_rejection_does_not_refresh_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dashboard"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(tokens("new", "r-new"))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with("old", "r-old");
        let client = client_for(&server, store.clone());
        let err = client
            .request(Method::GET, "/dashboard", None)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::SessionExpired));
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_failure_clears_credentials_and_signals_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dashboard"))
            .and(header("Authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid refresh token"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/market/popular"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with("old", "r-old");
        let client = client_for(&server, store.clone());
        let mut events = client.subscribe_auth_events();

        let err = client
            .request(Method::GET, "/dashboard", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::SessionExpired));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(store.get().is_none());
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SessionExpired);

        // Later calls no longer carry the old token.
        client
            .request(Method::GET, "/market/popular", None)
            .await
            .unwrap();
        let received = server.received_requests().await.unwrap();
        let last = received.last().unwrap();
        assert!(!last.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn unauthorized_without_credentials_expires_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(tokens("x", "y"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, CredentialStore::in_memory());
        let err = client.request(Method::GET, "/auth/me", None).await.unwrap_err();
        assert!(matches!(err, RequestError::SessionExpired));
    }

    #[tokio::test]
    async fn other_failures_pass_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/trading/sessions/99"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Session not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/trading/start"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(tokens("x", "y"))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_with("a1", "r1");
        let client = client_for(&server, store.clone());

        match client.request(Method::GET, "/trading/sessions/99", None).await {
            Err(RequestError::Status { status, detail }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(detail.as_deref(), Some("Session not found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let err = client
            .request(Method::POST, "/trading/start", Some(&json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn concurrent_rejections_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dashboard"))
            .and(header("Authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(tokens("new", "r-new").set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dashboard"))
            .and(header("Authorization", "Bearer new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server, store_with("old", "r-old"));
        let (a, b, c) = tokio::join!(
            client.request(Method::GET, "/dashboard", None),
            client.request(Method::GET, "/dashboard", None),
            client.request(Method::GET, "/dashboard", None),
        );

        for result in [a, b, c] {
            assert_eq!(result.unwrap(), json!({"ok": true}));
        }
    }

    #[tokio::test]
    async fn empty_success_body_decodes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/strategies/3"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, store_with("a1", "r1"));
        let body = client
            .request(Method::DELETE, "/strategies/3", None)
            .await
            .unwrap();
        assert_eq!(body, Value::Null);
    }

    #[test]
    fn rejects_absolute_urls() {
        let client = RequestClient::with_client(
            reqwest::Client::new(),
            "http://localhost:8000/api/v1/",
            CredentialStore::in_memory(),
        );
        assert!(matches!(
            client.url("https://evil.example.com/steal"),
            Err(RequestError::InvalidUrl(_))
        ));
        assert_eq!(
            client.url("/auth/me").unwrap(),
            "http://localhost:8000/api/v1/auth/me"
        );
    }
}
