use crate::error::RequestError;
use crate::responses::LoginRequest;
use crate::{decode_response, RequestClient};
use core_types::{Credential, TokenResponse, UserProfile};
use reqwest::Method;

// Login and registration are plain calls: a 401 here means bad credentials,
// not an expired token, so they bypass the refresh-and-retry path.
impl RequestClient {
    /// Logs in and stores the returned credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, RequestError> {
        self.authenticate("/auth/login", username, password).await
    }

    /// Creates an account and stores the returned credential pair.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, RequestError> {
        self.authenticate("/auth/register", username, password).await
    }

    /// Forgets the stored credential pair.
    pub fn logout(&self) -> Result<(), RequestError> {
        self.credentials.clear()?;
        tracing::info!("Logged out.");
        Ok(())
    }

    /// Fetches the profile of the logged-in user.
    pub async fn me(&self) -> Result<UserProfile, RequestError> {
        self.request_json(Method::GET, "/auth/me", None).await
    }

    async fn authenticate(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<Credential, RequestError> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let tokens: TokenResponse = decode_response(response).await?;
        let credential = Credential::try_from(tokens).map_err(crate::CredentialError::from)?;

        self.credentials.set(credential.clone())?;
        tracing::info!(username, "Authenticated.");
        Ok(credential)
    }
}
