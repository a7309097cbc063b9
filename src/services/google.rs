// src/services/google.rs
//! Google OAuth client: authorization URL building, authorization-code
//! exchange, and userinfo lookup.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Token endpoint response for an authorization-code exchange
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Identity attributes returned by the userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone)]
struct OAuthConfig {
    client_id: String,
    client_secret: String,
}

pub struct GoogleService {
    client: Client,
    config: Option<OAuthConfig>,
}

impl GoogleService {
    pub fn new(client: Client, client_id: Option<String>, client_secret: Option<String>) -> Self {
        let config = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(OAuthConfig {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&OAuthConfig, GoogleError> {
        self.config.as_ref().ok_or(GoogleError::NotConfigured)
    }

    /// Build the provider authorization URL the login flow redirects to
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, GoogleError> {
        let config = self.config()?;

        // Only identity scopes; this service never touches other Google APIs
        let scopes = ["openid", "email", "profile"];
        let scope_param = scopes.join(" ");

        let auth_url = format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}",
            urlencoding::encode(&config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_param)
        );

        debug!("Generated Google OAuth authorization URL with scopes: {}", scope_param);
        Ok(auth_url)
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, GoogleError> {
        let config = self.config()?;

        let params = [
            ("code", code),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        debug!(
            token_type = %token_response.token_type,
            expires_in = token_response.expires_in,
            scope = ?token_response.scope,
            "Token response received"
        );
        info!(
            "Successfully exchanged authorization code, refresh_token present: {}",
            token_response.refresh_token.is_some()
        );
        Ok(token_response)
    }

    /// Fetch identity attributes for an access token
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<ProviderUser, GoogleError> {
        let response = self
            .client
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GoogleError::RequestFailed(
                "Failed to get user info".to_string(),
            ));
        }

        response
            .json::<ProviderUser>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_service() -> GoogleService {
        GoogleService::new(
            Client::new(),
            Some("client-id".to_string()),
            Some("secret".to_string()),
        )
    }

    #[test]
    fn test_authorization_url_contains_redirect_and_scopes() {
        let service = configured_service();
        let url = service
            .authorization_url("http://localhost:8080/auth/callback")
            .unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(&urlencoding::encode("http://localhost:8080/auth/callback").to_string()));
        assert!(url.contains(&urlencoding::encode("openid email profile").to_string()));
    }

    #[test]
    fn test_unconfigured_service_refuses_flow() {
        let service = GoogleService::new(Client::new(), None, None);
        assert!(!service.is_configured());
        assert!(matches!(
            service.authorization_url("http://localhost:8080/auth/callback"),
            Err(GoogleError::NotConfigured)
        ));
    }
}
