use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::IdentityConfig;
use crate::errors::{AppError, Result};

/// Resolves the caller to a verified email address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns the caller's email or [`AppError::AuthRequired`].
    async fn resolve(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    verified_email: Option<bool>,
}

/// Looks up the owner of an OAuth access token at the provider's userinfo endpoint.
pub struct GoogleIdentityResolver {
    client: Client,
    userinfo_url: String,
    access_token: Option<String>,
}

impl GoogleIdentityResolver {
    pub fn new(client: Client, config: &IdentityConfig, access_token: Option<String>) -> Self {
        Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
            access_token,
        }
    }

    /// HTTP client preconfigured with the identity lookup timeout.
    pub fn http_client(config: &IdentityConfig) -> Result<Client> {
        Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl IdentityResolver for GoogleIdentityResolver {
    async fn resolve(&self) -> Result<String> {
        let token = self
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(AppError::AuthRequired)?;

        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Identity lookup failed: {}", e);
                AppError::AuthRequired
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Identity provider rejected token");
            return Err(AppError::AuthRequired);
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            tracing::warn!("Unreadable identity response: {}", e);
            AppError::AuthRequired
        })?;

        if info.verified_email == Some(false) {
            return Err(AppError::AuthRequired);
        }

        info.email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(AppError::AuthRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer, token: Option<&str>) -> GoogleIdentityResolver {
        let config = IdentityConfig {
            userinfo_url: format!("{}/oauth2/v1/userinfo", server.uri()),
            timeout: Duration::from_secs(2),
        };
        let client = GoogleIdentityResolver::http_client(&config).unwrap();
        GoogleIdentityResolver::new(client, &config, token.map(str::to_string))
    }

    #[tokio::test]
    async fn resolves_email_for_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v1/userinfo"))
            .and(header("authorization", "Bearer good-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "someone@example.com",
                "verified_email": true
            })))
            .mount(&server)
            .await;

        let email = resolver(&server, Some("good-token")).resolve().await.unwrap();
        assert_eq!(email, "someone@example.com");
    }

    #[tokio::test]
    async fn missing_token_never_calls_the_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolver(&server, None).resolve().await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired));
    }

    #[tokio::test]
    async fn rejected_token_or_missing_email_requires_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer no-email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "123" })))
            .mount(&server)
            .await;

        for token in ["expired", "no-email"] {
            let err = resolver(&server, Some(token)).resolve().await.unwrap_err();
            assert!(matches!(err, AppError::AuthRequired), "token {token}");
        }
    }
}
