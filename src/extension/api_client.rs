use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::{
    InitUserRequest, PromptRequest, PromptResponse, RenewPremiumRequest, RenewPremiumResponse,
    UpdateWordsRequest, UpdateWordsResponse, UpgradePremiumRequest, UpgradePremiumResponse,
    UserQuota, UserResponse,
};
use crate::services::{quota_store::QuotaStore, upstream::TextGenerator};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Talks to the backend routes on behalf of the extension.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Request to {} failed: {}", path, e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Unreadable response from {}: {}", path, e))
            });
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| status.to_string());

        Err(match status {
            StatusCode::BAD_REQUEST => AppError::Validation(message),
            StatusCode::NOT_FOUND => AppError::NotFound,
            StatusCode::UNAUTHORIZED => AppError::AuthRequired,
            _ => AppError::Internal(anyhow::anyhow!("{} returned {}: {}", path, status, message)),
        })
    }
}

#[async_trait]
impl QuotaStore for ApiClient {
    async fn get_or_create(&self, email: &str) -> Result<UserQuota> {
        let response: UserResponse = self
            .post_json(
                "/api/user/init",
                &InitUserRequest {
                    email: Some(email.to_string()),
                },
            )
            .await?;
        Ok(response.user)
    }

    async fn record_usage(&self, email: &str, words_used: i64) -> Result<UserQuota> {
        let response: UpdateWordsResponse = self
            .post_json(
                "/api/user/update-words",
                &UpdateWordsRequest {
                    email: Some(email.to_string()),
                    words_used: Some(words_used),
                },
            )
            .await?;
        tracing::debug!(email = %email, words_used, words_left = response.words_left, "Usage recorded");
        Ok(response.user)
    }

    async fn upgrade_to_premium(
        &self,
        email: &str,
        subscription_id: Option<String>,
        duration_days: i64,
    ) -> Result<UserQuota> {
        let response: UpgradePremiumResponse = self
            .post_json(
                "/api/user/upgrade-premium",
                &UpgradePremiumRequest {
                    email: Some(email.to_string()),
                    subscription_id,
                    duration: Some(duration_days),
                },
            )
            .await?;
        Ok(response.user)
    }

    async fn renew_subscription(&self, email: &str) -> Result<Option<UserQuota>> {
        let response: RenewPremiumResponse = self
            .post_json(
                "/api/user/renew-premium",
                &RenewPremiumRequest {
                    email: Some(email.to_string()),
                },
            )
            .await?;
        Ok(response.renewed.then_some(response.user))
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for ApiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/prompt"))
            .json(&PromptRequest {
                prompt: Some(prompt.to_string()),
            })
            .send()
            .await
            .map_err(|e| AppError::upstream(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::upstream(Some(status.as_u16()), body));
        }

        serde_json::from_str::<PromptResponse>(&body)
            .ok()
            .map(|response| response.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::upstream(Some(status.as_u16()), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    fn user_json(words_left: i64) -> serde_json::Value {
        let mut user = UserQuota::new("a@b.com", Utc::now());
        user.words_left = words_left;
        serde_json::to_value(user).unwrap()
    }

    #[tokio::test]
    async fn init_reads_the_flattened_user() {
        let server = MockServer::start().await;
        let mut body = user_json(10_000);
        body["daysUntilExpiry"] = serde_json::Value::Null;
        Mock::given(method("POST"))
            .and(path("/api/user/init"))
            .and(body_json(json!({ "email": "a@b.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let user = client(&server).get_or_create("a@b.com").await.unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.words_left, 10_000);
    }

    #[tokio::test]
    async fn update_words_maps_status_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/update-words"))
            .and(body_json(json!({ "email": "ghost@b.com", "wordsUsed": 3 })))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "User not found" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/user/update-words"))
            .and(body_json(json!({ "email": "a@b.com", "wordsUsed": -1 })))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({ "error": "Words used cannot be negative" }),
            ))
            .mount(&server)
            .await;

        let api = client(&server);
        assert!(matches!(
            api.record_usage("ghost@b.com", 3).await,
            Err(AppError::NotFound)
        ));
        match api.record_usage("a@b.com", -1).await {
            Err(AppError::Validation(message)) => {
                assert_eq!(message, "Words used cannot be negative")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_words_returns_the_new_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/update-words"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Words updated successfully",
                "wordsLeft": 15,
                "wordsUsed": 5,
                "totalWordsUsed": 5,
                "isPremium": false,
                "user": user_json(15)
            })))
            .mount(&server)
            .await;

        let user = client(&server).record_usage("a@b.com", 5).await.unwrap();
        assert_eq!(user.words_left, 15);
    }

    #[tokio::test]
    async fn generate_posts_the_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/prompt"))
            .and(body_json(json!({ "prompt": "compose me" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "done" })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).generate("compose me").await.unwrap(), "done");
    }

    #[tokio::test]
    async fn generate_failure_is_an_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/prompt"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "An error occurred while processing the prompt."
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).generate("x").await,
            Err(AppError::Upstream { status: Some(500), .. })
        ));
    }
}
