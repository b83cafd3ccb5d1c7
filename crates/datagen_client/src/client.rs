//! crates/datagen_client/src/client.rs
//!
//! The REST client and the poll-until-terminal loop.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::session::{AccountSummary, Session};
use datagen_core::domain::DatasetView;

/// How often the poller re-reads the dataset by default.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Errors surfaced by the API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status and a `msg` body.
    #[error("API error ({status}): {msg}")]
    Api { status: u16, msg: String },

    /// The poll loop was cancelled before a terminal status arrived.
    #[error("Polling cancelled")]
    Cancelled,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    user: AccountSummary,
}

/// What the submit endpoint returns once the keyword stage is done.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub prompt_id: Uuid,
    pub dataset_id: Uuid,
    pub keywords: Vec<String>,
    pub credits: i64,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: String,
}

#[derive(Debug, serde::Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyBody {
    api_key: String,
}

/// A typed client for the Datagen REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Parses a success body, or turns an error status into `ClientError::Api`
    /// carrying the server's `msg`.
    async fn expect_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let msg = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.msg)
                .unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                msg,
            })
        }
    }

    // --- Accounts ---

    pub async fn register(
        &self,
        name: &str,
        phone: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        let response = self
            .http
            .post(self.url("/register"))
            .json(&serde_json::json!({
                "name": name,
                "phone": phone,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        let body: TokenResponse = Self::expect_json(response).await?;
        Ok(Session {
            token: body.token,
            account: body.user,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: TokenResponse = Self::expect_json(response).await?;
        Ok(Session {
            token: body.token,
            account: body.user,
        })
    }

    pub async fn get_api_key(&self, session: &Session) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.url("/user/apikey"))
            .bearer_auth(&session.token)
            .send()
            .await?;
        let body: ApiKeyBody = Self::expect_json(response).await?;
        Ok(body.api_key)
    }

    pub async fn set_api_key(
        &self,
        session: &Session,
        api_key: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/user/apikey"))
            .bearer_auth(&session.token)
            .json(&ApiKeyBody {
                api_key: api_key.to_string(),
            })
            .send()
            .await?;
        let body: ApiKeyBody = Self::expect_json(response).await?;
        Ok(body.api_key)
    }

    // --- Datasets ---

    pub async fn submit_prompt(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<SubmitOutcome, ClientError> {
        let response = self
            .http
            .post(self.url("/prompt"))
            .bearer_auth(&session.token)
            .json(&serde_json::json!({ "prompt": text }))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn get_dataset(&self, prompt_id: Uuid) -> Result<DatasetView, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/prompt/{}", prompt_id)))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn dashboard(&self, session: &Session) -> Result<Vec<DatasetView>, ClientError> {
        let response = self
            .http
            .get(self.url("/dashboard"))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    pub async fn delete_dataset(
        &self,
        session: &Session,
        prompt_id: Uuid,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/dataset/{}", prompt_id)))
            .bearer_auth(&session.token)
            .send()
            .await?;
        // Body is just an ack; only the status matters here.
        let _: serde_json::Value = Self::expect_json(response).await?;
        Ok(())
    }

    /// Re-fetches the dataset every `interval` (first fetch immediately),
    /// handing each snapshot to `on_update`, until the status turns terminal.
    /// Cancelling the token stops the loop between fetches.
    pub async fn poll_dataset<F>(
        &self,
        prompt_id: Uuid,
        interval: Duration,
        cancel: CancellationToken,
        mut on_update: F,
    ) -> Result<DatasetView, ClientError>
    where
        F: FnMut(&DatasetView),
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Cancellation wins when both are ready.
                biased;
                _ = cancel.cancelled() => {
                    debug!(%prompt_id, "dataset poll cancelled");
                    return Err(ClientError::Cancelled);
                }
                _ = ticker.tick() => {
                    let view = self.get_dataset(prompt_id).await?;
                    on_update(&view);
                    if view.dataset.status.is_terminal() {
                        debug!(%prompt_id, status = view.dataset.status.as_str(), "dataset poll finished");
                        return Ok(view);
                    }
                }
            }
        }
    }
}
