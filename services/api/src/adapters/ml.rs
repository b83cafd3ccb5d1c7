//! services/api/src/adapters/ml.rs
//!
//! Adapters for the external keyword/embedding collaborator. The real one
//! talks JSON over HTTP; the fixed and failing variants back local
//! development and tests without the collaborator running.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use datagen_core::ports::{KeywordExtraction, KeywordExtractionService, PortError, PortResult};

//=========================================================================================
// HTTP Adapter
//=========================================================================================

/// Calls the ML collaborator's `/process` endpoint synchronously. The
/// collaborator also kicks off scraping on its side and reports back later
/// through the scrape callback; this adapter only covers the keyword stage.
#[derive(Clone)]
pub struct HttpMlAdapter {
    client: reqwest::Client,
    endpoint: String,
}

/// The collaborator's response shape. Both fields default to empty when the
/// service omits them.
#[derive(Deserialize)]
struct MlResponse {
    #[serde(default)]
    generated_keywords: Vec<String>,
    #[serde(default)]
    vector: Vec<f64>,
}

impl HttpMlAdapter {
    /// Creates a new `HttpMlAdapter` with a bounded request timeout, so a
    /// hung collaborator cannot pin the submit request forever.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl KeywordExtractionService for HttpMlAdapter {
    async fn extract(&self, prompt_text: &str, prompt_id: Uuid) -> PortResult<KeywordExtraction> {
        let payload = serde_json::json!({
            "prompt": prompt_text,
            "promptId": prompt_id,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("ML request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "ML service returned {}",
                response.status()
            )));
        }

        let body: MlResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("ML response parse error: {}", e)))?;

        Ok(KeywordExtraction {
            keywords: body.generated_keywords,
            vector: body.vector,
        })
    }
}

//=========================================================================================
// Offline Adapters (local development and tests)
//=========================================================================================

/// Returns the same extraction for every prompt.
#[derive(Clone)]
pub struct FixedMlAdapter {
    pub keywords: Vec<String>,
    pub vector: Vec<f64>,
}

#[async_trait]
impl KeywordExtractionService for FixedMlAdapter {
    async fn extract(&self, _prompt_text: &str, _prompt_id: Uuid) -> PortResult<KeywordExtraction> {
        Ok(KeywordExtraction {
            keywords: self.keywords.clone(),
            vector: self.vector.clone(),
        })
    }
}

/// Fails every extraction, exercising the submit path's failure branch.
#[derive(Clone)]
pub struct FailingMlAdapter {
    pub message: String,
}

#[async_trait]
impl KeywordExtractionService for FailingMlAdapter {
    async fn extract(&self, _prompt_text: &str, _prompt_id: Uuid) -> PortResult<KeywordExtraction> {
        Err(PortError::Unexpected(self.message.clone()))
    }
}
