//! crates/datagen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or the ML collaborator's HTTP API.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Account, AccountCredentials, Dataset, DatasetView, PreviewItem, Prompt, PromptStatus,
    ScrapeOutcome,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations. It abstracts away the
/// specific errors from external services (database, network) and carries the
/// domain failures the handlers map onto HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Not enough credits")]
    InsufficientCredits,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Everything the workflow needs from persistent storage.
#[async_trait]
pub trait StoreService: Send + Sync {
    // --- Account Management ---

    /// Creates an account with the starting credit allowance. Fails with
    /// `Conflict` when the email is already registered.
    async fn create_account(
        &self,
        name: &str,
        phone: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Account>;

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    /// Atomically checks the balance and decrements it, returning the new
    /// balance. Fails with `InsufficientCredits` when the balance is below
    /// `amount`; the balance can never go negative through this path.
    async fn debit_credits(&self, account_id: Uuid, amount: i64) -> PortResult<i64>;

    async fn get_api_key(&self, account_id: Uuid) -> PortResult<String>;

    async fn set_api_key(&self, account_id: Uuid, api_key: &str) -> PortResult<()>;

    // --- Prompt / Dataset Lifecycle ---

    async fn create_prompt(&self, account_id: Uuid, text: &str) -> PortResult<Prompt>;

    /// Creates the dataset row for a prompt, in `processing` with empty
    /// keywords and vector. At most one dataset exists per prompt.
    async fn create_dataset(&self, account_id: Uuid, prompt_id: Uuid) -> PortResult<Dataset>;

    async fn set_prompt_status(&self, prompt_id: Uuid, status: PromptStatus) -> PortResult<()>;

    /// Stores the keyword-stage result on the dataset. The status moves to
    /// `keywords_done` only if it is still `processing`, so a slow keyword
    /// write cannot regress a dataset a scrape callback already finished.
    async fn record_keyword_result(
        &self,
        prompt_id: Uuid,
        keywords: &[String],
        vector: &[f64],
    ) -> PortResult<()>;

    /// Marks the dataset `failed` with a diagnostic message.
    async fn mark_dataset_failed(&self, prompt_id: Uuid, message: &str) -> PortResult<()>;

    /// Applies a successful scrape report: preview, download link, total item
    /// count; clears any error message and moves the dataset to `completed`.
    /// Returns `Ignored` when no dataset exists for the prompt.
    async fn complete_from_scrape(
        &self,
        prompt_id: Uuid,
        preview: &[PreviewItem],
        download_link: Option<&str>,
        total_items: Option<i64>,
    ) -> PortResult<ScrapeOutcome>;

    /// Applies a failed scrape report, leaving previously stored keywords
    /// intact. Returns `Ignored` when no dataset exists for the prompt.
    async fn fail_from_scrape(&self, prompt_id: Uuid, message: &str) -> PortResult<ScrapeOutcome>;

    // --- Read Paths ---

    /// The dataset for a prompt with the prompt's text and creation time
    /// denormalized in. Fails with `NotFound` when absent.
    async fn get_dataset_view(&self, prompt_id: Uuid) -> PortResult<DatasetView>;

    /// All of an account's datasets, newest first.
    async fn list_dataset_views(&self, account_id: Uuid) -> PortResult<Vec<DatasetView>>;

    /// Deletes the dataset and its prompt, both scoped by owner. Fails with
    /// `NotFound` when the prompt does not exist or belongs to someone else —
    /// existence is never leaked across accounts.
    async fn delete_dataset_and_prompt(&self, account_id: Uuid, prompt_id: Uuid)
        -> PortResult<()>;
}

/// The keyword-stage result returned by the ML collaborator.
#[derive(Debug, Clone)]
pub struct KeywordExtraction {
    pub keywords: Vec<String>,
    pub vector: Vec<f64>,
}

/// The external ML collaborator: keyword extraction plus embedding, called
/// synchronously on the submit path. Scraping is kicked off by the same
/// collaborator out-of-band and reported back through the scrape callback.
#[async_trait]
pub trait KeywordExtractionService: Send + Sync {
    async fn extract(&self, prompt_text: &str, prompt_id: Uuid) -> PortResult<KeywordExtraction>;
}
