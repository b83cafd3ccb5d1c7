//! services/api/src/adapters/memory.rs
//!
//! An in-memory implementation of the `StoreService` port. Used by the test
//! suite and for running the service locally without Postgres. Mirrors the
//! database adapter's semantics, including the atomic conditional debit and
//! the keyword-stage status guard.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use datagen_core::domain::{
    Account, AccountCredentials, Dataset, DatasetStatus, DatasetView, PreviewItem, Prompt,
    PromptStatus, ScrapeOutcome,
};
use datagen_core::ports::{PortError, PortResult, StoreService};

const STARTING_CREDITS: i64 = 200;

struct AccountRow {
    account: Account,
    hashed_password: String,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, AccountRow>,
    prompts: HashMap<Uuid, Prompt>,
    /// Keyed by prompt id — at most one dataset per prompt.
    datasets: HashMap<Uuid, Dataset>,
}

/// An in-memory `StoreService`, safe for concurrent use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides an account's balance. Test/dev helper, not part of the port.
    pub fn set_credits(&self, account_id: Uuid, credits: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.accounts.get_mut(&account_id) {
            row.account.credits = credits;
        }
    }
}

fn not_found(what: &str) -> PortError {
    PortError::NotFound(what.to_string())
}

#[async_trait]
impl StoreService for MemoryStore {
    async fn create_account(
        &self,
        name: &str,
        phone: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Account> {
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.values().any(|r| r.account.email == email) {
            return Err(PortError::Conflict(format!(
                "email {} already registered",
                email
            )));
        }

        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            credits: STARTING_CREDITS,
            api_key: String::new(),
        };
        inner.accounts.insert(
            account.id,
            AccountRow {
                account: account.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(account)
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(&account_id)
            .map(|r| r.account.clone())
            .ok_or_else(|| not_found("Account not found"))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .values()
            .find(|r| r.account.email == email)
            .map(|r| AccountCredentials {
                id: r.account.id,
                email: r.account.email.clone(),
                hashed_password: r.hashed_password.clone(),
            })
            .ok_or_else(|| not_found("No account for email"))
    }

    async fn debit_credits(&self, account_id: Uuid, amount: i64) -> PortResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| not_found("Account not found"))?;

        if row.account.credits < amount {
            return Err(PortError::InsufficientCredits);
        }
        row.account.credits -= amount;
        Ok(row.account.credits)
    }

    async fn get_api_key(&self, account_id: Uuid) -> PortResult<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(&account_id)
            .map(|r| r.account.api_key.clone())
            .ok_or_else(|| not_found("Account not found"))
    }

    async fn set_api_key(&self, account_id: Uuid, api_key: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| not_found("Account not found"))?;
        row.account.api_key = api_key.to_string();
        Ok(())
    }

    async fn create_prompt(&self, account_id: Uuid, text: &str) -> PortResult<Prompt> {
        let mut inner = self.inner.lock().unwrap();
        let prompt = Prompt {
            id: Uuid::new_v4(),
            account_id,
            text: text.to_string(),
            status: PromptStatus::Processing,
            created_at: Utc::now(),
        };
        inner.prompts.insert(prompt.id, prompt.clone());
        Ok(prompt)
    }

    async fn create_dataset(&self, account_id: Uuid, prompt_id: Uuid) -> PortResult<Dataset> {
        let mut inner = self.inner.lock().unwrap();
        if inner.datasets.contains_key(&prompt_id) {
            return Err(PortError::Conflict(format!(
                "Dataset for prompt {} already exists",
                prompt_id
            )));
        }

        let dataset = Dataset {
            id: Uuid::new_v4(),
            account_id,
            prompt_id,
            keywords: Vec::new(),
            vector: Vec::new(),
            preview: Vec::new(),
            download_link: None,
            total_items: None,
            status: DatasetStatus::Processing,
            error_message: None,
            created_at: Utc::now(),
        };
        inner.datasets.insert(prompt_id, dataset.clone());
        Ok(dataset)
    }

    async fn set_prompt_status(&self, prompt_id: Uuid, status: PromptStatus) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(prompt) = inner.prompts.get_mut(&prompt_id) {
            prompt.status = status;
        }
        Ok(())
    }

    async fn record_keyword_result(
        &self,
        prompt_id: Uuid,
        keywords: &[String],
        vector: &[f64],
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(dataset) = inner.datasets.get_mut(&prompt_id) {
            dataset.keywords = keywords.to_vec();
            dataset.vector = vector.to_vec();
            if dataset.status.accepts_keyword_result() {
                dataset.status = DatasetStatus::KeywordsDone;
            }
        }
        Ok(())
    }

    async fn mark_dataset_failed(&self, prompt_id: Uuid, message: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(dataset) = inner.datasets.get_mut(&prompt_id) {
            dataset.status = DatasetStatus::Failed;
            dataset.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn complete_from_scrape(
        &self,
        prompt_id: Uuid,
        preview: &[PreviewItem],
        download_link: Option<&str>,
        total_items: Option<i64>,
    ) -> PortResult<ScrapeOutcome> {
        let mut inner = self.inner.lock().unwrap();
        match inner.datasets.get_mut(&prompt_id) {
            Some(dataset) => {
                dataset.preview = preview.to_vec();
                dataset.download_link = download_link.map(str::to_string);
                dataset.total_items = total_items;
                dataset.status = DatasetStatus::Completed;
                dataset.error_message = None;
                Ok(ScrapeOutcome::Applied)
            }
            None => Ok(ScrapeOutcome::Ignored),
        }
    }

    async fn fail_from_scrape(&self, prompt_id: Uuid, message: &str) -> PortResult<ScrapeOutcome> {
        let mut inner = self.inner.lock().unwrap();
        match inner.datasets.get_mut(&prompt_id) {
            Some(dataset) => {
                dataset.status = DatasetStatus::Failed;
                dataset.error_message = Some(message.to_string());
                Ok(ScrapeOutcome::Applied)
            }
            None => Ok(ScrapeOutcome::Ignored),
        }
    }

    async fn get_dataset_view(&self, prompt_id: Uuid) -> PortResult<DatasetView> {
        let inner = self.inner.lock().unwrap();
        let dataset = inner
            .datasets
            .get(&prompt_id)
            .cloned()
            .ok_or_else(|| not_found("Dataset not found"))?;
        let prompt = inner
            .prompts
            .get(&prompt_id)
            .cloned()
            .ok_or_else(|| not_found("Dataset not found"))?;
        Ok(DatasetView {
            dataset,
            prompt_text: prompt.text,
            prompt_created_at: prompt.created_at,
        })
    }

    async fn list_dataset_views(&self, account_id: Uuid) -> PortResult<Vec<DatasetView>> {
        let inner = self.inner.lock().unwrap();
        let mut views: Vec<DatasetView> = inner
            .datasets
            .values()
            .filter(|d| d.account_id == account_id)
            .filter_map(|d| {
                inner.prompts.get(&d.prompt_id).map(|p| DatasetView {
                    dataset: d.clone(),
                    prompt_text: p.text.clone(),
                    prompt_created_at: p.created_at,
                })
            })
            .collect();
        views.sort_by(|a, b| b.dataset.created_at.cmp(&a.dataset.created_at));
        Ok(views)
    }

    async fn delete_dataset_and_prompt(
        &self,
        account_id: Uuid,
        prompt_id: Uuid,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let owned = inner
            .datasets
            .get(&prompt_id)
            .map(|d| d.account_id == account_id)
            .unwrap_or(false);
        if !owned {
            return Err(not_found("Dataset not found"));
        }
        inner.datasets.remove(&prompt_id);
        inner.prompts.remove(&prompt_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn debit_is_conditional_and_never_negative() {
        let store = MemoryStore::new();
        let account = store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();

        store.set_credits(account.id, 15);
        assert_eq!(store.debit_credits(account.id, 10).await.unwrap(), 5);

        let err = store.debit_credits(account.id, 10).await.unwrap_err();
        assert!(matches!(err, PortError::InsufficientCredits));
        assert_eq!(store.get_account(account.id).await.unwrap().credits, 5);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();
        let err = store
            .create_account("Eve", "556", "ada@example.com", "hash2")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn keyword_result_does_not_regress_terminal_status() {
        let store = MemoryStore::new();
        let account = store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();
        let prompt = store.create_prompt(account.id, "cats").await.unwrap();
        store.create_dataset(account.id, prompt.id).await.unwrap();

        // Scrape callback lands first.
        store
            .complete_from_scrape(prompt.id, &[], Some("http://x/d.json"), Some(0))
            .await
            .unwrap();

        // Late keyword write stores fields but leaves the status terminal.
        store
            .record_keyword_result(prompt.id, &["a".to_string()], &[0.1])
            .await
            .unwrap();

        let view = store.get_dataset_view(prompt.id).await.unwrap();
        assert_eq!(view.dataset.status, DatasetStatus::Completed);
        assert_eq!(view.dataset.keywords, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let store = MemoryStore::new();
        let owner = store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();
        let stranger = store
            .create_account("Eve", "556", "eve@example.com", "hash")
            .await
            .unwrap();
        let prompt = store.create_prompt(owner.id, "cats").await.unwrap();
        store.create_dataset(owner.id, prompt.id).await.unwrap();

        let err = store
            .delete_dataset_and_prompt(stranger.id, prompt.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.get_dataset_view(prompt.id).await.is_ok());

        store
            .delete_dataset_and_prompt(owner.id, prompt.id)
            .await
            .unwrap();
        assert!(store.get_dataset_view(prompt.id).await.is_err());
    }

    #[tokio::test]
    async fn scrape_after_delete_is_ignored() {
        let store = MemoryStore::new();
        let account = store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();
        let prompt = store.create_prompt(account.id, "cats").await.unwrap();
        store.create_dataset(account.id, prompt.id).await.unwrap();
        store
            .delete_dataset_and_prompt(account.id, prompt.id)
            .await
            .unwrap();

        let outcome = store
            .complete_from_scrape(prompt.id, &[], None, None)
            .await
            .unwrap();
        assert_eq!(outcome, ScrapeOutcome::Ignored);
        // The no-op must not resurrect the dataset.
        assert!(store.get_dataset_view(prompt.id).await.is_err());
    }
}
