//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `StoreService` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use datagen_core::domain::{
    Account, AccountCredentials, Dataset, DatasetStatus, DatasetView, PreviewItem, Prompt,
    PromptStatus, ScrapeOutcome,
};
use datagen_core::ports::{PortError, PortResult, StoreService};

/// Starting allowance for a freshly registered account.
const STARTING_CREDITS: i64 = 200;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StoreService` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    name: String,
    phone: String,
    email: String,
    credits: i64,
    api_key: String,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            credits: self.credits,
            api_key: self.api_key,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> AccountCredentials {
        AccountCredentials {
            id: self.id,
            email: self.email,
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct PromptRecord {
    id: Uuid,
    user_id: Uuid,
    text: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl PromptRecord {
    fn to_domain(self) -> PortResult<Prompt> {
        let status = self
            .status
            .parse::<PromptStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(Prompt {
            id: self.id,
            account_id: self.user_id,
            text: self.text,
            status,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct DatasetRecord {
    id: Uuid,
    user_id: Uuid,
    prompt_id: Uuid,
    keywords: Vec<String>,
    vector: Vec<f64>,
    preview: sqlx::types::Json<Vec<PreviewItem>>,
    download_link: Option<String>,
    total_items: Option<i64>,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}
impl DatasetRecord {
    fn to_domain(self) -> PortResult<Dataset> {
        let status = self
            .status
            .parse::<DatasetStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(Dataset {
            id: self.id,
            account_id: self.user_id,
            prompt_id: self.prompt_id,
            keywords: self.keywords,
            vector: self.vector,
            preview: self.preview.0,
            download_link: self.download_link,
            total_items: self.total_items,
            status,
            error_message: self.error_message,
            created_at: self.created_at,
        })
    }
}

/// A dataset row joined with its prompt's text and creation time.
#[derive(FromRow)]
struct DatasetViewRecord {
    id: Uuid,
    user_id: Uuid,
    prompt_id: Uuid,
    keywords: Vec<String>,
    vector: Vec<f64>,
    preview: sqlx::types::Json<Vec<PreviewItem>>,
    download_link: Option<String>,
    total_items: Option<i64>,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    prompt_text: String,
    prompt_created_at: DateTime<Utc>,
}
impl DatasetViewRecord {
    fn to_domain(self) -> PortResult<DatasetView> {
        let status = self
            .status
            .parse::<DatasetStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(DatasetView {
            dataset: Dataset {
                id: self.id,
                account_id: self.user_id,
                prompt_id: self.prompt_id,
                keywords: self.keywords,
                vector: self.vector,
                preview: self.preview.0,
                download_link: self.download_link,
                total_items: self.total_items,
                status,
                error_message: self.error_message,
                created_at: self.created_at,
            },
            prompt_text: self.prompt_text,
            prompt_created_at: self.prompt_created_at,
        })
    }
}

const DATASET_VIEW_COLUMNS: &str = "d.id, d.user_id, d.prompt_id, d.keywords, d.vector, \
     d.preview, d.download_link, d.total_items, d.status, d.error_message, d.created_at, \
     p.text AS prompt_text, p.created_at AS prompt_created_at";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `StoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreService for PgStore {
    async fn create_account(
        &self,
        name: &str,
        phone: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO users (id, name, phone, email, password_hash, credits, api_key) \
             VALUES ($1, $2, $3, $4, $5, $6, '') \
             RETURNING id, name, phone, email, credits, api_key",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(phone)
        .bind(email)
        .bind(hashed_password)
        .bind(STARTING_CREDITS)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                PortError::Conflict(format!("email {} already registered", email))
            } else {
                unexpected(e)
            }
        })?;

        Ok(record.to_domain())
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, name, phone, email, credits, api_key FROM users WHERE id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Account {} not found", account_id))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("No account for email {}", email))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn debit_credits(&self, account_id: Uuid, amount: i64) -> PortResult<i64> {
        // Conditional decrement in one statement, so two racing submissions
        // cannot both pass a stale balance check and drive it negative.
        let updated = sqlx::query_as::<_, (i64,)>(
            "UPDATE users SET credits = credits - $2 \
             WHERE id = $1 AND credits >= $2 RETURNING credits",
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        if let Some((credits,)) = updated {
            return Ok(credits);
        }

        // Nothing matched: either the account is gone or the balance is short.
        let exists = sqlx::query_as::<_, (i64,)>("SELECT credits FROM users WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match exists {
            Some(_) => Err(PortError::InsufficientCredits),
            None => Err(PortError::NotFound(format!(
                "Account {} not found",
                account_id
            ))),
        }
    }

    async fn get_api_key(&self, account_id: Uuid) -> PortResult<String> {
        let (api_key,) =
            sqlx::query_as::<_, (String,)>("SELECT api_key FROM users WHERE id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::RowNotFound => {
                        PortError::NotFound(format!("Account {} not found", account_id))
                    }
                    _ => unexpected(e),
                })?;
        Ok(api_key)
    }

    async fn set_api_key(&self, account_id: Uuid, api_key: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET api_key = $2 WHERE id = $1")
            .bind(account_id)
            .bind(api_key)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Account {} not found",
                account_id
            )));
        }
        Ok(())
    }

    async fn create_prompt(&self, account_id: Uuid, text: &str) -> PortResult<Prompt> {
        let record = sqlx::query_as::<_, PromptRecord>(
            "INSERT INTO prompts (id, user_id, text, status) VALUES ($1, $2, $3, 'processing') \
             RETURNING id, user_id, text, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn create_dataset(&self, account_id: Uuid, prompt_id: Uuid) -> PortResult<Dataset> {
        let record = sqlx::query_as::<_, DatasetRecord>(
            "INSERT INTO datasets (id, user_id, prompt_id, status) \
             VALUES ($1, $2, $3, 'processing') \
             RETURNING id, user_id, prompt_id, keywords, vector, preview, download_link, \
                       total_items, status, error_message, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(prompt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                PortError::Conflict(format!("Dataset for prompt {} already exists", prompt_id))
            } else {
                unexpected(e)
            }
        })?;

        record.to_domain()
    }

    async fn set_prompt_status(&self, prompt_id: Uuid, status: PromptStatus) -> PortResult<()> {
        sqlx::query("UPDATE prompts SET status = $2 WHERE id = $1")
            .bind(prompt_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn record_keyword_result(
        &self,
        prompt_id: Uuid,
        keywords: &[String],
        vector: &[f64],
    ) -> PortResult<()> {
        // The CASE keeps a dataset a scrape callback already finished (or
        // failed) from sliding back to keywords_done.
        sqlx::query(
            "UPDATE datasets SET keywords = $2, vector = $3, \
             status = CASE WHEN status = 'processing' THEN 'keywords_done' ELSE status END \
             WHERE prompt_id = $1",
        )
        .bind(prompt_id)
        .bind(keywords)
        .bind(vector)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn mark_dataset_failed(&self, prompt_id: Uuid, message: &str) -> PortResult<()> {
        sqlx::query("UPDATE datasets SET status = 'failed', error_message = $2 WHERE prompt_id = $1")
            .bind(prompt_id)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn complete_from_scrape(
        &self,
        prompt_id: Uuid,
        preview: &[PreviewItem],
        download_link: Option<&str>,
        total_items: Option<i64>,
    ) -> PortResult<ScrapeOutcome> {
        let result = sqlx::query(
            "UPDATE datasets SET preview = $2, download_link = $3, total_items = $4, \
             status = 'completed', error_message = NULL WHERE prompt_id = $1",
        )
        .bind(prompt_id)
        .bind(sqlx::types::Json(preview))
        .bind(download_link)
        .bind(total_items)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            Ok(ScrapeOutcome::Ignored)
        } else {
            Ok(ScrapeOutcome::Applied)
        }
    }

    async fn fail_from_scrape(&self, prompt_id: Uuid, message: &str) -> PortResult<ScrapeOutcome> {
        let result = sqlx::query(
            "UPDATE datasets SET status = 'failed', error_message = $2 WHERE prompt_id = $1",
        )
        .bind(prompt_id)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            Ok(ScrapeOutcome::Ignored)
        } else {
            Ok(ScrapeOutcome::Applied)
        }
    }

    async fn get_dataset_view(&self, prompt_id: Uuid) -> PortResult<DatasetView> {
        let sql = format!(
            "SELECT {} FROM datasets d JOIN prompts p ON p.id = d.prompt_id \
             WHERE d.prompt_id = $1",
            DATASET_VIEW_COLUMNS
        );
        let record = sqlx::query_as::<_, DatasetViewRecord>(&sql)
            .bind(prompt_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound("Dataset not found".to_string()),
                _ => unexpected(e),
            })?;

        record.to_domain()
    }

    async fn list_dataset_views(&self, account_id: Uuid) -> PortResult<Vec<DatasetView>> {
        let sql = format!(
            "SELECT {} FROM datasets d JOIN prompts p ON p.id = d.prompt_id \
             WHERE d.user_id = $1 ORDER BY d.created_at DESC",
            DATASET_VIEW_COLUMNS
        );
        let records = sqlx::query_as::<_, DatasetViewRecord>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn delete_dataset_and_prompt(
        &self,
        account_id: Uuid,
        prompt_id: Uuid,
    ) -> PortResult<()> {
        // Owner-scoped lookup first, so a foreign prompt id reads the same
        // as a missing one.
        let dataset = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM datasets WHERE prompt_id = $1 AND user_id = $2",
        )
        .bind(prompt_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        let (dataset_id,) = dataset.ok_or_else(|| {
            PortError::NotFound("Dataset not found".to_string())
        })?;

        sqlx::query("DELETE FROM datasets WHERE id = $1")
            .bind(dataset_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        sqlx::query("DELETE FROM prompts WHERE id = $1 AND user_id = $2")
            .bind(prompt_id)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(())
    }
}
