//! services/api/src/web/generate.rs
//!
//! The dataset-generation workflow: credit debit, prompt/dataset creation,
//! the synchronous keyword stage, and applying the scraper's out-of-band
//! callback. The REST handlers in `rest.rs` are thin wrappers around these
//! two entry points.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use datagen_core::domain::{PreviewItem, PromptStatus, ScrapeOutcome};
use datagen_core::ports::{KeywordExtractionService, StoreService};

/// Credits debited per generation.
pub const GENERATION_COST: i64 = 10;

/// What the submit path hands back once the keyword stage has returned.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub prompt_id: Uuid,
    pub dataset_id: Uuid,
    pub keywords: Vec<String>,
    pub credits_remaining: i64,
}

/// Runs one generation for `account_id`.
///
/// Order matters: the debit happens before any insert and before the external
/// call, so a failed ML call never runs debit-free. There is no refund when
/// the keyword stage fails — the records are flipped to `failed` and the
/// debit stands. A crash between the debit and the inserts would spend
/// credits with no record; that window is accepted and documented rather
/// than transactionally guarded.
pub async fn run_generation(
    store: &dyn StoreService,
    ml: &dyn KeywordExtractionService,
    account_id: Uuid,
    text: &str,
) -> Result<GenerationOutcome, ApiError> {
    let credits_remaining = store.debit_credits(account_id, GENERATION_COST).await?;

    let prompt = store.create_prompt(account_id, text).await?;
    let dataset = store.create_dataset(account_id, prompt.id).await?;

    match ml.extract(text, prompt.id).await {
        Ok(extraction) => {
            store
                .record_keyword_result(prompt.id, &extraction.keywords, &extraction.vector)
                .await?;
            store
                .set_prompt_status(prompt.id, PromptStatus::Completed)
                .await?;
            info!(prompt_id = %prompt.id, "keyword stage complete");

            Ok(GenerationOutcome {
                prompt_id: prompt.id,
                dataset_id: dataset.id,
                keywords: extraction.keywords,
                credits_remaining,
            })
        }
        Err(e) => {
            // The client must never be left watching a dataset stuck at
            // `processing`; flip both records to failed before reporting.
            let message = format!("Keyword extraction failed: {}", e);
            if let Err(persist) = store.mark_dataset_failed(prompt.id, &message).await {
                warn!(prompt_id = %prompt.id, "could not record dataset failure: {}", persist);
            }
            if let Err(persist) = store
                .set_prompt_status(prompt.id, PromptStatus::Failed)
                .await
            {
                warn!(prompt_id = %prompt.id, "could not record prompt failure: {}", persist);
            }
            Err(ApiError::Upstream(message))
        }
    }
}

/// What the scraper collaborator posts back when it finishes.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub prompt_id: Uuid,
    pub preview: Option<Vec<PreviewItem>>,
    pub download_link: Option<String>,
    pub total_items: Option<i64>,
    pub error_message: Option<String>,
}

/// Applies a scrape report to the dataset for `report.prompt_id`.
///
/// A missing dataset (deleted before the scraper finished) comes back as
/// `Ignored`, which the handler acknowledges as a success — the scraper
/// cannot tell "deleted" from "never existed" and must not be made to retry.
/// Duplicate delivery simply overwrites the same fields again.
pub async fn apply_scrape_report(
    store: &dyn StoreService,
    report: &ScrapeReport,
) -> Result<ScrapeOutcome, ApiError> {
    let outcome = match report.error_message.as_deref().filter(|m| !m.is_empty()) {
        Some(message) => store.fail_from_scrape(report.prompt_id, message).await?,
        None => {
            let preview = report.preview.as_deref().unwrap_or(&[]);
            let total_items = report.total_items.unwrap_or(preview.len() as i64);
            store
                .complete_from_scrape(
                    report.prompt_id,
                    preview,
                    report.download_link.as_deref(),
                    Some(total_items),
                )
                .await?
        }
    };

    if outcome == ScrapeOutcome::Ignored {
        info!(prompt_id = %report.prompt_id, "scrape report for missing dataset, ignoring");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FailingMlAdapter, FixedMlAdapter, MemoryStore};
    use datagen_core::domain::DatasetStatus;

    fn fixed_ml() -> FixedMlAdapter {
        FixedMlAdapter {
            keywords: vec!["a".to_string(), "b".to_string()],
            vector: vec![0.1, 0.2],
        }
    }

    fn preview_item() -> PreviewItem {
        PreviewItem {
            title: "T".to_string(),
            url: "u".to_string(),
            content: "c".to_string(),
            keyword_used: "a".to_string(),
        }
    }

    async fn account_with_credits(store: &MemoryStore, credits: i64) -> Uuid {
        let account = store
            .create_account("Ada", "555", "ada@example.com", "hash")
            .await
            .unwrap();
        store.set_credits(account.id, credits);
        account.id
    }

    #[tokio::test]
    async fn successful_generation_debits_and_records_keywords() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;

        let outcome = run_generation(&store, &fixed_ml(), account_id, "cat datasets")
            .await
            .unwrap();

        assert_eq!(outcome.credits_remaining, 190);
        assert_eq!(outcome.keywords, vec!["a".to_string(), "b".to_string()]);

        let view = store.get_dataset_view(outcome.prompt_id).await.unwrap();
        assert_eq!(view.dataset.status, DatasetStatus::KeywordsDone);
        assert_eq!(view.dataset.vector, vec![0.1, 0.2]);
        assert_eq!(view.prompt_text, "cat datasets");
        assert_eq!(store.get_account(account_id).await.unwrap().credits, 190);
    }

    #[tokio::test]
    async fn insufficient_credits_rejects_before_any_write() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 9).await;

        let err = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientCredits));

        // No debit, no prompt, no dataset.
        assert_eq!(store.get_account(account_id).await.unwrap().credits, 9);
        assert!(store.list_dataset_views(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn serialized_submissions_never_drive_balance_negative() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 25).await;
        let ml = fixed_ml();

        assert!(run_generation(&store, &ml, account_id, "one").await.is_ok());
        assert!(run_generation(&store, &ml, account_id, "two").await.is_ok());
        let err = run_generation(&store, &ml, account_id, "three")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientCredits));
        assert_eq!(store.get_account(account_id).await.unwrap().credits, 5);
    }

    #[tokio::test]
    async fn ml_failure_marks_both_records_failed_and_keeps_the_debit() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let ml = FailingMlAdapter {
            message: "connection refused".to_string(),
        };

        let err = run_generation(&store, &ml, account_id, "cats")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        let views = store.list_dataset_views(account_id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].dataset.status, DatasetStatus::Failed);
        let message = views[0].dataset.error_message.as_deref().unwrap();
        assert!(!message.is_empty());

        // The debit is not refunded.
        assert_eq!(store.get_account(account_id).await.unwrap().credits, 190);
    }

    #[tokio::test]
    async fn full_round_trip_through_scrape_callback() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;

        let outcome = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap();

        let report = ScrapeReport {
            prompt_id: outcome.prompt_id,
            preview: Some(vec![preview_item()]),
            download_link: Some("http://x/d.json".to_string()),
            total_items: Some(1),
            error_message: None,
        };
        assert_eq!(
            apply_scrape_report(&store, &report).await.unwrap(),
            ScrapeOutcome::Applied
        );

        let view = store.get_dataset_view(outcome.prompt_id).await.unwrap();
        assert_eq!(view.dataset.status, DatasetStatus::Completed);
        assert_eq!(view.dataset.keywords, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(view.dataset.preview.len(), 1);
        assert_eq!(view.dataset.download_link.as_deref(), Some("http://x/d.json"));
        assert_eq!(view.dataset.total_items, Some(1));
        assert_eq!(view.dataset.error_message, None);
    }

    #[tokio::test]
    async fn scrape_callback_is_idempotent() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let outcome = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap();

        let report = ScrapeReport {
            prompt_id: outcome.prompt_id,
            preview: Some(vec![preview_item()]),
            download_link: Some("http://x/d.json".to_string()),
            total_items: None,
            error_message: None,
        };

        apply_scrape_report(&store, &report).await.unwrap();
        let first = store.get_dataset_view(outcome.prompt_id).await.unwrap();

        apply_scrape_report(&store, &report).await.unwrap();
        let second = store.get_dataset_view(outcome.prompt_id).await.unwrap();

        assert_eq!(first.dataset.status, second.dataset.status);
        assert_eq!(first.dataset.preview, second.dataset.preview);
        assert_eq!(first.dataset.download_link, second.dataset.download_link);
        // total_items defaults to the preview length when the report omits it.
        assert_eq!(first.dataset.total_items, Some(1));
        assert_eq!(second.dataset.total_items, Some(1));
    }

    #[tokio::test]
    async fn scrape_error_report_keeps_keywords() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let outcome = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap();

        let report = ScrapeReport {
            prompt_id: outcome.prompt_id,
            preview: None,
            download_link: None,
            total_items: None,
            error_message: Some("scraper crashed".to_string()),
        };
        apply_scrape_report(&store, &report).await.unwrap();

        let view = store.get_dataset_view(outcome.prompt_id).await.unwrap();
        assert_eq!(view.dataset.status, DatasetStatus::Failed);
        assert_eq!(view.dataset.error_message.as_deref(), Some("scraper crashed"));
        assert_eq!(view.dataset.keywords, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn empty_error_message_counts_as_success() {
        // The collaborator sends errorMessage: "" on the happy path.
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let outcome = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap();

        let report = ScrapeReport {
            prompt_id: outcome.prompt_id,
            preview: Some(vec![preview_item()]),
            download_link: Some("http://x/d.json".to_string()),
            total_items: Some(1),
            error_message: Some(String::new()),
        };
        apply_scrape_report(&store, &report).await.unwrap();

        let view = store.get_dataset_view(outcome.prompt_id).await.unwrap();
        assert_eq!(view.dataset.status, DatasetStatus::Completed);
    }

    #[tokio::test]
    async fn late_callback_after_delete_is_a_no_op() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let outcome = run_generation(&store, &fixed_ml(), account_id, "cats")
            .await
            .unwrap();

        store
            .delete_dataset_and_prompt(account_id, outcome.prompt_id)
            .await
            .unwrap();

        let report = ScrapeReport {
            prompt_id: outcome.prompt_id,
            preview: Some(vec![preview_item()]),
            download_link: None,
            total_items: None,
            error_message: None,
        };
        assert_eq!(
            apply_scrape_report(&store, &report).await.unwrap(),
            ScrapeOutcome::Ignored
        );
        assert!(store.list_dataset_views(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dashboard_lists_newest_first() {
        let store = MemoryStore::new();
        let account_id = account_with_credits(&store, 200).await;
        let ml = fixed_ml();

        let first = run_generation(&store, &ml, account_id, "one").await.unwrap();
        let second = run_generation(&store, &ml, account_id, "two").await.unwrap();
        let third = run_generation(&store, &ml, account_id, "three").await.unwrap();

        let views = store.list_dataset_views(account_id).await.unwrap();
        let order: Vec<Uuid> = views.iter().map(|v| v.dataset.prompt_id).collect();
        assert_eq!(order, vec![third.prompt_id, second.prompt_id, first.prompt_id]);
    }
}
