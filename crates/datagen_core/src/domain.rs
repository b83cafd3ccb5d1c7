//! crates/datagen_core/src/domain.rs
//!
//! Defines the core data structures for the application. These structs are
//! independent of any database; they carry serde derives because the same
//! shapes travel over the REST wire between the service and the poller client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a submitted prompt. `Completed` means the keyword stage
/// returned, regardless of how the later scrape turns out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Processing,
    Completed,
    Failed,
}

/// Lifecycle of a dataset. Moves forward along
/// `processing -> keywords_done -> completed`, or to `failed` from any
/// non-terminal state; it never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Processing,
    KeywordsDone,
    Completed,
    Failed,
}

impl DatasetStatus {
    /// `completed` and `failed` are terminal: the poller stops once it
    /// observes either of them.
    pub fn is_terminal(self) -> bool {
        matches!(self, DatasetStatus::Completed | DatasetStatus::Failed)
    }

    /// Whether the keyword stage may flip this status to `keywords_done`.
    /// Only the initial state qualifies, so an out-of-order keyword write
    /// can never pull a terminal dataset backwards.
    pub fn accepts_keyword_result(self) -> bool {
        matches!(self, DatasetStatus::Processing)
    }

    /// The wire/storage spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetStatus::Processing => "processing",
            DatasetStatus::KeywordsDone => "keywords_done",
            DatasetStatus::Completed => "completed",
            DatasetStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DatasetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(DatasetStatus::Processing),
            "keywords_done" => Ok(DatasetStatus::KeywordsDone),
            "completed" => Ok(DatasetStatus::Completed),
            "failed" => Ok(DatasetStatus::Failed),
            other => Err(format!("unknown dataset status '{}'", other)),
        }
    }
}

impl PromptStatus {
    /// The wire/storage spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            PromptStatus::Processing => "processing",
            PromptStatus::Completed => "completed",
            PromptStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PromptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(PromptStatus::Processing),
            "completed" => Ok(PromptStatus::Completed),
            "failed" => Ok(PromptStatus::Failed),
            other => Err(format!("unknown prompt status '{}'", other)),
        }
    }
}

/// A registered user. The password hash lives in `AccountCredentials` and is
/// never part of this struct, so it cannot leak into a response by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub credits: i64,
    pub api_key: String,
}

/// Only used internally for login — contains sensitive data.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// A user's natural-language request for a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: Uuid,
    pub account_id: Uuid,
    pub text: String,
    pub status: PromptStatus,
    pub created_at: DateTime<Utc>,
}

/// One scraped item shown to the user before they download the full dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub title: String,
    pub url: String,
    pub content: String,
    pub keyword_used: String,
}

/// The generated artifact tied one-to-one with a prompt. Filled in two
/// stages: the keyword stage writes `keywords`/`vector`, the scrape callback
/// writes `preview`/`download_link`/`total_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: Uuid,
    pub account_id: Uuid,
    pub prompt_id: Uuid,
    pub keywords: Vec<String>,
    pub vector: Vec<f64>,
    pub preview: Vec<PreviewItem>,
    pub download_link: Option<String>,
    pub total_items: Option<i64>,
    pub status: DatasetStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A dataset with its prompt's text and creation time denormalized in, as
/// returned by the read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetView {
    #[serde(flatten)]
    pub dataset: Dataset,
    pub prompt_text: String,
    pub prompt_created_at: DateTime<Utc>,
}

/// What applying a scrape report did. `Ignored` covers the case where the
/// dataset was deleted before the scraper finished — the callback must still
/// be acknowledged as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Applied,
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!DatasetStatus::Processing.is_terminal());
        assert!(!DatasetStatus::KeywordsDone.is_terminal());
        assert!(DatasetStatus::Completed.is_terminal());
        assert!(DatasetStatus::Failed.is_terminal());
    }

    #[test]
    fn keyword_result_only_from_processing() {
        assert!(DatasetStatus::Processing.accepts_keyword_result());
        assert!(!DatasetStatus::KeywordsDone.accepts_keyword_result());
        assert!(!DatasetStatus::Completed.accepts_keyword_result());
        assert!(!DatasetStatus::Failed.accepts_keyword_result());
    }

    #[test]
    fn status_wire_names() {
        let rendered = serde_json::to_string(&DatasetStatus::KeywordsDone).unwrap();
        assert_eq!(rendered, "\"keywords_done\"");
        let parsed: DatasetStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, DatasetStatus::Processing);
    }

    #[test]
    fn preview_item_uses_camel_case() {
        let item = PreviewItem {
            title: "T".to_string(),
            url: "u".to_string(),
            content: "c".to_string(),
            keyword_used: "a".to_string(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("keywordUsed").is_some());
    }
}
