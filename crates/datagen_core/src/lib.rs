pub mod domain;
pub mod ports;

pub use domain::{
    Account, AccountCredentials, Dataset, DatasetStatus, DatasetView, PreviewItem, Prompt,
    PromptStatus, ScrapeOutcome,
};
pub use ports::{KeywordExtraction, KeywordExtractionService, PortError, PortResult, StoreService};
