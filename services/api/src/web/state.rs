//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use datagen_core::ports::{KeywordExtractionService, StoreService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreService>,
    pub ml: Arc<dyn KeywordExtractionService>,
    pub config: Arc<Config>,
}
