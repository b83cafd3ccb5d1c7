//! Typed client for the Datagen REST API.
//!
//! Covers the full submit-then-poll flow: authenticate, submit a prompt,
//! then watch the dataset until it reaches a terminal status. Sessions are
//! explicit objects handed to each call, with a watch channel for observers
//! instead of ambient global state.

pub mod client;
pub mod session;

pub use client::{ApiClient, ClientError, SubmitOutcome};
pub use session::{AccountSummary, Session, SessionStore};
