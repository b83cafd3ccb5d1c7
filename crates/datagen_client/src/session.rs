//! crates/datagen_client/src/session.rs
//!
//! Explicit session state for the client. The original UI kept the token in
//! ambient browser storage and listened for storage events; here the session
//! is a value handed to each request, and interested parties subscribe to a
//! watch channel to hear about sign-ins and sign-outs.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The account fields the API returns alongside a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub name: String,
    pub email: String,
    pub credits: i64,
    #[serde(default)]
    pub api_key: String,
}

/// An authenticated session: the bearer token plus who it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub account: AccountSummary,
}

/// Holds the current session (if any) and notifies subscribers on change.
pub struct SessionStore {
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replaces the current session. `None` signs out.
    pub fn set(&self, session: Option<Session>) {
        // send_replace never fails, even with no subscribers.
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Subscribe to session changes. The receiver sees the current value
    /// immediately and every replacement after that.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> Session {
        Session {
            token: "tok".to_string(),
            account: AccountSummary {
                name: name.to_string(),
                email: format!("{}@example.com", name),
                credits: 200,
                api_key: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn subscribers_observe_sign_in_and_sign_out() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_none());

        store.set(Some(session("ada")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().account.name, "ada");

        store.set(None);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn current_reflects_latest_set() {
        let store = SessionStore::new();
        assert!(store.current().is_none());
        store.set(Some(session("ada")));
        assert_eq!(store.current().unwrap().account.name, "ada");
    }
}
