//! Scoped page sessions.
//!
//! Every page retrieval opens its own session and closes it when the guard
//! drops, on success and on every error path alike.

use marketfeed_core::port::FetchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared count of open sessions
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    open: Arc<AtomicUsize>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// An open page context; closed on drop
pub struct PageSession {
    client: reqwest::Client,
    tracker: SessionTracker,
    url: String,
}

impl PageSession {
    pub fn open(client: &reqwest::Client, tracker: &SessionTracker, url: &str) -> Self {
        tracker.open.fetch_add(1, Ordering::SeqCst);
        debug!(url = %url, "Page session opened");
        Self {
            client: client.clone(),
            tracker: tracker.clone(),
            url: url.to_string(),
        }
    }

    /// Retrieve the page body as text
    pub async fn fetch_html(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("reading {}: {}", self.url, e)))
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.tracker.open.fetch_sub(1, Ordering::SeqCst);
        debug!(url = %self.url, "Page session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_closed_after_failed_fetch() {
        let client = reqwest::Client::new();
        let tracker = SessionTracker::new();

        let result = {
            let session = PageSession::open(&client, &tracker, "not a url");
            assert_eq!(tracker.open_sessions(), 1);
            session.fetch_html().await
        };

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert_eq!(tracker.open_sessions(), 0);
    }
}
