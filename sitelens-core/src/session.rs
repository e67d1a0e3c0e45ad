//! Session manager: creates, queries and releases remote analysis sessions.
//!
//! The request pacing used by the pipeline lives in [`RequestPolicy`] so
//! tests can swap in [`RequestPolicy::immediate`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::service::{ChatRequest, MediaService};
use crate::types::{AnalysisSession, MediaAsset};

/// Upper bound for a single retry wait
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Pacing and retry settings for session requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Fixed delay between consecutive Q&A requests
    pub question_delay: Duration,
    /// Retries after the first attempt for retryable transport failures
    pub max_retries: usize,
    /// Wait before the first retry, doubled for each subsequent one
    pub retry_backoff: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            question_delay: Duration::from_millis(500),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl RequestPolicy {
    /// No delays and no retries
    pub fn immediate() -> Self {
        Self {
            question_delay: Duration::ZERO,
            max_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// Result of a best-effort session release.
///
/// Callers log the failure variant; it is never re-raised.
#[must_use = "release outcomes should be logged"]
#[derive(Debug)]
pub enum ReleaseOutcome {
    Released,
    Failed(Error),
}

impl ReleaseOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, ReleaseOutcome::Released)
    }

    /// Log the outcome at the appropriate level
    pub fn log(&self, session_id: &str) {
        match self {
            ReleaseOutcome::Released => {
                tracing::debug!(session_id = %session_id, "Session released");
            }
            ReleaseOutcome::Failed(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Session cleanup failed");
            }
        }
    }
}

/// Owns the remote session lifecycle for one asset at a time
pub struct SessionManager {
    service: Arc<dyn MediaService>,
    policy: RequestPolicy,
}

impl SessionManager {
    pub fn new(service: Arc<dyn MediaService>, policy: RequestPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    pub fn service(&self) -> &Arc<dyn MediaService> {
        &self.service
    }

    /// Upload the asset and open a session for it
    pub async fn create(&self, asset: &MediaAsset) -> Result<AnalysisSession> {
        let response = self.service.upload(asset).await.map_err(|e| match e {
            Error::Upload(_) => e,
            other => Error::Upload(other.to_string()),
        })?;

        let session_id = response
            .session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Upload("response did not include a session id".to_string()))?;

        tracing::info!(
            session_id = %session_id,
            file = %asset.display_name,
            "Session created"
        );

        Ok(AnalysisSession {
            session_id,
            created_at: Utc::now(),
        })
    }

    /// Ask a question against a session, returning the answer text.
    ///
    /// A response without choices yields an empty string. Retryable
    /// transport failures are retried per the policy.
    pub async fn ask(&self, session_id: &str, query: &str) -> Result<String> {
        if session_id.trim().is_empty() {
            return Err(Error::Session("no active session".to_string()));
        }

        let request = ChatRequest::new(session_id, query);
        let mut last_error = None;
        let mut delay = self.policy.retry_backoff;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying chat (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.policy.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_BACKOFF);
            }

            match self.service.chat(&request).await {
                Ok(response) => return Ok(response.content().to_string()),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(session_id = %session_id, "Transient error asking: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Session("max retries exceeded".to_string())))
    }

    /// Release a session without ever failing the caller
    pub async fn release(&self, session_id: &str) -> ReleaseOutcome {
        match self.service.cleanup(session_id).await {
            Ok(()) => ReleaseOutcome::Released,
            Err(e) => ReleaseOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ChatResponse, UploadResponse};
    use crate::types::{MimeCategory, QaPair};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyService {
        session_id: Option<String>,
        chat_failures: usize,
        chat_status: u16,
        chat_calls: AtomicUsize,
    }

    impl FlakyService {
        fn new(session_id: Option<&str>) -> Self {
            Self {
                session_id: session_id.map(str::to_string),
                chat_failures: 0,
                chat_status: 503,
                chat_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaService for FlakyService {
        async fn upload(&self, _asset: &MediaAsset) -> Result<UploadResponse> {
            Ok(UploadResponse {
                session_id: self.session_id.clone(),
            })
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            let n = self.chat_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.chat_failures {
                return Err(Error::Transport {
                    status: Some(self.chat_status),
                    message: "unavailable".to_string(),
                });
            }
            Ok(ChatResponse::with_content("answer"))
        }

        async fn generate_questions(&self, _: &str, _: MimeCategory) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn format_results(&self, _: &[QaPair]) -> Result<String> {
            Ok(String::new())
        }

        async fn cleanup(&self, _: &str) -> Result<()> {
            Err(Error::Transport {
                status: None,
                message: "offline".to_string(),
            })
        }
    }

    fn asset() -> MediaAsset {
        crate::upload::validate(crate::upload::CandidateFile::new(
            "site.jpg",
            "image/jpeg",
            vec![1, 2, 3],
        ))
        .unwrap()
    }

    fn policy(max_retries: usize) -> RequestPolicy {
        RequestPolicy {
            max_retries,
            ..RequestPolicy::immediate()
        }
    }

    #[tokio::test]
    async fn test_create_requires_session_id() {
        let manager = SessionManager::new(Arc::new(FlakyService::new(None)), policy(0));
        assert!(matches!(manager.create(&asset()).await, Err(Error::Upload(_))));

        let manager = SessionManager::new(Arc::new(FlakyService::new(Some("  "))), policy(0));
        assert!(matches!(manager.create(&asset()).await, Err(Error::Upload(_))));

        let manager = SessionManager::new(Arc::new(FlakyService::new(Some("s-9"))), policy(0));
        assert_eq!(manager.create(&asset()).await.unwrap().session_id, "s-9");
    }

    #[tokio::test]
    async fn test_ask_retries_transient_failures() {
        let service = Arc::new(FlakyService {
            chat_failures: 2,
            ..FlakyService::new(Some("s"))
        });
        let manager = SessionManager::new(service.clone(), policy(2));
        assert_eq!(manager.ask("s", "q").await.unwrap(), "answer");
        assert_eq!(service.chat_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ask_gives_up_after_bound() {
        let service = Arc::new(FlakyService {
            chat_failures: 5,
            ..FlakyService::new(Some("s"))
        });
        let manager = SessionManager::new(service.clone(), policy(1));
        assert!(manager.ask("s", "q").await.unwrap_err().is_retryable());
        assert_eq!(service.chat_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ask_does_not_retry_client_errors() {
        let service = Arc::new(FlakyService {
            chat_failures: 1,
            chat_status: 400,
            ..FlakyService::new(Some("s"))
        });
        let manager = SessionManager::new(service.clone(), policy(3));
        assert!(manager.ask("s", "q").await.is_err());
        assert_eq!(service.chat_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_session() {
        let manager = SessionManager::new(Arc::new(FlakyService::new(None)), policy(0));
        assert!(matches!(manager.ask("", "q").await, Err(Error::Session(_))));
    }

    #[tokio::test]
    async fn test_release_never_raises() {
        let manager = SessionManager::new(Arc::new(FlakyService::new(Some("s"))), policy(0));
        let outcome = manager.release("s").await;
        assert!(!outcome.is_released());
        outcome.log("s");
    }
}
