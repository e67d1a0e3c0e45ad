//! Interactive chat driver
//!
//! Free-form, turn-based dialogue against a session. Independent of the
//! orchestrator: it either opens its own session for an asset or attaches to
//! an existing one. Turns are strictly serialized; a turn, open or clear
//! started while another is outstanding is refused with
//! [`Error::TurnInProgress`]. Dropping an outstanding call frees the driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::pipeline::BusyGuard;
use crate::session::SessionManager;
use crate::types::{AnalysisSession, ChatEntry, ChatRole, MediaAsset};
use crate::upload::{self, CandidateFile};

/// Assistant reply recorded when a turn fails
pub const APOLOGY: &str = "Sorry, I couldn't process that request. Please try again.";

#[derive(Default)]
struct ChatState {
    asset: Option<MediaAsset>,
    session: Option<AnalysisSession>,
    transcript: Vec<ChatEntry>,
    input: String,
}

pub struct ChatDriver {
    sessions: Arc<SessionManager>,
    state: Mutex<ChatState>,
    in_flight: AtomicBool,
}

impl ChatDriver {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            state: Mutex::new(ChatState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        BusyGuard::acquire(&self.in_flight).ok_or(Error::TurnInProgress)
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and upload a file, replacing any previous session
    pub async fn open(&self, candidate: CandidateFile) -> Result<AnalysisSession> {
        let _busy = self.acquire()?;
        let asset = upload::validate(candidate)?;

        let previous = self.lock().session.take();
        if let Some(previous) = previous {
            self.sessions
                .release(&previous.session_id)
                .await
                .log(&previous.session_id);
        }

        let session = self.sessions.create(&asset).await?;

        let mut state = self.lock();
        state.asset = Some(asset);
        state.session = Some(session.clone());
        state.transcript.clear();
        state.input.clear();
        Ok(session)
    }

    /// Continue on a session created elsewhere
    pub fn attach(&self, asset: Option<MediaAsset>, session: AnalysisSession) {
        let mut state = self.lock();
        state.asset = asset;
        state.session = Some(session);
        state.transcript.clear();
        state.input.clear();
    }

    pub fn session(&self) -> Option<AnalysisSession> {
        self.lock().session.clone()
    }

    pub fn asset(&self) -> Option<MediaAsset> {
        self.lock().asset.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn transcript(&self) -> Vec<ChatEntry> {
        self.lock().transcript.clone()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send the pending input as one turn, returning the assistant entry.
    ///
    /// A failed request is recorded as [`APOLOGY`], not returned as an error.
    pub async fn send(&self) -> Result<ChatEntry> {
        let _busy = self.acquire()?;
        self.turn().await
    }

    /// Set the input and send it
    pub async fn send_message(&self, text: impl Into<String>) -> Result<ChatEntry> {
        self.set_input(text);
        self.send().await
    }

    async fn turn(&self) -> Result<ChatEntry> {
        let (session_id, query) = {
            let mut state = self.lock();
            let query = state.input.trim().to_string();
            if query.is_empty() {
                return Err(Error::Validation("Message must not be empty".to_string()));
            }
            let session_id = state
                .session
                .as_ref()
                .map(|s| s.session_id.clone())
                .ok_or_else(|| Error::Session("upload a file before chatting".to_string()))?;

            state.input.clear();
            state.transcript.push(ChatEntry {
                role: ChatRole::User,
                content: query.clone(),
                timestamp: Utc::now(),
            });
            (session_id, query)
        };

        let content = match self.sessions.ask(&session_id, &query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Chat turn failed");
                APOLOGY.to_string()
            }
        };

        let reply = ChatEntry {
            role: ChatRole::Assistant,
            content,
            timestamp: Utc::now(),
        };
        self.lock().transcript.push(reply.clone());
        Ok(reply)
    }

    /// Release the session and discard asset, transcript and input
    pub async fn clear(&self) -> Result<()> {
        let _busy = self.acquire()?;

        let previous = std::mem::take(&mut *self.lock());
        if let Some(session) = previous.session {
            self.sessions
                .release(&session.session_id)
                .await
                .log(&session.session_id);
        }
        Ok(())
    }
}
