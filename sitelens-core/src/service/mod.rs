//! Analysis service integration
//!
//! The pipeline talks to four remote endpoints (media ingestion,
//! conversational query, question generation, result formatting) plus a
//! session cleanup route. [`MediaService`] is the seam between the core and
//! those endpoints; [`HttpMediaService`] is the production implementation.
//!
//! ## Usage
//!
//! Point the client at the service in `~/.config/sitelens/config.toml`:
//!
//! ```toml
//! [service]
//! base_url = "https://analyzer.example.com"
//! api_key = "sk_live_xxxxxxxxxxxx"
//! ```

mod client;
mod wire;

pub use client::HttpMediaService;
pub use wire::{ChatRequest, ChatResponse, UploadResponse};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MediaAsset, MimeCategory, QaPair};

/// Contract of the remote analysis endpoints.
///
/// Implementations report non-2xx responses and network faults as
/// [`crate::Error::Transport`]. Interpretation of the payloads (missing
/// session ids, empty answers) is left to the session manager and the
/// orchestrator.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Upload the asset as a single multipart media field
    async fn upload(&self, asset: &MediaAsset) -> Result<UploadResponse>;

    /// Ask a question against the media held by a session
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Generate clarification questions from a summary
    async fn generate_questions(
        &self,
        summary: &str,
        media_type: MimeCategory,
    ) -> Result<Vec<String>>;

    /// Synthesize a report from the ordered Q&A list
    async fn format_results(&self, qa_data: &[QaPair]) -> Result<String>;

    /// Release server-side session state
    async fn cleanup(&self, session_id: &str) -> Result<()>;
}
