//! # sitelens-core
//!
//! Core library for sitelens - multi-stage construction site media analysis.
//!
//! This library provides:
//! - An upload gate validating video and image assets
//! - A session manager for the remote analysis service
//! - A four-stage pipeline orchestrator (summarize, questions, Q&A, formatting)
//! - An interactive chat driver over an existing session
//! - A quotation exporter with a Word document renderer and a plain-text fallback
//! - SQLite history storage, configuration and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitelens_core::{CandidateFile, Config, HttpMediaService, Orchestrator, SessionManager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> sitelens_core::Result<()> {
//! let config = Config::load()?;
//! let service = Arc::new(HttpMediaService::new(&config.service)?);
//! let sessions = Arc::new(SessionManager::new(service, config.pipeline.request_policy()));
//! let orchestrator = Orchestrator::new(sessions);
//!
//! orchestrator
//!     .accept(CandidateFile::from_path("site.mp4".as_ref())?)
//!     .await?;
//! let outcome = orchestrator.run(&CancellationToken::new()).await?;
//! println!("{}", outcome.report);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use chat::ChatDriver;
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use export::{ExportedFile, ReportExporter};
pub use pipeline::{AnalysisOutcome, Orchestrator, PipelineEvent, PipelineSnapshot};
pub use service::{HttpMediaService, MediaService};
pub use session::{ReleaseOutcome, RequestPolicy, SessionManager};
pub use types::*;
pub use upload::CandidateFile;

// Public modules
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod types;
pub mod upload;
