//! Core domain types for sitelens
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Asset** | The uploaded video or image being analyzed |
//! | **Session** | Server-side context binding an asset to conversational state |
//! | **Stage** | One of the four ordered pipeline phases |
//! | **Run** | One pass of the pipeline over the current asset |
//! | **Clarification question** | Model-generated follow-up used to extract missing detail |
//! | **Placeholder answer** | Fixed substitute used when a single Q&A turn fails |
//! | **Quotation** | Structured material/cost result rendered by the exporter |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================
// Media
// ============================================

/// Broad media category of an accepted asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Video,
    Image,
}

impl MimeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeCategory::Video => "video",
            MimeCategory::Image => "image",
        }
    }

    /// Derive the category from a MIME type (`video/*` is video, anything else image)
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            MimeCategory::Video
        } else {
            MimeCategory::Image
        }
    }
}

impl fmt::Display for MimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle for the front end's preview of the current asset.
///
/// Regenerated on every accepted upload so stale previews can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewHandle(Uuid);

impl PreviewHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreviewHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview-{}", self.0)
    }
}

/// An accepted media asset.
///
/// Immutable once accepted; a new upload replaces it wholesale.
#[derive(Clone)]
pub struct MediaAsset {
    /// Raw file bytes
    pub payload: Arc<[u8]>,
    /// Normalized MIME type (e.g. `video/mp4`)
    pub mime_type: String,
    pub category: MimeCategory,
    pub size_bytes: u64,
    /// Original file name shown to the user
    pub display_name: String,
}

impl fmt::Debug for MediaAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAsset")
            .field("mime_type", &self.mime_type)
            .field("category", &self.category)
            .field("size_bytes", &self.size_bytes)
            .field("display_name", &self.display_name)
            .finish()
    }
}

// ============================================
// Session
// ============================================

/// Remote analysis session created by uploading an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSession {
    /// Opaque token issued by the ingestion endpoint
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Stages
// ============================================

/// The four ordered pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Summarize,
    Questions,
    Answers,
    Formatting,
}

impl StageId {
    pub const ALL: [StageId; 4] = [
        StageId::Summarize,
        StageId::Questions,
        StageId::Answers,
        StageId::Formatting,
    ];

    /// Position in the stage sequence
    pub fn index(&self) -> usize {
        match self {
            StageId::Summarize => 0,
            StageId::Questions => 1,
            StageId::Answers => 2,
            StageId::Formatting => 3,
        }
    }

    /// Stable identifier used by front ends
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Summarize => "upload",
            StageId::Questions => "questions",
            StageId::Answers => "analysis",
            StageId::Formatting => "formatting",
        }
    }

    /// Human-readable stage name
    pub fn display_name(&self) -> &'static str {
        match self {
            StageId::Summarize => "Media Upload & Summary",
            StageId::Questions => "Generating Analysis Questions",
            StageId::Answers => "Detailed Measurement Analysis",
            StageId::Formatting => "Formatting Final Results",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage: pending -> processing -> {completed | error}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Processing => "processing",
            StageStatus::Completed => "completed",
            StageStatus::Error => "error",
        }
    }

    /// Whether the stage state machine permits moving from `self` to `next`.
    ///
    /// `Processing -> Pending` is only used to roll back an interrupted stage
    /// on cancellation.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Processing, Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Error)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable record of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub id: StageId,
    pub name: &'static str,
    pub status: StageStatus,
    /// 0.0 - 100.0
    pub progress: f32,
}

impl StageRecord {
    pub fn pending(id: StageId) -> Self {
        Self {
            id,
            name: id.display_name(),
            status: StageStatus::Pending,
            progress: 0.0,
        }
    }
}

/// Run state owned by the orchestrator: idle -> running -> {done | failed | cancelled}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Done => "done",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only, observational processing log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// One clarification question and its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

// ============================================
// History
// ============================================

/// Summary of one successful run, appended to history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Row id, `None` until stored
    #[serde(skip)]
    pub id: Option<i64>,
    pub file_name: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

// ============================================
// Chat
// ============================================

/// Author of a chat transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of the interactive chat transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Quotation (export input)
// ============================================

/// One priced material line of a quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub total_price: f64,
    #[serde(default)]
    pub price_source: String,
    pub last_updated: DateTime<Utc>,
    /// Percent, 0-100
    #[serde(default)]
    pub confidence: f64,
}

/// Structured result rendered by the report exporter.
///
/// `total_cost` is expected to equal the sum of `materials[].total_price`;
/// the exporter renders it as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationResult {
    pub timestamp: DateTime<Utc>,
    pub video_summary: String,
    #[serde(default)]
    pub materials: Vec<Material>,
    pub total_cost: f64,
    #[serde(default)]
    pub clarification_queries: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        use StageStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Error.can_transition_to(Completed));
    }

    #[test]
    fn test_stage_ids_ordered() {
        for (i, id) in StageId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(StageId::Answers.as_str(), "analysis");
    }

    #[test]
    fn test_mime_category() {
        assert_eq!(MimeCategory::from_mime("video/mp4"), MimeCategory::Video);
        assert_eq!(MimeCategory::from_mime("image/png"), MimeCategory::Image);
    }

    #[test]
    fn test_quotation_parses_camel_case() {
        let json = r#"{
            "timestamp": "2025-03-01T10:00:00Z",
            "videoSummary": "Small bathroom",
            "materials": [{
                "name": "Cement",
                "quantity": 10,
                "unit": "bags",
                "unitPrice": 8.5,
                "totalPrice": 85.0,
                "lastUpdated": "2025-02-28T00:00:00Z"
            }],
            "totalCost": 85.0
        }"#;
        let q: QuotationResult = serde_json::from_str(json).unwrap();
        assert_eq!(q.materials.len(), 1);
        assert_eq!(q.materials[0].unit_price, 8.5);
        assert!(q.clarification_queries.is_empty());
    }
}
