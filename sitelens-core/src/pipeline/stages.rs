//! Stage board: the fixed, ordered sequence of four stage records.

use crate::error::{Error, Result};
use crate::types::{StageId, StageRecord, StageStatus};

/// The four stage records of one run.
///
/// Every status change goes through [`StageBoard::set`], which rejects
/// transitions the stage state machine does not allow.
#[derive(Debug, Clone, PartialEq)]
pub struct StageBoard {
    records: [StageRecord; 4],
}

impl Default for StageBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StageBoard {
    /// Four pending stages at 0%
    pub fn new() -> Self {
        Self {
            records: StageId::ALL.map(StageRecord::pending),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn get(&self, id: StageId) -> &StageRecord {
        &self.records[id.index()]
    }

    /// Move a stage to `status` at `progress` (clamped to 0-100).
    pub fn set(&mut self, id: StageId, status: StageStatus, progress: f32) -> Result<&StageRecord> {
        let record = &mut self.records[id.index()];
        if !record.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                stage: id,
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.progress = progress.clamp(0.0, 100.0);
        Ok(record)
    }

    /// The stage currently processing, if any
    pub fn active(&self) -> Option<StageId> {
        self.records
            .iter()
            .find(|r| r.status == StageStatus::Processing)
            .map(|r| r.id)
    }

    pub fn all_pending(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status == StageStatus::Pending && r.progress == 0.0)
    }

    pub fn all_completed(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status == StageStatus::Completed)
    }
}
