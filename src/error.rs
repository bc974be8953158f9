use thiserror::Error;

use crate::sync::orchestrator::SyncStage;

/// Failure to turn a mailbox message into a record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unrecognized date '{raw}'")]
    DateParse { raw: String },
}

/// Unrecoverable failure that aborts a sync run.
///
/// The checkpoint is never written after one of these, so the next run
/// retries the same unread set.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("mailbox request failed while {stage}")]
    Mailbox {
        stage: SyncStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("spreadsheet request failed while {stage}")]
    Sheet {
        stage: SyncStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("checkpoint unavailable while {stage}")]
    Checkpoint {
        stage: SyncStage,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    /// Step the run was in when it aborted
    pub fn stage(&self) -> SyncStage {
        match self {
            SyncError::Mailbox { stage, .. }
            | SyncError::Sheet { stage, .. }
            | SyncError::Checkpoint { stage, .. } => *stage,
        }
    }
}
