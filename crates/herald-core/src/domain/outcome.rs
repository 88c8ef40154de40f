//! Submission outcome: the terminal state of one submit call.
//!
//! `Rejected` と `TimedOut` はエラーではなく「結果」として返します。
//! どちらを retry するかは呼び出し側の判断です。

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// What happened to the best-effort revoke issued after a confirmation timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevokeStatus {
    /// The broker accepted the revoke request.
    Acknowledged,

    /// The broker answered, but nobody took the request.
    NotAcknowledged,

    /// The revoke call itself failed.
    Failed { reason: String },
}

/// Terminal state of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// A worker reached `STARTED` (or later) before the timeout.
    Confirmed { task_id: TaskId },

    /// No admission observed in time; a revoke was attempted exactly once.
    TimedOut { task_id: TaskId, revoke: RevokeStatus },

    /// Enqueue failed synchronously; nothing is left on the broker.
    Rejected { reason: String },
}

impl SubmissionOutcome {
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            SubmissionOutcome::Confirmed { task_id } | SubmissionOutcome::TimedOut { task_id, .. } => {
                Some(task_id)
            }
            SubmissionOutcome::Rejected { .. } => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }
}
