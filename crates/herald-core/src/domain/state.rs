//! Broker-side task state, as observed through the result backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task state reported by the broker.
///
/// 進行度の順序:
/// - `Pending` < `Started` < `Custom` < { `Success`, `Failure`, `Revoked` }
/// - `Unknown` は順序の外（確認済みとはみなさない）
///
/// `Custom` は worker が `update_state` で付けた独自の状態（`PROGRESS` など）。
/// worker が実行中でなければ付かないので、`Started` より先とみなします。
///
/// Confirmation only asks "has a worker picked this up?", so every state at or
/// past `Started` counts, terminal ones included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerTaskState {
    /// Queued, or unknown to the result backend yet.
    Pending,

    /// A worker has begun executing the task.
    Started,

    Success,

    Failure,

    Revoked,

    /// A worker-defined state such as `PROGRESS`.
    Custom,

    /// The backend returned an empty state.
    Unknown,
}

impl BrokerTaskState {
    /// Progress rank; `None` for `Unknown`.
    pub fn rank(self) -> Option<u8> {
        match self {
            BrokerTaskState::Pending => Some(0),
            BrokerTaskState::Started => Some(1),
            BrokerTaskState::Custom => Some(2),
            BrokerTaskState::Success | BrokerTaskState::Failure | BrokerTaskState::Revoked => {
                Some(3)
            }
            BrokerTaskState::Unknown => None,
        }
    }

    /// Is this state at least as advanced as `Started`?
    pub fn reached_started(self) -> bool {
        self.rank()
            .zip(BrokerTaskState::Started.rank())
            .is_some_and(|(own, started)| own >= started)
    }

    /// Celery の state 文字列から変換する
    ///
    /// Celery の優先順位では `RECEIVED` / `REJECTED` / `RETRY` は `STARTED` より下なので
    /// `Pending` 扱い（`RETRY` は再投入待ちで、まだ誰も実行していない）。
    /// 知らない名前は worker 独自の状態なので `Custom`。
    pub fn from_celery(state: &str) -> Self {
        match state.trim() {
            "" => BrokerTaskState::Unknown,
            "PENDING" | "RECEIVED" | "REJECTED" | "RETRY" => BrokerTaskState::Pending,
            "STARTED" => BrokerTaskState::Started,
            "SUCCESS" => BrokerTaskState::Success,
            "FAILURE" => BrokerTaskState::Failure,
            "REVOKED" => BrokerTaskState::Revoked,
            _ => BrokerTaskState::Custom,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BrokerTaskState::Pending => "PENDING",
            BrokerTaskState::Started => "STARTED",
            BrokerTaskState::Success => "SUCCESS",
            BrokerTaskState::Failure => "FAILURE",
            BrokerTaskState::Revoked => "REVOKED",
            BrokerTaskState::Custom => "CUSTOM",
            BrokerTaskState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for BrokerTaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
