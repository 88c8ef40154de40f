//! Domain model (IDs, descriptors, broker states, outcomes, records).
//!
//! - ids: TaskId / TaskName / QueueName（Phantom type で区別）
//! - descriptor: 投入単位（task name + arguments）
//! - request: 投入先と待機パラメータ
//! - state: broker 側のタスク状態（順序付き）
//! - outcome: submit の終端状態
//! - tracking: 確認済みタスクの追跡レコード
//! - errors: エラー型

pub mod descriptor;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod request;
pub mod state;
pub mod tracking;

pub use descriptor::{DescriptorError, TaskArguments, TaskDescriptor};
pub use errors::{HeraldError, SignatureError};
pub use ids::{EmptyIdent, Ident, IdentKind, QueueName, TaskId, TaskName};
pub use outcome::{RevokeStatus, SubmissionOutcome};
pub use request::{
    DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_REVOKE_TIMEOUT, MIN_POLL_INTERVAL,
    SubmissionRequest,
};
pub use state::BrokerTaskState;
pub use tracking::TrackingRecord;
