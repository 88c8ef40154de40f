//! TaskBroker port - 外部のタスクキュー（broker + result backend）
//!
//! coordinator が必要とする操作は 3 つだけです:
//! - enqueue: 投入して task id を受け取る（worker の実行は待たない）
//! - get_state: result backend から状態を読む
//! - revoke: best-effort のキャンセル
//!
//! # 実装
//! - **InMemoryBroker**: テスト・ローカル実行用
//! - **RedisBroker**: Celery プロトコル互換（本番用）

use async_trait::async_trait;

use crate::domain::{BrokerTaskState, QueueName, TaskArguments, TaskId, TaskName};

/// BrokerError は broker 呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Network or connection failure; the broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker refused the task itself.
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// The broker answered with something we could not interpret.
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

/// TaskBroker は外部のタスクキューへのインターフェース
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数の submit から同時に使われる）
/// - 実装側が接続の共有・プールを引き受ける
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Publish a task and return the id the broker assigned to it.
    async fn enqueue(
        &self,
        task_name: &TaskName,
        arguments: &TaskArguments,
        queue: &QueueName,
    ) -> Result<TaskId, BrokerError>;

    /// Current state of `task_id` as seen by the result backend.
    async fn get_state(&self, task_id: &TaskId) -> Result<BrokerTaskState, BrokerError>;

    /// Best-effort cancel. `Ok(false)` means the broker answered but nobody took it.
    async fn revoke(&self, task_id: &TaskId) -> Result<bool, BrokerError>;
}
