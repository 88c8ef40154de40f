//! TrackingRecord - 確認済みタスクの追跡情報
//!
//! submit が `Confirmed` を返した後に呼び出し側が作り、TrackingStore に一度だけ書きます。
//! 書いた後は変更しません。`task-status` がこれを読み戻して broker に状態を問い合わせます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{QueueName, TaskId};

/// Durable association between a confirmed task and its queue.
///
/// File shape: `{"tid": "...", "queue": "...", "confirmed_at": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    #[serde(rename = "tid")]
    pub task_id: TaskId,

    #[serde(rename = "queue")]
    pub queue_name: QueueName,

    pub confirmed_at: DateTime<Utc>,
}

impl TrackingRecord {
    pub fn new(task_id: TaskId, queue_name: QueueName) -> Self {
        Self::confirmed_at(task_id, queue_name, Utc::now())
    }

    pub fn confirmed_at(task_id: TaskId, queue_name: QueueName, at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            queue_name,
            confirmed_at: at,
        }
    }
}
