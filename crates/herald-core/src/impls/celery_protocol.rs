//! Celery message protocol (v2) over the Redis transport.
//!
//! Redis 上の kombu メッセージは「JSON の封筒 + base64 の body」です。
//! - タスク: queue 名の list に `LPUSH`
//! - 状態: result backend の `celery-task-meta-<id>` に JSON
//! - revoke: `celery.pidbox` fanout への `PUBLISH`（control コマンド）

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::{BrokerTaskState, QueueName, TaskArguments, TaskId, TaskName};
use crate::ports::BrokerError;

const PIDBOX_EXCHANGE: &str = "celery.pidbox";

/// Key under which the result backend stores a task's meta.
pub fn result_key(task_id: &TaskId) -> String {
    format!("celery-task-meta-{task_id}")
}

/// Fanout channel used by kombu for broadcast exchanges on database `db`.
pub fn pidbox_channel(db: i64) -> String {
    format!("/{db}.{PIDBOX_EXCHANGE}")
}

/// Build the list entry that a Celery worker consuming `queue` will execute.
pub fn task_message(
    task_id: &TaskId,
    task_name: &TaskName,
    arguments: &TaskArguments,
    queue: &QueueName,
    origin: &str,
) -> Result<String, BrokerError> {
    let kwargs = serde_json::to_value(arguments).map_err(encode_error)?;
    let kwargs_repr = kwargs.to_string();
    let body = json!([
        [],
        kwargs,
        {"callbacks": null, "errbacks": null, "chain": null, "chord": null}
    ]);

    let envelope = json!({
        "body": encode_body(&body)?,
        "content-encoding": "utf-8",
        "content-type": "application/json",
        "headers": {
            "lang": "py",
            "task": task_name.as_str(),
            "id": task_id.as_str(),
            "shadow": null,
            "eta": null,
            "expires": null,
            "group": null,
            "group_index": null,
            "retries": 0,
            "timelimit": [null, null],
            "root_id": task_id.as_str(),
            "parent_id": null,
            "argsrepr": "()",
            "kwargsrepr": kwargs_repr,
            "origin": origin,
            "ignore_result": false
        },
        "properties": {
            "correlation_id": task_id.as_str(),
            "reply_to": Uuid::new_v4().to_string(),
            "delivery_mode": 2,
            "delivery_info": {"exchange": "", "routing_key": queue.as_str()},
            "priority": 0,
            "body_encoding": "base64",
            "delivery_tag": Uuid::new_v4().to_string()
        }
    });
    serde_json::to_string(&envelope).map_err(encode_error)
}

/// Build the broadcast control message asking workers to revoke `task_id`.
pub fn revoke_message(task_id: &TaskId) -> Result<String, BrokerError> {
    let body = json!({
        "method": "revoke",
        "arguments": {"task_id": task_id.as_str(), "terminate": false, "signal": "SIGTERM"},
        "destination": null,
        "pattern": null,
        "matcher": null
    });

    let envelope = json!({
        "body": encode_body(&body)?,
        "content-encoding": "utf-8",
        "content-type": "application/json",
        "headers": {"clock": 1},
        "properties": {
            "delivery_mode": 2,
            "delivery_info": {"exchange": PIDBOX_EXCHANGE, "routing_key": ""},
            "priority": 0,
            "body_encoding": "base64",
            "delivery_tag": Uuid::new_v4().to_string()
        }
    });
    serde_json::to_string(&envelope).map_err(encode_error)
}

#[derive(Debug, Deserialize)]
struct ResultMeta {
    status: String,
}

/// Interpret the result backend entry for a task (`None` = no entry yet).
pub fn parse_result_meta(raw: Option<&str>) -> Result<BrokerTaskState, BrokerError> {
    let Some(raw) = raw else {
        return Ok(BrokerTaskState::Pending);
    };
    let meta: ResultMeta = serde_json::from_str(raw)
        .map_err(|e| BrokerError::Protocol(format!("unreadable task meta: {e}")))?;
    Ok(BrokerTaskState::from_celery(&meta.status))
}

fn encode_body(body: &Value) -> Result<String, BrokerError> {
    let bytes = serde_json::to_vec(body).map_err(encode_error)?;
    Ok(STANDARD.encode(bytes))
}

fn encode_error(e: serde_json::Error) -> BrokerError {
    BrokerError::InvalidTask(format!("cannot encode message: {e}"))
}
