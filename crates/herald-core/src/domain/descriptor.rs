//! TaskDescriptor - 投入単位（task name + arguments）
//!
//! Celery の signature と同じ JSON 形をそのまま読み書きします:
//!
//! ```json
//! {"task": "tasks.create_feature", "kwargs": {"symbol": "AAPL"}}
//! ```
//!
//! `task_name` / `arguments` というキー名も受け付けます。
//! `args` / `options` / `subtask_type` など Celery 固有のキーは無視します。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::TaskName;

/// Arguments passed verbatim to the remote worker function.
pub type TaskArguments = BTreeMap<String, String>;

/// signature の中身が descriptor として成立しないときのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("missing task name (expected a \"task\" or \"task_name\" field)")]
    MissingTaskName,

    #[error("task name must not be empty")]
    EmptyTaskName,

    #[error("argument {key:?} must be a string, got {kind}")]
    NonStringArgument { key: String, kind: &'static str },
}

/// 正規化済みの投入単位
///
/// # 不変条件
/// - 構築後は変更されない（フィールドは private、setter なし）
/// - CLI の追加引数は [`TaskDescriptor::merged_arguments`] で別マップとして合成する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSignature")]
pub struct TaskDescriptor {
    #[serde(rename = "task")]
    task_name: TaskName,
    #[serde(rename = "kwargs")]
    arguments: TaskArguments,
}

impl TaskDescriptor {
    pub fn new(task_name: TaskName, arguments: TaskArguments) -> Self {
        Self {
            task_name,
            arguments,
        }
    }

    pub fn task_name(&self) -> &TaskName {
        &self.task_name
    }

    pub fn arguments(&self) -> &TaskArguments {
        &self.arguments
    }

    /// descriptor の引数に `extra` を上書き合成したマップを返す（descriptor 自体は不変）
    pub fn merged_arguments(&self, extra: &TaskArguments) -> TaskArguments {
        let mut merged = self.arguments.clone();
        merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// JSON から読んだままの signature
#[derive(Debug, Deserialize)]
pub(crate) struct RawSignature {
    #[serde(default, alias = "task_name")]
    task: Option<String>,
    #[serde(default, alias = "arguments")]
    kwargs: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TryFrom<RawSignature> for TaskDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawSignature) -> Result<Self, Self::Error> {
        let task = raw.task.ok_or(DescriptorError::MissingTaskName)?;
        let task_name = TaskName::new(task).map_err(|_| DescriptorError::EmptyTaskName)?;

        let mut arguments = TaskArguments::new();
        for (key, value) in raw.kwargs.unwrap_or_default() {
            match value {
                serde_json::Value::String(s) => {
                    arguments.insert(key, s);
                }
                other => {
                    return Err(DescriptorError::NonStringArgument {
                        key,
                        kind: json_kind(&other),
                    });
                }
            }
        }

        Ok(Self::new(task_name, arguments))
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
