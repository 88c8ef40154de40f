//! Domain identifiers (strongly-typed string IDs).
//!
//! broker から受け取る task id、worker 関数を指す task name、投入先の queue name は
//! どれも「空でない文字列」ですが、混同すると事故になります。
//! Phantom type パターンで共通実装を一つにまとめつつ、型としては区別します。
//!
//! ## Phantom Type パターン
//! `Ident<T>` の `T` は実行時には使わない（PhantomData）マーカー型です。
//! - `TaskId` と `QueueName` を取り違えるとコンパイルエラーになる
//! - 検証（空文字禁止）と serde 実装は一箇所だけ

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// IdentKind は各 ID 型のマーカー trait
///
/// エラーメッセージで使うラベル（"task id", "queue name" など）を提供します。
pub trait IdentKind: Send + Sync + 'static {
    fn label() -> &'static str;
}

/// 空文字列を渡されたときのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label} must not be empty")]
pub struct EmptyIdent {
    pub label: &'static str,
}

/// ジェネリックな文字列 ID 型
///
/// 値は broker / 呼び出し側から来た文字列をそのまま保持します（正規化しない）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident<T: IdentKind> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdentKind> Ident<T> {
    /// 空でない文字列から作成
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdent> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EmptyIdent { label: T::label() });
        }
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdentKind> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdentKind> AsRef<str> for Ident<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl<T: IdentKind> Serialize for Ident<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: IdentKind> Deserialize<'de> for Ident<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(D::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// broker が払い出す task id のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {}

impl IdentKind for TaskKind {
    fn label() -> &'static str {
        "task id"
    }
}

/// worker 関数名のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskNameKind {}

impl IdentKind for TaskNameKind {
    fn label() -> &'static str {
        "task name"
    }
}

/// 投入先キューのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueKind {}

impl IdentKind for QueueKind {
    fn label() -> &'static str {
        "queue name"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Opaque identifier the broker assigned to an enqueued task.
pub type TaskId = Ident<TaskKind>;

/// Name of the remote worker function (e.g. `tasks.create_feature`).
pub type TaskName = Ident<TaskNameKind>;

/// Destination queue.
pub type QueueName = Ident<QueueKind>;
