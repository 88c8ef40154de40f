//! TrackingStore port - TrackingRecord の永続化

use async_trait::async_trait;

use crate::domain::{HeraldError, TrackingRecord};

/// TrackingStore は確認済みタスクの記録を保存・読み戻す
///
/// 書き込み失敗は `HeraldError::TrackingWrite`、読み込み失敗は
/// `HeraldError::TrackingRead` で返します。
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn save(&self, record: &TrackingRecord) -> Result<(), HeraldError>;

    async fn load(&self) -> Result<TrackingRecord, HeraldError>;
}
