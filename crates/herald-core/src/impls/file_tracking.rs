//! FileTrackingStore - TrackingRecord を JSON ファイル 1 つに保存する

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{HeraldError, TrackingRecord};
use crate::ports::TrackingStore;

/// One tracking record per file.
#[derive(Debug, Clone)]
pub struct FileTrackingStore {
    path: PathBuf,
}

impl FileTrackingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_error(&self, reason: impl ToString) -> HeraldError {
        HeraldError::TrackingWrite {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn read_error(&self, reason: impl ToString) -> HeraldError {
        HeraldError::TrackingRead {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl TrackingStore for FileTrackingStore {
    async fn save(&self, record: &TrackingRecord) -> Result<(), HeraldError> {
        let mut body = serde_json::to_vec_pretty(record).map_err(|e| self.write_error(e))?;
        body.push(b'\n');
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| self.write_error(e))
    }

    async fn load(&self) -> Result<TrackingRecord, HeraldError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.read_error(e))?;
        serde_json::from_slice(&body).map_err(|e| self.read_error(e))
    }
}
