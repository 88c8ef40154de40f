//! Errors - エラー型と分類
//!
//! submit の「結果」(`Rejected` / `TimedOut`) は [`SubmissionOutcome`](super::SubmissionOutcome)
//! で表現し、ここには submit に入る前・出た後の失敗だけを置きます。

use std::path::PathBuf;

use super::descriptor::DescriptorError;
use crate::ports::BrokerError;

/// Why a signature could not be turned into a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("cannot read signature from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read signature stream: {0}")]
    Stream(#[source] std::io::Error),

    #[error("not a valid json document: {0}")]
    Json(#[source] serde_json::Error),

    #[error("malformed signature: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("signature must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// HeraldError はドメインエラー
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("could not write tracking file {}: {reason}", path.display())]
    TrackingWrite { path: PathBuf, reason: String },

    #[error("could not read tracking file {}: {reason}", path.display())]
    TrackingRead { path: PathBuf, reason: String },

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl HeraldError {
    pub fn configuration(message: impl Into<String>) -> Self {
        HeraldError::Configuration(message.into())
    }
}
