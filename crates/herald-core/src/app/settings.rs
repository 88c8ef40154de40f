//! Settings - 環境変数からの broker 設定
//!
//! `BROKER_URL` と `RESULT_BACKEND` は必須です。どちらかが無ければ、ネットワークに
//! 触る前に `HeraldError::Configuration` で止まります。

use crate::domain::HeraldError;

pub const BROKER_URL_VAR: &str = "BROKER_URL";
pub const RESULT_BACKEND_VAR: &str = "RESULT_BACKEND";

/// Broker wiring read once at process startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broker_url: String,
    pub result_backend: String,
}

impl Settings {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, HeraldError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`, so tests do not have to touch the real environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HeraldError> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| HeraldError::configuration(format!("{key} is not set")))
        };

        Ok(Self {
            broker_url: required(BROKER_URL_VAR)?,
            result_backend: required(RESULT_BACKEND_VAR)?,
        })
    }
}
