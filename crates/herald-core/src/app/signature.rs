//! Signature Loader - JSON signature から TaskDescriptor を作る
//!
//! 入力の種類（ファイル / インライン文字列）は呼び出し側が [`SignatureSource`] で明示します。
//! 実行時に「ファイルっぽいか」を推測したり、失敗したら別の解釈に落ちたりはしません。
//! どの失敗も `HeraldError::InvalidSignature` になります。

use std::io::Read;
use std::path::PathBuf;

use crate::domain::descriptor::{RawSignature, json_kind};
use crate::domain::{HeraldError, SignatureError, TaskDescriptor};

/// Where the signature JSON comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSource {
    /// A file containing one JSON document.
    File(PathBuf),

    /// JSON text given directly by the caller.
    Inline(String),
}

/// Load and normalize a signature.
pub fn load_signature(source: &SignatureSource) -> Result<TaskDescriptor, HeraldError> {
    match source {
        SignatureSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| SignatureError::Read {
                path: path.clone(),
                source,
            })?;
            parse_signature_str(&text)
        }
        SignatureSource::Inline(text) => parse_signature_str(text),
    }
}

/// Read a whole stream (e.g. stdin) and parse it.
pub fn parse_signature_reader<R: Read>(mut reader: R) -> Result<TaskDescriptor, HeraldError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(SignatureError::Stream)?;
    parse_signature_str(&text)
}

/// Parse JSON text into a descriptor.
pub fn parse_signature_str(text: &str) -> Result<TaskDescriptor, HeraldError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(SignatureError::Json)?;
    if !value.is_object() {
        return Err(SignatureError::NotAnObject(json_kind(&value)).into());
    }
    // object であることは確認済みなので、ここで落ちるのはフィールドの型の問題
    let raw: RawSignature = serde_json::from_value(value).map_err(SignatureError::Shape)?;
    let descriptor = TaskDescriptor::try_from(raw).map_err(SignatureError::from)?;
    Ok(descriptor)
}
