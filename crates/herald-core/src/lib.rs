//! herald-core
//!
//! リモートのタスクキューにタスクを投入し、worker が着手したことを確認する。
//! 期限内に確認できなければ revoke する。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, descriptor, request, state, outcome, tracking, errors）
//! - **ports**: 抽象化レイヤー（TaskBroker, TrackingStore）
//! - **app**: アプリケーションロジック（signature loader, coordinator, settings）
//! - **impls**: 実装（InMemoryBroker, RedisBroker, FileTrackingStore）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{SignatureSource, SubmissionCoordinator, load_signature};
pub use domain::{HeraldError, SubmissionOutcome, SubmissionRequest, TaskDescriptor};
pub use ports::TaskBroker;
