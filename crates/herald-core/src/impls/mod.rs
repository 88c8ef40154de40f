//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryBroker**: 開発・テスト用の broker（worker の挙動をスクリプトで指定）
//! - **RedisBroker**: Celery 互換の broker（本番用）
//! - **FileTrackingStore**: TrackingRecord の JSON ファイル保存

pub mod celery_protocol;
pub mod file_tracking;
pub mod inmem_broker;
pub mod redis_broker;

pub use self::file_tracking::FileTrackingStore;
pub use self::inmem_broker::{BrokerCall, EnqueuedTask, InMemoryBroker, StateScript};
pub use self::redis_broker::RedisBroker;
