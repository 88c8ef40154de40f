//! Ports - 抽象化レイヤー
//!
//! 外部システム（broker, 追跡ファイル）へのインターフェースを trait で定義し、
//! 実装の詳細は `impls` に隠蔽します。

pub mod broker;
pub mod tracking_store;

pub use self::broker::{BrokerError, TaskBroker};
pub use self::tracking_store::TrackingStore;
