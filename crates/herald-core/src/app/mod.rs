//! App - アプリケーション層
//!
//! ports を組み合わせて投入フローを実装します。
//!
//! # 主要コンポーネント
//! - **Signature Loader**: JSON signature → TaskDescriptor
//! - **SubmissionCoordinator**: enqueue → 着手確認 → (期限切れなら) revoke
//! - **Settings**: 環境変数からの broker 設定

pub mod coordinator;
pub mod settings;
pub mod signature;

pub use self::coordinator::{SubmissionCoordinator, SubmissionPhase};
pub use self::settings::Settings;
pub use self::signature::{
    SignatureSource, load_signature, parse_signature_reader, parse_signature_str,
};
