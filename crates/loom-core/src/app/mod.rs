//! App - アプリケーション層
//!
//! domain / queue / typed を組み合わせて manager を実装します。
//!
//! # 主要コンポーネント
//! - **QueueManagerBuilder**: manager の構築とワイヤリング
//! - **QueueManager**: 登録・起動/停止・投入・観測の表面
//! - **WorkerLoop**: タスク実行ループ（take→handle→decide→file）
//! - **status**: 観測用スナップショット

pub mod builder;
pub mod manager;
pub mod status;
mod lane;
mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, QueueManagerBuilder};
pub use self::manager::QueueManager;
pub use self::status::{CategoryStatus, CurrentTask, QueueStatus};
