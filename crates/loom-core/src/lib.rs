//! loom-core
//!
//! 複数 category の非同期 task queue。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（category, ids, state, task）
//! - **typed**: 型付き API（Payload trait, Handler trait, HandlerRegistry）
//! - **queue**: category ごとの FIFO, history, retry の判断
//! - **app**: QueueManager, builder, worker loop, status
//! - **config**: QueueConfig（環境変数からの読み込み）
//! - **error**: QueueError

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod queue;
pub mod typed;

pub use app::{BuildError, CategoryStatus, CurrentTask, QueueManager, QueueManagerBuilder, QueueStatus};
pub use config::QueueConfig;
pub use domain::{Category, DEFAULT_MAX_RETRIES, Task, TaskId, TaskStatus};
pub use error::QueueError;
pub use queue::{Decider, Decision, DefaultDecider};
pub use typed::{DynHandler, Handler, HandlerError, HandlerRegistry, Payload, handler_fn};
