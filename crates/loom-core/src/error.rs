//! Error - crate レベルのエラー型
//!
//! Handler が返すエラーは `typed::HandlerError`、build 時の検証エラーは
//! `app::BuildError` を参照。

use thiserror::Error;

use crate::domain::{Category, TaskId, TaskStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no handler registered for category={0}")]
    UnknownCategory(Category),

    /// Only `Pending` tasks can be submitted. Tasks taken from history are
    /// terminal and stay there.
    #[error("task {task_id} is {status:?}; only pending tasks can be queued")]
    NotPending { task_id: TaskId, status: TaskStatus },

    #[error("payload encode failed for category={category}: {source}")]
    Encode {
        category: Category,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration {key}: {reason}")]
    Config { key: &'static str, reason: String },
}
