//! Retry - 失敗した attempt の後に task をどうするか

use crate::domain::Task;

/// Decision は失敗した task の次の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Put the task back at the tail of its queue.
    Requeue,

    /// Give up and file the task into failed history.
    MarkFailed,
}

/// Decider は失敗後に retry するか諦めるかを決める
///
/// Deciders are pure functions of the task: the worker has already recorded
/// the failure (`retry_count` incremented, `error_message` set) and applies
/// the returned decision itself. A decider can give up early, but it can never
/// extend a task past `max_retries`.
pub trait Decider: Send + Sync {
    fn decide(&self, task: &Task) -> Decision;
}

/// DefaultDecider は `retry_count < max_retries` の間 retry する
///
/// No delay is imposed between attempts: a requeued task simply rejoins the
/// tail of its queue. Backoff, if wanted, belongs in the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecider;

impl Decider for DefaultDecider {
    fn decide(&self, task: &Task) -> Decision {
        if task.has_attempts_left() {
            Decision::Requeue
        } else {
            Decision::MarkFailed
        }
    }
}
