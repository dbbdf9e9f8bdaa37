//! State - Task の状態遷移

use serde::{Deserialize, Serialize};

/// TaskStatus は Task の状態
///
/// # 状態遷移
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Pending (handler failed, retries remain)
/// - Pending -> Processing -> Failed (retries exhausted)
///
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in its category queue.
    Pending,

    /// Held by the category worker.
    Processing,

    /// Handler reported success.
    Completed,

    /// Retries exhausted.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Is `self -> next` an allowed transition?
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Pending)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}
