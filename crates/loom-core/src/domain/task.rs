//! Task - category + payload + 実行状態

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Category, TaskId, TaskStatus};
use crate::error::QueueError;
use crate::typed::Payload;

/// Attempts allowed when a task does not say otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Task は category に投入される 1 単位の仕事
///
/// # 設計
/// - `id`, `category` and `payload` are fixed at construction.
/// - Execution state (status, retry count, timestamps, error) is only mutated
///   by the category worker; the transition methods are crate-private.
/// - `add_task` takes the task by value, so the producer cannot touch it after
///   submission.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: TaskId,
    category: Category,
    payload: serde_json::Value,
    status: TaskStatus,

    /// Informational only. Queues are plain FIFO and never look at it.
    priority: i32,

    /// Failed attempts so far.
    retry_count: u32,

    /// Attempts allowed before the task is marked failed.
    max_retries: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with a raw JSON payload and the
    /// [`DEFAULT_MAX_RETRIES`] budget. `QueueManager::submit` uses the
    /// configured default instead.
    pub fn new(category: Category, payload: serde_json::Value) -> Self {
        let created_at = Utc::now();
        Self {
            id: TaskId::generate(category, created_at),
            category,
            payload,
            status: TaskStatus::Pending,
            priority: 0,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error_message: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a pending task from a typed payload. The category comes from
    /// `P::CATEGORY`.
    pub fn from_payload<P: Payload>(payload: &P) -> Result<Self, QueueError> {
        let value = serde_json::to_value(payload).map_err(|source| QueueError::Encode {
            category: P::CATEGORY,
            source,
        })?;
        Ok(Self::new(P::CATEGORY, value))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the attempt budget. Zero is raised to one: every task runs at
    /// least once.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Pending -> Processing.
    pub(crate) fn start_attempt(&mut self) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Processing));
        self.status = TaskStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Processing -> Completed.
    pub(crate) fn mark_completed(&mut self) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Completed));
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Count a failed attempt. The caller then either requeues or fails the task.
    pub(crate) fn record_failure(&mut self, error: String) {
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.error_message = Some(error);
    }

    /// Are there attempts left after the failures recorded so far?
    pub fn has_attempts_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Processing -> Pending.
    pub(crate) fn back_to_pending(&mut self) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Pending));
        self.status = TaskStatus::Pending;
    }

    /// Processing -> Failed.
    pub(crate) fn mark_failed(&mut self) {
        debug_assert!(self.status.can_transition_to(TaskStatus::Failed));
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}
