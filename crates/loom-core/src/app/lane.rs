//! Lane - 1 category 分の handler / queue / history

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::domain::{Category, Task};
use crate::queue::{CategoryQueue, History};
use crate::typed::DynHandler;

/// Lane は 1 category に結び付くものすべて
///
/// A lane is created on the first registration of its category and lives for
/// the manager's lifetime. Only its worker executes tasks and appends to
/// history; everyone else reads.
pub(crate) struct Lane {
    category: Category,
    handler: RwLock<Arc<dyn DynHandler>>,
    queue: CategoryQueue,
    completed: Mutex<History>,
    failed: Mutex<History>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Lane {
    pub(crate) fn new(handler: Arc<dyn DynHandler>, history_capacity: Option<usize>) -> Self {
        Self {
            category: handler.category(),
            handler: RwLock::new(handler),
            queue: CategoryQueue::new(),
            completed: Mutex::new(History::new(history_capacity)),
            failed: Mutex::new(History::new(history_capacity)),
        }
    }

    pub(crate) fn category(&self) -> Category {
        self.category
    }

    pub(crate) fn queue(&self) -> &CategoryQueue {
        &self.queue
    }

    /// Handler for the next attempt.
    pub(crate) fn handler(&self) -> Arc<dyn DynHandler> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace_handler(&self, handler: Arc<dyn DynHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// File a completed task, then free the in-flight slot.
    pub(crate) fn file_completed(&self, task: Task) {
        lock(&self.completed).push(task);
        self.queue.release();
    }

    /// File a failed task, then free the in-flight slot.
    pub(crate) fn file_failed(&self, task: Task) {
        lock(&self.failed).push(task);
        self.queue.release();
    }

    pub(crate) fn completed_recent(&self, limit: usize) -> Vec<Task> {
        lock(&self.completed).recent(limit)
    }

    pub(crate) fn failed_recent(&self, limit: usize) -> Vec<Task> {
        lock(&self.failed).recent(limit)
    }

    pub(crate) fn completed_count(&self) -> usize {
        lock(&self.completed).total()
    }

    pub(crate) fn failed_count(&self) -> usize {
        lock(&self.failed).total()
    }

    /// Returns (completed, failed) entries dropped.
    pub(crate) fn clear_history(&self) -> (usize, usize) {
        let completed = lock(&self.completed).clear();
        let failed = lock(&self.failed).clear();
        (completed, failed)
    }
}
