//! CategoryQueue - category ごとの FIFO + 実行中スロット

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::domain::{Task, TaskId, TaskStatus};

/// The task a worker is currently executing.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub id: TaskId,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
}

struct QueueState {
    pending: VecDeque<Task>,
    current: Option<InFlight>,
}

/// CategoryQueue は pending の FIFO（上限なし）と実行中スロット
///
/// # 設計
/// - `pending` and `current` live behind one mutex, so a task is never seen
///   as "neither queued nor in flight" between dequeue and execution.
/// - The mutex is never held across an `.await`.
/// - `available` wakes the single worker; `settled` wakes `wait_idle` callers.
pub struct CategoryQueue {
    state: Mutex<QueueState>,
    available: Notify,
    settled: Notify,
}

impl CategoryQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                current: None,
            }),
            available: Notify::new(),
            settled: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // 中断された worker がいても queue 自体は壊れていないので使い続ける
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail. Never blocks.
    pub fn push(&self, task: Task) {
        self.lock().pending.push_back(task);
        self.available.notify_one();
    }

    /// Pending tasks (the in-flight one is not counted).
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn current(&self) -> Option<InFlight> {
        self.lock().current.clone()
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.current.is_none()
    }

    /// Take the head task, waiting at most `wait` for one to arrive.
    ///
    /// The returned task is already `Processing` and published as current.
    /// Cancel-safe: dropping the future never loses a task.
    pub async fn take(&self, wait: Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(task) = self.try_take() {
                return Some(task);
            }
            // notify_one は permit を保持するので、push との競合で通知を取りこぼさない
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    fn try_take(&self) -> Option<Task> {
        let mut state = self.lock();
        let mut task = state.pending.pop_front()?;
        task.start_attempt();
        state.current = Some(InFlight {
            id: task.id().clone(),
            status: task.status(),
            started_at: task.started_at().unwrap_or_else(Utc::now),
        });
        Some(task)
    }

    /// Put a failed task back at the tail and clear the in-flight slot.
    pub fn requeue(&self, task: Task) {
        {
            let mut state = self.lock();
            state.current = None;
            state.pending.push_back(task);
        }
        self.available.notify_one();
    }

    /// Clear the in-flight slot after the task was filed into history.
    pub fn release(&self) {
        let idle = {
            let mut state = self.lock();
            state.current = None;
            state.pending.is_empty()
        };
        if idle {
            self.settled.notify_waiters();
        }
    }

    /// Resolve once the queue is empty and nothing is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            // notify_waiters は permit を残さないので、判定の前に登録しておく
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CategoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn task(url: &str) -> Task {
        Task::new(Category::new("download"), serde_json::json!({ "url": url }))
    }

    #[tokio::test]
    async fn take_is_fifo() {
        let queue = CategoryQueue::new();
        queue.push(task("a"));
        queue.push(task("b"));

        let first = queue.take(Duration::from_millis(10)).await.unwrap();
        queue.release();
        let second = queue.take(Duration::from_millis(10)).await.unwrap();

        assert_eq!(first.payload()["url"], "a");
        assert_eq!(second.payload()["url"], "b");
    }

    #[tokio::test]
    async fn take_marks_processing_and_publishes_current() {
        let queue = CategoryQueue::new();
        let t = task("a");
        let id = t.id().clone();
        queue.push(t);

        let taken = queue.take(Duration::from_millis(10)).await.unwrap();
        assert_eq!(taken.status(), TaskStatus::Processing);

        let current = queue.current().unwrap();
        assert_eq!(current.id, id);
        assert_eq!(current.status, TaskStatus::Processing);
        assert_eq!(queue.len(), 0);
        assert!(!queue.is_idle());
    }

    #[tokio::test]
    async fn take_times_out_on_empty_queue() {
        let queue = CategoryQueue::new();
        let start = Instant::now();
        let taken = queue.take(Duration::from_millis(100)).await;
        assert!(taken.is_none());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn push_wakes_take() {
        let queue = Arc::new(CategoryQueue::new());

        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.take(Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.push(task("late"));

        let taken = waiter.await.unwrap().unwrap();
        assert_eq!(taken.payload()["url"], "late");
    }

    #[tokio::test]
    async fn requeue_goes_to_tail() {
        let queue = CategoryQueue::new();
        queue.push(task("a"));
        queue.push(task("b"));

        let mut a = queue.take(Duration::from_millis(10)).await.unwrap();
        a.record_failure("boom".to_string());
        a.back_to_pending();
        queue.requeue(a);
        assert!(queue.current().is_none());

        let next = queue.take(Duration::from_millis(10)).await.unwrap();
        assert_eq!(next.payload()["url"], "b");
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_release() {
        let queue = Arc::new(CategoryQueue::new());
        queue.push(task("a"));
        let _taken = queue.take(Duration::from_millis(10)).await.unwrap();

        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.wait_idle().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        queue.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_idle() {
        let queue = CategoryQueue::new();
        tokio::time::timeout(Duration::from_millis(100), queue.wait_idle())
            .await
            .unwrap();
    }
}
