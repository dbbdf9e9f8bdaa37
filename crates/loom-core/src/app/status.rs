//! Status - 観測用スナップショット
//!
//! - すべて serialize 可能な値（JSON でそのまま返せる）
//! - 取得時に worker を止めるのは queue の lock の間だけ

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Category, TaskId, TaskStatus};
use crate::queue::InFlight;

/// The task a category worker is executing right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentTask {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`, one decimal.
    pub elapsed_seconds: f64,
}

impl CurrentTask {
    pub(crate) fn from_in_flight(in_flight: InFlight, now: DateTime<Utc>) -> Self {
        let elapsed_ms = (now - in_flight.started_at).num_milliseconds().max(0);
        Self {
            task_id: in_flight.id,
            status: in_flight.status,
            started_at: in_flight.started_at,
            elapsed_seconds: (elapsed_ms as f64 / 100.0).round() / 10.0,
        }
    }
}

/// CategoryStatus は 1 category のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatus {
    pub category: Category,
    /// The manager is running and this category's worker is spawned.
    pub is_running: bool,
    /// Pending tasks, not counting the one in flight.
    pub queue_size: usize,
    pub current_task: Option<CurrentTask>,
    /// Completed since the last history clear.
    pub completed_count: usize,
    /// Failed since the last history clear.
    pub failed_count: usize,
}

/// QueueStatus は登録済み全 category のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub is_running: bool,
    pub categories: BTreeMap<Category, CategoryStatus>,
}

impl QueueStatus {
    pub fn get(&self, category: Category) -> Option<&CategoryStatus> {
        self.categories.get(&category)
    }

    /// Pending tasks across all categories.
    pub fn total_queued(&self) -> usize {
        self.categories.values().map(|c| c.queue_size).sum()
    }
}
