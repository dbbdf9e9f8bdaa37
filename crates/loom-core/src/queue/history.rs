//! History - completed / failed のリングバッファ

use std::collections::VecDeque;

use crate::domain::Task;

/// History は 1 category・1 結果分の終了済み task の記録
///
/// - With a capacity, only the newest `capacity` tasks are kept (ring buffer).
/// - `total()` counts every task filed since the last `clear()`, including
///   ones the ring buffer already dropped.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Task>,
    capacity: Option<usize>,
    total: usize,
}

impl History {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.filter(|&c| c > 0),
            total: 0,
        }
    }

    pub fn push(&mut self, task: Task) {
        if let Some(capacity) = self.capacity
            && self.entries.len() >= capacity
        {
            self.entries.pop_front();
        }
        self.entries.push_back(task);
        self.total += 1;
    }

    /// The newest `limit` entries, oldest first (newest last).
    pub fn recent(&self, limit: usize) -> Vec<Task> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Drop entries and reset the total. Returns how many entries were held.
    pub fn clear(&mut self) -> usize {
        let held = self.entries.len();
        self.entries.clear();
        self.total = 0;
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use serde_json::json;

    fn task(n: u32) -> Task {
        Task::new(Category::new("download"), json!({ "n": n }))
    }

    fn numbers(tasks: &[Task]) -> Vec<u64> {
        tasks
            .iter()
            .map(|t| t.payload()["n"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn recent_returns_newest_last() {
        let mut history = History::new(None);
        for n in 1..=5 {
            history.push(task(n));
        }
        assert_eq!(numbers(&history.recent(3)), vec![3, 4, 5]);
        assert_eq!(numbers(&history.recent(10)), vec![1, 2, 3, 4, 5]);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn bounded_history_drops_oldest_but_keeps_total() {
        let mut history = History::new(Some(2));
        for n in 1..=4 {
            history.push(task(n));
        }
        assert_eq!(history.recent(usize::MAX).len(), 2);
        assert_eq!(history.total(), 4);
        assert_eq!(numbers(&history.recent(10)), vec![3, 4]);
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        let mut history = History::new(Some(0));
        for n in 1..=3 {
            history.push(task(n));
        }
        assert_eq!(history.recent(usize::MAX).len(), 3);
    }

    #[test]
    fn clear_resets_entries_and_total() {
        let mut history = History::new(None);
        history.push(task(1));
        history.push(task(2));
        assert_eq!(history.clear(), 2);
        assert!(history.recent(usize::MAX).is_empty());
        assert_eq!(history.total(), 0);
    }
}
