//! QueueManager - 全 category のオーケストレーター
//!
//! - category ごとの Lane（handler + queue + history）を保持
//! - worker の起動/停止（start/stop）
//! - 投入・観測・完了待ち
//!
//! グローバルな singleton は持たない。composition root で構築し、
//! 必要なら `Arc<QueueManager>` で共有する。

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::builder::QueueManagerBuilder;
use super::lane::Lane;
use super::status::{CategoryStatus, CurrentTask, QueueStatus};
use super::worker_loop::WorkerLoop;
use crate::config::QueueConfig;
use crate::domain::{Category, Task, TaskId, TaskStatus};
use crate::error::QueueError;
use crate::queue::{Decider, DefaultDecider};
use crate::typed::{DynHandler, Handler, HandlerError, Payload, TypedHandler, handler_fn};

/// Worker group handle.
/// - `shutdown_tx` が `Some` の間は running
/// - `shutdown_tx` を drop するとワーカー全体が止まる
/// - `runtime` は start() 時の runtime。runtime 外のスレッドからの register でも
///   ここに spawn する
#[derive(Default)]
struct WorkerSet {
    shutdown_tx: Option<watch::Sender<bool>>,
    runtime: Option<Handle>,
    joins: HashMap<Category, JoinHandle<()>>,
}

/// QueueManager は category ごとの queue と worker をまとめて管理
///
/// # 使用例
/// ```ignore
/// let manager = Arc::new(QueueManager::new(QueueConfig::default()));
/// manager.register::<FileDownload, _>(DownloadHandler);
/// manager.start().await;
///
/// manager.submit(FileDownload { url: "a".into() })?;
/// manager.wait_completion(FileDownload::CATEGORY).await?;
///
/// manager.stop().await;
/// ```
///
/// Dropping the manager without `stop()` also stops the workers (they observe
/// the closed shutdown channel) but nothing waits for them.
pub struct QueueManager {
    config: QueueConfig,
    decider: Arc<dyn Decider>,
    lanes: RwLock<HashMap<Category, Arc<Lane>>>,
    workers: Mutex<WorkerSet>,
    /// Serializes start/stop so a restart never overlaps with workers that are
    /// still finishing their last attempt.
    lifecycle: tokio::sync::Mutex<()>,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_decider(config, Arc::new(DefaultDecider))
    }

    pub fn with_decider(config: QueueConfig, decider: Arc<dyn Decider>) -> Self {
        Self {
            config,
            decider,
            lanes: RwLock::new(HashMap::new()),
            workers: Mutex::new(WorkerSet::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn builder() -> QueueManagerBuilder {
        QueueManagerBuilder::new()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn workers(&self) -> MutexGuard<'_, WorkerSet> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lane(&self, category: Category) -> Option<Arc<Lane>> {
        self.lanes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .cloned()
    }

    /// Lanes sorted by category tag.
    fn sorted_lanes(&self) -> Vec<Arc<Lane>> {
        let mut lanes: Vec<Arc<Lane>> = self
            .lanes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        lanes.sort_by_key(|lane| lane.category());
        lanes
    }

    // ────────────────────────────────────────────────────────────────────────
    // Registration
    // ────────────────────────────────────────────────────────────────────────

    /// Register the handler for `P::CATEGORY`.
    pub fn register<P: Payload, H: Handler<P> + 'static>(&self, handler: H) {
        self.register_dyn(Arc::new(TypedHandler::<P, H>::new(handler)));
    }

    /// Register an async closure as the handler for `P::CATEGORY`.
    pub fn register_fn<P, F, Fut>(&self, f: F)
    where
        P: Payload,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
    {
        self.register::<P, _>(handler_fn(f));
    }

    /// Register an erased handler under its own category.
    ///
    /// - First registration creates the category queue and history.
    /// - Re-registration replaces the handler (with a warning); the worker uses
    ///   the new one from its next attempt.
    /// - When the manager is running, a category without a live worker gets
    ///   one now.
    pub fn register_dyn(&self, handler: Arc<dyn DynHandler>) {
        let category = handler.category();

        // lock order: workers -> lanes (start() も同じ順)
        let mut workers = self.workers();
        let lane = {
            let mut lanes = self.lanes.write().unwrap_or_else(PoisonError::into_inner);
            match lanes.get(&category) {
                Some(lane) => {
                    warn!(%category, "handler already registered, replacing");
                    lane.replace_handler(handler);
                    Arc::clone(lane)
                }
                None => {
                    let lane = Arc::new(Lane::new(handler, self.config.history_capacity));
                    lanes.insert(category, Arc::clone(&lane));
                    lane
                }
            }
        };
        info!(%category, "handler registered");

        // running 中なら新しい category の worker を起動（死んだ worker も再起動）
        self.spawn_worker(&mut workers, lane);
    }

    /// Registered categories, sorted by tag.
    pub fn categories(&self) -> Vec<Category> {
        self.sorted_lanes().iter().map(|lane| lane.category()).collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────────

    /// Spawn the lane's worker unless a live one exists. No-op when stopped.
    fn spawn_worker(&self, workers: &mut WorkerSet, lane: Arc<Lane>) {
        let (Some(shutdown_tx), Some(runtime)) =
            (workers.shutdown_tx.as_ref(), workers.runtime.as_ref())
        else {
            return;
        };
        let category = lane.category();
        if let Some(join) = workers.joins.get(&category) {
            if !join.is_finished() {
                return;
            }
            warn!(%category, "worker exited unexpectedly, respawning");
        }

        let worker = WorkerLoop::new(
            lane,
            Arc::clone(&self.decider),
            self.config.poll_interval,
            self.config.handler_timeout,
        );
        let join = runtime.spawn(worker.run(shutdown_tx.subscribe()));
        workers.joins.insert(category, join);
    }

    fn worker_alive(workers: &WorkerSet, category: Category) -> bool {
        workers.shutdown_tx.is_some()
            && workers
                .joins
                .get(&category)
                .is_some_and(|join| !join.is_finished())
    }

    /// Start one worker per registered category. When already running this
    /// only warns (and replaces workers that have exited).
    pub async fn start(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let mut workers = self.workers();
        if workers.shutdown_tx.is_some() {
            warn!("queue manager already running");
            for lane in self.sorted_lanes() {
                self.spawn_worker(&mut workers, lane);
            }
            return;
        }

        let (shutdown_tx, _) = watch::channel(false);
        workers.shutdown_tx = Some(shutdown_tx);
        workers.runtime = Some(Handle::current());
        for lane in self.sorted_lanes() {
            self.spawn_worker(&mut workers, lane);
        }
        info!(workers = workers.joins.len(), "queue manager started");
    }

    /// Signal every worker and wait for each to exit. In-flight attempts run
    /// to completion first. No-op (with a warning) when not running.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let (shutdown_tx, joins) = {
            let mut workers = self.workers();
            let Some(shutdown_tx) = workers.shutdown_tx.take() else {
                warn!("queue manager is not running");
                return;
            };
            workers.runtime = None;
            (shutdown_tx, std::mem::take(&mut workers.joins))
        };

        // ignore send error: receivers may already be dropped
        let _ = shutdown_tx.send(true);
        for (category, join) in joins {
            if let Err(e) = join.await {
                warn!(%category, error = %e, "worker exited abnormally");
            }
            debug!(%category, "worker joined");
        }
        info!("queue manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.workers().shutdown_tx.is_some()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Submission
    // ────────────────────────────────────────────────────────────────────────

    /// Queue a task on its category. Never waits for a worker.
    ///
    /// The task keeps its own `max_retries`: `Task::new` uses
    /// [`DEFAULT_MAX_RETRIES`](crate::domain::DEFAULT_MAX_RETRIES), and
    /// `QueueConfig::default_max_retries` only applies through [`submit`](Self::submit).
    ///
    /// # Errors
    /// - `UnknownCategory`: the category has no handler
    /// - `NotPending`: the task already ran (e.g. a clone taken from history)
    pub fn add_task(&self, task: Task) -> Result<TaskId, QueueError> {
        let category = task.category();
        if task.status() != TaskStatus::Pending {
            warn!(
                %category,
                task_id = %task.id(),
                status = ?task.status(),
                "rejected task that is not pending"
            );
            return Err(QueueError::NotPending {
                task_id: task.id().clone(),
                status: task.status(),
            });
        }
        let Some(lane) = self.lane(category) else {
            warn!(%category, task_id = %task.id(), "rejected task for unregistered category");
            return Err(QueueError::UnknownCategory(category));
        };

        let task_id = task.id().clone();
        lane.queue().push(task);
        info!(
            %category,
            %task_id,
            queue_size = lane.queue().len(),
            "task queued"
        );
        Ok(task_id)
    }

    /// Build a task from a typed payload (with the configured attempt budget)
    /// and queue it.
    pub fn submit<P: Payload>(&self, payload: P) -> Result<TaskId, QueueError> {
        let task = Task::from_payload(&payload)?.with_max_retries(self.config.default_max_retries);
        self.add_task(task)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Introspection
    // ────────────────────────────────────────────────────────────────────────

    fn lane_status(&self, lane: &Lane, workers: &WorkerSet) -> CategoryStatus {
        let category = lane.category();
        let now = Utc::now();
        CategoryStatus {
            category,
            is_running: Self::worker_alive(workers, category),
            queue_size: lane.queue().len(),
            current_task: lane
                .queue()
                .current()
                .map(|in_flight| CurrentTask::from_in_flight(in_flight, now)),
            completed_count: lane.completed_count(),
            failed_count: lane.failed_count(),
        }
    }

    /// Snapshot of one category, `None` when it is not registered.
    pub fn status(&self, category: Category) -> Option<CategoryStatus> {
        let lane = self.lane(category)?;
        let workers = self.workers();
        Some(self.lane_status(&lane, &workers))
    }

    /// Snapshot of every registered category plus the global running flag.
    pub fn overview(&self) -> QueueStatus {
        let lanes = self.sorted_lanes();
        let workers = self.workers();
        let categories: BTreeMap<Category, CategoryStatus> = lanes
            .iter()
            .map(|lane| (lane.category(), self.lane_status(lane, &workers)))
            .collect();
        QueueStatus {
            is_running: workers.shutdown_tx.is_some(),
            categories,
        }
    }

    /// The newest `limit` completed tasks of `category`, newest last.
    pub fn completed_tasks(&self, category: Category, limit: usize) -> Vec<Task> {
        self.lane(category)
            .map(|lane| lane.completed_recent(limit))
            .unwrap_or_default()
    }

    /// The newest `limit` failed tasks of `category`, newest last.
    pub fn failed_tasks(&self, category: Category, limit: usize) -> Vec<Task> {
        self.lane(category)
            .map(|lane| lane.failed_recent(limit))
            .unwrap_or_default()
    }

    /// Resolve once `category` has nothing queued and nothing in flight.
    ///
    /// Only the caller waits; workers keep running. If the manager is stopped
    /// while tasks are queued, this waits until it is started again.
    pub async fn wait_completion(&self, category: Category) -> Result<(), QueueError> {
        let lane = self
            .lane(category)
            .ok_or(QueueError::UnknownCategory(category))?;
        debug!(%category, "waiting for category to drain");
        lane.queue().wait_idle().await;
        debug!(%category, "category drained");
        Ok(())
    }

    /// `wait_completion` for every registered category, one after another.
    pub async fn wait_all(&self) {
        for lane in self.sorted_lanes() {
            lane.queue().wait_idle().await;
        }
        debug!("all categories drained");
    }

    /// Drop completed/failed history of `category`. Queue contents and running
    /// state are untouched.
    pub fn clear_history(&self, category: Category) -> Result<(), QueueError> {
        let lane = self
            .lane(category)
            .ok_or(QueueError::UnknownCategory(category))?;
        let (completed, failed) = lane.clear_history();
        info!(%category, completed, failed, "history cleared");
        Ok(())
    }

    /// `clear_history` for every registered category.
    pub fn clear_all_history(&self) {
        for lane in self.sorted_lanes() {
            let (completed, failed) = lane.clear_history();
            info!(category = %lane.category(), completed, failed, "history cleared");
        }
    }
}
