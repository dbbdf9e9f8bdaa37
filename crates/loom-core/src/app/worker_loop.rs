//! WorkerLoop - タスク実行ループ（1 category = 1 loop）
//!
//! # フロー
//! 1. CategoryQueue::take() で task を取得（Pending -> Processing）
//! 2. Handler 実行（別 task で実行し、panic / timeout を閉じ込める）
//! 3. 成功 -> completed history
//! 4. 失敗 -> Decider が Requeue / MarkFailed を決める

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::lane::Lane;
use crate::domain::Task;
use crate::queue::{Decider, Decision};
use crate::typed::DynHandler;

/// WorkerLoop は 1 category の task を順に実行
pub(crate) struct WorkerLoop {
    lane: Arc<Lane>,
    decider: Arc<dyn Decider>,
    poll_interval: Duration,
    handler_timeout: Option<Duration>,
}

impl WorkerLoop {
    pub(crate) fn new(
        lane: Arc<Lane>,
        decider: Arc<dyn Decider>,
        poll_interval: Duration,
        handler_timeout: Option<Duration>,
    ) -> Self {
        Self {
            lane,
            decider,
            poll_interval,
            handler_timeout,
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// Shutdown only stops taking new tasks; an attempt already started runs
    /// to completion first.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let category = self.lane.category();
        info!(%category, "worker started");

        loop {
            // shutdown が来ていたら抜ける
            if *shutdown.borrow() {
                break;
            }

            let task = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // manager が drop された
                        break;
                    }
                    continue;
                }
                task = self.lane.queue().take(self.poll_interval) => task,
            };

            let Some(task) = task else {
                continue;
            };

            self.execute(task).await;
        }

        info!(%category, "worker stopped");
    }

    async fn execute(&self, mut task: Task) {
        let category = self.lane.category();
        debug!(
            %category,
            task_id = %task.id(),
            attempt = task.retry_count() + 1,
            max_retries = task.max_retries(),
            queue_size = self.lane.queue().len(),
            "task started"
        );

        let result = invoke(
            self.lane.handler(),
            task.payload().clone(),
            self.handler_timeout,
        )
        .await;

        match result {
            Ok(()) => {
                task.mark_completed();
                let elapsed_ms = match (task.started_at(), task.completed_at()) {
                    (Some(start), Some(end)) => (end - start).num_milliseconds(),
                    _ => 0,
                };
                info!(%category, task_id = %task.id(), elapsed_ms, "task completed");
                self.lane.file_completed(task);
            }
            Err(reason) => {
                task.record_failure(reason);
                // Decider は max_retries を超えて延長できない
                let decision = match self.decider.decide(&task) {
                    Decision::Requeue if task.has_attempts_left() => Decision::Requeue,
                    _ => Decision::MarkFailed,
                };

                match decision {
                    Decision::Requeue => {
                        warn!(
                            %category,
                            task_id = %task.id(),
                            retry_count = task.retry_count(),
                            max_retries = task.max_retries(),
                            error = task.error_message().unwrap_or_default(),
                            "task failed, requeued"
                        );
                        task.back_to_pending();
                        self.lane.queue().requeue(task);
                    }
                    Decision::MarkFailed => {
                        task.mark_failed();
                        error!(
                            %category,
                            task_id = %task.id(),
                            retry_count = task.retry_count(),
                            error = task.error_message().unwrap_or_default(),
                            "task failed permanently"
                        );
                        self.lane.file_failed(task);
                    }
                }
            }
        }
    }
}

/// One handler attempt. Every way an attempt can go wrong comes back as
/// `Err(reason)`: `Ok(false)`, a handler error, a panic, or the deadline.
///
/// The handler runs on its own tokio task so a panic stays contained.
async fn invoke(
    handler: Arc<dyn DynHandler>,
    payload: serde_json::Value,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let mut join = tokio::spawn(async move { handler.handle_dyn(payload).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut join).await {
            Ok(joined) => joined,
            Err(_) => {
                join.abort();
                return Err(format!("handler timed out after {limit:?}"));
            }
        },
        None => join.await,
    };

    match joined {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err("handler reported failure".to_string()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err("handler panicked".to_string()),
        Err(e) => Err(format!("handler aborted: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::payload::fixtures::Download;
    use crate::typed::{HandlerError, TypedHandler, handler_fn};

    fn erased<F, Fut>(f: F) -> Arc<dyn DynHandler>
    where
        F: Fn(Download) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<bool, HandlerError>> + Send + 'static,
    {
        Arc::new(TypedHandler::<Download, _>::new(handler_fn(f)))
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({"url": "a"})
    }

    #[tokio::test]
    async fn invoke_success() {
        let handler = erased(|_| async { Ok(true) });
        assert!(invoke(handler, payload(), None).await.is_ok());
    }

    #[tokio::test]
    async fn invoke_false_is_failure() {
        let handler = erased(|_| async { Ok(false) });
        let err = invoke(handler, payload(), None).await.unwrap_err();
        assert_eq!(err, "handler reported failure");
    }

    #[tokio::test]
    async fn invoke_error_message_is_kept() {
        let handler = erased(|_| async { Err(HandlerError::new("quota exceeded")) });
        let err = invoke(handler, payload(), None).await.unwrap_err();
        assert_eq!(err, "quota exceeded");
    }

    #[tokio::test]
    async fn invoke_panic_is_failure() {
        let handler = erased(|p: Download| async move {
            if p.url == "a" {
                panic!("unexpected");
            }
            Ok(true)
        });
        let err = invoke(handler, payload(), None).await.unwrap_err();
        assert_eq!(err, "handler panicked");
    }

    #[tokio::test]
    async fn invoke_deadline_is_failure() {
        let handler = erased(|_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(true)
        });
        let err = invoke(handler, payload(), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(err.starts_with("handler timed out"));
    }
}
