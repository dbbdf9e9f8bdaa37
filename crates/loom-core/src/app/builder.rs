//! QueueManagerBuilder - manager の構築とワイヤリング
//!
//! - Builder パターン
//! - 起動時検証（Fail-fast 設計）

use std::future::Future;
use std::sync::Arc;

use super::manager::QueueManager;
use crate::config::QueueConfig;
use crate::domain::Category;
use crate::queue::{Decider, DefaultDecider};
use crate::typed::{Handler, HandlerError, HandlerRegistry, Payload, handler_fn};

/// QueueManagerBuilder は config・retry 方針・handler をまとめて manager を構築
///
/// # 使用例
/// ```ignore
/// let manager = QueueManager::builder()
///     .config(QueueConfig::from_env()?)
///     .register::<FileDownload, _>(DownloadHandler)
///     .expect_categories(&[FileDownload::CATEGORY, MetadataUpdate::CATEGORY])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_categories() で期待される category を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct QueueManagerBuilder {
    config: QueueConfig,
    decider: Arc<dyn Decider>,
    registry: HandlerRegistry,
    expected: Option<Vec<Category>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing categories: {0:?}. These categories were expected but have no handler.")]
    MissingCategories(Vec<Category>),
}

impl QueueManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            decider: Arc::new(DefaultDecider),
            registry: HandlerRegistry::new(),
            expected: None,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the retry policy. The attempt budget still caps retries.
    pub fn decider(mut self, decider: impl Decider + 'static) -> Self {
        self.decider = Arc::new(decider);
        self
    }

    pub fn register<P: Payload, H: Handler<P> + 'static>(mut self, handler: H) -> Self {
        if self.registry.register::<P, H>(handler).is_some() {
            tracing::warn!(category = %P::CATEGORY, "handler already staged, replacing");
        }
        self
    }

    pub fn register_fn<P, F, Fut>(self, f: F) -> Self
    where
        P: Payload,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
    {
        self.register::<P, _>(handler_fn(f))
    }

    /// Categories that must have a handler when `build()` runs.
    pub fn expect_categories(mut self, categories: &[Category]) -> Self {
        self.expected = Some(categories.to_vec());
        self
    }

    /// Build a stopped manager.
    ///
    /// # 検証
    /// - expect_categories() の category が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingCategories を返す
    pub fn build(self) -> Result<QueueManager, BuildError> {
        if let Some(expected) = &self.expected {
            let registered = self.registry.categories();
            let mut missing: Vec<Category> = expected
                .iter()
                .filter(|c| !registered.contains(c))
                .copied()
                .collect();
            if !missing.is_empty() {
                missing.sort();
                missing.dedup();
                return Err(BuildError::MissingCategories(missing));
            }
        }

        let manager = QueueManager::with_decider(self.config, self.decider);
        for handler in self.registry.into_handlers() {
            manager.register_dyn(handler);
        }
        Ok(manager)
    }
}

impl Default for QueueManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::queue::Decision;
    use crate::typed::payload::fixtures::{Download, ResourceSync};
    use std::time::Duration;

    #[test]
    fn test_build_success() {
        let manager = QueueManager::builder()
            .register_fn::<Download, _, _>(|_| async { Ok(true) })
            .expect_categories(&[Download::CATEGORY])
            .build()
            .unwrap();
        assert_eq!(manager.categories(), vec![Download::CATEGORY]);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_build_missing_categories() {
        let result = QueueManager::builder()
            .register_fn::<Download, _, _>(|_| async { Ok(true) })
            .expect_categories(&[Download::CATEGORY, ResourceSync::CATEGORY])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingCategories(missing)) if missing == vec![ResourceSync::CATEGORY]
        ));
    }

    #[test]
    fn test_build_no_expect_categories() {
        let manager = QueueManager::builder().build().unwrap();
        assert!(manager.categories().is_empty());
    }

    #[test]
    fn test_config_is_applied() {
        let config = QueueConfig {
            poll_interval: Duration::from_millis(20),
            default_max_retries: 7,
            ..QueueConfig::default()
        };
        let manager = QueueManager::builder()
            .config(config)
            .register_fn::<Download, _, _>(|_| async { Ok(true) })
            .build()
            .unwrap();
        assert_eq!(manager.config().default_max_retries, 7);
        assert_eq!(manager.config().poll_interval, Duration::from_millis(20));
    }

    struct NeverRetry;

    impl Decider for NeverRetry {
        fn decide(&self, _task: &Task) -> Decision {
            Decision::MarkFailed
        }
    }

    #[tokio::test]
    async fn test_custom_decider_is_used() {
        let manager = QueueManager::builder()
            .config(QueueConfig {
                poll_interval: Duration::from_millis(50),
                ..QueueConfig::default()
            })
            .decider(NeverRetry)
            .register_fn::<Download, _, _>(|_| async { Ok(false) })
            .build()
            .unwrap();
        manager.start().await;

        manager.submit(Download::new("a")).unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            manager.wait_completion(Download::CATEGORY),
        )
        .await
        .unwrap()
        .unwrap();

        let failed = manager.failed_tasks(Download::CATEGORY, 10);
        assert_eq!(failed[0].retry_count(), 1);
        manager.stop().await;
    }
}
