use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loom_core::{
    Category, Handler, HandlerError, Payload, QueueConfig, QueueManager, Task,
};

// ── payloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct SharePublish {
    media_id: String,
    channel: String,
}

impl Payload for SharePublish {
    const CATEGORY: Category = Category::new("share-publish");
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceSync {
    folder: String,
}

impl Payload for ResourceSync {
    const CATEGORY: Category = Category::new("sync");
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataUpdate {
    media_id: String,
    title: String,
}

impl Payload for MetadataUpdate {
    const CATEGORY: Category = Category::new("metadata-update");
}

#[derive(Debug, Serialize, Deserialize)]
struct FileDownload {
    url: String,
}

impl Payload for FileDownload {
    const CATEGORY: Category = Category::new("download");
}

// ── handlers ─────────────────────────────────────────────────────────────────

/// Fails its first `n` attempts, then succeeds.
struct FlakyPublisher {
    remaining_failures: AtomicU32,
}

impl FlakyPublisher {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<SharePublish> for FlakyPublisher {
    async fn handle(&self, p: SharePublish) -> Result<bool, HandlerError> {
        sleep(Duration::from_millis(150)).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::new(format!(
                "channel {} unavailable (left={left})",
                p.channel
            )));
        }

        println!("published {} to {}", p.media_id, p.channel);
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) manager を用意（設定は LOOM_* 環境変数で上書きできる）
    let manager = QueueManager::builder()
        .config(QueueConfig::from_env()?)
        .register::<SharePublish, _>(FlakyPublisher::new(2))
        .register_fn::<ResourceSync, _, _>(|p: ResourceSync| async move {
            sleep(Duration::from_millis(100)).await;
            println!("synced {}", p.folder);
            Ok(true)
        })
        .register_fn::<MetadataUpdate, _, _>(|p: MetadataUpdate| async move {
            if p.title.trim().is_empty() {
                return Err(HandlerError::new("empty title"));
            }
            println!("updated {} -> {}", p.media_id, p.title);
            Ok(true)
        })
        .register_fn::<FileDownload, _, _>(|p: FileDownload| async move {
            sleep(Duration::from_millis(200)).await;
            println!("downloaded {}", p.url);
            Ok(true)
        })
        .expect_categories(&[
            SharePublish::CATEGORY,
            ResourceSync::CATEGORY,
            MetadataUpdate::CATEGORY,
            FileDownload::CATEGORY,
        ])
        .build()?;

    // (B) worker を起動（category ごとに 1 本）
    manager.start().await;

    // (C) タスク投入
    for url in ["a.jpg", "b.jpg", "c.jpg"] {
        manager.submit(FileDownload { url: url.into() })?;
    }
    manager.submit(ResourceSync {
        folder: "albums/2024".into(),
    })?;
    manager.submit(MetadataUpdate {
        media_id: "m-1".into(),
        title: "Harbor at dusk".into(),
    })?;
    // 空タイトルは最後まで失敗する
    let invalid = Task::from_payload(&MetadataUpdate {
        media_id: "m-2".into(),
        title: " ".into(),
    })?
    .with_max_retries(2);
    manager.add_task(invalid)?;
    manager.submit(SharePublish {
        media_id: "m-1".into(),
        channel: "gallery".into(),
    })?;

    let overview = manager.overview();
    info!(queued = overview.total_queued(), "tasks submitted");
    println!(
        "status after submit:\n{}",
        serde_json::to_string_pretty(&overview)?
    );

    // (D) 全 category が空になるまで待つ（Ctrl-C で中断）
    tokio::select! {
        _ = manager.wait_all() => info!("all categories drained"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    // (E) 結果を確認
    println!(
        "status:\n{}",
        serde_json::to_string_pretty(&manager.overview())?
    );
    for category in manager.categories() {
        for task in manager.failed_tasks(category, 10) {
            println!(
                "failed: category={category} id={} retries={} error={:?}",
                task.id(),
                task.retry_count(),
                task.error_message()
            );
        }
    }

    manager.stop().await;
    Ok(())
}
