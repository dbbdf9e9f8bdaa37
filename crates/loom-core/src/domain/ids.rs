//! Task ID
//!
//! # ULID ベースの ID
//! 形式は `<category>-<ULID>`。ULID の上位ビットは作成時刻（ミリ秒）、
//! 残り 80 bit は乱数。
//! - category 内では作成順にソートできる
//! - 同じミリ秒に大量投入しても衝突しない

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::Category;

/// TaskId は Task の識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate an id for a task of `category` created at `created_at`.
    pub fn generate(category: Category, created_at: DateTime<Utc>) -> Self {
        let timestamp_ms = created_at.timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        Self(format!("{category}-{ulid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
