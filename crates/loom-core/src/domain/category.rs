//! Category - 仕事の種類を表すタグ
//!
//! 登録された category はそれぞれ handler を 1 つ、FIFO queue を 1 つ持つ。
//! 2 つの category が実行を共有することはない。

use serde::Serialize;
use std::fmt;

/// Category は仕事の種類のタグ（例: `download`）
///
/// # 使用例
/// ```ignore
/// const DOWNLOAD: Category = Category::new("download");
/// assert_eq!(DOWNLOAD.as_str(), "download");
/// ```
///
/// The tag is `&'static str` so categories can be declared as constants on
/// payload types (see [`Payload::CATEGORY`](crate::typed::Payload::CATEGORY)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Category(&'static str);

impl Category {
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
