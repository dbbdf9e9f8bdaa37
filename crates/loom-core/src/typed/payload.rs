//! Payload trait - 型付き payload の定義
//!
//! payload の型が静的に category を持つので、handler は
//! その category の queue にしか結び付かない。

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::Category;

/// Payload はデータ型と category を結び付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct FileDownload {
///     url: String,
/// }
///
/// impl Payload for FileDownload {
///     const CATEGORY: Category = Category::new("download");
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize`: tasks store the payload as JSON
/// - `DeserializeOwned`: each attempt decodes a fresh value
/// - `Send + Sync + 'static`: handlers run on spawned tokio tasks
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CATEGORY: Category;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Download {
        pub url: String,
    }

    impl Download {
        pub fn new(url: impl Into<String>) -> Self {
            Self { url: url.into() }
        }
    }

    impl Payload for Download {
        const CATEGORY: Category = Category::new("download");
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ResourceSync {
        pub name: String,
    }

    impl ResourceSync {
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    impl Payload for ResourceSync {
        const CATEGORY: Category = Category::new("sync");
    }
}
