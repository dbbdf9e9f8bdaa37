//! HandlerRegistry - Handler の登録と管理
//!
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::payload::Payload;
use crate::domain::Category;

/// HandlerRegistry は manager を build する前に handler を溜めておく
///
/// # 使用例
/// ```ignore
/// let mut registry = HandlerRegistry::new();
/// registry.register::<FileDownload, _>(DownloadHandler);
/// let handler = registry.get(FileDownload::CATEGORY);
/// ```
///
/// Registering a category twice keeps the last handler ("last wins"); the
/// caller gets the replaced one back so it can warn.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Category, Arc<dyn DynHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<P: Payload, H: Handler<P> + 'static>(
        &mut self,
        handler: H,
    ) -> Option<Arc<dyn DynHandler>> {
        self.insert(Arc::new(TypedHandler::<P, H>::new(handler)))
    }

    /// Insert an already erased handler under its own category.
    pub fn insert(&mut self, handler: Arc<dyn DynHandler>) -> Option<Arc<dyn DynHandler>> {
        self.handlers.insert(handler.category(), handler)
    }

    pub fn get(&self, category: Category) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&category).cloned()
    }

    /// Registered categories, sorted by tag.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.handlers.keys().copied().collect();
        categories.sort();
        categories
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn into_handlers(self) -> impl Iterator<Item = Arc<dyn DynHandler>> {
        self.handlers.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::HandlerError;
    use crate::typed::payload::fixtures::{Download, ResourceSync};
    use async_trait::async_trait;

    struct Always(bool);

    #[async_trait]
    impl Handler<Download> for Always {
        async fn handle(&self, _payload: Download) -> Result<bool, HandlerError> {
            Ok(self.0)
        }
    }

    struct SyncOk;

    #[async_trait]
    impl Handler<ResourceSync> for SyncOk {
        async fn handle(&self, _payload: ResourceSync) -> Result<bool, HandlerError> {
            Ok(true)
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.register::<Download, _>(Always(true)).is_none());

        let retrieved = registry.get(Download::CATEGORY);
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().category(), Download::CATEGORY);
    }

    #[tokio::test]
    async fn test_double_registration_keeps_last() {
        let mut registry = HandlerRegistry::new();
        registry.register::<Download, _>(Always(true));
        let replaced = registry.register::<Download, _>(Always(false));
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);

        let handler = registry.get(Download::CATEGORY).unwrap();
        let ok = handler
            .handle_dyn(serde_json::json!({"url": "a"}))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_categories_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register::<ResourceSync, _>(SyncOk);
        registry.register::<Download, _>(Always(true));
        assert_eq!(
            registry.categories(),
            vec![Download::CATEGORY, ResourceSync::CATEGORY]
        );
    }

    #[test]
    fn test_unregistered_category_is_absent() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(Category::new("missing")).is_none());
    }
}
