//! Handler trait - payload を実行する Handler の定義
//!
//! - ジェネリック trait (Handler<P>)
//! - Object-safe trait (DynHandler)
//! - Type erasure (TypedHandler<P, H> → DynHandler)

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::payload::Payload;
use crate::domain::Category;

/// HandlerError は handler が返すエラー。どんなエラーも失敗した attempt として扱う
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source(format!("json: {e}"), e)
    }
}

/// Handler は payload を 1 つ実行
///
/// `Ok(true)` is success. `Ok(false)` is an expected business failure and is
/// retried like an error.
///
/// # 使用例
/// ```ignore
/// struct DownloadHandler;
///
/// #[async_trait]
/// impl Handler<FileDownload> for DownloadHandler {
///     async fn handle(&self, payload: FileDownload) -> Result<bool, HandlerError> {
///         fetch(&payload.url).await.map_err(|e| HandlerError::with_source("fetch", e))?;
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<P: Payload>: Send + Sync {
    async fn handle(&self, payload: P) -> Result<bool, HandlerError>;
}

/// DynHandler は object-safe な Handler
///
/// TypedHandler<P, H> を DynHandler に変換することで
/// `HashMap<Category, Arc<dyn DynHandler>>` に格納できる。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<bool, HandlerError>;
    fn category(&self) -> Category;
}

pub struct TypedHandler<P: Payload, H: Handler<P>> {
    handler: H,
    _marker: PhantomData<P>,
}

impl<P: Payload, H: Handler<P>> TypedHandler<P, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P: Payload, H: Handler<P>> DynHandler for TypedHandler<P, H> {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<bool, HandlerError> {
        let payload: P = serde_json::from_value(payload)
            .map_err(|e| HandlerError::with_source(format!("payload decode: {e}"), e))?;
        self.handler.handle(payload).await
    }

    fn category(&self) -> Category {
        P::CATEGORY
    }
}

/// Handler backed by an async closure. Built with [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`].
///
/// ```ignore
/// manager.register::<FileDownload, _>(handler_fn(|p: FileDownload| async move {
///     println!("downloading {}", p.url);
///     Ok(true)
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for FnHandler<F>
where
    P: Payload,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<bool, HandlerError> {
        (self.f)(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::payload::fixtures::Download;
    use serde_json::json;

    struct UrlIsA;

    #[async_trait]
    impl Handler<Download> for UrlIsA {
        async fn handle(&self, payload: Download) -> Result<bool, HandlerError> {
            Ok(payload.url == "a")
        }
    }

    #[tokio::test]
    async fn typed_handler_decodes_payload() {
        let handler = TypedHandler::<Download, _>::new(UrlIsA);
        assert!(handler.handle_dyn(json!({"url": "a"})).await.unwrap());
        assert!(!handler.handle_dyn(json!({"url": "b"})).await.unwrap());
        assert_eq!(handler.category(), Download::CATEGORY);
    }

    #[tokio::test]
    async fn decode_failure_is_handler_error() {
        let handler = TypedHandler::<Download, _>::new(UrlIsA);
        let err = handler.handle_dyn(json!({"link": 1})).await.unwrap_err();
        assert!(err.message().starts_with("payload decode"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn closure_handler_runs() {
        let handler = TypedHandler::<Download, _>::new(handler_fn(|p: Download| async move {
            if p.url.is_empty() {
                return Err(HandlerError::new("empty url"));
            }
            Ok(true)
        }));

        assert!(handler.handle_dyn(json!({"url": "x"})).await.unwrap());
        let err = handler.handle_dyn(json!({"url": ""})).await.unwrap_err();
        assert_eq!(err.to_string(), "empty url");
    }
}
