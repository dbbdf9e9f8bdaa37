//! Typed - 型付き Task API
//!
//! Category の typo を型で排除し、Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Payload` trait, `Handler<P>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod handler;
pub mod payload;
pub mod registry;

pub use self::handler::{DynHandler, FnHandler, Handler, HandlerError, TypedHandler, handler_fn};
pub use self::payload::Payload;
pub use self::registry::HandlerRegistry;
