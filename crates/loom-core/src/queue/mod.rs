//! Queue - category ごとの FIFO, 終了済み history, retry の判断
//!
//! - **fifo**: pending の FIFO + 実行中スロット（crate 内部）
//! - **history**: completed / failed のリングバッファ（crate 内部）
//! - **retry**: `Decider` trait と既定の `DefaultDecider`

mod fifo;
mod history;
mod retry;

pub(crate) use fifo::{CategoryQueue, InFlight};
pub(crate) use history::History;
pub use retry::{Decider, Decision, DefaultDecider};
