//! 流程层
//!
//! 一个题集从请求到终态的过程，以及它的重试状态机

pub mod item_ctx;
pub mod item_flow;
pub mod retry_policy;

pub use item_ctx::ItemCtx;
pub use item_flow::ItemFlow;
pub use retry_policy::{AttemptPhase, AttemptState, RetryPolicy, Step};
