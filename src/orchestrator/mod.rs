//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_coordinator` - 批处理协调器
//! - 管理一次运行的生命周期（初始化、运行、统计）
//! - 加载题集、准备输出目录
//! - 每个题集结算后立即落盘
//!
//! ### `dispatcher` - 并发调度器
//! - 每个题集一个任务，共享 Semaphore 限制在途请求数
//! - 任务 panic 只影响该题集
//!
//! ## 层次关系
//!
//! ```text
//! batch_coordinator (处理 Vec<WorkItem>)
//!     ↓
//! dispatcher (每个 WorkItem 一个任务)
//!     ↓
//! workflow::ItemFlow (单个题集的请求与重试)
//!     ↓
//! services (能力层：request_builder / remote_caller / result_writer)
//!     ↓
//! infrastructure (基础设施：HttpClient / atomic_file)
//! ```

pub mod batch_coordinator;
pub mod dispatcher;

pub use batch_coordinator::BatchCoordinator;
pub use dispatcher::{Dispatcher, SettlementStream};
