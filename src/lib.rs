//! # MCQ Review
//!
//! 把一个目录下的选择题题集并发提交给远程审校接口，每个题集的结果写成一个 JSON 文件
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不含业务判断
//! - `HttpClient` - 发送一次 POST，返回状态码和响应体
//! - `atomic_file` - 临时文件 + rename 的原子写入
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 只处理单个题集
//! - `RequestBuilder` - 构建审校请求
//! - `RemoteCaller` - 调用一次并给结果分类
//! - `ResultWriter` - 分配文件名并写入结果
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个题集"的完整处理流程
//! - `RetryPolicy` / `AttemptState` - 重试状态机
//! - `ItemFlow` - 请求 → 分类 → 重试 / 结束
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 并发调度
//! - `orchestrator/batch_coordinator` - 加载、调度、落盘、统计
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ItemError};
pub use infrastructure::{HttpClient, MockHttpClient, MockReply, ReqwestHttpClient};
pub use models::{BatchSummary, WorkItem};
pub use orchestrator::{BatchCoordinator, Dispatcher};
pub use workflow::{ItemFlow, RetryPolicy};
