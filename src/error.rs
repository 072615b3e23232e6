//! 错误类型
//!
//! 分两层：
//! - `AppError`：批处理启动阶段的错误，会让整次运行失败
//! - `ItemError`：单个题集的错误，只影响该题集，最终写进它自己的结果文件

use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型（只用于批处理启动阶段）
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 输入目录不存在
    #[error("输入目录不存在: {}", path.display())]
    InputDirMissing { path: PathBuf },

    /// 输入目录无法读取
    #[error("无法读取输入目录 ({}): {source}", path.display())]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 输出目录无法创建
    #[error("无法创建输出目录 ({}): {source}", path.display())]
    OutputDirUnusable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP 客户端初始化失败
    #[error("HTTP 客户端初始化失败: {0}")]
    HttpClientBuild(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 缺少 API 凭证
    #[error("缺少 API 凭证，请设置环境变量 REVIEW_API_KEY 或 DEEPSEEK_API_KEY")]
    MissingCredential,

    /// 配置项取值非法
    #[error("配置项 {field} 取值非法: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 题集文件加载错误（加载阶段跳过该文件，不影响批处理）
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("读取文件失败: {0}")]
    Read(#[from] std::io::Error),

    #[error("JSON 解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("结构不完整: {0}")]
    Structure(String),
}

/// 网络传输层错误（一律可重试）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("请求超时")]
    Timeout,

    #[error("连接失败: {0}")]
    Connect(String),

    #[error("读取响应体失败: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

/// 单个题集的错误
///
/// 所有题集级错误都在题集边界被捕获并转换成错误结果，不会中断整批处理。
#[derive(Debug, Error)]
pub enum ItemError {
    /// 请求体构建失败（按致命错误处理）
    #[error("请求构建失败: {0}")]
    RequestBuild(String),

    /// 网络传输错误（可重试）
    #[error("网络传输错误: {0}")]
    TransientNetwork(#[from] TransportError),

    /// 服务端 5xx（可重试）
    #[error("服务端错误 HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// 客户端 4xx（致命，不重试）
    #[error("客户端错误 HTTP {status}: {body}")]
    Client { status: u16, body: String },

    /// 重试耗尽
    #[error("重试 {retries} 次后仍然失败: {last}")]
    ExhaustedRetries { retries: u32, last: Box<ItemError> },

    /// 远程调用成功但结果没能落盘
    #[error("结果写入失败 ({}): {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 题集任务异常终止
    #[error("任务异常终止: {0}")]
    Panicked(String),

    /// 批处理已取消，未再发起请求
    #[error("批处理已取消")]
    Cancelled,
}

impl ItemError {
    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ItemError::TransientNetwork(_) | ItemError::Server { .. })
    }

    /// 创建持久化错误
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ItemError::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// 启动阶段结果类型
pub type AppResult<T> = Result<T, AppError>;
