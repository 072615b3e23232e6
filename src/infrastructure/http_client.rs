//! HTTP 客户端 - 基础设施层
//!
//! 只暴露"发一次 POST"的能力。不认识题集，不做重试，不做结果分类。
//! `HttpClient` trait 让调度逻辑可以在没有网络的情况下测试。

use crate::error::{AppError, TransportError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// 一次出站请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// 所属题集（仅用于日志和测试桩的脚本匹配）
    pub item_id: String,
    pub url: String,
    /// 为空时不发送 Authorization 头
    pub api_key: String,
    /// JSON 请求体
    pub body: String,
    pub timeout: Duration,
}

/// 响应状态码与完整响应体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// 执行 HTTP 请求的能力
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// 发送一次 JSON POST
    ///
    /// 只有传输层失败（超时、连接失败、读响应体失败）才返回 `Err`，
    /// 任何状态码都以 `Ok(HttpResponse)` 返回，由调用方分类。
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// 基于 reqwest 的生产实现
///
/// 内部的 `reqwest::Client` 自带连接池，整批共用一个实例。
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::HttpClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id))]
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(request.body.clone());

        if !request.api_key.is_empty() {
            req = req.bearer_auth(&request.api_key);
        }

        let response = req.send().await.map_err(classify_send_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        tracing::debug!(status, body_len = body.len(), "HTTP 请求完成");

        Ok(HttpResponse { status, body })
    }
}

fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
