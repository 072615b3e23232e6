//! 远程调用 - 业务能力层
//!
//! 只负责"发一次请求并给结果分类"，不重试，不关心流程。
//!
//! 分类规则：
//! - 2xx 且消息内容是 JSON 对象 → `Success(Structured)`
//! - 2xx 但内容为空或不是 JSON 对象 → `Success(Degraded)`，原文连同身份字段保存
//! - 5xx → `RetryableFailure`
//! - 4xx 及其他非 2xx → `FatalFailure`
//! - 传输层错误（超时、连接失败等）→ `RetryableFailure`

use crate::config::Config;
use crate::error::ItemError;
use crate::infrastructure::{HttpClient, HttpRequest, HttpResponse};
use crate::models::outcome::{CallOutcome, ReviewContent};
use crate::services::request_builder::OutboundPayload;
use crate::utils::logging::truncate_text;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

/// 错误信息里保留的响应体长度
const ERROR_BODY_PREVIEW: usize = 500;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 远程调用服务
///
/// 职责：
/// - 把出站请求交给 `HttpClient` 发送一次
/// - 把响应分类成 `CallOutcome`
/// - 不修改任何共享状态
pub struct RemoteCaller<C: HttpClient> {
    client: C,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl<C: HttpClient> RemoteCaller<C> {
    pub fn new(client: C, config: &Config) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
        }
    }

    /// 发送一次请求
    pub async fn call(&self, payload: &OutboundPayload) -> CallOutcome {
        let request = HttpRequest {
            item_id: payload.item_id.clone(),
            url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            body: payload.body.clone(),
            timeout: self.timeout,
        };

        debug!("[{}] 发送审校请求，请求体 {} 字节", payload.item_id, payload.body.len());

        match self.client.post_json(&request).await {
            Ok(response) => classify_response(payload, response),
            Err(e) => {
                warn!("[{}] 网络错误: {}", payload.item_id, e);
                CallOutcome::RetryableFailure(ItemError::TransientNetwork(e))
            }
        }
    }
}

/// 按状态码与响应体给一次响应分类
pub fn classify_response(payload: &OutboundPayload, response: HttpResponse) -> CallOutcome {
    let HttpResponse { status, body } = response;

    match status {
        200..=299 => CallOutcome::Success(parse_review(payload, &body)),
        500..=599 => {
            warn!("[{}] 服务端错误 HTTP {}", payload.item_id, status);
            CallOutcome::RetryableFailure(ItemError::Server {
                status,
                body: truncate_text(&body, ERROR_BODY_PREVIEW),
            })
        }
        _ => {
            warn!(
                "[{}] 请求被拒绝 HTTP {}: {}",
                payload.item_id,
                status,
                truncate_text(&body, 200)
            );
            CallOutcome::FatalFailure(ItemError::Client {
                status,
                body: truncate_text(&body, ERROR_BODY_PREVIEW),
            })
        }
    }
}

/// 从 2xx 响应体中提取审校内容
fn parse_review(payload: &OutboundPayload, body: &str) -> ReviewContent {
    let content = serde_json::from_str::<ChatCompletionResponse>(body)
        .ok()
        .and_then(|resp| resp.choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty());

    let Some(content) = content else {
        warn!("[{}] 响应中没有消息内容，保存原始响应体", payload.item_id);
        return degraded(payload, JsonValue::String(body.to_string()));
    };

    match serde_json::from_str::<JsonValue>(&content) {
        Ok(JsonValue::Object(mut review)) => {
            review
                .entry("disease")
                .or_insert_with(|| json!(payload.disease));
            review
                .entry("source_filename")
                .or_insert_with(|| json!(payload.source_filename));
            ReviewContent::Structured(JsonValue::Object(review))
        }
        Ok(other) => {
            warn!("[{}] 响应内容不是 JSON 对象，保存原始内容", payload.item_id);
            degraded(payload, other)
        }
        Err(_) => {
            warn!("[{}] 响应内容不是合法 JSON，保存原始文本", payload.item_id);
            degraded(payload, JsonValue::String(content))
        }
    }
}

fn degraded(payload: &OutboundPayload, raw: JsonValue) -> ReviewContent {
    ReviewContent::Degraded(json!({
        "disease": payload.disease,
        "source_filename": payload.source_filename,
        "raw_response": raw,
    }))
}
