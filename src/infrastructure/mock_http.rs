//! 测试用 HTTP 客户端桩
//!
//! 按题集预设响应，记录调用次数，并统计同一时刻的最大在途请求数。

use crate::error::TransportError;
use crate::infrastructure::http_client::{HttpClient, HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 预设的一次响应
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 返回指定状态码和响应体
    Status(u16, String),
    /// 传输层失败
    Transport(TransportError),
}

impl MockReply {
    /// 200，消息内容为给定 JSON 对象的聊天补全响应
    pub fn review(content: &JsonValue) -> Self {
        Self::message(&content.to_string())
    }

    /// 200，消息内容为任意文本的聊天补全响应
    pub fn message(content: &str) -> Self {
        MockReply::Status(200, chat_completion_body(content))
    }

    pub fn status(status: u16) -> Self {
        MockReply::Status(status, format!("mock status {}", status))
    }
}

/// 聊天补全响应体，`content` 放在第一个 choice 的 message 里
pub fn chat_completion_body(content: &str) -> String {
    json!({
        "id": "mock",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub item_id: String,
    pub url: String,
    pub api_key: String,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    fallback: Mutex<Option<MockReply>>,
    panic_items: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// 测试用 HTTP 客户端
///
/// 每个题集的预设响应按先进先出消费，用完后使用兜底响应；
/// 没有兜底响应时返回一个回显题集身份的结构化审校结果。
#[derive(Clone, Default)]
pub struct MockHttpClient {
    state: Arc<MockState>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用在返回前等待的时长
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.state.latency.lock() = latency;
        self
    }

    /// 为某个题集追加一次预设响应
    pub fn push_reply(&self, item_id: &str, reply: MockReply) {
        self.state
            .scripts
            .lock()
            .entry(item_id.to_string())
            .or_default()
            .push_back(reply);
    }

    /// 所有题集的兜底响应
    pub fn set_fallback(&self, reply: MockReply) {
        *self.state.fallback.lock() = Some(reply);
    }

    /// 调用到该题集时直接 panic
    pub fn panic_for(&self, item_id: &str) {
        self.state.panic_items.lock().insert(item_id.to_string());
    }

    pub fn calls_for(&self, item_id: &str) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.item_id == item_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.calls.lock().len()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    /// 运行期间同时在途请求数的最大值
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, item_id: &str) -> Option<MockReply> {
        let scripted = self
            .state
            .scripts
            .lock()
            .get_mut(item_id)
            .and_then(|queue| queue.pop_front());
        scripted.or_else(|| self.state.fallback.lock().clone())
    }
}

/// 离开作用域时减少在途计数，panic 时同样生效
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let current = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.state.in_flight);
        self.state.max_in_flight.fetch_max(current, Ordering::SeqCst);

        self.state.calls.lock().push(RecordedCall {
            item_id: request.item_id.clone(),
            url: request.url.clone(),
            api_key: request.api_key.clone(),
            body: request.body.clone(),
        });

        if self.state.panic_items.lock().contains(&request.item_id) {
            panic!("mock panic for {}", request.item_id);
        }

        let latency = *self.state.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.next_reply(&request.item_id) {
            Some(MockReply::Status(status, body)) => Ok(HttpResponse { status, body }),
            Some(MockReply::Transport(err)) => Err(err),
            None => {
                let echo = json!({
                    "source_filename": request.item_id,
                    "quality": {"score": 5, "issues": []},
                    "confidence": 0.9
                });
                Ok(HttpResponse {
                    status: 200,
                    body: chat_completion_body(&echo.to_string()),
                })
            }
        }
    }
}
