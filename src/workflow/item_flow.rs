//! 题集处理流程 - 流程层
//!
//! 定义"一个题集"从构建请求到终态的完整过程：
//!
//! 1. 构建出站请求（失败即致命）
//! 2. 取得一个并发槽位后发起远程调用，调用结束立即归还槽位
//! 3. 交给 `AttemptState` 决定重试还是结束
//! 4. 退避等待期间不占用槽位
//!
//! 取消信号只阻止新的调用；已经发出的调用会等它结束。

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infrastructure::HttpClient;
use crate::models::outcome::{Settlement, Terminal};
use crate::models::WorkItem;
use crate::services::{RemoteCaller, RequestBuilder};
use crate::workflow::item_ctx::ItemCtx;
use crate::workflow::retry_policy::{AttemptState, RetryPolicy, Step};

/// 单个题集的处理流程
///
/// 持有的都是只读或可共享的资源，可以被多个任务同时使用。
pub struct ItemFlow<C: HttpClient> {
    caller: Arc<RemoteCaller<C>>,
    builder: RequestBuilder,
    policy: RetryPolicy,
    slots: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl<C: HttpClient> ItemFlow<C> {
    pub fn new(
        caller: Arc<RemoteCaller<C>>,
        builder: RequestBuilder,
        policy: RetryPolicy,
        slots: Arc<Semaphore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            caller,
            builder,
            policy,
            slots,
            cancel,
        }
    }

    /// 把一个题集推进到终态
    pub async fn run(&self, item: &WorkItem, ctx: &ItemCtx) -> Settlement {
        let settle = |terminal: Terminal, calls: u32| Settlement {
            item_id: item.id.clone(),
            disease: item.disease.clone(),
            source_filename: item.source_filename.clone(),
            terminal,
            calls,
        };

        let payload = match self.builder.build(item) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{} ❌ 请求构建失败: {}", ctx, e);
                return settle(Terminal::FailedFatal(e), 0);
            }
        };

        let mut state = AttemptState::new(&item.id);

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("{} ⏹️ 批处理已取消，不再发起请求", ctx);
                    return settle(Terminal::Cancelled, state.calls);
                }
                permit = self.slots.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return settle(Terminal::Cancelled, state.calls),
                },
            };

            state.begin_attempt();
            let outcome = self.caller.call(&payload).await;
            drop(permit);

            match state.on_outcome(outcome, &self.policy) {
                Step::Settle(terminal) => return settle(terminal, state.calls),
                Step::Retry { delay, cause } => {
                    warn!(
                        "{} 🔄 第 {}/{} 次重试，{:.2}s 后重新提交: {}",
                        ctx,
                        state.attempts_made,
                        self.policy.max_retries,
                        delay.as_secs_f64(),
                        cause
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            info!("{} ⏹️ 退避期间收到取消信号", ctx);
                            return settle(Terminal::Cancelled, state.calls);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ItemError;
    use crate::infrastructure::{MockHttpClient, MockReply};
    use crate::error::TransportError;
    use serde_json::json;
    use std::time::Duration;

    fn item(id: &str) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            disease: "Asthma".to_string(),
            source_filename: id.to_string(),
            mcqs: vec![json!({"question": "Q1"})],
        }
    }

    fn flow(client: MockHttpClient, max_retries: u32, cancel: CancellationToken) -> ItemFlow<MockHttpClient> {
        let config = Config {
            api_key: "sk-test".to_string(),
            ..Config::default()
        };
        let policy = RetryPolicy {
            max_retries,
            backoff_factor: 0.0,
            jitter_floor: Duration::ZERO,
        };
        ItemFlow::new(
            Arc::new(RemoteCaller::new(client, &config)),
            RequestBuilder::new(&config.model),
            policy,
            Arc::new(Semaphore::new(1)),
            cancel,
        )
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let client = MockHttpClient::new();
        client.push_reply("a.json", MockReply::status(503));
        client.push_reply("a.json", MockReply::Transport(TransportError::Timeout));
        client.push_reply("a.json", MockReply::review(&json!({"quality": "good"})));

        let flow = flow(client.clone(), 4, CancellationToken::new());
        let settlement = flow.run(&item("a.json"), &ItemCtx::new("a.json", 1, 1)).await;

        assert!(matches!(settlement.terminal, Terminal::Succeeded(_)));
        assert_eq!(settlement.calls, 3);
        assert_eq!(client.calls_for("a.json"), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let client = MockHttpClient::new();
        client.set_fallback(MockReply::status(401));

        let flow = flow(client.clone(), 4, CancellationToken::new());
        let settlement = flow.run(&item("a.json"), &ItemCtx::new("a.json", 1, 1)).await;

        assert!(matches!(
            settlement.terminal,
            Terminal::FailedFatal(ItemError::Client { status: 401, .. })
        ));
        assert_eq!(client.calls_for("a.json"), 1);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let client = MockHttpClient::new();
        client.set_fallback(MockReply::status(500));

        let flow = flow(client.clone(), 2, CancellationToken::new());
        let settlement = flow.run(&item("a.json"), &ItemCtx::new("a.json", 1, 1)).await;

        assert!(matches!(settlement.terminal, Terminal::FailedExhausted(_)));
        assert_eq!(settlement.calls, 3);
        assert_eq!(client.calls_for("a.json"), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let client = MockHttpClient::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let flow = flow(client.clone(), 4, cancel);
        let settlement = flow.run(&item("a.json"), &ItemCtx::new("a.json", 1, 1)).await;

        assert!(matches!(settlement.terminal, Terminal::Cancelled));
        assert_eq!(settlement.calls, 0);
        assert_eq!(client.total_calls(), 0);
    }
}
