//! 并发调度器
//!
//! 每个题集一个 tokio 任务，所有任务共享一个 `Semaphore`，
//! 同一时刻在途的远程调用数不超过 `max_concurrent`。
//!
//! 结算按完成顺序交回调用方，而不是提交顺序。

use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::ItemError;
use crate::infrastructure::HttpClient;
use crate::models::outcome::{Settlement, Terminal};
use crate::models::WorkItem;
use crate::services::{RemoteCaller, RequestBuilder};
use crate::workflow::{ItemCtx, ItemFlow, RetryPolicy};

/// 按完成顺序产出结算的流
pub type SettlementStream = FuturesUnordered<BoxFuture<'static, Settlement>>;

pub struct Dispatcher<C: HttpClient> {
    flow: Arc<ItemFlow<C>>,
}

impl<C: HttpClient> Dispatcher<C> {
    pub fn new(
        caller: RemoteCaller<C>,
        builder: RequestBuilder,
        policy: RetryPolicy,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(max_concurrent));
        let flow = ItemFlow::new(Arc::new(caller), builder, policy, slots, cancel);
        Self {
            flow: Arc::new(flow),
        }
    }

    /// 为每个题集启动一个任务
    ///
    /// 必须在 tokio 运行时内调用。任务 panic 时该题集结算为 `FailedFatal`，
    /// 其余题集不受影响。
    pub fn dispatch(&self, items: Vec<WorkItem>) -> SettlementStream {
        let total = items.len();
        let settlements = FuturesUnordered::new();

        for (idx, item) in items.into_iter().enumerate() {
            let ctx = ItemCtx::new(&item.id, idx + 1, total);
            let identity = (item.id.clone(), item.disease.clone(), item.source_filename.clone());
            let flow = Arc::clone(&self.flow);

            let handle = tokio::spawn(async move { flow.run(&item, &ctx).await });

            let settlement = handle.map(move |joined| match joined {
                Ok(settlement) => settlement,
                Err(e) => {
                    let (item_id, disease, source_filename) = identity;
                    let reason = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    error!("[题集 {}] 💥 任务异常终止: {}", item_id, reason);
                    Settlement {
                        item_id,
                        disease,
                        source_filename,
                        terminal: Terminal::FailedFatal(ItemError::Panicked(reason)),
                        calls: 0,
                    }
                }
            });

            settlements.push(settlement.boxed());
        }

        settlements
    }

    /// 等待所有题集结算完毕
    pub async fn dispatch_all(&self, items: Vec<WorkItem>) -> Vec<Settlement> {
        self.dispatch(items).collect().await
    }
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "未知 panic".to_string()
    }
}
