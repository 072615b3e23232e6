//! 批处理协调器 - 编排层
//!
//! ## 职责
//!
//! 1. **初始化**：校验配置、创建 HTTP 客户端
//! 2. **加载**：扫描输入目录，得到 `Vec<WorkItem>`
//! 3. **调度**：交给 `Dispatcher` 并发处理
//! 4. **落盘**：每个题集结算后立即写入结果文件
//! 5. **统计**：汇总 `BatchSummary` 并写入运行日志
//!
//! 单个题集的任何失败都不会让 `run` 返回错误；只有启动阶段的问题才会。

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{HttpClient, ReqwestHttpClient};
use crate::models::{load_work_items, BatchSummary, LoadReport, Settlement};
use crate::orchestrator::dispatcher::Dispatcher;
use crate::services::{RemoteCaller, RequestBuilder, ResultWriter};
use crate::utils::logging::{
    append_summary, init_log_file, log_items_loaded, log_progress, log_startup, print_final_stats,
};
use crate::workflow::RetryPolicy;

/// 应用主结构
pub struct BatchCoordinator<C: HttpClient = ReqwestHttpClient> {
    config: Config,
    dispatcher: Dispatcher<C>,
    writer: Arc<ResultWriter>,
    cancel: CancellationToken,
}

impl BatchCoordinator<ReqwestHttpClient> {
    /// 用真实 HTTP 客户端初始化
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        let client = ReqwestHttpClient::new()?;
        Self::with_client(config, client)
    }
}

impl<C: HttpClient> BatchCoordinator<C> {
    /// 用指定的 HTTP 客户端初始化
    pub fn with_client(config: Config, client: C) -> AppResult<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            RemoteCaller::new(client, &config),
            RequestBuilder::new(&config.model),
            RetryPolicy::from_config(&config),
            config.max_concurrent,
            cancel.clone(),
        );
        let writer = Arc::new(ResultWriter::new(
            config.effective_output_dir(),
            &config.output_prefix,
        ));

        Ok(Self {
            config,
            dispatcher,
            writer,
            cancel,
        })
    }

    /// 取消令牌；取消后不再发起新的请求，在途请求会等它结束
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行整批处理
    pub async fn run(&self) -> AppResult<BatchSummary> {
        if let Err(e) = init_log_file(&self.config.run_log_file) {
            warn!(
                "⚠️ 无法写入运行日志 {}: {}",
                self.config.run_log_file.display(),
                e
            );
        }
        log_startup(&self.config);

        let report = self.load_items().await?;
        log_items_loaded(&report);
        self.prepare_output_dir().await?;

        let mut summary = BatchSummary::new(report.items.len(), report.skipped.len());

        if report.items.is_empty() {
            warn!("⚠️ 没有找到待审校的题集，程序结束");
            self.finish(&summary);
            return Ok(summary);
        }

        let total = report.items.len();
        self.writer.plan(&report.items);

        let mut settlements = self.dispatcher.dispatch(report.items);
        while let Some(settlement) = settlements.next().await {
            let persisted = self.persist(&settlement).await;
            summary.record(&settlement.terminal, persisted);
            log_progress(summary.settled(), total, &settlement);
        }

        self.finish(&summary);
        Ok(summary)
    }

    /// 加载题集
    async fn load_items(&self) -> AppResult<LoadReport> {
        info!("\n📁 正在扫描待审校的题集...");
        load_work_items(&self.config.input_dir, &self.config.output_prefix).await
    }

    async fn prepare_output_dir(&self) -> AppResult<()> {
        let dir = self.writer.output_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| AppError::OutputDirUnusable {
                path: dir.to_path_buf(),
                source,
            })
    }

    /// 写入一个题集的结果，返回是否写入成功
    ///
    /// 写入包含 fsync，放到阻塞线程池执行，不占用驱动结算的任务。
    async fn persist(&self, settlement: &Settlement) -> bool {
        let Some(result) = settlement.to_result() else {
            return false;
        };

        let writer = Arc::clone(&self.writer);
        match tokio::task::spawn_blocking(move || writer.write(&result)).await {
            Ok(Ok(path)) => {
                info!("[题集 {}] 💾 已保存: {}", settlement.item_id, path.display());
                true
            }
            Ok(Err(e)) => {
                error!("[题集 {}] ❌ {}", settlement.item_id, e);
                false
            }
            Err(e) => {
                error!("[题集 {}] ❌ 写入任务异常终止: {}", settlement.item_id, e);
                false
            }
        }
    }

    fn finish(&self, summary: &BatchSummary) {
        print_final_stats(summary);
        match append_summary(&self.config.run_log_file, summary) {
            Ok(()) => info!("\n日志已保存至: {}", self.config.run_log_file.display()),
            Err(e) => warn!("⚠️ 无法追加运行日志: {}", e),
        }
    }
}
