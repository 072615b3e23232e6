use anyhow::Result;
use mcq_review::utils::logging;
use mcq_review::{BatchCoordinator, Config};
use std::path::PathBuf;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置，第一个命令行参数可以覆盖输入目录
    let mut config = Config::from_env()?;
    if let Some(dir) = std::env::args().nth(1) {
        config.input_dir = PathBuf::from(dir);
    }

    let coordinator = BatchCoordinator::initialize(config)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，不再发起新请求，等待在途请求结束...");
            cancel.cancel();
        }
    });

    let summary = coordinator.run().await?;
    if !summary.is_clean() {
        info!("部分题集未成功，详见各自的结果文件");
    }

    Ok(())
}
