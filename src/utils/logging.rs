/// 日志工具模块
///
/// 提供日志初始化、格式化输出和运行日志文件的辅助函数
use crate::config::Config;
use crate::models::{BatchSummary, LoadReport, Settlement, Terminal};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 输出
///
/// 日志级别由 `RUST_LOG` 控制，默认 `info`。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &Path) -> io::Result<()> {
    let log_header = format!(
        "{}\n题集审校运行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发题集审校模式");
    info!("📁 输入目录: {}", config.input_dir.display());
    info!("📁 输出目录: {}", config.effective_output_dir().display());
    info!("🤖 模型: {}", config.model);
    info!(
        "📊 最大并发数: {} | 最大重试: {} | 超时: {}s",
        config.max_concurrent,
        config.max_retries,
        config.request_timeout.as_secs_f64()
    );
    info!("{}", "=".repeat(60));
}

/// 记录题集加载结果
pub fn log_items_loaded(report: &LoadReport) {
    info!("✓ 找到 {} 个待审校的题集", report.items.len());
    if !report.skipped.is_empty() {
        warn!("⚠️ 跳过 {} 个格式错误的文件:", report.skipped.len());
        for skipped in &report.skipped {
            warn!("   - {}: {}", skipped.file_name, skipped.reason);
        }
    }
}

/// 记录单个题集的结算进度
///
/// # 参数
/// - `settled`: 已结算数量
/// - `total`: 题集总数
/// - `settlement`: 本次结算
pub fn log_progress(settled: usize, total: usize, settlement: &Settlement) {
    let prefix = format!("[进度 {}/{}] {}", settled, total, settlement.item_id);
    match &settlement.terminal {
        Terminal::Succeeded(content) if content.is_degraded() => {
            warn!("{} ⚠️ 完成（内容未能解析，已保存原文），请求 {} 次", prefix, settlement.calls)
        }
        Terminal::Succeeded(_) => info!("{} ✅ 完成，请求 {} 次", prefix, settlement.calls),
        Terminal::FailedFatal(e) => error!("{} ❌ 失败: {}", prefix, e),
        Terminal::FailedExhausted(e) => error!("{} ❌ 重试耗尽: {}", prefix, e),
        Terminal::Cancelled => warn!("{} ⏹️ 已取消", prefix),
    }
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &BatchSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for line in summary_lines(summary) {
        info!("{}", line);
    }
    info!("{}", "=".repeat(60));
}

/// 把最终统计追加到运行日志文件
pub fn append_summary(log_file_path: &Path, summary: &BatchSummary) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(
        file,
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    for line in summary_lines(summary) {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    vec![
        format!("✅ 成功: {}/{}", summary.succeeded, summary.submitted),
        format!("   其中保存原文: {}", summary.degraded),
        format!("❌ 失败: {}", summary.failed),
        format!("💾 写入失败: {}", summary.persist_failed),
        format!("⏹️ 取消: {}", summary.cancelled),
        format!("⏭️ 加载时跳过: {}", summary.skipped_at_load),
    ]
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
