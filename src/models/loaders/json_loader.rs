use crate::error::{AppError, AppResult, LoadError};
use crate::models::work_item::{McqRecord, WorkItem};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 加载阶段被跳过的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

/// 目录扫描结果
#[derive(Debug, Default)]
pub struct LoadReport {
    /// 按文件名排序的题集
    pub items: Vec<WorkItem>,
    /// 格式错误而被跳过的文件
    pub skipped: Vec<SkippedFile>,
}

/// 从 JSON 文件加载单个题集
pub async fn load_work_item(path: &Path) -> Result<WorkItem, LoadError> {
    let content = fs::read_to_string(path).await?;
    let value: JsonValue = serde_json::from_str(&content)?;

    let obj = value
        .as_object()
        .ok_or_else(|| LoadError::Structure("顶层不是 JSON 对象".to_string()))?;
    match obj.get("mcqs") {
        None => return Err(LoadError::Structure("缺少 mcqs 字段".to_string())),
        Some(mcqs) if !mcqs.is_array() => {
            return Err(LoadError::Structure("mcqs 不是数组".to_string()))
        }
        Some(_) => {}
    }

    let record: McqRecord = serde_json::from_value(value)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(WorkItem::from_record(record, &file_name, &file_stem))
}

/// 扫描目录，加载所有题集
///
/// - 只处理扩展名为 `.json` 的文件（不区分大小写）
/// - 以 `<output_prefix>_` 开头（不区分大小写）的文件是以前的审校结果，直接忽略
/// - 格式错误的文件记为跳过，不会返回错误
///
/// # 返回
/// 目录不存在或无法读取时返回错误，其余情况返回 `LoadReport`
pub async fn load_work_items(folder: &Path, output_prefix: &str) -> AppResult<LoadReport> {
    if !fs::try_exists(folder).await.unwrap_or(false) {
        return Err(AppError::InputDirMissing {
            path: folder.to_path_buf(),
        });
    }

    let unreadable = |source| AppError::InputDirUnreadable {
        path: folder.to_path_buf(),
        source,
    };

    let output_marker = format!("{}_", output_prefix).to_lowercase();
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(folder).await.map_err(unreadable)?;

    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let is_output = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.to_lowercase().starts_with(&output_marker))
            .unwrap_or(false);

        if is_json && !is_output && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();

    let mut report = LoadReport::default();
    for path in paths {
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        match load_work_item(&path).await {
            Ok(item) => {
                tracing::info!("正在加载: {} ({} 道题)", file_name, item.mcqs.len());
                report.items.push(item);
            }
            Err(e) => {
                tracing::warn!("跳过文件 {}: {}", file_name, e);
                report.skipped.push(SkippedFile {
                    file_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}
