//! 请求结果与题集最终结果

use crate::error::ItemError;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// 远程返回的审校内容
///
/// 两种情况都已经带上了题集的身份字段（`disease`、`source_filename`），可以直接落盘。
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewContent {
    /// 返回了预期的 JSON 对象
    Structured(JsonValue),
    /// 请求成功但内容无法解析为预期结构，原文保存在 `raw_response` 中
    Degraded(JsonValue),
}

impl ReviewContent {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ReviewContent::Degraded(_))
    }

    pub fn as_value(&self) -> &JsonValue {
        match self {
            ReviewContent::Structured(v) | ReviewContent::Degraded(v) => v,
        }
    }
}

/// 单次远程调用的分类结果
#[derive(Debug)]
pub enum CallOutcome {
    Success(ReviewContent),
    RetryableFailure(ItemError),
    FatalFailure(ItemError),
}

/// 题集的终态
#[derive(Debug)]
pub enum Terminal {
    Succeeded(ReviewContent),
    FailedFatal(ItemError),
    FailedExhausted(ItemError),
    /// 批处理取消时尚未完成，不落盘
    Cancelled,
}

impl Terminal {
    pub fn label(&self) -> &'static str {
        match self {
            Terminal::Succeeded(_) => "succeeded",
            Terminal::FailedFatal(_) => "failed_fatal",
            Terminal::FailedExhausted(_) => "failed_exhausted",
            Terminal::Cancelled => "cancelled",
        }
    }
}

/// 调度器交回的题集结算
#[derive(Debug)]
pub struct Settlement {
    pub item_id: String,
    pub disease: String,
    pub source_filename: String,
    pub terminal: Terminal,
    /// 实际发起的远程调用次数
    pub calls: u32,
}

impl Settlement {
    /// 转换为要落盘的结果；取消的题集返回 `None`
    pub fn to_result(&self) -> Option<ItemResult> {
        let (status, content) = match &self.terminal {
            Terminal::Succeeded(content) => (ItemStatus::Ok, content.as_value().clone()),
            Terminal::FailedFatal(err) | Terminal::FailedExhausted(err) => (
                ItemStatus::Error,
                error_artifact(&self.disease, &self.source_filename, &err.to_string()),
            ),
            Terminal::Cancelled => return None,
        };

        Some(ItemResult {
            item_id: self.item_id.clone(),
            disease: self.disease.clone(),
            source_filename: self.source_filename.clone(),
            status,
            content,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    Error,
}

/// 一个题集的最终结果，由 `ResultWriter` 负责写成文件
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub item_id: String,
    pub disease: String,
    pub source_filename: String,
    pub status: ItemStatus,
    /// 成功时为审校内容，失败时为 `{disease, source_filename, error}`
    pub content: JsonValue,
}

/// 错误结果的文件内容
pub fn error_artifact(disease: &str, source_filename: &str, error: &str) -> JsonValue {
    json!({
        "disease": disease,
        "source_filename": source_filename,
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(terminal: Terminal) -> Settlement {
        Settlement {
            item_id: "a.json".to_string(),
            disease: "Appendicitis".to_string(),
            source_filename: "a.json".to_string(),
            terminal,
            calls: 1,
        }
    }

    #[test]
    fn test_success_result_keeps_content() {
        let content = json!({"disease": "Appendicitis", "source_filename": "a.json", "confidence": 0.9});
        let result = settlement(Terminal::Succeeded(ReviewContent::Structured(content.clone())))
            .to_result()
            .unwrap();
        assert_eq!(result.status, ItemStatus::Ok);
        assert_eq!(result.content, content);
    }

    #[test]
    fn test_error_result_carries_identity() {
        let result = settlement(Terminal::FailedFatal(ItemError::Client {
            status: 400,
            body: "bad request".to_string(),
        }))
        .to_result()
        .unwrap();
        assert_eq!(result.status, ItemStatus::Error);
        assert_eq!(result.content["disease"], "Appendicitis");
        assert_eq!(result.content["source_filename"], "a.json");
        assert!(result.content["error"].as_str().unwrap().contains("400"));
    }

    #[test]
    fn test_cancelled_is_not_persisted() {
        assert!(settlement(Terminal::Cancelled).to_result().is_none());
    }
}
