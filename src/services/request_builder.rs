//! 请求构建 - 业务能力层
//!
//! 纯函数：题集 → 出站请求体。不做 I/O，结果只取决于输入，便于脱离网络测试。

use crate::error::ItemError;
use crate::models::work_item::WorkItem;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// 固定的审校指令
pub const REVIEW_INSTRUCTIONS: &str = r#"You are an expert pediatric surgery reviewer. You receive one JSON object
{"disease": string, "source_filename": string, "mcqs": [ {question, options, correct_answer, explanation} ]}.

Review every MCQ and return ONLY a single JSON object with these keys:
- "disease", "source_filename": copied from the input
- "accuracy_summary": {"overall_accuracy": "high"|"moderate"|"low", "factual_errors": [{"mcq_id", "issue", "correction"}]}
- "spelling_grammar": [{"mcq_id", "field", "original", "corrected"}]
- "quality": {"score": integer 1-5, "issues": [string]}
- "suggestions": [string]
- "improved_examples": up to 5 rewritten questions [{"mcq_id", "question", "options", "correct_option", "explanation"}]
- "confidence": number between 0 and 1

Do not add any text outside the JSON object."#;

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// 响应格式提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// 聊天补全请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

/// 出站请求：序列化好的请求体加上题集身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPayload {
    pub item_id: String,
    pub disease: String,
    pub source_filename: String,
    /// JSON 请求体
    pub body: String,
}

/// 请求构建器
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    model: String,
}

impl RequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// 构建聊天请求
    pub fn chat_request(&self, item: &WorkItem) -> Result<ChatRequest, ItemError> {
        let user_content = json!({
            "disease": item.disease,
            "source_filename": item.source_filename,
            "mcqs": item.mcqs,
        });
        let user_content = serde_json::to_string(&user_content)
            .map_err(|e| ItemError::RequestBuild(e.to_string()))?;

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: REVIEW_INSTRUCTIONS.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        })
    }

    /// 构建出站请求
    pub fn build(&self, item: &WorkItem) -> Result<OutboundPayload, ItemError> {
        let request = self.chat_request(item)?;
        let body =
            serde_json::to_string(&request).map_err(|e| ItemError::RequestBuild(e.to_string()))?;

        Ok(OutboundPayload {
            item_id: item.id.clone(),
            disease: item.disease.clone(),
            source_filename: item.source_filename.clone(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    fn item() -> WorkItem {
        WorkItem {
            id: "03_pyloric_stenosis.json".to_string(),
            disease: "Pyloric stenosis".to_string(),
            source_filename: "03_pyloric_stenosis.json".to_string(),
            mcqs: vec![json!({
                "question": "Typical age of presentation?",
                "options": {"A": "2-8 weeks", "B": "6 months"},
                "correct_answer": "A",
                "explanation": "Usually between 2 and 8 weeks; 幽门狭窄"
            })],
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = RequestBuilder::new("deepseek-chat");
        assert_eq!(builder.build(&item()).unwrap(), builder.build(&item()).unwrap());
    }

    #[test]
    fn test_payload_shape() {
        let payload = RequestBuilder::new("deepseek-chat").build(&item()).unwrap();
        assert_eq!(payload.item_id, "03_pyloric_stenosis.json");

        let body: JsonValue = serde_json::from_str(&payload.body).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], REVIEW_INSTRUCTIONS);
        assert_eq!(body["messages"][1]["role"], "user");

        let user: JsonValue =
            serde_json::from_str(body["messages"][1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(user["disease"], "Pyloric stenosis");
        assert_eq!(user["source_filename"], "03_pyloric_stenosis.json");
        assert_eq!(user["mcqs"], JsonValue::Array(item().mcqs));
    }

    #[test]
    fn test_non_ascii_is_kept_verbatim() {
        let request = RequestBuilder::new("m").chat_request(&item()).unwrap();
        assert!(request.messages[1].content.contains("幽门狭窄"));
    }
}
