use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 题集文件的原始结构
///
/// ```json
/// { "disease": "Appendicitis", "mcqs": [ { "question": "...", "options": {...} } ] }
/// ```
///
/// 单个题目的字段不做约束，原样透传给远程服务。
#[derive(Debug, Clone, Deserialize)]
pub struct McqRecord {
    #[serde(default)]
    pub disease: Option<String>,
    pub mcqs: Vec<JsonValue>,
}

/// 一个待处理的题集
///
/// 加载时创建，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    /// 唯一标识（源文件名）
    pub id: String,
    /// 身份名称：`disease` 字段，缺失时退回文件名主干
    pub disease: String,
    /// 源文件名，随结果一起保存便于追溯
    pub source_filename: String,
    /// 题目列表
    pub mcqs: Vec<JsonValue>,
}

impl WorkItem {
    /// 由解析好的题集记录创建
    ///
    /// # 参数
    /// - `record`: 题集记录
    /// - `source_filename`: 源文件名
    /// - `file_stem`: 文件名主干，`disease` 缺失或为空时使用
    pub fn from_record(record: McqRecord, source_filename: &str, file_stem: &str) -> Self {
        let disease = record
            .disease
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| file_stem.to_string());

        Self {
            id: source_filename.to_string(),
            disease,
            source_filename: source_filename.to_string(),
            mcqs: record.mcqs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_prefers_disease_field() {
        let record: McqRecord =
            serde_json::from_value(json!({"disease": " Hirschsprung disease ", "mcqs": []})).unwrap();
        let item = WorkItem::from_record(record, "07_hirschsprung.json", "07_hirschsprung");
        assert_eq!(item.disease, "Hirschsprung disease");
        assert_eq!(item.id, "07_hirschsprung.json");
    }

    #[test]
    fn test_identity_falls_back_to_file_stem() {
        let record: McqRecord = serde_json::from_value(json!({"mcqs": [{"question": "q"}]})).unwrap();
        let item = WorkItem::from_record(record, "intussusception.json", "intussusception");
        assert_eq!(item.disease, "intussusception");
        assert_eq!(item.mcqs.len(), 1);

        let record: McqRecord = serde_json::from_value(json!({"disease": "", "mcqs": []})).unwrap();
        let item = WorkItem::from_record(record, "a.json", "a");
        assert_eq!(item.disease, "a");
    }
}
