//! 结果写入服务 - 业务能力层
//!
//! 只负责"把一个题集的结果写成文件"，不关心流程。
//!
//! 文件名为 `<前缀>_<清洗后的身份名>.json`。身份名清洗后重名时，按题集加载顺序
//! 依次追加 `_2`、`_3`……，保证不同题集不会互相覆盖。

use crate::error::ItemError;
use crate::infrastructure::atomic_file::write_atomic_with;
use crate::models::outcome::ItemResult;
use crate::models::work_item::WorkItem;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// 清洗后身份名的最大字节数
pub const MAX_NAME_BYTES: usize = 150;

/// 输出文件名（含前缀、重名编号和扩展名）的最大字节数
pub const MAX_FILE_NAME_BYTES: usize = 200;

/// 为 `_N` 重名编号预留的字节数
const COLLISION_SUFFIX_BYTES: usize = 8;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-. ]").expect("static pattern is valid"))
}

/// 把身份名清洗成安全的文件名片段
///
/// 非单词字符（字母、数字、下划线之外，且不是 `-`、`.`、空格）替换为 `_`，
/// 去掉首尾空白，空格替换为 `_`，按字符边界截断到 `MAX_NAME_BYTES` 字节。
pub fn sanitize_name(name: &str) -> String {
    let replaced = unsafe_chars().replace_all(name, "_");
    let cleaned = replaced.trim().replace(' ', "_");
    let cleaned = truncate_bytes(&cleaned, MAX_NAME_BYTES);

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// 截断到不超过 `max_bytes` 字节，不拆开多字节字符
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 已分配的文件名
#[derive(Default)]
struct NamePlan {
    /// 题集 id → 文件名
    assigned: HashMap<String, String>,
    /// 已占用的文件名（小写，兼容大小写不敏感的文件系统）
    claimed: HashSet<String>,
}

impl NamePlan {
    fn assign(&mut self, prefix: &str, item_id: &str, disease: &str) -> String {
        if let Some(name) = self.assigned.get(item_id) {
            return name.clone();
        }

        // 前缀过长时继续压缩身份名，保证整个文件名不超过上限
        let budget = MAX_FILE_NAME_BYTES
            .saturating_sub(prefix.len() + 1 + ".json".len() + COLLISION_SUFFIX_BYTES)
            .max(1);
        let sanitized = sanitize_name(disease);
        let base = truncate_bytes(&sanitized, budget);
        let base = if base.is_empty() { "unnamed" } else { base };
        let mut candidate = format!("{}_{}.json", prefix, base);
        let mut n = 2;
        while self.claimed.contains(&candidate.to_lowercase()) {
            candidate = format!("{}_{}_{}.json", prefix, base, n);
            n += 1;
        }

        self.claimed.insert(candidate.to_lowercase());
        self.assigned.insert(item_id.to_string(), candidate.clone());
        candidate
    }
}

/// 结果写入服务
///
/// 职责：
/// - 为每个题集分配唯一的输出文件名
/// - 原子地写入结果（临时文件 + rename）
/// - 每个输出文件只由它对应的题集写入
pub struct ResultWriter {
    output_dir: PathBuf,
    prefix: String,
    plan: Mutex<NamePlan>,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            plan: Mutex::new(NamePlan::default()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 按给定顺序预先分配文件名
    ///
    /// 在调度前调用，使重名时的编号只取决于加载顺序，而不取决于完成顺序。
    pub fn plan(&self, items: &[WorkItem]) {
        let mut plan = self.plan.lock();
        for item in items {
            plan.assign(&self.prefix, &item.id, &item.disease);
        }
    }

    /// 题集对应的输出路径（未预先分配时现场分配）
    pub fn output_path(&self, item_id: &str, disease: &str) -> PathBuf {
        let name = self.plan.lock().assign(&self.prefix, item_id, disease);
        self.output_dir.join(name)
    }

    /// 写入一个题集的结果
    ///
    /// # 返回
    /// 成功时返回写入的文件路径
    pub fn write(&self, result: &ItemResult) -> Result<PathBuf, ItemError> {
        self.write_with(result, |_| Ok(()))
    }

    /// 写入结果，`before_commit` 在 rename 之前调用（用于故障注入）
    pub fn write_with<F>(&self, result: &ItemResult, before_commit: F) -> Result<PathBuf, ItemError>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let path = self.output_path(&result.item_id, &result.disease);

        let bytes = serde_json::to_vec_pretty(&result.content)
            .map_err(|e| ItemError::persistence(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        debug!("写入结果: {} ({} 字节)", path.display(), bytes.len());

        write_atomic_with(&path, &bytes, before_commit)
            .map_err(|e| ItemError::persistence(&path, e))?;

        info!(
            "[{}] 结果已保存 -> {}",
            result.item_id,
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        Ok(path)
    }
}
