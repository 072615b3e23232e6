//! 题集处理上下文
//!
//! 封装"我正在处理第几个题集、是哪个文件"这一信息，只用于日志

use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 题集标识（源文件名）
    pub item_id: String,
    /// 在本批中的序号（从 1 开始）
    pub index: usize,
    /// 本批题集总数
    pub total: usize,
}

impl ItemCtx {
    pub fn new(item_id: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            item_id: item_id.into(),
            index,
            total,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[题集 {}/{} {}]", self.index, self.total, self.item_id)
    }
}
