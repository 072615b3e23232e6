use crate::models::outcome::Terminal;
use serde::Serialize;

/// 整批运行的汇总统计
///
/// 协调器在每个题集结算时增量更新，运行结束后只读。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// 交给调度器的题集数
    pub submitted: usize,
    /// 成功并已落盘
    pub succeeded: usize,
    /// 其中属于降级成功（原文保存）的数量
    pub degraded: usize,
    /// 远程处理失败（致命或重试耗尽），错误结果已落盘
    pub failed: usize,
    /// 远程成功但结果写入失败
    pub persist_failed: usize,
    /// 取消时尚未完成
    pub cancelled: usize,
    /// 加载阶段跳过的文件
    pub skipped_at_load: usize,
}

impl BatchSummary {
    pub fn new(submitted: usize, skipped_at_load: usize) -> Self {
        Self {
            submitted,
            skipped_at_load,
            ..Default::default()
        }
    }

    /// 记录一个题集的结算
    ///
    /// # 参数
    /// - `terminal`: 题集终态
    /// - `persisted`: 结果是否成功写入
    pub fn record(&mut self, terminal: &Terminal, persisted: bool) {
        match terminal {
            Terminal::Cancelled => self.cancelled += 1,
            Terminal::Succeeded(content) if persisted => {
                self.succeeded += 1;
                if content.is_degraded() {
                    self.degraded += 1;
                }
            }
            Terminal::Succeeded(_) => self.persist_failed += 1,
            Terminal::FailedFatal(_) | Terminal::FailedExhausted(_) => self.failed += 1,
        }
    }

    /// 已结算的题集数
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed + self.persist_failed + self.cancelled
    }

    /// 是否全部成功
    pub fn is_clean(&self) -> bool {
        self.succeeded == self.submitted && self.skipped_at_load == 0
    }
}
