//! 重试策略
//!
//! 每个题集一个状态机：
//!
//! ```text
//! Pending → Attempting → { Succeeded | FailedFatal | FailedExhausted }
//!               ↓ 可重试失败且未超过重试上限
//!            Pending（等待退避后再次 Attempting）
//! ```

use crate::config::Config;
use crate::error::ItemError;
use crate::models::outcome::{CallOutcome, Terminal};
use std::time::Duration;

/// 重试参数
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    /// 退避底数
    pub backoff_factor: f64,
    /// 每次退避额外等待的固定时长
    pub jitter_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            backoff_factor: 1.5,
            jitter_floor: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            jitter_floor: config.jitter_floor,
        }
    }

    /// 第 `attempts_made` 次重试前的等待时长：`backoff_factor ^ attempts_made + jitter_floor`
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        let exponent = i32::try_from(attempts_made).unwrap_or(i32::MAX);
        let backoff = Duration::try_from_secs_f64(self.backoff_factor.powi(exponent))
            .unwrap_or(Duration::MAX);
        backoff.saturating_add(self.jitter_floor)
    }
}

/// 状态机所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    Attempting,
    Succeeded,
    FailedFatal,
    FailedExhausted,
}

impl AttemptPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptPhase::Succeeded | AttemptPhase::FailedFatal | AttemptPhase::FailedExhausted
        )
    }
}

/// 一次结果处理后的下一步
#[derive(Debug)]
pub enum Step {
    /// 等待 `delay` 后重新提交
    Retry { delay: Duration, cause: ItemError },
    /// 到达终态
    Settle(Terminal),
}

/// 单个题集的重试状态
///
/// 只由处理该题集的任务持有，到达终态后丢弃。
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub item_id: String,
    /// 已经进行的重试次数
    pub attempts_made: u32,
    /// 下一次重试前的等待时长
    pub next_delay: Duration,
    /// 已发起的远程调用次数
    pub calls: u32,
    phase: AttemptPhase,
}

impl AttemptState {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            attempts_made: 0,
            next_delay: Duration::ZERO,
            calls: 0,
            phase: AttemptPhase::Pending,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// 开始一次远程调用
    pub fn begin_attempt(&mut self) {
        debug_assert_eq!(self.phase, AttemptPhase::Pending);
        self.phase = AttemptPhase::Attempting;
        self.calls += 1;
    }

    /// 根据本次调用结果推进状态
    pub fn on_outcome(&mut self, outcome: CallOutcome, policy: &RetryPolicy) -> Step {
        debug_assert_eq!(self.phase, AttemptPhase::Attempting);

        match outcome {
            CallOutcome::Success(content) => {
                self.phase = AttemptPhase::Succeeded;
                Step::Settle(Terminal::Succeeded(content))
            }
            CallOutcome::FatalFailure(err) => {
                self.phase = AttemptPhase::FailedFatal;
                Step::Settle(Terminal::FailedFatal(err))
            }
            CallOutcome::RetryableFailure(err) if self.attempts_made < policy.max_retries => {
                self.attempts_made += 1;
                self.next_delay = policy.delay_for(self.attempts_made);
                self.phase = AttemptPhase::Pending;
                Step::Retry {
                    delay: self.next_delay,
                    cause: err,
                }
            }
            CallOutcome::RetryableFailure(err) => {
                self.phase = AttemptPhase::FailedExhausted;
                Step::Settle(Terminal::FailedExhausted(ItemError::ExhaustedRetries {
                    retries: self.attempts_made,
                    last: Box::new(err),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::ReviewContent;
    use serde_json::json;

    fn server_error() -> CallOutcome {
        CallOutcome::RetryableFailure(ItemError::Server {
            status: 500,
            body: String::new(),
        })
    }

    #[test]
    fn test_delay_formula() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs_f64(1.5) + Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_secs_f64(2.25) + Duration::from_millis(100));
        assert!(policy.delay_for(4) > policy.delay_for(3));

        let instant = RetryPolicy {
            max_retries: 3,
            backoff_factor: 0.0,
            jitter_floor: Duration::ZERO,
        };
        assert_eq!(instant.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            backoff_factor: 10.0,
            jitter_floor: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(10_000), Duration::MAX);
    }

    #[test]
    fn test_retry_until_exhausted() {
        let policy = RetryPolicy::default();
        let mut state = AttemptState::new("a.json");

        for expected_retry in 1..=policy.max_retries {
            state.begin_attempt();
            match state.on_outcome(server_error(), &policy) {
                Step::Retry { delay, .. } => assert_eq!(delay, policy.delay_for(expected_retry)),
                other => panic!("expected retry, got {:?}", other),
            }
            assert_eq!(state.phase(), AttemptPhase::Pending);
            assert_eq!(state.attempts_made, expected_retry);
        }

        state.begin_attempt();
        match state.on_outcome(server_error(), &policy) {
            Step::Settle(Terminal::FailedExhausted(ItemError::ExhaustedRetries { retries, .. })) => {
                assert_eq!(retries, policy.max_retries)
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(state.phase(), AttemptPhase::FailedExhausted);
        assert_eq!(state.calls, 1 + policy.max_retries);
    }

    #[test]
    fn test_fatal_settles_immediately() {
        let policy = RetryPolicy::default();
        let mut state = AttemptState::new("a.json");
        state.begin_attempt();
        let step = state.on_outcome(
            CallOutcome::FatalFailure(ItemError::Client {
                status: 400,
                body: String::new(),
            }),
            &policy,
        );
        assert!(matches!(step, Step::Settle(Terminal::FailedFatal(_))));
        assert!(state.phase().is_terminal());
        assert_eq!(state.calls, 1);
    }

    #[test]
    fn test_success_after_retry() {
        let policy = RetryPolicy::default();
        let mut state = AttemptState::new("a.json");
        state.begin_attempt();
        assert!(matches!(state.on_outcome(server_error(), &policy), Step::Retry { .. }));
        state.begin_attempt();
        let step = state.on_outcome(
            CallOutcome::Success(ReviewContent::Structured(json!({}))),
            &policy,
        );
        assert!(matches!(step, Step::Settle(Terminal::Succeeded(_))));
        assert_eq!(state.phase(), AttemptPhase::Succeeded);
        assert_eq!(state.calls, 2);
    }

    #[test]
    fn test_zero_retries_exhausts_on_first_failure() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let mut state = AttemptState::new("a.json");
        state.begin_attempt();
        assert!(matches!(
            state.on_outcome(server_error(), &policy),
            Step::Settle(Terminal::FailedExhausted(_))
        ));
    }
}
