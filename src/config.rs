use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Semaphore;

/// 程序配置
///
/// 所有选项都有默认值，都可以通过环境变量覆盖。配置显式传给 `BatchCoordinator`，
/// 不使用全局状态。
#[derive(Clone, Debug)]
pub struct Config {
    // --- 远程服务 ---
    /// 远程接口地址
    pub api_url: String,
    /// Bearer 凭证
    pub api_key: String,
    /// 模型名称
    pub model: String,
    /// 单次请求超时
    pub request_timeout: Duration,

    // --- 并发与重试 ---
    /// 同时在途的远程调用上限
    pub max_concurrent: usize,
    /// 最大重试次数（不含首次请求）
    pub max_retries: u32,
    /// 退避底数
    pub backoff_factor: f64,
    /// 每次退避额外等待的固定时长
    pub jitter_floor: Duration,

    // --- 文件 ---
    /// 题集 JSON 所在目录
    pub input_dir: PathBuf,
    /// 结果输出目录，未设置时与输入目录相同
    pub output_dir: Option<PathBuf>,
    /// 结果文件名前缀
    pub output_prefix: String,
    /// 运行日志文件
    pub run_log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            request_timeout: Duration::from_secs(120),
            max_concurrent: 10,
            max_retries: 4,
            backoff_factor: 1.5,
            jitter_floor: Duration::from_millis(100),
            input_dir: PathBuf::from("mcq_json"),
            output_dir: None,
            output_prefix: "review".to_string(),
            run_log_file: PathBuf::from("review_run.log"),
        }
    }
}

impl Config {
    /// 从进程环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 用给定的查找函数加载配置，未提供的选项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_url: get("REVIEW_API_URL").unwrap_or(default.api_url),
            api_key: get("REVIEW_API_KEY")
                .or_else(|| get("DEEPSEEK_API_KEY"))
                .unwrap_or(default.api_key),
            model: get("REVIEW_MODEL").unwrap_or(default.model),
            request_timeout: match get("REQUEST_TIMEOUT_SECS") {
                Some(v) => parse_secs("REQUEST_TIMEOUT_SECS", &v)?,
                None => default.request_timeout,
            },
            max_concurrent: parse_or("MAX_CONCURRENT", get("MAX_CONCURRENT"), default.max_concurrent)?,
            max_retries: parse_or("MAX_RETRIES", get("MAX_RETRIES"), default.max_retries)?,
            backoff_factor: parse_or("BACKOFF_FACTOR", get("BACKOFF_FACTOR"), default.backoff_factor)?,
            jitter_floor: match get("RETRY_JITTER_SECS") {
                Some(v) => parse_secs("RETRY_JITTER_SECS", &v)?,
                None => default.jitter_floor,
            },
            input_dir: get("INPUT_DIR").map(PathBuf::from).unwrap_or(default.input_dir),
            output_dir: get("OUTPUT_DIR").map(PathBuf::from),
            output_prefix: get("OUTPUT_PREFIX").unwrap_or(default.output_prefix),
            run_log_file: get("RUN_LOG_FILE").map(PathBuf::from).unwrap_or(default.run_log_file),
        })
    }

    /// 检查配置是否可以启动批处理
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_url",
                reason: "不能为空".to_string(),
            });
        }
        if self.max_concurrent == 0 || self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "max_concurrent",
                reason: format!("应在 1 到 {} 之间", Semaphore::MAX_PERMITS),
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid {
                field: "backoff_factor",
                reason: format!("{} 不是非负有限数", self.backoff_factor),
            });
        }
        if self.output_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "output_prefix",
                reason: "不能为空".to_string(),
            });
        }
        Ok(())
    }

    /// 实际使用的输出目录
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.clone())
    }
}

fn parse_or<T: FromStr>(var_name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: v.clone(),
            expected_type: std::any::type_name::<T>().to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_secs(var_name: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: "非负秒数".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.backoff_factor, 1.5);
        assert_eq!(config.jitter_floor, Duration::from_millis(100));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.output_prefix, "review");
        assert_eq!(config.effective_output_dir(), PathBuf::from("mcq_json"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("REVIEW_API_URL", "http://localhost:9000/v1/chat/completions"),
            ("DEEPSEEK_API_KEY", "sk-fallback"),
            ("MAX_CONCURRENT", "3"),
            ("MAX_RETRIES", "0"),
            ("BACKOFF_FACTOR", "2"),
            ("RETRY_JITTER_SECS", "0.5"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("OUTPUT_DIR", "out"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.api_key, "sk-fallback");
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.jitter_floor, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.effective_output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn test_primary_key_wins_over_fallback() {
        let config = Config::from_lookup(lookup_from(&[
            ("REVIEW_API_KEY", "sk-primary"),
            ("DEEPSEEK_API_KEY", "sk-fallback"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "sk-primary");
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("MAX_CONCURRENT", "ten")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvVarParseFailed { ref var_name, .. } if var_name == "MAX_CONCURRENT"
        ));

        let err = Config::from_lookup(lookup_from(&[("RETRY_JITTER_SECS", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { .. }));
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingCredential)));

        config.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());

        config.max_concurrent = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "max_concurrent", .. })
        ));

        config.max_concurrent = usize::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "max_concurrent", .. })
        ));

        config.max_concurrent = 1;
        config.backoff_factor = f64::NAN;
        assert!(config.validate().is_err());
    }
}
