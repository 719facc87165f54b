//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 定义熔断器和重试策略的配置结构，支持从 YAML、TOML、JSON 文件加载。
//! 时长字段使用带单位的字符串，例如 `500ms`、`30s`、`5m`。

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::constants::{
    DATABASE_BREAKER, DATABASE_BREAKER_MAX_FAILURES, DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD,
    MYSQL_CONNECTION_POLICY, REDIS_BREAKER, REDIS_BREAKER_MAX_FAILURES, REDIS_CONNECTION_POLICY,
};
use crate::error::ResilonError;
use crate::registry::BreakerRegistry;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// 容错配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// 熔断器列表
    #[serde(default)]
    pub breakers: Vec<BreakerSettings>,
    /// 重试策略，按名称索引
    #[serde(default)]
    pub retry_policies: BTreeMap<String, RetrySettings>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        let mut retry_policies = BTreeMap::new();
        retry_policies.insert(
            MYSQL_CONNECTION_POLICY.to_string(),
            RetrySettings {
                max_attempts: 5,
                base_delay: "1s".to_string(),
                max_delay: "30s".to_string(),
                backoff_factor: 2.0,
                jitter: true,
            },
        );
        retry_policies.insert(
            REDIS_CONNECTION_POLICY.to_string(),
            RetrySettings {
                max_attempts: 3,
                base_delay: "500ms".to_string(),
                max_delay: "10s".to_string(),
                backoff_factor: 2.0,
                jitter: true,
            },
        );

        Self {
            breakers: vec![
                BreakerSettings::new(DATABASE_BREAKER, DATABASE_BREAKER_MAX_FAILURES, "30s"),
                BreakerSettings::new(REDIS_BREAKER, REDIS_BREAKER_MAX_FAILURES, "15s"),
            ],
            retry_policies,
        }
    }
}

impl ResilienceConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ResilonError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ResilonError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ResilonError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 从文件加载配置，按扩展名选择格式，加载后立即校验
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ResilonError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ResilonError::ConfigError("无法确定配置文件类型".to_string()))?;

        let config = match extension {
            "yaml" | "yml" => Self::from_yaml_str(&content)?,
            "toml" => Self::from_toml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            _ => {
                return Err(ResilonError::ConfigError(format!(
                    "不支持的配置文件类型: {}",
                    extension
                )))
            }
        };

        config.validate()?;
        debug!(path = %path.display(), breakers = config.breakers.len(), "配置已加载");
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ResilonError> {
        let mut names = HashSet::new();
        for (index, breaker) in self.breakers.iter().enumerate() {
            if !names.insert(breaker.name.as_str()) {
                return Err(ResilonError::ConfigError(format!(
                    "熔断器名称重复: {}",
                    breaker.name
                )));
            }
            breaker.to_config().map_err(|e| {
                ResilonError::ConfigError(format!("熔断器[{}]校验失败: {}", index, e))
            })?;
        }

        for (name, policy) in &self.retry_policies {
            if name.is_empty() {
                return Err(ResilonError::ConfigError("重试策略名称不能为空".to_string()));
            }
            policy.to_config().map_err(|e| {
                ResilonError::ConfigError(format!("重试策略[{}]校验失败: {}", name, e))
            })?;
        }

        Ok(())
    }

    /// 按配置创建熔断器注册表
    pub fn build_registry(&self) -> Result<BreakerRegistry, ResilonError> {
        let registry = BreakerRegistry::new();
        self.populate(&registry)?;
        Ok(registry)
    }

    /// 把配置中的熔断器登记到已有注册表，已存在的名称保持不变
    pub fn populate(&self, registry: &BreakerRegistry) -> Result<(), ResilonError> {
        for breaker in &self.breakers {
            registry.get_or_insert(&breaker.name, breaker.to_config()?);
        }
        info!(count = self.breakers.len(), "熔断器注册完成");
        Ok(())
    }

    /// 取指定名称的重试策略
    pub fn retry_config(&self, name: &str) -> Result<RetryConfig, ResilonError> {
        self.retry_policies
            .get(name)
            .ok_or_else(|| ResilonError::NotFound(format!("重试策略 {}", name)))?
            .to_config()
    }
}

/// 单个熔断器的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    pub name: String,
    pub max_failures: u32,
    /// 打开状态持续时长，例如 `30s`
    pub reset_timeout: String,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default)]
    pub serialize_calls: bool,
}

fn default_success_threshold() -> u32 {
    DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD
}

impl BreakerSettings {
    pub fn new(name: impl Into<String>, max_failures: u32, reset_timeout: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_failures,
            reset_timeout: reset_timeout.into(),
            success_threshold: DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD,
            serialize_calls: false,
        }
    }

    pub fn to_config(&self) -> Result<CircuitBreakerConfig, ResilonError> {
        if self.name.is_empty() {
            return Err(ResilonError::ConfigError("熔断器名称不能为空".to_string()));
        }

        let config = CircuitBreakerConfig::new(self.max_failures, parse_duration(&self.reset_timeout)?)
            .success_threshold(self.success_threshold)
            .serialize_calls(self.serialize_calls);
        config.validate()?;
        Ok(config)
    }
}

/// 单个重试策略的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: String,
    pub max_delay: String,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_backoff_factor() -> f64 {
    crate::constants::DEFAULT_RETRY_BACKOFF_FACTOR
}

fn default_jitter() -> bool {
    true
}

impl RetrySettings {
    pub fn to_config(&self) -> Result<RetryConfig, ResilonError> {
        let config = RetryConfig::new(self.max_attempts, parse_duration(&self.base_delay)?)
            .max_delay(parse_duration(&self.max_delay)?)
            .backoff_factor(self.backoff_factor)
            .jitter(self.jitter);
        config.validate()?;
        Ok(config)
    }
}

/// 解析带单位的时长字符串
///
/// 支持的单位：`ms`、`s`、`m`、`h`、`d`（以及对应的英文全称）。数字部分必须是非负整数。
pub fn parse_duration(value: &str) -> Result<Duration, ResilonError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ResilonError::ConfigError("时长不能为空".to_string()));
    }

    let (num_part, unit_part) =
        value.split_at(value.find(|c: char| c.is_alphabetic()).unwrap_or(value.len()));

    let num_str = num_part.trim();
    let unit = unit_part.trim().to_lowercase();

    if num_str.is_empty() {
        return Err(ResilonError::ConfigError(
            "时长格式错误：缺少数字部分".to_string(),
        ));
    }

    let num: u64 = num_str
        .parse()
        .map_err(|_| ResilonError::ConfigError(format!("无效的数字格式: {}", num_str)))?;

    let secs = |factor: u64| {
        num.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| ResilonError::ConfigError(format!("时长溢出: {}", value)))
    };

    match unit.as_str() {
        "ms" | "msec" | "millis" | "milliseconds" => Ok(Duration::from_millis(num)),
        "s" | "sec" | "second" | "seconds" => secs(1),
        "m" | "min" | "minute" | "minutes" => secs(60),
        "h" | "hr" | "hour" | "hours" => secs(3600),
        "d" | "day" | "days" => secs(86400),
        _ => Err(ResilonError::ConfigError(format!(
            "不支持的单位: {}。支持的单位: ms, s, m, h, d",
            unit
        ))),
    }
}
