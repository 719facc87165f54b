//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。熔断拒绝、操作失败和重试耗尽是三种
//! 不同的错误，调用方可以按类型区分。

use std::fmt;
use thiserror::Error;

/// Resilon 错误类型
#[derive(Error, Debug)]
pub enum ResilonError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 未找到（例如未注册的熔断器名称）
    #[error("未找到: {0}")]
    NotFound(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// 熔断器调用错误
///
/// `Open` 表示请求被熔断器直接拒绝，操作从未执行；
/// `Operation` 原样携带被保护操作返回的错误。
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// 熔断器打开，请求被拒绝
    #[error("circuit breaker is open for {name}")]
    Open { name: String },

    /// 被保护的操作本身失败
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// 是否为熔断拒绝
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// 取出操作错误；熔断拒绝时返回 `None`
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Operation(e) => Some(e),
        }
    }
}

/// 重试执行错误
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// 所有尝试均失败
    #[error("operation {operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: E,
    },

    /// 遇到不可重试的错误，提前终止
    #[error("operation {operation} aborted on attempt {attempt} with a non-retryable error: {source}")]
    Aborted {
        operation: String,
        attempt: u32,
        #[source]
        source: E,
    },

    /// 调用方取消
    #[error("operation {operation} cancelled after {attempts} attempts")]
    Cancelled {
        operation: String,
        attempts: u32,
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// 操作名称
    pub fn operation(&self) -> &str {
        match self {
            RetryError::Exhausted { operation, .. }
            | RetryError::Aborted { operation, .. }
            | RetryError::Cancelled { operation, .. } => operation,
        }
    }

    /// 实际执行的尝试次数
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
            RetryError::Aborted { attempt, .. } => *attempt,
        }
    }

    /// 最后一次观察到的操作错误
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Aborted { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    /// 取出最后一次观察到的操作错误
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Aborted { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// 关闭状态（正常）
    Closed,
    /// 打开状态（熔断）
    Open,
    /// 半开状态（探测）
    HalfOpen,
}

impl CircuitState {
    /// 状态名称: "closed" / "open" / "half-open"
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 熔断器统计信息
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerStats {
    /// 当前状态
    pub state: CircuitState,
    /// 连续失败次数
    pub failures: u32,
    /// 最后失败时间
    pub last_failure: Option<chrono::DateTime<chrono::Utc>>,
    /// 半开状态下的连续成功次数
    pub success_count: u32,
    /// 总调用次数（含被拒绝的调用）
    pub total_calls: u64,
    /// 被熔断拒绝的调用次数
    pub rejected_calls: u64,
    /// 最后状态变更时间
    pub last_state_change: Option<chrono::DateTime<chrono::Utc>>,
}
