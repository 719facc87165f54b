//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 重试执行器
//!
//! 反复执行调用方提供的操作，两次尝试之间按指数退避（可选抖动）等待，
//! 直到成功或尝试次数耗尽。执行器本身不保存状态，每次调用相互独立。
//!
//! # 退避计算
//!
//! 第 `n` 次尝试失败后（`n` 从 1 开始，仅在还会重试时计算）：
//!
//! ```text
//! delay = min(base_delay * backoff_factor^(n-1), max_delay)
//! ```
//!
//! 启用抖动时在 `[-10%, +10%]` 范围内均匀调整，结果不小于 0。

use crate::constants::{
    DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_SECS, RETRY_JITTER_RATIO,
};
use crate::error::{ResilonError, RetryError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;
#[cfg(feature = "monitoring")]
use std::sync::Arc;

/// 重试配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    /// 初始退避时间
    pub base_delay: Duration,
    /// 单次退避上限
    pub max_delay: Duration,
    /// 每次尝试的退避倍数
    pub backoff_factor: f64,
    /// 是否启用抖动
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
            backoff_factor: DEFAULT_RETRY_BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 创建新的重试配置
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// 设置退避上限
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// 设置退避倍数
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// 设置是否启用抖动
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ResilonError> {
        if self.max_attempts == 0 {
            return Err(ResilonError::ConfigError(
                "max_attempts 必须大于0".to_string(),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(ResilonError::ConfigError(format!(
                "base_delay ({:?}) 不能大于 max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ResilonError::ConfigError(format!(
                "backoff_factor 必须是不小于1的有限数: {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// 第 `attempt` 次失败后的退避时间（不含抖动）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// 第 `attempt` 次失败后实际等待的时间
    ///
    /// 抖动使用调用方提供的随机源，固定种子时结果可复现。
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.backoff_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let spread = delay.as_secs_f64() * RETRY_JITTER_RATIO;
        let offset = rng.gen_range(-spread..=spread);
        let jittered = (delay.as_secs_f64() + offset).max(0.0);

        Duration::try_from_secs_f64(jittered).unwrap_or(delay)
    }

    /// 持续失败时所有等待时间之和的上界（不含抖动）
    pub fn max_total_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff_delay(attempt))
            .sum()
    }
}

/// 重试执行器
///
/// # 示例
/// ```rust
/// use resilon::retry::{RetryConfig, RetryExecutor};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = RetryConfig::new(3, Duration::from_millis(1)).jitter(false);
/// let executor = RetryExecutor::new("redis-connection", config);
///
/// let result = executor
///     .run(|| async { Ok::<_, std::io::Error>("connected") })
///     .await;
/// assert_eq!(result.unwrap(), "connected");
/// # }
/// ```
#[derive(Clone)]
pub struct RetryExecutor {
    operation: String,
    config: RetryConfig,
    cancel: Option<CancellationToken>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("operation", &self.operation)
            .field("config", &self.config)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(operation: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            operation: operation.into(),
            config,
            cancel: None,
            #[cfg(feature = "monitoring")]
            metrics: None,
        }
    }

    /// 在每次尝试前和每次等待期间检查取消信号
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 挂载监控指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 执行操作，所有错误都视为可重试
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(operation, |_| true).await
    }

    /// 执行操作，`is_retryable` 返回 false 的错误立即终止
    pub async fn run_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        mut is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: FnMut(&E) -> bool,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if self.is_cancelled() {
                return Err(self.cancelled(attempt - 1, last_error));
            }

            #[cfg(feature = "monitoring")]
            if let Some(metrics) = &self.metrics {
                metrics.record_retry_attempt(&self.operation);
            }

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation = %self.operation,
                            attempt,
                            "重试后操作成功"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                warn!(
                    operation = %self.operation,
                    attempt,
                    error = %error,
                    "操作失败，错误不可重试"
                );
                return Err(RetryError::Aborted {
                    operation: self.operation.clone(),
                    attempt,
                    source: error,
                });
            }

            if attempt == max_attempts {
                last_error = Some(error);
                break;
            }

            let delay = self.next_delay(attempt);
            warn!(
                operation = %self.operation,
                attempt,
                error = %error,
                delay = ?delay,
                "操作失败，稍后重试"
            );
            last_error = Some(error);

            if !self.sleep(delay).await {
                return Err(self.cancelled(attempt, last_error));
            }
        }

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_retry_exhausted(&self.operation);
        }

        match last_error {
            Some(source) => {
                error!(
                    operation = %self.operation,
                    attempts = max_attempts,
                    error = %source,
                    "操作失败，已达最大重试次数"
                );
                Err(RetryError::Exhausted {
                    operation: self.operation.clone(),
                    attempts: max_attempts,
                    source,
                })
            }
            // 循环至少执行一次，且只在记录错误后退出
            None => Err(self.cancelled(max_attempts, None)),
        }
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.config.delay_for_attempt(attempt, &mut rand::thread_rng())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    fn cancelled<E>(&self, attempts: u32, last_error: Option<E>) -> RetryError<E> {
        debug!(operation = %self.operation, attempts, "重试被取消");
        RetryError::Cancelled {
            operation: self.operation.clone(),
            attempts,
            last_error,
        }
    }

    /// 等待指定时间，被取消时返回 false
    async fn sleep(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            },
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

/// 带重试地执行操作
///
/// 等价于 `RetryExecutor::new(operation, config.clone()).run(op)`。
///
/// # 示例
/// ```rust
/// use resilon::retry::{with_retry, RetryConfig};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = RetryConfig::new(1, Duration::from_millis(1));
/// let result = with_retry("ping", &config, || async {
///     Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "refused"))
/// })
/// .await;
///
/// let err = result.unwrap_err();
/// assert_eq!(err.attempts(), 1);
/// assert_eq!(err.to_string(), "operation ping failed after 1 attempts: refused");
/// # }
/// ```
pub async fn with_retry<F, Fut, T, E>(
    operation: &str,
    config: &RetryConfig,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    RetryExecutor::new(operation, config.clone()).run(op).await
}
