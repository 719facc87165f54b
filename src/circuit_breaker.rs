//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器实现
//!
//! 为单个下游依赖（数据库、缓存、远程服务）提供熔断保护。
//!
//! # 特性
//!
//! - **三状态**: Closed（关闭）、Open（打开）、HalfOpen（半开）
//! - **自动熔断**: 连续失败次数达到阈值自动熔断
//! - **自动恢复**: 超时后放行探测请求，半开状态下连续成功后恢复
//! - **线程安全**: 状态判断与记账在同一把读写锁下串行执行
//!
//! # 状态转换
//!
//! ```text
//! Closed   --(failures >= max_failures)--> Open
//! Open     --(elapsed > reset_timeout)---> HalfOpen
//! HalfOpen --(任意失败)-------------------> Open
//! HalfOpen --(连续 success_threshold 次成功)--> Closed
//! ```
//!
//! # 锁的范围
//!
//! 默认情况下锁只覆盖调用前的放行判断和调用后的记账，被保护的操作在锁外
//! 执行。因此半开状态下多个并发调用可能同时作为探测请求通过。需要“同一时刻
//! 最多一个调用在途”时，设置 [`CircuitBreakerConfig::serialize_calls`]，
//! 整个调用（判断、操作、记账）会在一个异步互斥锁下串行执行。

use crate::constants::{
    DEFAULT_CIRCUIT_BREAKER_MAX_FAILURES, DEFAULT_CIRCUIT_BREAKER_RESET_TIMEOUT_SECS,
    DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD,
};
use crate::error::{BreakerError, CircuitBreakerStats, CircuitState, ResilonError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;
#[cfg(feature = "monitoring")]
use std::sync::Arc;

/// 熔断器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// 失败阈值（连续失败达到此值时熔断）
    pub max_failures: u32,
    /// 打开状态持续时间，超过后放行探测请求
    pub reset_timeout: Duration,
    /// 成功阈值（半开状态下连续成功达到此值时恢复）
    pub success_threshold: u32,
    /// 是否在整个调用期间持有锁
    pub serialize_calls: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_CIRCUIT_BREAKER_MAX_FAILURES,
            reset_timeout: Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RESET_TIMEOUT_SECS),
            success_threshold: DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD,
            serialize_calls: false,
        }
    }
}

impl CircuitBreakerConfig {
    /// 创建新的熔断器配置
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            max_failures,
            reset_timeout,
            ..Default::default()
        }
    }

    /// 设置半开状态的成功阈值
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// 设置是否串行执行所有调用
    pub fn serialize_calls(mut self, serialize: bool) -> Self {
        self.serialize_calls = serialize;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ResilonError> {
        if self.max_failures == 0 {
            return Err(ResilonError::ConfigError(
                "max_failures 必须大于0".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(ResilonError::ConfigError(
                "success_threshold 必须大于0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 锁内的可变状态
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    success_count: u32,
    /// 单调时钟，用于判断是否可以探测
    last_failure: Option<Instant>,
    /// 墙上时间，仅用于展示
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change: Option<DateTime<Utc>>,
    total_calls: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            success_count: 0,
            last_failure: None,
            last_failure_at: None,
            last_state_change: Some(Utc::now()),
            total_calls: 0,
            rejected_calls: 0,
        }
    }

    fn record_failure_time(&mut self) {
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());
    }
}

/// 熔断器
///
/// 每个受保护的依赖创建一个实例，由调用方持有（通常包在 `Arc` 里共享）。
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerState>,
    /// `serialize_calls` 为真时，整个调用期间持有此锁
    call_gate: Option<tokio::sync::Mutex<()>>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failures", &inner.failures)
            .field("success_count", &inner.success_count)
            .finish()
    }
}

impl CircuitBreaker {
    /// 创建新的熔断器
    ///
    /// # 参数
    /// - `name`: 依赖名称，用于日志和指标
    /// - `max_failures`: 连续失败阈值
    /// - `reset_timeout`: 打开状态持续时间
    ///
    /// # 示例
    /// ```rust
    /// use resilon::circuit_breaker::CircuitBreaker;
    /// use std::time::Duration;
    ///
    /// let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));
    /// assert_eq!(breaker.state().as_str(), "closed");
    /// ```
    pub fn new(name: impl Into<String>, max_failures: u32, reset_timeout: Duration) -> Self {
        Self::with_config(name, CircuitBreakerConfig::new(max_failures, reset_timeout))
    }

    /// 使用完整配置创建熔断器
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            circuit = %name,
            max_failures = config.max_failures,
            reset_timeout = ?config.reset_timeout,
            success_threshold = config.success_threshold,
            "创建熔断器"
        );

        let call_gate = config.serialize_calls.then(|| tokio::sync::Mutex::new(()));

        Self {
            name,
            config,
            inner: RwLock::new(BreakerState::new()),
            call_gate,
            #[cfg(feature = "monitoring")]
            metrics: None,
        }
    }

    /// 挂载监控指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.set_state(&self.name, self.inner.read().state);
        self.metrics = Some(metrics);
        self
    }

    /// 执行操作，自动处理熔断逻辑
    ///
    /// # 返回
    /// - `Ok(T)`: 操作成功
    /// - `Err(BreakerError::Open)`: 熔断器打开，操作未执行
    /// - `Err(BreakerError::Operation)`: 操作本身失败，错误原样返回
    ///
    /// # 示例
    /// ```rust
    /// use resilon::circuit_breaker::CircuitBreaker;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let breaker = CircuitBreaker::new("redis", 3, Duration::from_secs(15));
    ///
    /// let result = breaker
    ///     .call(|| async { Ok::<_, std::io::Error>("PONG") })
    ///     .await;
    /// assert_eq!(result.unwrap(), "PONG");
    /// # }
    /// ```
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _permit = match &self.call_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        if !self.try_acquire() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// 放行判断，打开状态且未超时时返回 false
    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.write();
        inner.total_calls += 1;

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_breaker_call(&self.name);
        }

        if inner.state == CircuitState::Open {
            let elapsed = inner.last_failure.map(|t| t.elapsed());
            match elapsed {
                Some(elapsed) if elapsed > self.config.reset_timeout => {
                    inner.success_count = 0;
                    self.transition(&mut inner, CircuitState::HalfOpen);
                }
                _ => {
                    inner.rejected_calls += 1;
                    debug!(circuit = %self.name, "熔断器打开，拒绝请求");

                    #[cfg(feature = "monitoring")]
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rejection(&self.name);
                    }

                    return false;
                }
            }
        }

        true
    }

    /// 操作成功时的处理
    fn on_success(&self) {
        let mut inner = self.inner.write();
        let state = inner.state;

        match state {
            CircuitState::Closed => {
                inner.failures = 0;
                trace!(circuit = %self.name, "操作成功（关闭状态）");
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.failures = 0;
                    inner.success_count = 0;
                    self.transition(&mut inner, CircuitState::Closed);
                } else {
                    trace!(
                        circuit = %self.name,
                        success_count = inner.success_count,
                        threshold = self.config.success_threshold,
                        "操作成功（半开状态）"
                    );
                }
            }
            CircuitState::Open => {
                // 其他调用已经触发熔断，迟到的成功不改变状态
                trace!(circuit = %self.name, "熔断器打开状态下收到成功响应，忽略");
            }
        }
    }

    /// 操作失败时的处理
    fn on_failure(&self) {
        let mut inner = self.inner.write();
        inner.failures = inner.failures.saturating_add(1);
        inner.record_failure_time();
        let state = inner.state;

        match state {
            CircuitState::Closed if inner.failures >= self.config.max_failures => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                trace!(
                    circuit = %self.name,
                    failures = inner.failures,
                    max_failures = self.config.max_failures,
                    "操作失败（关闭状态）"
                );
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                trace!(circuit = %self.name, failures = inner.failures, "熔断器打开状态下收到失败响应");
            }
        }
    }

    /// 状态切换，调用方必须持有写锁
    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.last_state_change = Some(Utc::now());

        match to {
            CircuitState::Open => warn!(
                circuit = %self.name,
                failures = inner.failures,
                from = %from,
                "熔断器打开"
            ),
            CircuitState::HalfOpen => {
                info!(circuit = %self.name, from = %from, "熔断器进入半开状态")
            }
            CircuitState::Closed => info!(circuit = %self.name, from = %from, "熔断器关闭"),
        }

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(&self.name, to);
        }
    }

    /// 重置熔断器到关闭状态
    ///
    /// 最后失败时间保留，仅供展示。
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.failures = 0;
        inner.success_count = 0;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
        info!(circuit = %self.name, "重置熔断器");
    }

    /// 依赖名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取配置
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// 获取当前状态
    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// 当前连续失败次数
    pub fn failures(&self) -> u32 {
        self.inner.read().failures
    }

    /// 最后失败时间
    pub fn last_fail_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_failure_at
    }

    /// 半开状态下的连续成功次数
    pub fn success_count(&self) -> u32 {
        self.inner.read().success_count
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read();
        CircuitBreakerStats {
            state: inner.state,
            failures: inner.failures,
            last_failure: inner.last_failure_at,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            last_state_change: inner.last_state_change,
        }
    }
}
