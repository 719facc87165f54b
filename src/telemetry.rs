//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 监控和日志模块
//!
//! - `monitoring` 特性：Prometheus 指标（熔断器调用、拒绝、状态变更，重试次数）
//! - `telemetry` 特性：基于 tracing-subscriber 的日志初始化
//!
//! 指标实例由调用方创建并显式挂载到熔断器或重试执行器上，不使用全局实例。
//!
//! # 示例
//!
//! ```rust,ignore
//! use resilon::telemetry::Metrics;
//! use resilon::CircuitBreaker;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let metrics = Arc::new(Metrics::new().unwrap());
//! let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30))
//!     .with_metrics(metrics.clone());
//! println!("{}", metrics.gather());
//! ```

#[cfg(feature = "monitoring")]
pub use self::metrics::Metrics;

#[cfg(feature = "telemetry")]
pub use self::logging::{init_logging, LoggingConfig};

#[cfg(feature = "monitoring")]
mod metrics {
    use crate::error::CircuitState;
    use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
    use tracing::error;

    /// 监控指标
    #[derive(Clone)]
    pub struct Metrics {
        /// 经过熔断器的调用数
        pub breaker_calls: CounterVec,
        /// 被熔断拒绝的调用数
        pub breaker_rejections: CounterVec,
        /// 状态变更次数
        pub breaker_transitions: CounterVec,
        /// 当前状态（0 关闭，1 打开，2 半开）
        pub breaker_state: GaugeVec,
        /// 重试执行器发起的尝试次数
        pub retry_attempts: CounterVec,
        /// 重试耗尽次数
        pub retry_exhausted: CounterVec,
        registry: Registry,
    }

    impl Metrics {
        /// 创建并注册所有指标
        pub fn new() -> Result<Self, prometheus::Error> {
            let registry = Registry::new();

            let breaker_calls = CounterVec::new(
                Opts::new(
                    "resilon_breaker_calls_total",
                    "Total number of calls routed through a circuit breaker",
                ),
                &["breaker"],
            )?;
            let breaker_rejections = CounterVec::new(
                Opts::new(
                    "resilon_breaker_rejections_total",
                    "Total number of calls rejected by an open circuit breaker",
                ),
                &["breaker"],
            )?;
            let breaker_transitions = CounterVec::new(
                Opts::new(
                    "resilon_breaker_transitions_total",
                    "Total number of circuit breaker state transitions",
                ),
                &["breaker", "to"],
            )?;
            let breaker_state = GaugeVec::new(
                Opts::new(
                    "resilon_breaker_state",
                    "Current circuit breaker state (0 closed, 1 open, 2 half-open)",
                ),
                &["breaker"],
            )?;
            let retry_attempts = CounterVec::new(
                Opts::new(
                    "resilon_retry_attempts_total",
                    "Total number of attempts made by the retry executor",
                ),
                &["operation"],
            )?;
            let retry_exhausted = CounterVec::new(
                Opts::new(
                    "resilon_retry_exhausted_total",
                    "Total number of operations that exhausted their retry budget",
                ),
                &["operation"],
            )?;

            registry.register(Box::new(breaker_calls.clone()))?;
            registry.register(Box::new(breaker_rejections.clone()))?;
            registry.register(Box::new(breaker_transitions.clone()))?;
            registry.register(Box::new(breaker_state.clone()))?;
            registry.register(Box::new(retry_attempts.clone()))?;
            registry.register(Box::new(retry_exhausted.clone()))?;

            Ok(Self {
                breaker_calls,
                breaker_rejections,
                breaker_transitions,
                breaker_state,
                retry_attempts,
                retry_exhausted,
                registry,
            })
        }

        /// 指标注册表
        pub fn registry(&self) -> &Registry {
            &self.registry
        }

        /// 收集所有指标并返回Prometheus格式的文本
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let metric_families = self.registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("Failed to encode metrics: {}", e);
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }

        pub fn record_breaker_call(&self, breaker: &str) {
            self.breaker_calls.with_label_values(&[breaker]).inc();
        }

        pub fn record_rejection(&self, breaker: &str) {
            self.breaker_rejections.with_label_values(&[breaker]).inc();
        }

        /// 记录状态变更并同步状态仪表
        pub fn record_transition(&self, breaker: &str, to: CircuitState) {
            self.breaker_transitions
                .with_label_values(&[breaker, to.as_str()])
                .inc();
            self.set_state(breaker, to);
        }

        /// 仅同步状态仪表，不计入状态变更
        pub fn set_state(&self, breaker: &str, state: CircuitState) {
            self.breaker_state
                .with_label_values(&[breaker])
                .set(state_value(state));
        }

        pub fn record_retry_attempt(&self, operation: &str) {
            self.retry_attempts.with_label_values(&[operation]).inc();
        }

        pub fn record_retry_exhausted(&self, operation: &str) {
            self.retry_exhausted.with_label_values(&[operation]).inc();
        }
    }

    fn state_value(state: CircuitState) -> f64 {
        match state {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }

}

#[cfg(feature = "telemetry")]
mod logging {
    use crate::error::ResilonError;
    use tracing_subscriber::EnvFilter;

    /// 日志配置
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// 默认过滤规则（`RUST_LOG` 优先）
        pub filter: String,
        /// 是否输出 target
        pub with_target: bool,
        /// 是否启用终端颜色
        pub ansi: bool,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                filter: "info".to_string(),
                with_target: true,
                ansi: true,
            }
        }
    }

    impl LoggingConfig {
        pub fn new(filter: impl Into<String>) -> Self {
            Self {
                filter: filter.into(),
                ..Default::default()
            }
        }

        pub fn with_target(mut self, with_target: bool) -> Self {
            self.with_target = with_target;
            self
        }

        pub fn ansi(mut self, ansi: bool) -> Self {
            self.ansi = ansi;
            self
        }
    }

    /// 安装全局 fmt 订阅者
    ///
    /// 进程内只能成功调用一次，重复调用返回 `ConfigError`。
    pub fn init_logging(config: &LoggingConfig) -> Result<(), ResilonError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .map_err(|e| ResilonError::ConfigError(format!("无效的日志过滤规则: {}", e)))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .with_ansi(config.ansi)
            .try_init()
            .map_err(|e| ResilonError::ConfigError(format!("日志初始化失败: {}", e)))
    }

}
