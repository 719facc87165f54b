//! 测试通用工具模块
//!
//! 提供测试中常用的工具函数和辅助结构。

#![allow(dead_code)]

use resilon::{BreakerError, CircuitBreaker, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// 测试用的依赖错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TestError(pub String);

impl TestError {
    pub fn new(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// 让熔断器连续失败 `n` 次
pub async fn fail_times(breaker: &CircuitBreaker, n: u32) {
    for _ in 0..n {
        let _ = breaker
            .call(|| async { Err::<(), _>(TestError::new("dependency down")) })
            .await;
    }
}

/// 发起一次成功调用
pub async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<TestError>> {
    breaker.call(|| async { Ok(()) }).await
}

/// 前 `failures` 次调用失败，之后成功的模拟依赖
#[derive(Debug, Default)]
pub struct FlakyDependency {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyDependency {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// 一直失败的依赖
    pub fn down() -> Self {
        Self::new(u32::MAX)
    }

    pub async fn connect(&self) -> Result<&'static str, TestError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            Err(TestError(format!("connection refused (attempt {})", n)))
        } else {
            Ok("PONG")
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 初始化测试日志，输出到测试捕获的 writer
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("resilon=debug"))
        .with_test_writer()
        .try_init();
}

/// 不带抖动的重试配置
pub fn retry_without_jitter(max_attempts: u32, base_delay: Duration) -> RetryConfig {
    RetryConfig::new(max_attempts, base_delay)
        .max_delay(Duration::from_secs(60))
        .backoff_factor(2.0)
        .jitter(false)
}
