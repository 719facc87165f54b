//! 容错演示
//!
//! 模拟一次依赖故障：带退避重试地建立连接，持续失败直到熔断器打开，
//! 然后输出所有熔断器的状态并全部重置。
//!
//! 用法：`resilience_demo [config.yaml|config.toml|config.json]`

use anyhow::Context;
use resilon::constants::{DATABASE_BREAKER, REDIS_CONNECTION_POLICY};
use resilon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DependencyError(String);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::new("info,resilon=debug"))?;

    println!("=== 容错演示 ===");

    let config = match std::env::args().nth(1) {
        Some(path) => ResilienceConfig::load(&path)
            .await
            .with_context(|| format!("加载配置失败: {}", path))?,
        None => ResilienceConfig::default(),
    };
    config.validate()?;

    let registry = config.build_registry()?;

    connect_with_retry(&config).await?;
    trip_database_breaker(&registry).await;

    println!("\n--- 熔断器状态 ---");
    println!("{}", serde_json::to_string_pretty(&registry.status())?);

    registry.reset_all();

    println!("\n--- 重置后 ---");
    println!("{}", serde_json::to_string_pretty(&registry.status())?);

    Ok(())
}

/// 前两次连接失败，第三次成功
async fn connect_with_retry(config: &ResilienceConfig) -> anyhow::Result<()> {
    let policy = config.retry_config(REDIS_CONNECTION_POLICY)?;
    let attempts = Arc::new(AtomicU32::new(0));

    let executor = RetryExecutor::new(REDIS_CONNECTION_POLICY, policy);
    let result = executor
        .run(|| {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(DependencyError(format!("connection refused (attempt {})", n)))
                } else {
                    Ok("PONG")
                }
            }
        })
        .await?;

    println!(
        "连接成功: {} (尝试 {} 次)",
        result,
        attempts.load(Ordering::SeqCst)
    );
    Ok(())
}

/// 连续失败直到熔断器打开，再验证后续调用被快速拒绝
async fn trip_database_breaker(registry: &BreakerRegistry) {
    let Some(breaker) = registry.get(DATABASE_BREAKER) else {
        println!("未配置熔断器 {}，跳过", DATABASE_BREAKER);
        return;
    };

    for i in 1..=breaker.config().max_failures {
        let result: Result<(), _> = breaker
            .call(|| async { Err(DependencyError("query timeout".to_string())) })
            .await;
        if let Err(e) = result {
            println!("第 {} 次调用失败: {}", i, e);
        }
    }

    let rejected: Result<(), BreakerError<DependencyError>> =
        breaker.call(|| async { Ok(()) }).await;
    match rejected {
        Err(e) if e.is_open() => println!("调用被拒绝: {}", e),
        _ => println!("熔断器未打开"),
    }
}
