//! 熔断器模块集成测试
//!
//! 测试熔断器的完整状态转换和并发行为

use crate::common::{fail_times, succeed, TestError};
use resilon::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 测试完整的 关闭 -> 打开 -> 半开 -> 关闭 流程
#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_full_cycle() {
    let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));

    fail_times(&breaker, 5).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.state().as_str(), "open");

    // 重置超时前被拒绝，失败计数不变
    let result = succeed(&breaker).await;
    assert!(matches!(result, Err(BreakerError::Open { .. })));
    assert_eq!(breaker.failures(), 5);

    tokio::time::advance(Duration::from_secs(31)).await;

    // 第一次探测成功后进入半开状态
    assert!(succeed(&breaker).await.is_ok());
    assert_eq!(breaker.state().as_str(), "half-open");
    assert_eq!(breaker.success_count(), 1);

    assert!(succeed(&breaker).await.is_ok());
    assert!(succeed(&breaker).await.is_ok());
    assert_eq!(breaker.state().as_str(), "closed");
    assert_eq!(breaker.failures(), 0);
    assert_eq!(breaker.success_count(), 0);
}

/// 测试打开状态下不调用被保护的操作
#[tokio::test]
async fn test_open_breaker_skips_operation() {
    let breaker = CircuitBreaker::new("redis", 3, Duration::from_secs(15));
    let invoked = AtomicU32::new(0);

    for _ in 0..3 {
        let _ = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::new("timeout"))
            })
            .await;
    }
    assert!(breaker.is_open());

    let result = breaker
        .call(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>(())
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_open());
    assert_eq!(err.to_string(), "circuit breaker is open for redis");
    assert_eq!(invoked.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.stats().rejected_calls, 1);
}

/// 测试操作错误原样透传
#[tokio::test]
async fn test_operation_error_passes_through() {
    let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));

    let err = breaker
        .call(|| async { Err::<(), _>(TestError::new("duplicate key")) })
        .await
        .unwrap_err();

    assert!(!err.is_open());
    assert_eq!(err.to_string(), "duplicate key");
    assert_eq!(err.into_operation_error(), Some(TestError::new("duplicate key")));
}

/// 测试半开状态下失败重新打开，且失败计数继续累加
#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens() {
    let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));
    fail_times(&breaker, 5).await;

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(succeed(&breaker).await.is_ok());
    assert!(breaker.is_half_open());

    fail_times(&breaker, 1).await;
    assert!(breaker.is_open());
    assert_eq!(breaker.failures(), 6);
    assert_eq!(breaker.success_count(), 0);

    // 新的失败时间重新开始计时
    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(succeed(&breaker).await.unwrap_err().is_open());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(succeed(&breaker).await.is_ok());
    assert!(breaker.is_half_open());
}

/// 测试重置总是回到初始状态
#[tokio::test(start_paused = true)]
async fn test_reset_from_every_state() {
    let breaker = CircuitBreaker::new("database", 2, Duration::from_secs(10));

    fail_times(&breaker, 1).await;
    breaker.reset();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);

    fail_times(&breaker, 2).await;
    assert!(breaker.is_open());
    breaker.reset();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);
    assert_eq!(breaker.success_count(), 0);

    fail_times(&breaker, 2).await;
    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(succeed(&breaker).await.is_ok());
    assert!(breaker.is_half_open());
    breaker.reset();
    assert!(breaker.is_closed());
    assert_eq!(breaker.success_count(), 0);

    // 重置后保留最后失败时间
    assert!(breaker.last_fail_time().is_some());
}

/// 测试默认模式下调用可以并发执行
#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_overlap() {
    let breaker = Arc::new(CircuitBreaker::new("database", 5, Duration::from_secs(30)));
    let max_in_flight = run_concurrent_calls(breaker.clone(), 8).await;

    assert!(max_in_flight > 1);
    assert_eq!(breaker.stats().total_calls, 8);
    assert!(breaker.is_closed());
}

/// 测试串行模式下同一时刻最多一个调用
#[tokio::test(start_paused = true)]
async fn test_serialized_calls_never_overlap() {
    let config = CircuitBreakerConfig::new(5, Duration::from_secs(30)).serialize_calls(true);
    let breaker = Arc::new(CircuitBreaker::with_config("database", config));
    let max_in_flight = run_concurrent_calls(breaker.clone(), 8).await;

    assert_eq!(max_in_flight, 1);
    assert_eq!(breaker.stats().total_calls, 8);
}

async fn run_concurrent_calls(breaker: Arc<CircuitBreaker>, tasks: usize) -> usize {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let breaker = breaker.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, TestError>(())
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    max_seen.load(Ordering::SeqCst)
}

/// 测试统计信息的序列化格式
#[tokio::test]
async fn test_stats_serialization() {
    let breaker = CircuitBreaker::new("database", 1, Duration::from_secs(30));
    fail_times(&breaker, 1).await;

    let json = serde_json::to_value(breaker.stats()).unwrap();
    assert_eq!(json["state"], "open");
    assert_eq!(json["failures"], 1);
    assert_eq!(json["success_count"], 0);
    assert!(json["last_failure"].is_string());
}

/// 测试串行模式下，排在失败探测之后的调用被拒绝且不执行操作
#[tokio::test(start_paused = true)]
async fn test_serialized_mode_admits_one_trial_call() {
    let config = CircuitBreakerConfig::new(1, Duration::from_secs(30)).serialize_calls(true);
    let breaker = Arc::new(CircuitBreaker::with_config("database", config));
    fail_times(&breaker, 1).await;
    assert!(breaker.is_open());

    tokio::time::advance(Duration::from_secs(31)).await;

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let first = {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            breaker
                .call(|| async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Err::<(), _>(TestError::new("still down"))
                })
                .await
        })
    };
    started_rx.await.unwrap();
    assert!(breaker.is_half_open());

    let invoked = Arc::new(AtomicU32::new(0));
    let second = {
        let breaker = breaker.clone();
        let invoked = invoked.clone();
        tokio::spawn(async move {
            breaker
                .call(|| async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                })
                .await
        })
    };

    let first = first.await.unwrap().unwrap_err();
    assert!(!first.is_open());

    let second = second.await.unwrap().unwrap_err();
    assert!(matches!(second, BreakerError::Open { .. }));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(breaker.is_open());
    assert_eq!(breaker.failures(), 2);
}

/// 测试调用在途时被丢弃不记录成功或失败
#[tokio::test(start_paused = true)]
async fn test_dropped_call_leaves_state_unchanged() {
    let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));

    fail_times(&breaker, 2).await;
    let dropped = tokio::time::timeout(
        Duration::from_secs(1),
        breaker.call(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err::<(), _>(TestError::new("slow failure"))
        }),
    )
    .await;
    assert!(dropped.is_err());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failures(), 2);

    // 半开状态下丢弃探测调用
    fail_times(&breaker, 3).await;
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(succeed(&breaker).await.is_ok());
    assert_eq!(breaker.success_count(), 1);

    let dropped = tokio::time::timeout(
        Duration::from_secs(1),
        breaker.call(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, TestError>(())
        }),
    )
    .await;
    assert!(dropped.is_err());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.success_count(), 1);
    assert_eq!(breaker.failures(), 5);
}
