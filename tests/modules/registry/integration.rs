//! 熔断器注册表集成测试

use crate::common::{fail_times, succeed};
use resilon::{BreakerRegistry, CircuitBreakerConfig, CircuitState, ResilienceConfig, ResilonError};
use std::sync::Arc;
use std::time::Duration;

/// 测试注册表与熔断器共享同一实例
#[tokio::test]
async fn test_registry_shares_breaker_instances() {
    let registry = Arc::new(BreakerRegistry::new());
    let config = CircuitBreakerConfig::new(10, Duration::from_secs(30));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let config = config.clone();
            tokio::spawn(async move {
                let breaker = registry.get_or_insert("database", config);
                fail_times(&breaker, 1).await;
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.len(), 1);
    let breaker = registry.get("database").unwrap();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 4);
}

/// 测试状态快照的 JSON 结构
#[tokio::test]
async fn test_status_json_shape() {
    let registry = ResilienceConfig::default().build_registry().unwrap();
    let database = registry.get("database").unwrap();
    fail_times(&database, 5).await;

    let status = serde_json::to_value(registry.status()).unwrap();
    assert_eq!(status["database"]["state"], "open");
    assert_eq!(status["database"]["failures"], 5);
    assert!(status["database"]["last_failure"].is_string());
    assert_eq!(status["redis"]["state"], "closed");
    assert!(status["redis"]["last_failure"].is_null());
}

/// 测试批量重置后所有熔断器恢复服务
#[tokio::test]
async fn test_reset_all_restores_service() {
    let registry = ResilienceConfig::default().build_registry().unwrap();
    for name in registry.names() {
        let breaker = registry.get(&name).unwrap();
        fail_times(&breaker, breaker.config().max_failures).await;
        assert!(succeed(&breaker).await.unwrap_err().is_open());
    }

    registry.reset_all();

    for (name, stats) in registry.status() {
        assert_eq!(stats.state, CircuitState::Closed, "{}", name);
        assert_eq!(stats.failures, 0);
        assert!(succeed(&registry.get(&name).unwrap()).await.is_ok());
    }
}

#[test]
fn test_reset_missing_breaker() {
    let registry = BreakerRegistry::new();
    assert!(matches!(
        registry.reset("database"),
        Err(ResilonError::NotFound(_))
    ));
}
