//! 配置文件集成测试
//!
//! 从磁盘加载配置，构建注册表和重试执行器

use crate::common::FlakyDependency;
use resilon::{ResilienceConfig, RetryExecutor};
use std::time::Duration;

const YAML: &str = r#"
breakers:
  - name: database
    max_failures: 5
    reset_timeout: 30s
  - name: redis
    max_failures: 3
    reset_timeout: 15s
    serialize_calls: true
retry_policies:
  mysql-connection:
    max_attempts: 5
    base_delay: 1s
    max_delay: 30s
    backoff_factor: 2.0
    jitter: true
  redis-connection:
    max_attempts: 3
    base_delay: 500ms
    max_delay: 10s
"#;

#[tokio::test]
async fn test_yaml_file_builds_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resilience.yaml");
    tokio::fs::write(&path, YAML).await.unwrap();

    let config = ResilienceConfig::load(&path).await.unwrap();
    let registry = config.build_registry().unwrap();

    assert_eq!(registry.names(), vec!["database", "redis"]);
    let redis = registry.get("redis").unwrap();
    assert!(redis.config().serialize_calls);
    assert_eq!(redis.config().reset_timeout, Duration::from_secs(15));
}

#[tokio::test]
async fn test_toml_and_json_match_yaml() {
    let yaml = ResilienceConfig::from_yaml_str(YAML).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let json_path = dir.path().join("resilience.json");
    tokio::fs::write(&json_path, serde_json::to_string_pretty(&yaml).unwrap())
        .await
        .unwrap();
    assert_eq!(ResilienceConfig::load(&json_path).await.unwrap(), yaml);

    let toml_path = dir.path().join("resilience.toml");
    tokio::fs::write(&toml_path, toml::to_string(&yaml).unwrap())
        .await
        .unwrap();
    assert_eq!(ResilienceConfig::load(&toml_path).await.unwrap(), yaml);
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_from_file() {
    let config = ResilienceConfig::from_yaml_str(YAML).unwrap();
    let policy = config.retry_config("redis-connection").unwrap();
    assert!(policy.jitter);

    let dependency = FlakyDependency::new(1);
    let executor = RetryExecutor::new("redis-connection", policy);
    assert_eq!(executor.run(|| dependency.connect()).await.unwrap(), "PONG");
    assert_eq!(dependency.calls(), 2);
}
