//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器注册表
//!
//! 按依赖名称管理熔断器实例，供健康检查和管理接口统一查询状态、批量重置。
//! 注册表由调用方创建并注入，不存在全局实例。

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{CircuitBreakerStats, ResilonError};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "monitoring")]
use crate::telemetry::Metrics;

/// 熔断器注册表
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<Metrics>>,
}

impl BreakerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 为之后通过 [`get_or_insert`](Self::get_or_insert) 创建的熔断器挂载指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 获取或创建熔断器
    ///
    /// 名称已存在时返回已有实例，忽略传入的配置。
    pub fn get_or_insert(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(self.build(name, config)))
            .value()
            .clone()
    }

    #[cfg(feature = "monitoring")]
    fn build(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        let breaker = CircuitBreaker::with_config(name, config);
        match &self.metrics {
            Some(metrics) => breaker.with_metrics(metrics.clone()),
            None => breaker,
        }
    }

    #[cfg(not(feature = "monitoring"))]
    fn build(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::with_config(name, config)
    }

    /// 注册已有熔断器，返回被替换的同名实例
    pub fn insert(&self, breaker: Arc<CircuitBreaker>) -> Option<Arc<CircuitBreaker>> {
        self.breakers.insert(breaker.name().to_string(), breaker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    /// 已注册的名称（按字典序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// 所有熔断器的状态快照，按名称排序
    pub fn status(&self) -> BTreeMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// 重置指定熔断器
    pub fn reset(&self, name: &str) -> Result<(), ResilonError> {
        let breaker = self
            .get(name)
            .ok_or_else(|| ResilonError::NotFound(format!("熔断器 {}", name)))?;
        breaker.reset();
        Ok(())
    }

    /// 重置所有熔断器
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        info!(count = self.breakers.len(), "所有熔断器已重置");
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}
