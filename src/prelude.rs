//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Resilon,
//! allowing users to import them with a single `use resilon::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use crate::config::ResilienceConfig;
pub use crate::error::{BreakerError, CircuitState, ResilonError, RetryError};
pub use crate::registry::BreakerRegistry;
pub use crate::retry::{with_retry, RetryConfig, RetryExecutor};

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::telemetry::Metrics;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{init_logging, LoggingConfig};
