//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Resilon - Circuit Breaker and Retry Primitives
//!
//! Guards calls to unreliable dependencies (databases, caches, remote services)
//! with a three-state circuit breaker and a retry executor using exponential
//! backoff with jitter.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use resilon::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`CircuitBreaker`] - Closed / Open / HalfOpen state machine around a fallible call
//! - [`RetryExecutor`] - Re-runs a fallible operation with bounded exponential backoff
//! - [`BreakerRegistry`] - Named breakers for status reporting and bulk reset
//! - [`ResilienceConfig`] - Breakers and retry policies loaded from YAML, TOML or JSON
//!
//! ## Extensions (feature-gated)
//!
//! - Log initialisation (requires `telemetry` feature)
//! - Prometheus metrics (requires `monitoring` feature)
//!
//! # Examples
//!
//! ```rust
//! use resilon::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let breaker = CircuitBreaker::new("database", 5, Duration::from_secs(30));
//!     let retry = RetryExecutor::new("query", RetryConfig::new(3, Duration::from_millis(10)));
//!
//!     let value = retry
//!         .run_if(
//!             || breaker.call(|| async { Ok::<_, std::io::Error>(42) }),
//!             |e: &BreakerError<std::io::Error>| !e.is_open(),
//!         )
//!         .await
//!         .unwrap();
//!     assert_eq!(value, 42);
//! }
//! ```

pub mod prelude;

pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod error;
pub mod registry;
pub mod retry;

#[cfg(any(feature = "telemetry", feature = "monitoring"))]
pub mod telemetry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use config::{parse_duration, BreakerSettings, ResilienceConfig, RetrySettings};
pub use error::{BreakerError, CircuitBreakerStats, CircuitState, ResilonError, RetryError};
pub use registry::BreakerRegistry;
pub use retry::{with_retry, RetryConfig, RetryExecutor};

#[cfg(feature = "monitoring")]
pub use telemetry::Metrics;

#[cfg(feature = "telemetry")]
pub use telemetry::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
