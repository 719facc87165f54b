//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for Resilon.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

// ============================================================================
// Circuit Breaker Constants
// ============================================================================

/// Default failure threshold for circuit breaker.
///
/// The circuit breaker transitions to open state after this many consecutive failures.
pub const DEFAULT_CIRCUIT_BREAKER_MAX_FAILURES: u32 = 5;

/// Default success threshold for circuit breaker half-open state.
///
/// The circuit breaker transitions to closed state after this many consecutive
/// successes in half-open state.
pub const DEFAULT_CIRCUIT_BREAKER_SUCCESS_THRESHOLD: u32 = 3;

/// Default reset timeout for circuit breaker (30 seconds).
///
/// How long the circuit breaker remains open before letting a probe through.
pub const DEFAULT_CIRCUIT_BREAKER_RESET_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Retry Constants
// ============================================================================

/// Default total number of attempts, including the first one.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry (500 milliseconds).
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Default upper bound for a single backoff delay (10 seconds).
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 10;

/// Default multiplicative growth of the delay per attempt.
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Jitter spread applied to a computed delay (±10%).
///
/// The actual delay is drawn uniformly from `[delay * (1 - r), delay * (1 + r)]`.
pub const RETRY_JITTER_RATIO: f64 = 0.1;

// ============================================================================
// Well-known Dependency Profiles
// ============================================================================

/// Breaker name used for the primary database.
pub const DATABASE_BREAKER: &str = "database";

/// Failure threshold for the database breaker.
pub const DATABASE_BREAKER_MAX_FAILURES: u32 = 5;

/// Reset timeout for the database breaker (30 seconds).
pub const DATABASE_BREAKER_RESET_TIMEOUT_SECS: u64 = 30;

/// Breaker name used for the cache.
pub const REDIS_BREAKER: &str = "redis";

/// Failure threshold for the cache breaker.
pub const REDIS_BREAKER_MAX_FAILURES: u32 = 3;

/// Reset timeout for the cache breaker (15 seconds).
pub const REDIS_BREAKER_RESET_TIMEOUT_SECS: u64 = 15;

/// Retry policy name for establishing the database connection.
pub const MYSQL_CONNECTION_POLICY: &str = "mysql-connection";

/// Retry policy name for establishing the cache connection.
pub const REDIS_CONNECTION_POLICY: &str = "redis-connection";
