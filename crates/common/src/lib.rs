//! Shared infrastructure for the Vaultline crates.
//!
//! This crate carries the pieces every Vaultline service leans on: the
//! error classification system, the configuration collaborator, the clock
//! abstraction, the TTL memory cache, the service lifecycle state machine,
//! and the zeroizing secure string.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod secure;
pub mod time;

// Re-export commonly used types for convenience
// ------------------------------
pub use cache::{CacheError, MemoryCache};
pub use config::{ConfigError, ConfigResult, Configuration, MapConfiguration};
pub use error::{ErrorClassification, ErrorSeverity};
pub use lifecycle::{InitScope, ServiceLifecycle, ServiceState, StateError};
pub use secure::SecureString;
pub use time::{Clock, MockClock, SystemClock};
