//! TTL memory cache with eviction callbacks
//!
//! This module provides the keyed, time-bounded cache the key-resolution
//! chain stores resolved key handles in. See [`MemoryCache`].

mod core;

pub use self::core::{CacheError, EvictionCallback, MemoryCache};
