//! Key provider chain
//!
//! [`KeyProvider`] is the seam every resolution flows through. Providers
//! answer with a tagged [`Resolution`] rather than mixing "no such key"
//! into the error channel: `NotFound` and `Unsupported` are ordinary
//! outcomes, and only provider failures (bad keystores, malformed paths)
//! are errors.
//!
//! The chain assembled by [`provider_from_config`] is
//! `Framed(Cached(Multiplexed([Keystore...])))`: the multiplexer routes
//! by path prefix, the cache keeps resolved handles alive for a TTL, and
//! the framing layer (see [`crate::frame`]) reference-counts per-path
//! usage across units of work.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};
use vaultline_common::cache::MemoryCache;
use vaultline_common::config::{ConfigError, Configuration};

use crate::error::{KeyError, KeyResult};
use crate::frame::FramedKeyProvider;
use crate::keystore::{path_in_root, KeystoreProvider};
use crate::material::{KeyAlgorithm, KeyMaterial, KeyVersion};
use crate::reference::{KeyPathComponents, KeyReference};

/// Default TTL for cached key handles
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(300);

/// Outcome of a key resolution
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The provider resolved the reference
    Found(Arc<KeyVersion>),
    /// The provider owns the path but has no matching alias/version
    NotFound,
    /// The path is outside every provider's root
    Unsupported,
}

impl Resolution {
    /// Unwrap a resolution that must have succeeded
    ///
    /// # Errors
    /// Converts `NotFound` and `Unsupported` into the corresponding
    /// [`KeyError`] naming the requested path.
    pub fn require(self, path: &str) -> KeyResult<Arc<KeyVersion>> {
        match self {
            Self::Found(version) => Ok(version),
            Self::NotFound => Err(KeyError::NotFound(path.to_string())),
            Self::Unsupported => Err(KeyError::Unsupported(path.to_string())),
        }
    }

    /// Check whether the resolution found a key
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A source of key material addressed by path
pub trait KeyProvider: Send + Sync {
    /// Check whether this provider serves the reference's path
    fn supports(&self, reference: &KeyReference) -> bool;

    /// Resolve a reference to key material
    ///
    /// # Errors
    /// Fails only for provider-level problems; missing keys are reported
    /// through [`Resolution`].
    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution>;
}

/// Routes resolutions to the first provider supporting the path
pub struct MultiplexedKeyProvider {
    providers: Vec<Arc<dyn KeyProvider>>,
}

impl MultiplexedKeyProvider {
    /// Create a multiplexer over an ordered provider list
    pub fn new(providers: Vec<Arc<dyn KeyProvider>>) -> Self {
        Self { providers }
    }
}

impl KeyProvider for MultiplexedKeyProvider {
    fn supports(&self, reference: &KeyReference) -> bool {
        self.providers.iter().any(|p| p.supports(reference))
    }

    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        for provider in &self.providers {
            if provider.supports(reference) {
                return provider.resolve_key(reference);
            }
        }
        trace!(path = reference.path(), "no provider supports path");
        Ok(Resolution::Unsupported)
    }
}

/// Resolves a path prefix to secret bytes held in an environment variable
///
/// The variable holds base64 of the raw key bytes and is treated as the
/// single version (`@1`) of its alias. Intended for test and operational
/// wiring where a keystore file is overkill.
pub struct EnvKeyProvider {
    root: String,
    variable: String,
    algorithm: KeyAlgorithm,
}

impl EnvKeyProvider {
    /// Create a provider serving `root` from the given environment variable
    pub fn new(
        root: impl Into<String>,
        variable: impl Into<String>,
        algorithm: KeyAlgorithm,
    ) -> Self {
        Self { root: root.into(), variable: variable.into(), algorithm }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn supports(&self, reference: &KeyReference) -> bool {
        path_in_root(reference.path(), &self.root)
    }

    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        if !self.supports(reference) {
            return Ok(Resolution::Unsupported);
        }

        let components = KeyPathComponents::parse(reference.path())?;
        if components.is_versioned() && components.version() != 1 {
            return Ok(Resolution::NotFound);
        }

        let Ok(encoded) = std::env::var(&self.variable) else {
            return Ok(Resolution::NotFound);
        };
        let bytes = {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            STANDARD.decode(encoded.trim()).map_err(|e| {
                KeyError::InvalidMaterial(format!(
                    "environment variable '{}' is not base64: {e}",
                    self.variable
                ))
            })?
        };

        debug!(path = reference.path(), variable = %self.variable, "resolved key from environment");
        Ok(Resolution::Found(Arc::new(KeyVersion::new(
            components.version_path(1),
            KeyMaterial::Secret { algorithm: self.algorithm, bytes },
        ))))
    }
}

/// Caches resolved key handles in front of another provider
///
/// Lookups hit the TTL cache first; misses delegate under a single
/// provider-wide lock so concurrent resolutions of the same path do one
/// underlying load. Eviction drops the cache's `Arc`, and the material is
/// zeroed when the last holder releases the handle.
pub struct CachedKeyProvider {
    inner: Arc<dyn KeyProvider>,
    cache: MemoryCache<Arc<KeyVersion>>,
    resolve_lock: Mutex<()>,
}

impl CachedKeyProvider {
    /// Wrap a provider with a TTL cache
    pub fn new(inner: Arc<dyn KeyProvider>, ttl: Duration) -> Self {
        let cache = MemoryCache::new(ttl).on_eviction(|path, _version: &Arc<KeyVersion>| {
            debug!(path, "cached key evicted");
        });
        Self { inner, cache, resolve_lock: Mutex::new(()) }
    }

    /// Evict a cached resolution by its cache key
    ///
    /// Used by frames when a path's reference count reaches zero.
    pub fn evict(&self, cache_key: &str) -> bool {
        self.cache.evict(cache_key)
    }

    /// Check whether a cache key currently holds a live entry
    pub fn is_cached(&self, cache_key: &str) -> bool {
        self.cache.get(cache_key).is_some()
    }
}

impl KeyProvider for CachedKeyProvider {
    fn supports(&self, reference: &KeyReference) -> bool {
        self.inner.supports(reference)
    }

    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        let cache_key = KeyPathComponents::parse(reference.path())?.cache_key();

        if let Some(version) = self.cache.get(&cache_key) {
            trace!(path = reference.path(), "key cache hit");
            return Ok(Resolution::Found(version));
        }

        let _guard = self.resolve_lock.lock();
        if let Some(version) = self.cache.get(&cache_key) {
            return Ok(Resolution::Found(version));
        }

        match self.inner.resolve_key(reference)? {
            Resolution::Found(version) => {
                let _ = self.cache.add(cache_key, Arc::clone(&version));
                Ok(Resolution::Found(version))
            }
            other => Ok(other),
        }
    }
}

/// Assemble the provider chain from configuration
///
/// Builds one [`KeystoreProvider`] per `key-service.keystores.<name>`
/// entry, multiplexes them, wraps the result in a cache (TTL is the
/// smallest configured `cachedKeyTTL`, default 300s), and puts the
/// framing layer on top (`key-service.requireFrame`, default false).
///
/// # Errors
/// Fails when no keystores are configured or any keystore cannot load.
pub fn provider_from_config(config: &dyn Configuration) -> KeyResult<Arc<FramedKeyProvider>> {
    let names = config.child_names("key-service.keystores");
    if names.is_empty() {
        return Err(ConfigError::Missing("key-service.keystores".to_string()).into());
    }

    let mut ttl = DEFAULT_KEY_TTL;
    let mut providers: Vec<Arc<dyn KeyProvider>> = Vec::with_capacity(names.len());
    for name in &names {
        let provider = KeystoreProvider::from_config(name, config)?;
        let ttl_key = format!("key-service.keystores.{name}.cachedKeyTTL");
        ttl = ttl.min(config.get_duration_or(&ttl_key, DEFAULT_KEY_TTL));
        providers.push(Arc::new(provider));
    }

    let multiplexed = Arc::new(MultiplexedKeyProvider::new(providers));
    let cached = Arc::new(CachedKeyProvider::new(multiplexed, ttl));
    let require_frame = config.get_bool_or("key-service.requireFrame", false);
    Ok(FramedKeyProvider::new(cached, require_frame))
}
