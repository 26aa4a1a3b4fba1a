//! Key frames: scoped, reference-counted key usage
//!
//! A [`KeyFrame`] is a scoped unit of work that records which key paths
//! were resolved during its lifetime. Closing the frame (explicitly or by
//! drop) decrements a shared per-path count; a count reaching zero evicts
//! that path from the key cache, so key handles live exactly as long as
//! some unit of work is using them (or the cache TTL, for frameless
//! resolutions).
//!
//! Frames are explicit values: the caller creates a [`FrameScope`] per
//! logical unit of work, opens at most one frame on it at a time, and
//! resolves keys through the frame handle. There is no thread-local
//! "current frame".
//!
//! The per-path counts are global across all frames of one
//! [`FramedKeyProvider`]. When overlapping frames from different scopes
//! touch the same path, the close that drives the count to zero evicts
//! the path even if another open frame conceptually still uses it; the
//! evicted handle stays usable by its holders (material is zeroed when
//! the last `Arc` drops), but the next resolution reloads it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{KeyError, KeyResult};
use crate::provider::{CachedKeyProvider, KeyProvider, Resolution};
use crate::reference::{KeyPathComponents, KeyReference};

/// One logical unit of work, on which at most one frame may be open
#[derive(Debug, Default)]
pub struct FrameScope {
    active: AtomicBool,
}

impl FrameScope {
    /// Create a scope with no open frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a frame is currently open on this scope
    pub fn has_open_frame(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> bool {
        self.active.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Framing layer over the cached key provider
///
/// Implements [`KeyProvider`] for frameless resolutions (rejected when
/// `require_frame` is set); framed resolutions go through
/// [`KeyFrame::resolve_key`].
pub struct FramedKeyProvider {
    cached: Arc<CachedKeyProvider>,
    counts: Mutex<HashMap<String, usize>>,
    require_frame: bool,
}

impl FramedKeyProvider {
    /// Create the framing layer over a cached provider
    pub fn new(cached: Arc<CachedKeyProvider>, require_frame: bool) -> Arc<Self> {
        Arc::new(Self { cached, counts: Mutex::new(HashMap::new()), require_frame })
    }

    /// Check whether frameless resolutions are rejected
    pub fn requires_frame(&self) -> bool {
        self.require_frame
    }

    /// Open a frame on a scope
    ///
    /// # Errors
    /// Fails with [`KeyError::FrameAlreadyOpen`] when the scope already
    /// has an open frame.
    pub fn open_frame<'scope>(
        self: &Arc<Self>,
        scope: &'scope FrameScope,
    ) -> KeyResult<KeyFrame<'scope>> {
        if !scope.try_acquire() {
            return Err(KeyError::FrameAlreadyOpen);
        }
        let id = Uuid::new_v4();
        debug!(frame = %id, "key frame opened");
        Ok(KeyFrame {
            id,
            provider: Arc::clone(self),
            scope,
            touched: Mutex::new(HashSet::new()),
            closed: false,
        })
    }

    /// Get the current reference count for a cache key
    pub fn reference_count(&self, cache_key: &str) -> usize {
        self.counts.lock().get(cache_key).copied().unwrap_or(0)
    }

    /// Get the underlying cached provider
    pub fn cached(&self) -> &CachedKeyProvider {
        &self.cached
    }

    fn increment(&self, cache_key: &str) {
        *self.counts.lock().entry(cache_key.to_string()).or_insert(0) += 1;
    }

    fn release_paths(&self, frame: Uuid, touched: HashSet<String>) {
        let mut to_evict = Vec::new();
        {
            let mut counts = self.counts.lock();
            for path in touched {
                match counts.get_mut(&path) {
                    Some(count) if *count > 1 => *count -= 1,
                    Some(_) => {
                        counts.remove(&path);
                        to_evict.push(path);
                    }
                    None => {}
                }
            }
        }
        // Evictions happen outside the counts lock; the cache callback
        // must never contend with frame bookkeeping.
        for path in to_evict {
            debug!(frame = %frame, path = %path, "frame released last reference, evicting key");
            self.cached.evict(&path);
        }
    }
}

impl KeyProvider for FramedKeyProvider {
    fn supports(&self, reference: &KeyReference) -> bool {
        self.cached.supports(reference)
    }

    /// Frameless resolution
    ///
    /// # Errors
    /// Fails with [`KeyError::FrameRequired`] when the provider is
    /// configured to require an open frame.
    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        if self.require_frame {
            return Err(KeyError::FrameRequired);
        }
        self.cached.resolve_key(reference)
    }
}

/// An open frame: records resolved paths until closed
///
/// Closing (or dropping) the frame decrements every touched path's
/// shared reference count and releases the scope for the next frame.
pub struct KeyFrame<'scope> {
    id: Uuid,
    provider: Arc<FramedKeyProvider>,
    scope: &'scope FrameScope,
    touched: Mutex<HashSet<String>>,
    closed: bool,
}

impl KeyFrame<'_> {
    /// Get the frame id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resolve a key within this frame
    ///
    /// A successful resolution records the path in the frame; each frame
    /// counts a path once no matter how many times it resolves it.
    ///
    /// # Errors
    /// Propagates provider failures; missing keys are reported through
    /// [`Resolution`].
    pub fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        let cache_key = KeyPathComponents::parse(reference.path())?.cache_key();
        let resolution = self.provider.cached.resolve_key(reference)?;

        if resolution.is_found() {
            let newly_touched = self.touched.lock().insert(cache_key.clone());
            if newly_touched {
                self.provider.increment(&cache_key);
            }
        }
        Ok(resolution)
    }

    /// Close the frame, releasing its key references
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let touched = std::mem::take(&mut *self.touched.lock());
        self.provider.release_paths(self.id, touched);
        self.scope.release();
        debug!(frame = %self.id, "key frame closed");
    }
}

impl Drop for KeyFrame<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for frame.
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::material::{KeyAlgorithm, KeyMaterial, KeyVersion};
    use crate::provider::DEFAULT_KEY_TTL;

    /// Stub provider that always resolves, counting underlying loads.
    struct CountingProvider {
        loads: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self { loads: AtomicUsize::new(0) }
        }
    }

    impl KeyProvider for CountingProvider {
        fn supports(&self, _reference: &KeyReference) -> bool {
            true
        }

        fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let components = KeyPathComponents::parse(reference.path())?;
            Ok(Resolution::Found(Arc::new(KeyVersion::new(
                components.version_path(1),
                KeyMaterial::Secret { algorithm: KeyAlgorithm::Aes, bytes: vec![1; 32] },
            ))))
        }
    }

    fn framed(require_frame: bool) -> (Arc<FramedKeyProvider>, Arc<CountingProvider>) {
        let inner = Arc::new(CountingProvider::new());
        let cached = Arc::new(CachedKeyProvider::new(
            Arc::clone(&inner) as Arc<dyn KeyProvider>,
            DEFAULT_KEY_TTL,
        ));
        (FramedKeyProvider::new(cached, require_frame), inner)
    }

    /// Validates `FramedKeyProvider::open_frame` behavior for the one frame
    /// per scope scenario.
    ///
    /// Assertions:
    /// - Ensures a second open on the same scope fails while the first
    ///   frame is open.
    /// - Ensures the scope can open a new frame after close.
    #[test]
    fn test_one_frame_per_scope() {
        let (provider, _) = framed(false);
        let scope = FrameScope::new();

        let frame = provider.open_frame(&scope).unwrap();
        assert!(scope.has_open_frame());
        assert!(matches!(provider.open_frame(&scope), Err(KeyError::FrameAlreadyOpen)));

        frame.close();
        assert!(!scope.has_open_frame());
        let reopened = provider.open_frame(&scope).unwrap();
        reopened.close();
    }

    /// Validates `KeyFrame` drop behavior for the implicit release scenario.
    ///
    /// Assertions:
    /// - Ensures dropping an unclosed frame releases the scope.
    #[test]
    fn test_drop_releases_scope() {
        let (provider, _) = framed(false);
        let scope = FrameScope::new();

        {
            let _frame = provider.open_frame(&scope).unwrap();
            assert!(scope.has_open_frame());
        }
        assert!(!scope.has_open_frame());
    }

    /// Validates `KeyFrame::close` behavior for the eviction at zero count
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the resolved path is cached while the frame is open.
    /// - Confirms closing the frame evicts the path.
    #[test]
    fn test_close_evicts_at_zero() {
        let (provider, inner) = framed(false);
        let scope = FrameScope::new();
        let reference = KeyReference::new("apps/db@1");

        let frame = provider.open_frame(&scope).unwrap();
        frame.resolve_key(&reference).unwrap().require("apps/db@1").unwrap();
        assert_eq!(provider.reference_count("apps/db@1"), 1);
        assert!(provider.cached().is_cached("apps/db@1"));

        frame.close();
        assert_eq!(provider.reference_count("apps/db@1"), 0);
        assert!(!provider.cached().is_cached("apps/db@1"));

        // Next resolution reloads from the underlying provider
        let scope = FrameScope::new();
        let frame = provider.open_frame(&scope).unwrap();
        frame.resolve_key(&reference).unwrap();
        assert_eq!(inner.loads.load(Ordering::SeqCst), 2);
        frame.close();
    }

    /// Validates shared reference counts across sibling frames.
    ///
    /// A path resolved twice within one frame and once in a sibling frame
    /// is only evicted once the count reaches zero across both.
    ///
    /// Assertions:
    /// - Confirms duplicate resolutions within a frame count once.
    /// - Confirms the path stays cached until the last frame closes.
    #[test]
    fn test_sibling_frames_share_counts() {
        let (provider, inner) = framed(false);
        let scope_a = FrameScope::new();
        let scope_b = FrameScope::new();
        let reference = KeyReference::new("apps/shared@1");

        let frame_a = provider.open_frame(&scope_a).unwrap();
        frame_a.resolve_key(&reference).unwrap();
        frame_a.resolve_key(&reference).unwrap(); // duplicate within the frame
        assert_eq!(provider.reference_count("apps/shared@1"), 1);

        let frame_b = provider.open_frame(&scope_b).unwrap();
        frame_b.resolve_key(&reference).unwrap();
        assert_eq!(provider.reference_count("apps/shared@1"), 2);
        assert_eq!(inner.loads.load(Ordering::SeqCst), 1); // cache hit for the siblings

        frame_b.close();
        assert_eq!(provider.reference_count("apps/shared@1"), 1);
        assert!(provider.cached().is_cached("apps/shared@1"));

        frame_a.close();
        assert_eq!(provider.reference_count("apps/shared@1"), 0);
        assert!(!provider.cached().is_cached("apps/shared@1"));
    }

    /// Validates `FramedKeyProvider` behavior for the require-frame
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures frameless resolution fails with `KeyError::FrameRequired`.
    /// - Ensures framed resolution succeeds on the same provider.
    #[test]
    fn test_require_frame() {
        let (provider, _) = framed(true);
        let reference = KeyReference::new("apps/db@1");

        assert!(matches!(provider.resolve_key(&reference), Err(KeyError::FrameRequired)));

        let scope = FrameScope::new();
        let frame = provider.open_frame(&scope).unwrap();
        assert!(frame.resolve_key(&reference).unwrap().is_found());
        frame.close();
    }

    /// Validates `FramedKeyProvider` frameless resolution for the optional
    /// frame scenario.
    ///
    /// Assertions:
    /// - Confirms frameless resolutions work and take no references.
    #[test]
    fn test_frameless_resolution_takes_no_references() {
        let (provider, _) = framed(false);
        let reference = KeyReference::new("apps/db@1");

        assert!(provider.resolve_key(&reference).unwrap().is_found());
        assert_eq!(provider.reference_count("apps/db@1"), 0);
        assert!(provider.cached().is_cached("apps/db@1"));
    }
}
