//! Key resolution for Vaultline.
//!
//! Key material is addressed by hierarchical paths
//! (`<root>/<alias>[@<version>][/public|/private|/secret]`) and resolved
//! through a provider chain: keystore-backed providers hold the material,
//! a multiplexing provider routes by path prefix, a caching provider
//! keeps resolved handles alive for a TTL, and a framing provider tracks
//! which paths each unit of work touched so their cache entries can be
//! released by reference count when the work completes.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod frame;
pub mod keystore;
pub mod material;
pub mod provider;
pub mod reference;

// Re-export commonly used types for convenience
// ------------------------------
pub use error::{KeyError, KeyResult};
pub use frame::{FrameScope, FramedKeyProvider, KeyFrame};
pub use keystore::{Keystore, KeystoreProvider};
pub use material::{KeyAlgorithm, KeyMaterial, KeyVersion};
pub use provider::{
    provider_from_config, CachedKeyProvider, EnvKeyProvider, KeyProvider, MultiplexedKeyProvider,
    Resolution,
};
pub use reference::{join, KeyPathComponents, KeyReference, Visibility};
