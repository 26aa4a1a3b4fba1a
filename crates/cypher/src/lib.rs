//! Envelope encryption, signing, and password hashing for Vaultline.
//!
//! The crate is organized around three layers:
//!
//! - **Templates** ([`template`], [`templates`], [`registry`]): one
//!   strategy object per algorithm family, bound by name through an
//!   explicit registration table.
//! - **Dispatch** ([`provider`]): resolves an algorithm name plus a key
//!   reference into an opaque [`provider::Cypher`] facade.
//! - **Facade** ([`service`]): the [`service::CypherService`] ties
//!   configuration, the key provider chain, concealed strings, hash
//!   cyphers, and endorsers together behind the shared lifecycle state
//!   machine.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod concealed;
pub mod endorser;
pub mod error;
pub mod hash;
pub mod keygen;
pub mod provider;
pub mod random;
pub mod registry;
pub mod service;
pub mod spec;
pub mod template;
pub mod templates;

// Re-export commonly used types for convenience
// ------------------------------
pub use concealed::{ConcealedString, CONCEAL_SALT_LENGTH, MAX_CONCEALED_CHARS, MIN_SALT_LENGTH};
pub use endorser::Endorser;
pub use error::{CypherError, CypherResult};
pub use hash::HashCypher;
pub use keygen::{generate_key, GeneratedKey};
pub use provider::{Cypher, CypherProvider, StringCypher};
pub use random::{OsRandom, RandomSource};
pub use registry::CypherRegistry;
pub use service::CypherService;
pub use spec::{CypherSpecification, KeyDescriptor};
pub use template::{CypherContext, CypherEncryption, CypherTemplate};
