//! Cypher specifications
//!
//! A cypher specification names the algorithm for a configured cypher;
//! a key descriptor names the key family and size a key slot expects.
//! Named cyphers live under `cypher.cyphers.<name>.*` in configuration.

use vaultline_common::config::Configuration;
use vaultline_keys::{KeyAlgorithm, KeyReference};

use crate::error::CypherResult;

/// Algorithm selection for a named cypher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CypherSpecification {
    /// Registered algorithm name (e.g. `aes-256-gcm`)
    pub algorithm: String,
}

impl CypherSpecification {
    /// Load a named cypher specification and its key reference
    ///
    /// Reads `cypher.cyphers.<name>.algorithm` (required) and
    /// `cypher.cyphers.<name>.keyPath` (optional for keyless algorithms
    /// such as `clear`).
    ///
    /// # Errors
    /// Fails when the algorithm property is missing.
    pub fn load(
        config: &dyn Configuration,
        name: &str,
    ) -> CypherResult<(Self, KeyReference)> {
        let prefix = format!("cypher.cyphers.{name}");
        let algorithm = config.get_string(&format!("{prefix}.algorithm"))?;
        let key_path = config.get_string_or(&format!("{prefix}.keyPath"), "");
        Ok((Self { algorithm }, KeyReference::new(key_path)))
    }
}

/// Key family and size a key slot expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Algorithm family of the key
    pub key_algorithm: KeyAlgorithm,
    /// Key size in bits (modulus size for RSA)
    pub key_size: usize,
}

impl KeyDescriptor {
    /// Create a key descriptor
    pub fn new(key_algorithm: KeyAlgorithm, key_size: usize) -> Self {
        Self { key_algorithm, key_size }
    }
}
