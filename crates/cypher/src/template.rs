//! Cypher template contract
//!
//! A [`CypherTemplate`] is the strategy object for one algorithm family:
//! a matched `encrypt`/`decrypt` pair working on raw bytes. Templates
//! resolve their keys through a [`CypherContext`] at call time, so a
//! template instance is stateless and shared across all cyphers bound to
//! its algorithm.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use vaultline_keys::{KeyProvider, KeyReference, KeyVersion};

use crate::error::{CypherError, CypherResult};

/// An encrypted payload with its algorithm parameters
///
/// `iv` and `aad` are carried only when the algorithm needs them back at
/// decrypt time; algorithms with fixed defaults leave them `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CypherEncryption {
    /// The ciphertext
    pub secure_data: Vec<u8>,
    /// Initialization vector / nonce, when one was generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,
    /// Associated data bound into the ciphertext, when supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad: Option<Vec<u8>>,
}

/// Key resolution context handed to templates at call time
pub struct CypherContext<'a> {
    keys: &'a dyn KeyProvider,
}

impl<'a> CypherContext<'a> {
    /// Create a context over a key provider
    pub fn new(keys: &'a dyn KeyProvider) -> Self {
        Self { keys }
    }

    /// Resolve a key reference, failing when the key is absent
    ///
    /// # Errors
    /// Fails with the underlying [`vaultline_keys::KeyError`] when the
    /// path is unsupported, missing, or the provider fails.
    pub fn resolve(&self, reference: &KeyReference) -> CypherResult<Arc<KeyVersion>> {
        self.keys
            .resolve_key(reference)?
            .require(reference.path())
            .map_err(CypherError::from)
    }
}

/// Strategy object implementing encrypt/decrypt for one algorithm family
pub trait CypherTemplate: Send + Sync {
    /// Get the registered algorithm name
    fn algorithm(&self) -> &'static str;

    /// Encrypt a plaintext under the referenced key
    ///
    /// # Errors
    /// Fails when the key cannot be resolved, the material does not fit
    /// the algorithm, or the primitive rejects the parameters.
    fn encrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        plaintext: &[u8],
        iv: Option<&[u8]>,
        aad: Option<&[u8]>,
    ) -> CypherResult<CypherEncryption>;

    /// Decrypt a payload under the referenced key
    ///
    /// The returned buffer is zeroed when dropped.
    ///
    /// # Errors
    /// Fails when the key cannot be resolved or the payload fails
    /// authentication or decoding.
    fn decrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        payload: &CypherEncryption,
        aad: Option<&[u8]>,
    ) -> CypherResult<Zeroizing<Vec<u8>>>;
}
