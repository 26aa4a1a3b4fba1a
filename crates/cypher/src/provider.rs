//! Cypher dispatch
//!
//! [`CypherProvider`] resolves an algorithm name and a key reference
//! into an opaque [`Cypher`] facade. Callers holding a `Cypher` encrypt
//! and decrypt without ever seeing the algorithm or the key again;
//! [`StringCypher`] adds a base64 string form of the same contract.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use vaultline_keys::{KeyProvider, KeyReference};

use crate::error::{CypherError, CypherResult};
use crate::registry::CypherRegistry;
use crate::template::{CypherContext, CypherEncryption, CypherTemplate};

/// Binds algorithm names and key references into cypher facades
pub struct CypherProvider {
    registry: CypherRegistry,
    keys: Arc<dyn KeyProvider>,
}

impl CypherProvider {
    /// Create a provider over a registry and a key provider
    pub fn new(registry: CypherRegistry, keys: Arc<dyn KeyProvider>) -> Self {
        Self { registry, keys }
    }

    /// Bind an algorithm and key reference into a [`Cypher`]
    ///
    /// # Errors
    /// Fails with [`CypherError::UnsupportedAlgorithm`] when the
    /// algorithm is not registered.
    pub fn cypher(&self, algorithm: &str, reference: KeyReference) -> CypherResult<Cypher> {
        let template = self.registry.template(algorithm)?;
        Ok(Cypher { template, keys: Arc::clone(&self.keys), reference })
    }

    /// Bind an algorithm and key reference into a [`StringCypher`]
    ///
    /// # Errors
    /// Fails with [`CypherError::UnsupportedAlgorithm`] when the
    /// algorithm is not registered.
    pub fn string_cypher(
        &self,
        algorithm: &str,
        reference: KeyReference,
    ) -> CypherResult<StringCypher> {
        Ok(StringCypher { inner: self.cypher(algorithm, reference)? })
    }

    /// Get the registered algorithm names
    pub fn algorithms(&self) -> Vec<&str> {
        self.registry.algorithms()
    }
}

/// An algorithm bound to a key reference
///
/// The template and key are fixed at bind time; subsequent calls only
/// carry payloads.
#[derive(Clone)]
pub struct Cypher {
    template: Arc<dyn CypherTemplate>,
    keys: Arc<dyn KeyProvider>,
    reference: KeyReference,
}

impl Cypher {
    /// Get the bound algorithm name
    pub fn algorithm(&self) -> &str {
        self.template.algorithm()
    }

    /// Encrypt a plaintext
    ///
    /// # Errors
    /// Propagates key resolution and primitive failures.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        iv: Option<&[u8]>,
        aad: Option<&[u8]>,
    ) -> CypherResult<CypherEncryption> {
        let context = CypherContext::new(&*self.keys);
        self.template.encrypt(&context, &self.reference, plaintext, iv, aad)
    }

    /// Decrypt a payload into a zeroizing buffer
    ///
    /// # Errors
    /// Propagates key resolution and primitive failures.
    pub fn decrypt(
        &self,
        payload: &CypherEncryption,
        aad: Option<&[u8]>,
    ) -> CypherResult<Zeroizing<Vec<u8>>> {
        let context = CypherContext::new(&*self.keys);
        self.template.decrypt(&context, &self.reference, payload, aad)
    }
}

/// String form of a bound cypher
///
/// Payloads are serialized and carried as base64 text, which is the
/// shape configuration files and datastores want.
#[derive(Clone)]
pub struct StringCypher {
    inner: Cypher,
}

impl StringCypher {
    /// Get the bound algorithm name
    pub fn algorithm(&self) -> &str {
        self.inner.algorithm()
    }

    /// Encrypt a string into base64 payload text
    ///
    /// # Errors
    /// Propagates encryption failures.
    pub fn encrypt_string(&self, plaintext: &str) -> CypherResult<String> {
        let payload = self.inner.encrypt(plaintext.as_bytes(), None, None)?;
        let encoded = serde_json::to_vec(&payload)
            .map_err(|e| CypherError::Encrypt(format!("payload encoding failed: {e}")))?;
        Ok(BASE64.encode(encoded))
    }

    /// Decrypt base64 payload text into a zeroizing string
    ///
    /// # Errors
    /// Fails with [`CypherError::Malformed`] for undecodable payloads and
    /// propagates decryption failures.
    pub fn decrypt_string(&self, encrypted: &str) -> CypherResult<Zeroizing<String>> {
        let raw = BASE64
            .decode(encrypted)
            .map_err(|e| CypherError::Malformed(format!("payload is not base64: {e}")))?;
        let payload: CypherEncryption = serde_json::from_slice(&raw)
            .map_err(|e| CypherError::Malformed(format!("payload is not valid: {e}")))?;

        let bytes = self.inner.decrypt(&payload, None)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| CypherError::Decrypt("decrypted payload is not UTF-8".into()))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}
