//! ChaCha20-Poly1305 AEAD stream template

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use zeroize::Zeroizing;

use vaultline_keys::{KeyAlgorithm, KeyReference};

use crate::error::{CypherError, CypherResult};
use crate::template::{CypherContext, CypherEncryption, CypherTemplate};

/// Zero nonce used when the caller supplies no IV
///
/// Safe only because conceal-style callers encrypt each payload under a
/// fresh salt and the envelope carries no cross-payload structure;
/// callers encrypting many payloads under one key should pass explicit
/// nonces.
const DEFAULT_NONCE: [u8; 12] = [0u8; 12];

/// AEAD stream template registered as `chacha20-poly1305`
///
/// The IV defaults to 12 zero bytes when not supplied, and only a
/// caller-supplied IV is echoed in the payload. Associated data is
/// optional.
#[derive(Debug, Default)]
pub struct ChaCha20Poly1305Cypher;

impl ChaCha20Poly1305Cypher {
    fn cipher(context: &CypherContext<'_>, key: &KeyReference) -> CypherResult<ChaCha20Poly1305> {
        let version = context.resolve(key)?;
        let material = version.material();
        if material.algorithm() != KeyAlgorithm::ChaCha20 {
            return Err(CypherError::InvalidKey(format!(
                "chacha20-poly1305 requires a chacha20 key, got {}",
                material.algorithm()
            )));
        }
        let bytes = material.secret_bytes().ok_or_else(|| {
            CypherError::InvalidKey("chacha20-poly1305 requires secret material".into())
        })?;
        ChaCha20Poly1305::new_from_slice(bytes)
            .map_err(|_| CypherError::InvalidKey("chacha20-poly1305 requires a 32-byte key".into()))
    }

    fn nonce_from(iv: Option<&[u8]>) -> CypherResult<[u8; 12]> {
        match iv {
            None => Ok(DEFAULT_NONCE),
            Some(iv) => iv.try_into().map_err(|_| {
                CypherError::invalid_argument("chacha20-poly1305 iv must be 12 bytes")
            }),
        }
    }
}

impl CypherTemplate for ChaCha20Poly1305Cypher {
    fn algorithm(&self) -> &'static str {
        "chacha20-poly1305"
    }

    fn encrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        plaintext: &[u8],
        iv: Option<&[u8]>,
        aad: Option<&[u8]>,
    ) -> CypherResult<CypherEncryption> {
        let cipher = Self::cipher(context, key)?;
        let nonce = Self::nonce_from(iv)?;

        let payload = Payload { msg: plaintext, aad: aad.unwrap_or_default() };
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| CypherError::Encrypt("chacha20-poly1305 encryption failed".into()))?;

        Ok(CypherEncryption {
            secure_data: ciphertext,
            iv: iv.map(<[u8]>::to_vec),
            aad: aad.map(<[u8]>::to_vec),
        })
    }

    fn decrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        payload: &CypherEncryption,
        aad: Option<&[u8]>,
    ) -> CypherResult<Zeroizing<Vec<u8>>> {
        let cipher = Self::cipher(context, key)?;
        let nonce = Self::nonce_from(payload.iv.as_deref())?;

        let aad = aad.or(payload.aad.as_deref()).unwrap_or_default();
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: &payload.secure_data, aad })
            .map_err(|_| {
                CypherError::Decrypt(
                    "chacha20-poly1305 authentication failed or payload corrupted".into(),
                )
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}
