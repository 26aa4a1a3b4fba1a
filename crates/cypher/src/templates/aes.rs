//! AES-256-GCM symmetric template

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use vaultline_keys::{KeyAlgorithm, KeyReference};

use crate::error::{CypherError, CypherResult};
use crate::template::{CypherContext, CypherEncryption, CypherTemplate};

/// Authenticated symmetric template registered as `aes-256-gcm`
///
/// A random 96-bit nonce is generated per encryption unless the caller
/// supplies one; the nonce rides in [`CypherEncryption::iv`].
#[derive(Debug, Default)]
pub struct AesGcmCypher;

impl AesGcmCypher {
    fn cipher(context: &CypherContext<'_>, key: &KeyReference) -> CypherResult<Aes256Gcm> {
        let version = context.resolve(key)?;
        let material = version.material();
        if material.algorithm() != KeyAlgorithm::Aes {
            return Err(CypherError::InvalidKey(format!(
                "aes-256-gcm requires an aes key, got {}",
                material.algorithm()
            )));
        }
        let bytes = material
            .secret_bytes()
            .ok_or_else(|| CypherError::InvalidKey("aes-256-gcm requires secret material".into()))?;
        Aes256Gcm::new_from_slice(bytes)
            .map_err(|_| CypherError::InvalidKey("aes-256-gcm requires a 32-byte key".into()))
    }

    fn nonce_from(iv: &[u8]) -> CypherResult<[u8; 12]> {
        iv.try_into()
            .map_err(|_| CypherError::invalid_argument("aes-256-gcm iv must be 12 bytes"))
    }
}

impl CypherTemplate for AesGcmCypher {
    fn algorithm(&self) -> &'static str {
        "aes-256-gcm"
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
        let nonce = match iv {
            Some(iv) => Self::nonce_from(iv)?,
            None => {
                let mut nonce = [0u8; 12];
                OsRng.fill_bytes(&mut nonce);
                nonce
            }
        };

        let payload = Payload { msg: plaintext, aad: aad.unwrap_or_default() };
        let ciphertext = cipher
            .encrypt(&Nonce::from(nonce), payload)
            .map_err(|_| CypherError::Encrypt("aes-256-gcm encryption failed".into()))?;

        Ok(CypherEncryption {
            secure_data: ciphertext,
            iv: Some(nonce.to_vec()),
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
        let iv = payload
            .iv
            .as_deref()
            .ok_or_else(|| CypherError::Malformed("aes-256-gcm payload has no iv".into()))?;
        let nonce = Self::nonce_from(iv)?;

        let aad = aad.or(payload.aad.as_deref()).unwrap_or_default();
        let plaintext = cipher
            .decrypt(&Nonce::from(nonce), Payload { msg: &payload.secure_data, aad })
            .map_err(|_| {
                CypherError::Decrypt("aes-256-gcm authentication failed or payload corrupted".into())
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}
