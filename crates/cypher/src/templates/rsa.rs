//! RSA PKCS#1 v1.5 asymmetric template

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use vaultline_keys::{KeyAlgorithm, KeyMaterial, KeyReference};

use crate::error::{CypherError, CypherResult};
use crate::template::{CypherContext, CypherEncryption, CypherTemplate};

/// Asymmetric template registered as `rsa-pkcs1`
///
/// Encryption works with either half of the keypair (the public key is
/// derived from private material when needed); decryption requires the
/// private half. IV and AAD do not apply.
#[derive(Debug, Default)]
pub struct RsaCypher;

fn check_algorithm(material: &KeyMaterial) -> CypherResult<()> {
    if material.algorithm() != KeyAlgorithm::Rsa {
        return Err(CypherError::InvalidKey(format!(
            "rsa-pkcs1 requires an rsa key, got {}",
            material.algorithm()
        )));
    }
    Ok(())
}

fn private_key(material: &KeyMaterial) -> CypherResult<RsaPrivateKey> {
    check_algorithm(material)?;
    let encoded = material
        .private_encoding()
        .ok_or_else(|| CypherError::InvalidKey("rsa-pkcs1 requires private material".into()))?;
    RsaPrivateKey::from_pkcs8_der(encoded)
        .map_err(|e| CypherError::InvalidKey(format!("rsa private key is malformed: {e}")))
}

fn public_key(material: &KeyMaterial) -> CypherResult<RsaPublicKey> {
    check_algorithm(material)?;
    match material.public_encoding() {
        Some(encoded) => RsaPublicKey::from_public_key_der(encoded)
            .map_err(|e| CypherError::InvalidKey(format!("rsa public key is malformed: {e}"))),
        None => Ok(private_key(material)?.to_public_key()),
    }
}

impl CypherTemplate for RsaCypher {
    fn algorithm(&self) -> &'static str {
        "rsa-pkcs1"
    }

    fn encrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        plaintext: &[u8],
        _iv: Option<&[u8]>,
        _aad: Option<&[u8]>,
    ) -> CypherResult<CypherEncryption> {
        let version = context.resolve(key)?;
        let public = public_key(version.material())?;

        let ciphertext = public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CypherError::Encrypt(format!("rsa-pkcs1 encryption failed: {e}")))?;
        Ok(CypherEncryption { secure_data: ciphertext, iv: None, aad: None })
    }

    fn decrypt(
        &self,
        context: &CypherContext<'_>,
        key: &KeyReference,
        payload: &CypherEncryption,
        _aad: Option<&[u8]>,
    ) -> CypherResult<Zeroizing<Vec<u8>>> {
        let version = context.resolve(key)?;
        let private = private_key(version.material())?;

        let plaintext = private
            .decrypt(Pkcs1v15Encrypt, &payload.secure_data)
            .map_err(|_| CypherError::Decrypt("rsa-pkcs1 decryption failed".into()))?;
        Ok(Zeroizing::new(plaintext))
    }
}
