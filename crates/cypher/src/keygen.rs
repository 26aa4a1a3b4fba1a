//! Key generation
//!
//! Generates key material matching a [`KeyDescriptor`], for provisioning
//! keystores and for tests. Private halves come back in zeroizing
//! buffers; callers move them straight into a keystore entry.

use p256::ecdsa::SigningKey as EcdsaSigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

use vaultline_keys::KeyAlgorithm;

use crate::error::{CypherError, CypherResult};
use crate::spec::KeyDescriptor;

/// Freshly generated key material
pub enum GeneratedKey {
    /// Symmetric secret bytes
    Secret(Zeroizing<Vec<u8>>),
    /// Asymmetric keypair: private encoding plus public encoding
    Keypair {
        /// PKCS#8 DER (RSA) or raw scalar (P-256)
        private: Zeroizing<Vec<u8>>,
        /// SPKI DER (RSA) or uncompressed SEC1 (P-256)
        public: Vec<u8>,
    },
}

/// Generate key material for a descriptor
///
/// # Errors
/// Fails with [`CypherError::InvalidArgument`] for unsupported key sizes
/// and with [`CypherError::Encrypt`] when generation itself fails.
pub fn generate_key(descriptor: &KeyDescriptor) -> CypherResult<GeneratedKey> {
    match descriptor.key_algorithm {
        KeyAlgorithm::Aes | KeyAlgorithm::ChaCha20 => {
            if descriptor.key_size != 256 {
                return Err(CypherError::invalid_argument(format!(
                    "{} keys must be 256 bits, got {}",
                    descriptor.key_algorithm, descriptor.key_size
                )));
            }
            let mut bytes = Zeroizing::new(vec![0u8; descriptor.key_size / 8]);
            OsRng.fill_bytes(&mut bytes);
            Ok(GeneratedKey::Secret(bytes))
        }
        KeyAlgorithm::Rsa => {
            if !(2048..=4096).contains(&descriptor.key_size) {
                return Err(CypherError::invalid_argument(format!(
                    "rsa keys must be 2048-4096 bits, got {}",
                    descriptor.key_size
                )));
            }
            let private = RsaPrivateKey::new(&mut OsRng, descriptor.key_size)
                .map_err(|e| CypherError::Encrypt(format!("rsa key generation failed: {e}")))?;
            let public = private
                .to_public_key()
                .to_public_key_der()
                .map_err(|e| CypherError::Encrypt(format!("rsa public encoding failed: {e}")))?
                .as_bytes()
                .to_vec();
            let private = private
                .to_pkcs8_der()
                .map_err(|e| CypherError::Encrypt(format!("rsa private encoding failed: {e}")))?;
            Ok(GeneratedKey::Keypair {
                private: Zeroizing::new(private.as_bytes().to_vec()),
                public,
            })
        }
        KeyAlgorithm::EcP256 => {
            if descriptor.key_size != 256 {
                return Err(CypherError::invalid_argument(format!(
                    "ec-p256 keys must be 256 bits, got {}",
                    descriptor.key_size
                )));
            }
            let signing = EcdsaSigningKey::random(&mut OsRng);
            let public = signing.verifying_key().to_encoded_point(false).as_bytes().to_vec();
            Ok(GeneratedKey::Keypair {
                private: Zeroizing::new(signing.to_bytes().to_vec()),
                public,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for keygen.
    use super::*;

    /// Validates `generate_key` behavior for the symmetric generation
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms 32 random bytes come back for aes and chacha20.
    #[test]
    fn test_generate_symmetric() {
        for algorithm in [KeyAlgorithm::Aes, KeyAlgorithm::ChaCha20] {
            match generate_key(&KeyDescriptor::new(algorithm, 256)).unwrap() {
                GeneratedKey::Secret(bytes) => {
                    assert_eq!(bytes.len(), 32);
                    assert_ne!(&bytes[..], &[0u8; 32][..]);
                }
                GeneratedKey::Keypair { .. } => panic!("expected secret material"),
            }
        }
    }

    /// Validates `generate_key` behavior for the ec keypair scenario.
    ///
    /// Assertions:
    /// - Confirms the private scalar is 32 bytes and the public point is
    ///   uncompressed SEC1 (65 bytes).
    #[test]
    fn test_generate_ec_keypair() {
        match generate_key(&KeyDescriptor::new(KeyAlgorithm::EcP256, 256)).unwrap() {
            GeneratedKey::Keypair { private, public } => {
                assert_eq!(private.len(), 32);
                assert_eq!(public.len(), 65);
                assert_eq!(public[0], 0x04);
            }
            GeneratedKey::Secret(_) => panic!("expected a keypair"),
        }
    }

    /// Validates `generate_key` behavior for the unsupported size scenario.
    ///
    /// Assertions:
    /// - Ensures a 128-bit aes request is rejected.
    #[test]
    fn test_unsupported_sizes_rejected() {
        assert!(generate_key(&KeyDescriptor::new(KeyAlgorithm::Aes, 128)).is_err());
        assert!(generate_key(&KeyDescriptor::new(KeyAlgorithm::Rsa, 512)).is_err());
        assert!(generate_key(&KeyDescriptor::new(KeyAlgorithm::EcP256, 384)).is_err());
    }
}
