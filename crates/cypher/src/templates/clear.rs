//! Clear-text passthrough template
//!
//! For testing and non-sensitive use only: the "ciphertext" is the
//! plaintext. Resolves no keys.

use zeroize::Zeroizing;

use vaultline_keys::KeyReference;

use crate::error::CypherResult;
use crate::template::{CypherContext, CypherEncryption, CypherTemplate};

/// Passthrough template registered as `clear`
#[derive(Debug, Default)]
pub struct ClearTextCypher;

impl CypherTemplate for ClearTextCypher {
    fn algorithm(&self) -> &'static str {
        "clear"
    }

    fn encrypt(
        &self,
        _context: &CypherContext<'_>,
        _key: &KeyReference,
        plaintext: &[u8],
        _iv: Option<&[u8]>,
        _aad: Option<&[u8]>,
    ) -> CypherResult<CypherEncryption> {
        Ok(CypherEncryption { secure_data: plaintext.to_vec(), iv: None, aad: None })
    }

    fn decrypt(
        &self,
        _context: &CypherContext<'_>,
        _key: &KeyReference,
        payload: &CypherEncryption,
        _aad: Option<&[u8]>,
    ) -> CypherResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(payload.secure_data.clone()))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for templates::clear.
    use vaultline_keys::{KeyError, KeyProvider, KeyResult, Resolution};

    use super::*;

    struct NoKeys;

    impl KeyProvider for NoKeys {
        fn supports(&self, _reference: &KeyReference) -> bool {
            false
        }

        fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
            Err(KeyError::Unsupported(reference.path().to_string()))
        }
    }

    /// Validates `ClearTextCypher` behavior for the passthrough scenario.
    ///
    /// Assertions:
    /// - Confirms the payload equals the plaintext.
    /// - Confirms no key resolution happens (the provider always errors).
    #[test]
    fn test_passthrough_resolves_no_keys() {
        let template = ClearTextCypher;
        let context = CypherContext::new(&NoKeys);
        let reference = KeyReference::new("");

        let payload =
            template.encrypt(&context, &reference, b"visible", None, None).unwrap();
        assert_eq!(payload.secure_data, b"visible");
        assert!(payload.iv.is_none());

        let decrypted = template.decrypt(&context, &reference, &payload, None).unwrap();
        assert_eq!(&*decrypted, b"visible");
    }
}
