//! Hash cyphers
//!
//! Salted iterative key-derivation hashing for passwords, with
//! verify-by-recompute. Algorithms, iteration counts, derived key
//! lengths, and salts come from configuration through
//! [`crate::service::CypherService::get_hash_cypher`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::concealed::MIN_SALT_LENGTH;
use crate::error::{CypherError, CypherResult};

/// Default derivation algorithm
pub const DEFAULT_HASH_ALGORITHM: &str = "pbkdf2-hmac-sha512";

/// Default iteration count
pub const DEFAULT_HASH_ITERATIONS: u32 = 65_536;

/// Default derived key length in bits
pub const DEFAULT_HASH_KEY_BITS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlgorithm {
    Pbkdf2HmacSha512,
    Pbkdf2HmacSha256,
}

impl HashAlgorithm {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pbkdf2-hmac-sha512" => Some(Self::Pbkdf2HmacSha512),
            "pbkdf2-hmac-sha256" => Some(Self::Pbkdf2HmacSha256),
            _ => None,
        }
    }
}

/// Salted iterative password hasher
pub struct HashCypher {
    algorithm: HashAlgorithm,
    iterations: u32,
    key_length_bits: usize,
    salt: Zeroizing<Vec<u8>>,
}

impl HashCypher {
    /// Create a hash cypher
    ///
    /// # Errors
    /// Fails with [`CypherError::UnsupportedAlgorithm`] for unknown
    /// algorithm names and [`CypherError::InvalidArgument`] for a salt
    /// under [`MIN_SALT_LENGTH`] bytes, zero iterations, or a key length
    /// that is zero or not a multiple of 8.
    pub fn new(
        algorithm: &str,
        iterations: u32,
        key_length_bits: usize,
        salt: Vec<u8>,
    ) -> CypherResult<Self> {
        let algorithm = HashAlgorithm::from_name(algorithm)
            .ok_or_else(|| CypherError::UnsupportedAlgorithm(algorithm.to_string()))?;
        if salt.len() < MIN_SALT_LENGTH {
            return Err(CypherError::invalid_argument(format!(
                "hash salt is {} bytes, minimum is {MIN_SALT_LENGTH}",
                salt.len()
            )));
        }
        if iterations == 0 {
            return Err(CypherError::invalid_argument("hash iterations must be positive"));
        }
        if key_length_bits == 0 || key_length_bits % 8 != 0 {
            return Err(CypherError::invalid_argument(
                "hash key length must be a positive multiple of 8 bits",
            ));
        }
        Ok(Self { algorithm, iterations, key_length_bits, salt: Zeroizing::new(salt) })
    }

    /// Hash a password, returning base64 of the derived bytes
    pub fn hash(&self, password: &str) -> String {
        let mut derived = Zeroizing::new(vec![0u8; self.key_length_bits / 8]);
        match self.algorithm {
            HashAlgorithm::Pbkdf2HmacSha512 => pbkdf2_hmac::<Sha512>(
                password.as_bytes(),
                &self.salt,
                self.iterations,
                &mut derived,
            ),
            HashAlgorithm::Pbkdf2HmacSha256 => pbkdf2_hmac::<Sha256>(
                password.as_bytes(),
                &self.salt,
                self.iterations,
                &mut derived,
            ),
        }
        BASE64.encode(&derived)
    }

    /// Verify a password against a previously computed hash
    ///
    /// Recomputes and compares with ordinary string equality. The
    /// comparison is not constant time; callers hardening against timing
    /// probes can compare via
    /// [`vaultline_common::secure::SecureString::constant_time_eq`].
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        self.hash(password) == hash
    }
}
