//! Key material handles
//!
//! [`KeyMaterial`] is the opaque handle the provider chain hands out.
//! Secret and private bytes are scrubbed from memory when the handle is
//! dropped, which is how destroy-on-eviction is realized: the cache drops
//! its `Arc<KeyVersion>` on eviction and the material is zeroed as soon
//! as the last holder releases it.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Algorithm family a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// AES symmetric keys (256-bit)
    Aes,
    /// ChaCha20 symmetric keys (256-bit)
    ChaCha20,
    /// RSA keypairs
    Rsa,
    /// NIST P-256 keypairs
    EcP256,
}

impl KeyAlgorithm {
    /// Parse an algorithm name as stored in keystore entries
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes" => Some(Self::Aes),
            "chacha20" => Some(Self::ChaCha20),
            "rsa" => Some(Self::Rsa),
            "ec-p256" => Some(Self::EcP256),
            _ => None,
        }
    }

    /// Get the canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes => "aes",
            Self::ChaCha20 => "chacha20",
            Self::Rsa => "rsa",
            Self::EcP256 => "ec-p256",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque key material handle
///
/// Secret bytes, private-key encodings, and public-key encodings are all
/// zeroed on drop; only the algorithm tag survives in debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum KeyMaterial {
    /// Raw symmetric secret bytes
    Secret {
        #[zeroize(skip)]
        algorithm: KeyAlgorithm,
        bytes: Vec<u8>,
    },
    /// Private half of a keypair (DER or raw scalar, per algorithm)
    Private {
        #[zeroize(skip)]
        algorithm: KeyAlgorithm,
        encoded: Vec<u8>,
    },
    /// Public half of a keypair (DER or SEC1, per algorithm)
    Public {
        #[zeroize(skip)]
        algorithm: KeyAlgorithm,
        encoded: Vec<u8>,
    },
}

impl KeyMaterial {
    /// Get the algorithm family
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Secret { algorithm, .. }
            | Self::Private { algorithm, .. }
            | Self::Public { algorithm, .. } => *algorithm,
        }
    }

    /// Get symmetric secret bytes, if this is secret material
    pub fn secret_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Secret { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Get the private-key encoding, if this is private material
    pub fn private_encoding(&self) -> Option<&[u8]> {
        match self {
            Self::Private { encoded, .. } => Some(encoded),
            _ => None,
        }
    }

    /// Get the public-key encoding, if this is public material
    pub fn public_encoding(&self) -> Option<&[u8]> {
        match self {
            Self::Public { encoded, .. } => Some(encoded),
            _ => None,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret { algorithm, .. } => write!(f, "KeyMaterial::Secret({algorithm}, ***)"),
            Self::Private { algorithm, .. } => write!(f, "KeyMaterial::Private({algorithm}, ***)"),
            Self::Public { algorithm, .. } => write!(f, "KeyMaterial::Public({algorithm}, ***)"),
        }
    }
}

/// A resolved key: the canonical versioned path plus its material
///
/// Immutable once resolved. Shared as `Arc<KeyVersion>` between the
/// cache, open frames, and in-flight crypto calls; the material is
/// zeroed when the last holder drops the handle.
#[derive(Debug)]
pub struct KeyVersion {
    version_path: String,
    material: KeyMaterial,
}

impl KeyVersion {
    /// Create a resolved key version
    pub fn new(version_path: impl Into<String>, material: KeyMaterial) -> Self {
        Self { version_path: version_path.into(), material }
    }

    /// Get the canonical versioned path this key resolved to
    pub fn version_path(&self) -> &str {
        &self.version_path
    }

    /// Get the key material
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }
}
