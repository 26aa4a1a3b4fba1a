//! Password-protected keystore files
//!
//! A keystore is a binary container on disk holding key entries addressed
//! by alias (`<name>@<version>`). The container is a JSON entry map sealed
//! with AES-256-GCM under a key derived from the keystore password with
//! Argon2id; the derivation salt and nonce ride alongside the ciphertext,
//! so the password is the only input needed to open it.
//!
//! Secret entries hold raw symmetric bytes. Keypair entries hold both
//! halves, so resolving a `/public` path never touches private material.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vaultline_common::config::Configuration;
use vaultline_common::secure::SecureString;
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};
use crate::material::{KeyAlgorithm, KeyMaterial, KeyVersion};
use crate::provider::{KeyProvider, Resolution};
use crate::reference::{KeyPathComponents, KeyReference, Visibility};

const CONTAINER_ALGORITHM: &str = "aes-256-gcm";

/// Sealed on-disk form of a keystore
#[derive(Serialize, Deserialize)]
struct SealedContainer {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    salt: String,
    algorithm: String,
}

/// One keystore entry: a symmetric secret or a keypair
#[derive(Clone, Serialize, Deserialize)]
struct StoredEntry {
    algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public: Option<String>,
}

/// In-memory keystore: alias -> entry
///
/// Aliases have the form `<name>@<version>`.
#[derive(Default)]
pub struct Keystore {
    entries: HashMap<String, StoredEntry>,
}

impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystore").field("entries", &self.entries.len()).finish()
    }
}

impl Keystore {
    /// Create an empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and unseal a keystore file
    ///
    /// # Errors
    /// Fails with [`KeyError::KeystoreLoad`] when the file is unreadable,
    /// the container is malformed, or the password is wrong.
    pub fn load(path: &Path, password: &SecureString) -> KeyResult<Self> {
        let name = path.display().to_string();
        let fail = |message: String| KeyError::keystore_load(&name, message);

        let encoded = std::fs::read_to_string(path)
            .map_err(|e| fail(format!("failed to read keystore file: {e}")))?;
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| fail(format!("keystore container is not base64: {e}")))?;
        let container: SealedContainer = serde_json::from_slice(&raw)
            .map_err(|e| fail(format!("keystore container is malformed: {e}")))?;

        if container.algorithm != CONTAINER_ALGORITHM {
            return Err(fail(format!("unsupported container algorithm '{}'", container.algorithm)));
        }
        let nonce: [u8; 12] = container
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| fail("container nonce must be 12 bytes".to_string()))?;

        let salt = SaltString::from_b64(&container.salt)
            .map_err(|e| fail(format!("container salt is malformed: {e}")))?;
        let key = derive_container_key(password, &salt).map_err(&fail)?;

        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| fail(format!("failed to create container cipher: {e}")))?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(&Nonce::from(nonce), container.ciphertext.as_ref())
                .map_err(|_| fail("wrong keystore password or corrupted container".to_string()))?,
        );

        let entries: HashMap<String, StoredEntry> = serde_json::from_slice(&plaintext)
            .map_err(|e| fail(format!("keystore entries are malformed: {e}")))?;

        info!(keystore = %name, entries = entries.len(), "keystore loaded");
        Ok(Self { entries })
    }

    /// Seal and write the keystore to a file
    ///
    /// A fresh salt and nonce are generated on every save.
    ///
    /// # Errors
    /// Fails with [`KeyError::KeystoreLoad`] when sealing or writing fails.
    pub fn save(&self, path: &Path, password: &SecureString) -> KeyResult<()> {
        let name = path.display().to_string();
        let fail = |message: String| KeyError::keystore_load(&name, message);

        let plaintext = Zeroizing::new(
            serde_json::to_vec(&self.entries)
                .map_err(|e| fail(format!("failed to encode keystore entries: {e}")))?,
        );

        let salt = SaltString::generate(SaltRng);
        let key = derive_container_key(password, &salt).map_err(&fail)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| fail(format!("failed to create container cipher: {e}")))?;

        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(&Nonce::from(nonce), plaintext.as_slice())
            .map_err(|e| fail(format!("failed to seal keystore: {e}")))?;

        let container = SealedContainer {
            nonce: nonce.to_vec(),
            ciphertext,
            salt: salt.as_str().to_string(),
            algorithm: CONTAINER_ALGORITHM.to_string(),
        };
        let raw = serde_json::to_vec(&container)
            .map_err(|e| fail(format!("failed to encode container: {e}")))?;
        std::fs::write(path, BASE64.encode(raw))
            .map_err(|e| fail(format!("failed to write keystore file: {e}")))?;

        debug!(keystore = %name, entries = self.entries.len(), "keystore saved");
        Ok(())
    }

    /// Insert a symmetric secret entry
    pub fn insert_secret(&mut self, alias: impl Into<String>, algorithm: KeyAlgorithm, bytes: &[u8]) {
        self.entries.insert(
            alias.into(),
            StoredEntry {
                algorithm: algorithm.name().to_string(),
                secret: Some(BASE64.encode(bytes)),
                private: None,
                public: None,
            },
        );
    }

    /// Insert a keypair entry holding both halves
    pub fn insert_keypair(
        &mut self,
        alias: impl Into<String>,
        algorithm: KeyAlgorithm,
        private: &[u8],
        public: &[u8],
    ) {
        self.entries.insert(
            alias.into(),
            StoredEntry {
                algorithm: algorithm.name().to_string(),
                secret: None,
                private: Some(BASE64.encode(private)),
                public: Some(BASE64.encode(public)),
            },
        );
    }

    /// Iterate over the entry aliases
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the keystore has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode the material for an alias under a visibility qualifier
    ///
    /// Returns `Ok(None)` when the alias is absent or the entry lacks the
    /// requested half.
    fn material(&self, alias: &str, visibility: Visibility) -> KeyResult<Option<KeyMaterial>> {
        let Some(entry) = self.entries.get(alias) else {
            return Ok(None);
        };

        let algorithm = KeyAlgorithm::from_name(&entry.algorithm).ok_or_else(|| {
            KeyError::InvalidMaterial(format!(
                "entry '{alias}' has unknown algorithm '{}'",
                entry.algorithm
            ))
        })?;
        let decode = |field: &str, value: &str| {
            BASE64.decode(value).map_err(|e| {
                KeyError::InvalidMaterial(format!("entry '{alias}' has invalid {field} data: {e}"))
            })
        };

        let material = match visibility {
            Visibility::Public => match &entry.public {
                Some(value) => {
                    KeyMaterial::Public { algorithm, encoded: decode("public", value)? }
                }
                None => return Ok(None),
            },
            Visibility::Private | Visibility::Secret => {
                if let Some(value) = &entry.secret {
                    KeyMaterial::Secret { algorithm, bytes: decode("secret", value)? }
                } else if let Some(value) = &entry.private {
                    KeyMaterial::Private { algorithm, encoded: decode("private", value)? }
                } else {
                    return Ok(None);
                }
            }
        };
        Ok(Some(material))
    }
}

fn derive_container_key(
    password: &SecureString,
    salt: &SaltString,
) -> Result<Zeroizing<[u8; 32]>, String> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt.as_str().as_bytes(), key.as_mut())
        .map_err(|e| format!("key derivation failed: {e}"))?;
    Ok(key)
}

/// Key provider backed by a keystore file
///
/// Supports every path under its configured root. Unversioned references
/// resolve to the highest version present for the alias at resolution
/// time.
#[derive(Debug)]
pub struct KeystoreProvider {
    name: String,
    root: String,
    keystore: Keystore,
}

impl KeystoreProvider {
    /// Open a keystore file as a provider rooted at `root`
    ///
    /// # Errors
    /// Fails with [`KeyError::KeystoreLoad`] when the keystore cannot be
    /// opened.
    pub fn open(
        name: impl Into<String>,
        root: impl Into<String>,
        path: &Path,
        password: &SecureString,
    ) -> KeyResult<Self> {
        let keystore = Keystore::load(path, password)?;
        Ok(Self { name: name.into(), root: root.into(), keystore })
    }

    /// Build a provider from `key-service.keystores.<name>.*` configuration
    ///
    /// Reads `path` and `password` (required), `keyPath` (the root
    /// prefix, optional), and `type` (container format, optional; only
    /// `sealed` is supported).
    ///
    /// # Errors
    /// Fails when required configuration is missing, the container type
    /// is unknown, or the keystore cannot be loaded.
    pub fn from_config(name: &str, config: &dyn Configuration) -> KeyResult<Self> {
        let prefix = format!("key-service.keystores.{name}");
        let kind = config.get_string_or(&format!("{prefix}.type"), "sealed");
        if kind != "sealed" {
            return Err(KeyError::keystore_load(
                name,
                format!("unsupported keystore type '{kind}'"),
            ));
        }
        let path = config.get_string(&format!("{prefix}.path"))?;
        let password = config.get_secret(&format!("{prefix}.password"))?;
        let root = config.get_string_or(&format!("{prefix}.keyPath"), "");
        Self::open(name, root, Path::new(&path), &password)
    }

    /// Get the provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the root prefix this provider serves
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Find the highest version present for an alias
    fn latest_version(&self, alias: &str) -> Option<u32> {
        let prefix = format!("{alias}@");
        self.keystore
            .aliases()
            .filter_map(|a| a.strip_prefix(&prefix))
            .filter_map(|v| v.parse::<u32>().ok())
            .max()
    }
}

/// Check whether `path` falls under `root` on a segment boundary
pub(crate) fn path_in_root(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    path.strip_prefix(root).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

impl KeyProvider for KeystoreProvider {
    fn supports(&self, reference: &KeyReference) -> bool {
        path_in_root(reference.path(), &self.root)
    }

    fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
        if !self.supports(reference) {
            return Ok(Resolution::Unsupported);
        }

        let components = KeyPathComponents::parse(reference.path())?;
        let version = if components.is_versioned() {
            components.version()
        } else {
            match self.latest_version(components.alias()) {
                Some(version) => version,
                None => return Ok(Resolution::NotFound),
            }
        };

        let alias = components.alias_key(version);
        match self.keystore.material(&alias, components.visibility())? {
            Some(material) => {
                debug!(
                    keystore = %self.name,
                    path = reference.path(),
                    alias = %alias,
                    "resolved key from keystore"
                );
                Ok(Resolution::Found(Arc::new(KeyVersion::new(
                    components.version_path(version),
                    material,
                ))))
            }
            None => Ok(Resolution::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for keystore.
    use tempfile::TempDir;

    use super::*;

    fn password() -> SecureString {
        SecureString::new("correct horse battery staple")
    }

    fn saved_keystore(dir: &TempDir) -> std::path::PathBuf {
        let mut keystore = Keystore::new();
        keystore.insert_secret("tokenSigningKey@1", KeyAlgorithm::Aes, &[1u8; 32]);
        keystore.insert_secret("tokenSigningKey@2", KeyAlgorithm::Aes, &[2u8; 32]);
        keystore.insert_keypair("endorser@1", KeyAlgorithm::Rsa, &[3u8; 64], &[4u8; 32]);

        let path = dir.path().join("test.ks");
        keystore.save(&path, &password()).unwrap();
        path
    }

    /// Validates `Keystore::save`/`Keystore::load` behavior for the sealed
    /// round trip scenario.
    ///
    /// Assertions:
    /// - Confirms all entries survive the round trip.
    #[test]
    fn test_sealed_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);

        let loaded = Keystore::load(&path, &password()).unwrap();
        assert_eq!(loaded.len(), 3);
        let mut aliases: Vec<&str> = loaded.aliases().collect();
        aliases.sort_unstable();
        assert_eq!(aliases, vec!["endorser@1", "tokenSigningKey@1", "tokenSigningKey@2"]);
    }

    /// Validates `Keystore::load` behavior for the wrong password scenario.
    ///
    /// Assertions:
    /// - Ensures loading with the wrong password fails with
    ///   `KeyError::KeystoreLoad`.
    #[test]
    fn test_wrong_password_fails() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);

        let result = Keystore::load(&path, &SecureString::new("not the password"));
        assert!(matches!(result, Err(KeyError::KeystoreLoad { .. })));
    }

    /// Validates `Keystore::load` behavior for the tampered container
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures flipping container bytes makes the load fail.
    #[test]
    fn test_tampered_container_fails() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);

        let encoded = std::fs::read_to_string(&path).unwrap();
        let mut raw = BASE64.decode(encoded.trim()).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xFF;
        std::fs::write(&path, BASE64.encode(raw)).unwrap();

        assert!(Keystore::load(&path, &password()).is_err());
    }

    /// Validates `KeystoreProvider` latest-version resolution for the
    /// unversioned alias scenario.
    ///
    /// Assertions:
    /// - Confirms resolving "tokenSigningKey" returns version 2's key.
    /// - Confirms resolving "tokenSigningKey@1" returns version 1's key.
    #[test]
    fn test_latest_version_scan() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);
        let provider = KeystoreProvider::open("main", "", &path, &password()).unwrap();

        let latest = provider
            .resolve_key(&KeyReference::new("tokenSigningKey"))
            .unwrap()
            .require("tokenSigningKey")
            .unwrap();
        assert_eq!(latest.version_path(), "tokenSigningKey@2");
        assert_eq!(latest.material().secret_bytes(), Some(&[2u8; 32][..]));

        let pinned = provider
            .resolve_key(&KeyReference::new("tokenSigningKey@1"))
            .unwrap()
            .require("tokenSigningKey@1")
            .unwrap();
        assert_eq!(pinned.version_path(), "tokenSigningKey@1");
        assert_eq!(pinned.material().secret_bytes(), Some(&[1u8; 32][..]));
    }

    /// Validates `KeystoreProvider` behavior for the public visibility
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a `/public` path resolves the public half only.
    /// - Confirms the unqualified path resolves the private half.
    #[test]
    fn test_public_visibility() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);
        let provider = KeystoreProvider::open("main", "", &path, &password()).unwrap();

        let public = provider
            .resolve_key(&KeyReference::new("endorser@1/public"))
            .unwrap()
            .require("endorser@1/public")
            .unwrap();
        assert_eq!(public.material().public_encoding(), Some(&[4u8; 32][..]));
        assert_eq!(public.version_path(), "endorser@1/public");

        let private = provider
            .resolve_key(&KeyReference::new("endorser@1"))
            .unwrap()
            .require("endorser@1")
            .unwrap();
        assert_eq!(private.material().private_encoding(), Some(&[3u8; 64][..]));
    }

    /// Validates `KeystoreProvider` behavior for the missing alias scenario.
    ///
    /// Assertions:
    /// - Confirms unknown aliases and versions resolve to `NotFound`.
    #[test]
    fn test_not_found() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);
        let provider = KeystoreProvider::open("main", "", &path, &password()).unwrap();

        assert!(matches!(
            provider.resolve_key(&KeyReference::new("unknownKey")).unwrap(),
            Resolution::NotFound
        ));
        assert!(matches!(
            provider.resolve_key(&KeyReference::new("tokenSigningKey@9")).unwrap(),
            Resolution::NotFound
        ));
    }

    /// Validates `KeystoreProvider::supports` behavior for the root boundary
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms prefix matching respects segment boundaries.
    #[test]
    fn test_root_boundary() {
        let dir = TempDir::new().unwrap();
        let path = saved_keystore(&dir);
        let provider = KeystoreProvider::open("main", "apps", &path, &password()).unwrap();

        assert!(provider.supports(&KeyReference::new("apps/tokenSigningKey")));
        assert!(!provider.supports(&KeyReference::new("appsx/tokenSigningKey")));
        assert!(matches!(
            provider.resolve_key(&KeyReference::new("other/tokenSigningKey")).unwrap(),
            Resolution::Unsupported
        ));
    }
}
