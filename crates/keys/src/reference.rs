//! Key references and path addressing
//!
//! Every piece of key material is addressed by a hierarchical path:
//!
//! ```text
//! <root>/<...>/<alias>[@<version>][/public|/private|/secret]
//! ```
//!
//! Version `0` (or an absent version) means "the highest version present
//! at resolution time". The visibility qualifier selects which half of a
//! keypair entry is resolved; it may appear after the version marker or
//! carry the marker itself (`signing/public@2`), which is what
//! [`join`] produces.

use std::fmt;

use vaultline_common::secure::SecureString;

use crate::error::{KeyError, KeyResult};

/// Reference to a logical key slot
///
/// Opaque to callers beyond the path semantics; the optional password
/// covers providers whose entries are individually protected.
#[derive(Clone)]
pub struct KeyReference {
    path: String,
    password: Option<SecureString>,
}

impl KeyReference {
    /// Create a reference to a key path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), password: None }
    }

    /// Create a reference carrying an entry password
    pub fn with_password(path: impl Into<String>, password: SecureString) -> Self {
        Self { path: path.into(), password: Some(password) }
    }

    /// Get the key path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the entry password, if any
    pub fn password(&self) -> Option<&SecureString> {
        self.password.as_ref()
    }
}

impl fmt::Debug for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyReference")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Visibility qualifier of a key path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The stored private (or default) half of the entry
    Private,
    /// The public half of a keypair entry
    Public,
    /// Symmetric secret material
    Secret,
}

impl Visibility {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            "secret" => Some(Self::Secret),
            _ => None,
        }
    }
}

/// Parsed components of a key path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPathComponents {
    root: String,
    alias: String,
    version: u32,
    visibility: Visibility,
}

impl KeyPathComponents {
    /// Parse a key path into its components
    ///
    /// # Errors
    /// Fails with [`KeyError::MalformedPath`] for empty paths, empty
    /// segments, and unparseable version markers.
    pub fn parse(path: &str) -> KeyResult<Self> {
        if path.is_empty() {
            return Err(KeyError::malformed_path(path, "path is empty"));
        }

        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(KeyError::malformed_path(path, "path has an empty segment"));
        }

        // The last segment may be a visibility qualifier, optionally
        // carrying the version marker (`public@2`).
        let (last_name, last_version) = split_version(path, segments[segments.len() - 1])?;
        let (visibility, version_from_qualifier) = match Visibility::from_segment(last_name) {
            Some(visibility) => {
                segments.pop();
                if segments.is_empty() {
                    return Err(KeyError::malformed_path(path, "path has no alias"));
                }
                (visibility, last_version)
            }
            None => (Visibility::Private, None),
        };

        let alias_segment = segments.pop().unwrap_or_default();
        let (alias, alias_version) = split_version(path, alias_segment)?;
        if alias.is_empty() {
            return Err(KeyError::malformed_path(path, "path has no alias"));
        }
        if alias_version.is_some() && version_from_qualifier.is_some() {
            return Err(KeyError::malformed_path(path, "path has two version markers"));
        }

        Ok(Self {
            root: segments.join("/"),
            alias: alias.to_string(),
            version: alias_version.or(version_from_qualifier).unwrap_or(0),
            visibility,
        })
    }

    /// Get the root prefix (may be empty)
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Get the alias name (without version or visibility)
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Get the requested version (0 means "latest")
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Check whether the path pins an explicit version
    pub fn is_versioned(&self) -> bool {
        self.version != 0
    }

    /// Get the visibility qualifier
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Get the path without version or visibility (`<root>/<alias>`)
    pub fn base_path(&self) -> String {
        if self.root.is_empty() {
            self.alias.clone()
        } else {
            format!("{}/{}", self.root, self.alias)
        }
    }

    /// Get the cache key for this request
    ///
    /// Always versioned (version 0 for "latest") and qualified for public
    /// resolutions, so the public half of a keypair never shares a cache
    /// entry with the private half.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{}@{}", self.base_path(), self.version);
        if self.visibility == Visibility::Public {
            key.push_str("/public");
        }
        key
    }

    /// Get the canonical path for a concrete resolved version
    pub fn version_path(&self, version: u32) -> String {
        let mut key = format!("{}@{version}", self.base_path());
        if self.visibility == Visibility::Public {
            key.push_str("/public");
        }
        key
    }

    /// Get the keystore alias for a concrete version (`<alias>@<version>`)
    pub fn alias_key(&self, version: u32) -> String {
        format!("{}@{version}", self.alias)
    }
}

fn split_version<'a>(path: &str, segment: &'a str) -> KeyResult<(&'a str, Option<u32>)> {
    match segment.split_once('@') {
        None => Ok((segment, None)),
        Some((name, version)) => {
            let version = version.parse::<u32>().map_err(|e| {
                KeyError::malformed_path(path, format!("bad version marker '@{version}': {e}"))
            })?;
            Ok((name, Some(version)))
        }
    }
}

/// Join a suffix onto a key path, inserting it before any version marker
///
/// `join("apps/signing@2", "public")` is `"apps/signing/public@2"`, not
/// `"apps/signing@2/public"`; appending blindly would detach the suffix
/// from the versioned alias.
pub fn join(base: &str, suffix: &str) -> String {
    match base.rfind('@') {
        Some(at) if !base[at..].contains('/') => {
            format!("{}/{}{}", &base[..at], suffix, &base[at..])
        }
        _ => format!("{base}/{suffix}"),
    }
}
