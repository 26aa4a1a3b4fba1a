//! Zeroizing secret string
//!
//! Passwords and other credential material travel through Vaultline as
//! [`SecureString`], which scrubs its memory on drop and keeps secrets
//! out of `Debug` and `Display` output.

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret string that zeroes its memory on drop
///
/// Equality via `==` is not constant time; use
/// [`SecureString::constant_time_eq`] when comparing attacker-influenced
/// values.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    value: String,
}

impl SecureString {
    /// Wrap a secret string
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Expose the secret value
    ///
    /// The exposed slice must not be stored or logged; use it for the
    /// immediate operation only.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Expose the secret value as bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    /// Get the length in bytes
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Compare with another secret in constant time
    pub fn constant_time_eq(&self, other: &SecureString) -> bool {
        constant_time_eq(self.as_bytes(), other.as_bytes())
    }
}

// Ordinary equality for map keys and tests; not constant time.
impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecureString {}

impl FromStr for SecureString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    //! Unit tests for secure.
    use super::*;

    /// Validates `SecureString::new` behavior for the construction scenario.
    ///
    /// Assertions:
    /// - Confirms `secret.expose()` equals `"swordfish"`.
    /// - Confirms `secret.len()` equals `9`.
    #[test]
    fn test_construction() {
        let secret = SecureString::new("swordfish");
        assert_eq!(secret.expose(), "swordfish");
        assert_eq!(secret.len(), 9);
        assert!(!secret.is_empty());
    }

    /// Validates `SecureString` formatting for the redaction scenario.
    ///
    /// Assertions:
    /// - Ensures neither Debug nor Display leak the secret.
    #[test]
    fn test_redacted_formatting() {
        let secret = SecureString::new("swordfish");
        assert_eq!(format!("{secret:?}"), "SecureString(***)");
        assert_eq!(format!("{secret}"), "***");
    }

    /// Validates `SecureString::constant_time_eq` behavior for the comparison
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures equal values compare equal and different values do not.
    #[test]
    fn test_constant_time_eq() {
        let a = SecureString::new("same");
        let b = SecureString::new("same");
        let c = SecureString::new("other");
        let d = SecureString::new("same-but-longer");

        assert!(a.constant_time_eq(&b));
        assert!(!a.constant_time_eq(&c));
        assert!(!a.constant_time_eq(&d));
    }

    /// Validates `SecureString::from_str` behavior for the parse scenario.
    ///
    /// Assertions:
    /// - Confirms parsing round-trips the value.
    #[test]
    fn test_from_str() {
        let secret: SecureString = "parsed".parse().unwrap();
        assert_eq!(secret.expose(), "parsed");
    }
}
