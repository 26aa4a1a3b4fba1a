//! Concealed strings
//!
//! A concealed string is the envelope-encrypted form of a short secret
//! string. The plaintext layout before encryption is:
//!
//! ```text
//! [2-byte big-endian character count][UTF-8 plaintext][64-byte random salt]
//! ```
//!
//! The count always reflects the plaintext character count (never the
//! salt), and is used to truncate after decryption; the salt tail is
//! discarded without ever being decoded. Plaintext may be 1 to 65 535
//! characters.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::{CypherError, CypherResult};

/// Maximum plaintext length in characters
pub const MAX_CONCEALED_CHARS: usize = 65_535;

/// Salt length appended to every concealed plaintext
pub const CONCEAL_SALT_LENGTH: usize = 64;

/// Minimum salt length for any hash or salt use
pub const MIN_SALT_LENGTH: usize = 10;

/// An envelope-encrypted secret string
///
/// Carries the ciphertext and the trust-boundary flag that selects which
/// configured cypher can reveal it. The plaintext is never held here.
#[derive(Clone)]
pub struct ConcealedString {
    secure_data: Vec<u8>,
    internal: bool,
}

impl ConcealedString {
    /// Reconstruct a concealed string from its stored parts
    pub fn new(secure_data: Vec<u8>, internal: bool) -> Self {
        Self { secure_data, internal }
    }

    /// Get the encrypted bytes
    pub fn secure_data(&self) -> &[u8] {
        &self.secure_data
    }

    /// Check whether this was concealed for the internal trust boundary
    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

impl fmt::Debug for ConcealedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcealedString")
            .field("secure_data", &format_args!("[{} bytes]", self.secure_data.len()))
            .field("internal", &self.internal)
            .finish()
    }
}

/// Build the length-prefixed, salted envelope plaintext
///
/// # Errors
/// Fails with [`CypherError::InvalidArgument`] when the plaintext is
/// empty or longer than [`MAX_CONCEALED_CHARS`] characters.
pub(crate) fn encode_envelope(plaintext: &str, salt: &[u8]) -> CypherResult<Zeroizing<Vec<u8>>> {
    let char_count = plaintext.chars().count();
    if char_count == 0 {
        return Err(CypherError::invalid_argument("concealed plaintext must not be empty"));
    }
    if char_count > MAX_CONCEALED_CHARS {
        return Err(CypherError::invalid_argument(format!(
            "concealed plaintext is {char_count} characters, maximum is {MAX_CONCEALED_CHARS}"
        )));
    }

    let mut buffer = Zeroizing::new(Vec::with_capacity(2 + plaintext.len() + salt.len()));
    #[allow(clippy::cast_possible_truncation)]
    buffer.extend_from_slice(&(char_count as u16).to_be_bytes());
    buffer.extend_from_slice(plaintext.as_bytes());
    buffer.extend_from_slice(salt);
    Ok(buffer)
}

/// Decode a decrypted envelope back into its plaintext
///
/// Takes exactly the declared number of characters from the valid UTF-8
/// prefix after the length field; the salt tail is ignored.
///
/// # Errors
/// Fails with [`CypherError::InvalidArgument`] when the length field is
/// out of range and [`CypherError::Malformed`] when the buffer cannot
/// satisfy it.
pub(crate) fn decode_envelope(buffer: &[u8]) -> CypherResult<Zeroizing<String>> {
    if buffer.len() < 2 {
        return Err(CypherError::Malformed("envelope is shorter than its length field".into()));
    }
    let char_count = u16::from_be_bytes([buffer[0], buffer[1]]) as usize;
    if char_count == 0 {
        return Err(CypherError::invalid_argument("envelope length field is out of range"));
    }

    let rest = &buffer[2..];
    let valid = match std::str::from_utf8(rest) {
        Ok(text) => text,
        // The salt tail need not be valid UTF-8; the plaintext prefix is.
        Err(e) => std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or_default(),
    };

    let mut plaintext = Zeroizing::new(String::with_capacity(char_count));
    let mut taken = 0usize;
    for ch in valid.chars() {
        if taken == char_count {
            break;
        }
        plaintext.push(ch);
        taken += 1;
    }
    if taken < char_count {
        return Err(CypherError::Malformed(format!(
            "envelope declares {char_count} characters but holds {taken}"
        )));
    }
    Ok(plaintext)
}
