//! Built-in cypher templates
//!
//! One module per algorithm family. All templates ship in
//! [`crate::registry::CypherRegistry::with_defaults`].

mod aes;
mod chacha;
mod clear;
mod rsa;

pub use self::aes::AesGcmCypher;
pub use self::chacha::ChaCha20Poly1305Cypher;
pub use self::clear::ClearTextCypher;
pub use self::rsa::RsaCypher;
