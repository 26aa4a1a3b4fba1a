//! Endorsers: named sign/verify capabilities
//!
//! An endorser binds a signing algorithm to an asymmetric keypair
//! addressed by convention: the public key path is the private key path
//! with a `public` suffix inserted before any version marker. Signatures
//! travel as base64 text.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use p256::ecdsa::{
    Signature as EcdsaSignature, SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey,
};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;

use vaultline_keys::{join, KeyAlgorithm, KeyMaterial, KeyProvider, KeyReference};

use crate::error::{CypherError, CypherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndorserAlgorithm {
    RsaSha256,
    EcdsaP256,
}

impl EndorserAlgorithm {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "rsa-sha256" => Some(Self::RsaSha256),
            "ecdsa-p256" => Some(Self::EcdsaP256),
            _ => None,
        }
    }

    fn key_algorithm(self) -> KeyAlgorithm {
        match self {
            Self::RsaSha256 => KeyAlgorithm::Rsa,
            Self::EcdsaP256 => KeyAlgorithm::EcP256,
        }
    }
}

/// A named sign/verify capability bound to a keypair
pub struct Endorser {
    algorithm: EndorserAlgorithm,
    keys: Arc<dyn KeyProvider>,
    private_reference: KeyReference,
    public_reference: KeyReference,
}

impl Endorser {
    /// Bind an endorser algorithm to a private key path
    ///
    /// # Errors
    /// Fails with [`CypherError::UnsupportedAlgorithm`] for unknown
    /// algorithm names.
    pub fn new(
        algorithm: &str,
        keys: Arc<dyn KeyProvider>,
        reference: KeyReference,
    ) -> CypherResult<Self> {
        let algorithm = EndorserAlgorithm::from_name(algorithm)
            .ok_or_else(|| CypherError::UnsupportedAlgorithm(algorithm.to_string()))?;
        let public_reference = KeyReference::new(join(reference.path(), "public"));
        debug!(
            private = reference.path(),
            public = public_reference.path(),
            "endorser bound to keypair"
        );
        Ok(Self { algorithm, keys, private_reference: reference, public_reference })
    }

    /// Get the public key path this endorser verifies against
    pub fn public_path(&self) -> &str {
        self.public_reference.path()
    }

    fn material(&self, reference: &KeyReference) -> CypherResult<Arc<vaultline_keys::KeyVersion>> {
        let version = self.keys.resolve_key(reference)?.require(reference.path())?;
        if version.material().algorithm() != self.algorithm.key_algorithm() {
            return Err(CypherError::InvalidKey(format!(
                "endorser requires a {} key, got {}",
                self.algorithm.key_algorithm(),
                version.material().algorithm()
            )));
        }
        Ok(version)
    }

    /// Sign a payload, returning the base64 signature
    ///
    /// # Errors
    /// Fails when the private key cannot be resolved or is malformed.
    pub fn sign(&self, payload: &str) -> CypherResult<String> {
        let version = self.material(&self.private_reference)?;
        let encoded = private_encoding(version.material())?;

        let signature = match self.algorithm {
            EndorserAlgorithm::RsaSha256 => {
                let private = RsaPrivateKey::from_pkcs8_der(encoded).map_err(|e| {
                    CypherError::InvalidKey(format!("rsa private key is malformed: {e}"))
                })?;
                let signing_key = RsaSigningKey::<Sha256>::new(private);
                signing_key.sign(payload.as_bytes()).to_vec()
            }
            EndorserAlgorithm::EcdsaP256 => {
                let signing_key = EcdsaSigningKey::from_slice(encoded).map_err(|e| {
                    CypherError::InvalidKey(format!("p256 private key is malformed: {e}"))
                })?;
                let signature: EcdsaSignature = signing_key.sign(payload.as_bytes());
                signature.to_vec()
            }
        };
        Ok(BASE64.encode(signature))
    }

    /// Verify a base64 signature against a payload
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not
    /// match the payload.
    ///
    /// # Errors
    /// Fails when the signature text is not decodable or the public key
    /// cannot be resolved.
    pub fn verify(&self, signature: &str, payload: &str) -> CypherResult<bool> {
        let raw = BASE64
            .decode(signature)
            .map_err(|e| CypherError::Signature(format!("signature is not base64: {e}")))?;

        let version = self.material(&self.public_reference)?;
        let encoded = public_encoding(version.material())?;

        let verified = match self.algorithm {
            EndorserAlgorithm::RsaSha256 => {
                let public = RsaPublicKey::from_public_key_der(encoded).map_err(|e| {
                    CypherError::InvalidKey(format!("rsa public key is malformed: {e}"))
                })?;
                let verifying_key = RsaVerifyingKey::<Sha256>::new(public);
                match RsaSignature::try_from(raw.as_slice()) {
                    Ok(signature) => verifying_key.verify(payload.as_bytes(), &signature).is_ok(),
                    Err(_) => false,
                }
            }
            EndorserAlgorithm::EcdsaP256 => {
                let verifying_key = EcdsaVerifyingKey::from_sec1_bytes(encoded).map_err(|e| {
                    CypherError::InvalidKey(format!("p256 public key is malformed: {e}"))
                })?;
                match EcdsaSignature::from_slice(&raw) {
                    Ok(signature) => verifying_key.verify(payload.as_bytes(), &signature).is_ok(),
                    Err(_) => false,
                }
            }
        };
        Ok(verified)
    }
}

fn private_encoding(material: &KeyMaterial) -> CypherResult<&[u8]> {
    material
        .private_encoding()
        .ok_or_else(|| CypherError::InvalidKey("endorser signing requires private material".into()))
}

fn public_encoding(material: &KeyMaterial) -> CypherResult<&[u8]> {
    material
        .public_encoding()
        .ok_or_else(|| {
            CypherError::InvalidKey("endorser verification requires public material".into())
        })
}
