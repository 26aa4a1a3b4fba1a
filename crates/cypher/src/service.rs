//! Cypher service facade
//!
//! [`CypherService`] is the entry point callers hold. It owns the
//! lifecycle state machine, binds the internal and external conceal
//! cyphers from configuration during two-phase initialization, and
//! fronts concealed strings, hash cyphers, and endorsers.
//!
//! Two named cyphers are bound at initialization: one for the
//! **internal** trust boundary (service-to-service secrets, at-rest
//! tokens) and one for the **external** boundary (user-facing secrets),
//! so the two can use different algorithms and keys.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use tracing::{debug, info};
use zeroize::Zeroizing;

use vaultline_common::config::{ConfigError, Configuration};
use vaultline_common::lifecycle::{ServiceLifecycle, ServiceState};
use vaultline_keys::{KeyProvider, KeyReference, KeyVersion};

use crate::concealed::{
    decode_envelope, encode_envelope, ConcealedString, CONCEAL_SALT_LENGTH, MIN_SALT_LENGTH,
};
use crate::endorser::Endorser;
use crate::error::{CypherError, CypherResult};
use crate::hash::{
    HashCypher, DEFAULT_HASH_ALGORITHM, DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_KEY_BITS,
};
use crate::provider::{Cypher, CypherProvider};
use crate::random::{OsRandom, RandomSource};
use crate::registry::CypherRegistry;
use crate::spec::CypherSpecification;
use crate::template::CypherEncryption;

struct ConcealBindings {
    internal: Cypher,
    external: Cypher,
}

/// Facade over concealment, hashing, and endorsement
///
/// Constructed with its dependencies injected; nothing here is a
/// singleton, and tests routinely build several independent instances.
pub struct CypherService {
    lifecycle: ServiceLifecycle,
    config: Arc<dyn Configuration>,
    keys: Arc<dyn KeyProvider>,
    provider: CypherProvider,
    random: Arc<dyn RandomSource>,
    bindings: RwLock<Option<ConcealBindings>>,
}

impl CypherService {
    /// Create a service in the `Created` state
    pub fn new(
        config: Arc<dyn Configuration>,
        keys: Arc<dyn KeyProvider>,
        registry: CypherRegistry,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let provider = CypherProvider::new(registry, Arc::clone(&keys));
        Self {
            lifecycle: ServiceLifecycle::new(),
            config,
            keys,
            provider,
            random,
            bindings: RwLock::new(None),
        }
    }

    /// Create a service with the default registry and OS randomness
    pub fn with_defaults(config: Arc<dyn Configuration>, keys: Arc<dyn KeyProvider>) -> Self {
        Self::new(config, keys, CypherRegistry::with_defaults(), Arc::new(OsRandom))
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Initialize the service
    ///
    /// Two-phase: the state moves to `Initializing`, the internal and
    /// external conceal cyphers are bound from `cypher.conceal.internal`
    /// and `cypher.conceal.external`, and on success the state commits
    /// to `Initialized`. Any configuration failure leaves the service
    /// `Compromised` and propagates the error.
    ///
    /// # Errors
    /// Fails when the service is not `Created` or configuration is
    /// missing or malformed.
    pub fn initialize(&self) -> CypherResult<()> {
        let scope = self.lifecycle.begin_initialize()?;

        let internal = self.bind_conceal_cypher("internal")?;
        let external = self.bind_conceal_cypher("external")?;
        *self.bindings.write() = Some(ConcealBindings { internal, external });

        scope.commit();
        info!("cypher service initialized");
        Ok(())
    }

    fn bind_conceal_cypher(&self, boundary: &str) -> CypherResult<Cypher> {
        let name = self.config.get_string(&format!("cypher.conceal.{boundary}"))?;
        let (spec, reference) = CypherSpecification::load(&*self.config, &name)?;
        debug!(boundary, cypher = %name, algorithm = %spec.algorithm, "conceal cypher bound");
        self.provider.cypher(&spec.algorithm, reference)
    }

    /// Close the service
    ///
    /// # Errors
    /// Fails when the service is not `Initialized`.
    pub fn close(&self) -> CypherResult<()> {
        self.lifecycle.close()?;
        *self.bindings.write() = None;
        info!("cypher service closed");
        Ok(())
    }

    fn binding(&self, internal: bool) -> CypherResult<Cypher> {
        let guard = self.bindings.read();
        let bindings = guard
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("cypher.conceal".to_string()))?;
        Ok(if internal { bindings.internal.clone() } else { bindings.external.clone() })
    }

    /// Conceal a secret string
    ///
    /// The plaintext is length-prefixed, padded with a fresh 64-byte
    /// random salt, and encrypted under the internal or external conceal
    /// cypher per the `internal` flag. Every intermediate buffer is
    /// zeroed on all paths, including error unwinds.
    ///
    /// # Errors
    /// Fails for empty or over-length plaintext and for encryption
    /// failures; the service must be `Initialized`.
    pub fn conceal_string(&self, plaintext: &str, internal: bool) -> CypherResult<ConcealedString> {
        self.lifecycle.require(&[ServiceState::Initialized])?;

        let mut salt = Zeroizing::new(vec![0u8; CONCEAL_SALT_LENGTH]);
        self.random.fill(&mut salt);
        let envelope = encode_envelope(plaintext, &salt)?;

        let cypher = self.binding(internal)?;
        let encryption = cypher.encrypt(&envelope, None, None)?;
        let secure_data = serde_json::to_vec(&encryption)
            .map_err(|e| CypherError::Encrypt(format!("payload encoding failed: {e}")))?;

        debug!(internal, "string concealed");
        Ok(ConcealedString::new(secure_data, internal))
    }

    /// Reveal a concealed string into a zeroizing buffer
    ///
    /// Crate-internal: callers go through
    /// [`CypherService::process_with_concealed_string`], which guarantees
    /// the plaintext is scrubbed after use.
    pub(crate) fn reveal_string(
        &self,
        concealed: &ConcealedString,
    ) -> CypherResult<Zeroizing<String>> {
        self.lifecycle.require(&[ServiceState::Initialized])?;

        let encryption: CypherEncryption = serde_json::from_slice(concealed.secure_data())
            .map_err(|e| CypherError::Malformed(format!("concealed payload is not valid: {e}")))?;

        let cypher = self.binding(concealed.is_internal())?;
        let envelope = cypher.decrypt(&encryption, None)?;
        decode_envelope(&envelope)
    }

    /// Reveal a concealed string, run an action over the plaintext, and
    /// scrub the buffer
    ///
    /// The plaintext buffer is zeroed when the call returns, whatever
    /// the action does (including panicking).
    ///
    /// # Errors
    /// Propagates reveal failures; the action itself is infallible.
    pub fn process_with_concealed_string<R>(
        &self,
        concealed: &ConcealedString,
        action: impl FnOnce(&str) -> R,
    ) -> CypherResult<R> {
        let plaintext = self.reveal_string(concealed)?;
        Ok(action(&plaintext))
    }

    /// Fallible variant of
    /// [`CypherService::process_with_concealed_string`]
    ///
    /// # Errors
    /// Propagates reveal failures and wraps the action's error as
    /// [`CypherError::Callback`].
    pub fn try_process_with_concealed_string<R, E>(
        &self,
        concealed: &ConcealedString,
        action: impl FnOnce(&str) -> Result<R, E>,
    ) -> CypherResult<R>
    where
        E: std::fmt::Display,
    {
        let plaintext = self.reveal_string(concealed)?;
        action(&plaintext).map_err(|e| CypherError::Callback(e.to_string()))
    }

    /// Generate a random salt, returned as base64
    ///
    /// # Errors
    /// Fails with [`CypherError::InvalidArgument`] for lengths under
    /// [`MIN_SALT_LENGTH`] bytes; the service must be `Initialized`.
    pub fn generate_salt(&self, length: usize) -> CypherResult<String> {
        self.lifecycle.require(&[ServiceState::Initialized])?;
        if length < MIN_SALT_LENGTH {
            return Err(CypherError::invalid_argument(format!(
                "salt length {length} is below the minimum of {MIN_SALT_LENGTH}"
            )));
        }

        let mut salt = Zeroizing::new(vec![0u8; length]);
        self.random.fill(&mut salt);
        Ok(BASE64.encode(&*salt))
    }

    /// Get a named hash cypher
    ///
    /// Parameters come from `cypher.hashes.<name>.*` with the documented
    /// defaults; an explicit salt overrides the configured one
    /// (`cypher.hashes.<name>.salt`, base64).
    ///
    /// # Errors
    /// Fails when neither an explicit nor a configured salt exists, or
    /// the parameters are invalid; the service must be `Initialized`.
    pub fn get_hash_cypher(
        &self,
        name: &str,
        salt: Option<Vec<u8>>,
    ) -> CypherResult<HashCypher> {
        self.lifecycle.require(&[ServiceState::Initialized])?;

        let prefix = format!("cypher.hashes.{name}");
        let algorithm =
            self.config.get_string_or(&format!("{prefix}.algorithm"), DEFAULT_HASH_ALGORITHM);
        let iterations = u32::try_from(
            self.config
                .get_i64_or(&format!("{prefix}.iterations"), i64::from(DEFAULT_HASH_ITERATIONS)),
        )
        .map_err(|_| CypherError::invalid_argument("hash iterations are out of range"))?;
        let key_length = usize::try_from(
            self.config.get_i64_or(&format!("{prefix}.keyLength"), DEFAULT_HASH_KEY_BITS as i64),
        )
        .map_err(|_| CypherError::invalid_argument("hash key length is out of range"))?;

        let salt = match salt {
            Some(salt) => salt,
            None => {
                let key = format!("{prefix}.salt");
                let encoded = self.config.get_string(&key)?;
                BASE64.decode(encoded.trim()).map_err(|e| {
                    CypherError::from(ConfigError::malformed(key, format!("not base64: {e}")))
                })?
            }
        };

        HashCypher::new(&algorithm, iterations, key_length, salt)
    }

    /// Get a named endorser
    ///
    /// The endorser's algorithm and private key path come from
    /// `cypher.cyphers.<name>.*`; the public key path is derived by
    /// inserting `public` before any version marker.
    ///
    /// # Errors
    /// Fails for unknown names or algorithms; the service must be
    /// `Initialized`.
    pub fn get_endorser(&self, name: &str) -> CypherResult<Endorser> {
        self.lifecycle.require(&[ServiceState::Initialized])?;

        let (spec, reference) = CypherSpecification::load(&*self.config, name)?;
        Endorser::new(&spec.algorithm, Arc::clone(&self.keys), reference)
    }

    /// Resolve key material directly
    ///
    /// The narrow key-unwrap path: tolerated during `Initializing` so
    /// configuration loading can unwrap keys it depends on, as well as
    /// after initialization.
    ///
    /// # Errors
    /// Fails when the key is absent or the service is in any other
    /// state.
    pub fn unwrap_key(&self, reference: &KeyReference) -> CypherResult<Arc<KeyVersion>> {
        self.lifecycle.require(&[ServiceState::Initializing, ServiceState::Initialized])?;
        self.keys
            .resolve_key(reference)?
            .require(reference.path())
            .map_err(CypherError::from)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for service.
    use vaultline_common::config::MapConfiguration;
    use vaultline_keys::{KeyError, KeyResult, Resolution};

    use super::*;

    /// Provider for keyless (clear) configurations; resolves nothing.
    struct NoKeys;

    impl KeyProvider for NoKeys {
        fn supports(&self, _reference: &KeyReference) -> bool {
            false
        }

        fn resolve_key(&self, reference: &KeyReference) -> KeyResult<Resolution> {
            Err(KeyError::Unsupported(reference.path().to_string()))
        }
    }

    fn clear_config() -> Arc<MapConfiguration> {
        Arc::new(
            MapConfiguration::builder()
                .set("cypher.conceal.internal", "plain")
                .set("cypher.conceal.external", "plain")
                .set("cypher.cyphers.plain.algorithm", "clear")
                .build(),
        )
    }

    fn clear_service() -> CypherService {
        CypherService::with_defaults(clear_config(), Arc::new(NoKeys))
    }

    /// Validates `CypherService` state gating for the uninitialized
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures every operation fails before initialization with an
    ///   invalid-state error naming both states.
    #[test]
    fn test_operations_require_initialized() {
        let service = clear_service();
        assert_eq!(service.state(), ServiceState::Created);

        let err = service.conceal_string("secret", true).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("CREATED"));
        assert!(message.contains("INITIALIZED"));

        assert!(service.generate_salt(16).is_err());
        assert!(service.get_hash_cypher("h", Some(vec![0u8; 16])).is_err());
        assert!(service.get_endorser("plain").is_err());
        assert!(service.unwrap_key(&KeyReference::new("apps/k")).is_err());
    }

    /// Validates `CypherService::initialize` behavior for the happy path
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the service lands in `Initialized`.
    /// - Ensures a second initialization fails.
    #[test]
    fn test_initialize() {
        let service = clear_service();
        service.initialize().unwrap();
        assert_eq!(service.state(), ServiceState::Initialized);

        assert!(service.initialize().is_err());
    }

    /// Validates `CypherService::initialize` behavior for the configuration
    /// failure scenario.
    ///
    /// Assertions:
    /// - Ensures a missing conceal binding compromises the service.
    /// - Ensures the service stays unusable afterwards.
    #[test]
    fn test_configure_failure_compromises() {
        let config = Arc::new(
            MapConfiguration::builder().set("cypher.conceal.internal", "plain").build(),
        );
        let service = CypherService::with_defaults(config, Arc::new(NoKeys));

        assert!(service.initialize().is_err());
        assert_eq!(service.state(), ServiceState::Compromised);
        assert!(service.conceal_string("secret", true).is_err());
    }

    /// Validates conceal/reveal behavior for the clear-cypher round trip
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `process_with_concealed_string` sees the exact
    ///   plaintext for both trust boundaries.
    #[test]
    fn test_conceal_process_round_trip() {
        let service = clear_service();
        service.initialize().unwrap();

        for internal in [true, false] {
            let concealed = service.conceal_string("123456", internal).unwrap();
            assert_eq!(concealed.is_internal(), internal);

            let echoed = service
                .process_with_concealed_string(&concealed, |plaintext| plaintext.to_string())
                .unwrap();
            assert_eq!(echoed, "123456");
        }
    }

    /// Validates `CypherService::conceal_string` behavior for the input
    /// validation scenarios.
    ///
    /// Assertions:
    /// - Ensures empty and over-length plaintext are rejected.
    #[test]
    fn test_conceal_input_validation() {
        let service = clear_service();
        service.initialize().unwrap();

        assert!(matches!(
            service.conceal_string("", true),
            Err(CypherError::InvalidArgument(_))
        ));
        let over = "x".repeat(65_536);
        assert!(matches!(
            service.conceal_string(&over, true),
            Err(CypherError::InvalidArgument(_))
        ));
    }

    /// Validates `CypherService::try_process_with_concealed_string`
    /// behavior for the failing action scenario.
    ///
    /// Assertions:
    /// - Confirms the action's error comes back wrapped as a
    ///   `CypherError::Callback`.
    #[test]
    fn test_try_process_wraps_action_error() {
        let service = clear_service();
        service.initialize().unwrap();
        let concealed = service.conceal_string("value", true).unwrap();

        let result: CypherResult<()> = service
            .try_process_with_concealed_string(&concealed, |_| Err::<(), _>("account locked"));
        assert!(matches!(result, Err(CypherError::Callback(message)) if message == "account locked"));
    }

    /// Validates `CypherService::generate_salt` behavior for the salt
    /// scenarios.
    ///
    /// Assertions:
    /// - Ensures `generate_salt(5)` fails (below minimum 10).
    /// - Confirms `generate_salt(16)` decodes to exactly 16 bytes.
    #[test]
    fn test_generate_salt() {
        let service = clear_service();
        service.initialize().unwrap();

        assert!(matches!(service.generate_salt(5), Err(CypherError::InvalidArgument(_))));

        let salt = service.generate_salt(16).unwrap();
        assert_eq!(BASE64.decode(salt).unwrap().len(), 16);
    }

    /// Validates `CypherService::get_hash_cypher` behavior for the
    /// configured hash scenario.
    ///
    /// Assertions:
    /// - Confirms defaults apply and explicit salts override config.
    /// - Ensures a missing salt fails.
    #[test]
    fn test_get_hash_cypher() {
        let config = Arc::new(
            MapConfiguration::builder()
                .set("cypher.conceal.internal", "plain")
                .set("cypher.conceal.external", "plain")
                .set("cypher.cyphers.plain.algorithm", "clear")
                .set("cypher.hashes.login.iterations", "100")
                .set("cypher.hashes.login.salt", BASE64.encode([5u8; 16]))
                .build(),
        );
        let service = CypherService::with_defaults(config, Arc::new(NoKeys));
        service.initialize().unwrap();

        let configured = service.get_hash_cypher("login", None).unwrap();
        let hash = configured.hash("password");
        assert!(configured.verify(&hash, "password"));

        let explicit = service.get_hash_cypher("login", Some(vec![9u8; 16])).unwrap();
        assert_ne!(explicit.hash("password"), hash);

        assert!(service.get_hash_cypher("unsalted", None).is_err());
    }

    /// Validates `CypherService::close` behavior for the closed scenario.
    ///
    /// Assertions:
    /// - Confirms close transitions to `Closed` and operations fail after.
    #[test]
    fn test_close() {
        let service = clear_service();
        service.initialize().unwrap();
        service.close().unwrap();

        assert_eq!(service.state(), ServiceState::Closed);
        assert!(service.conceal_string("secret", true).is_err());
        assert!(service.close().is_err());
    }
}
