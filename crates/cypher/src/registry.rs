//! Algorithm registry
//!
//! Templates are bound to algorithm names through an explicit
//! registration table built at startup. There is no runtime discovery;
//! what is registered is exactly what dispatches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CypherError, CypherResult};
use crate::template::CypherTemplate;
use crate::templates::{AesGcmCypher, ChaCha20Poly1305Cypher, ClearTextCypher, RsaCypher};

/// Registration table: algorithm name -> template
pub struct CypherRegistry {
    templates: HashMap<String, Arc<dyn CypherTemplate>>,
}

impl CypherRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Create a registry with every built-in template registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClearTextCypher));
        registry.register(Arc::new(AesGcmCypher));
        registry.register(Arc::new(ChaCha20Poly1305Cypher));
        registry.register(Arc::new(RsaCypher));
        registry
    }

    /// Register a template under its algorithm name
    ///
    /// Replaces any template previously registered under the same name.
    pub fn register(&mut self, template: Arc<dyn CypherTemplate>) {
        self.templates.insert(template.algorithm().to_string(), template);
    }

    /// Look up the template for an algorithm name
    ///
    /// # Errors
    /// Fails with [`CypherError::UnsupportedAlgorithm`] when nothing is
    /// registered under the name.
    pub fn template(&self, algorithm: &str) -> CypherResult<Arc<dyn CypherTemplate>> {
        self.templates
            .get(algorithm)
            .cloned()
            .ok_or_else(|| CypherError::UnsupportedAlgorithm(algorithm.to_string()))
    }

    /// List the registered algorithm names, sorted
    pub fn algorithms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CypherRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
