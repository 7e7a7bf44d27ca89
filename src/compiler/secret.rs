//! Secret generator
//!
//! Forwards literal key-value data into a Kubernetes Secret, base64-encoding
//! each value the way the API stores it, with an optional immutability flag.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::compiler::{append_kubernetes_object, Generator, GeneratorFactory};
use crate::intent::Intent;
use crate::k8s;
use crate::{Error, Result};

/// Generates one Kubernetes Secret from literal data
pub struct SecretGenerator {
    namespace: String,
    name: String,
    data: BTreeMap<String, String>,
    immutable: bool,
}

impl SecretGenerator {
    /// Create the generator, validating the namespace and secret name
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        data: BTreeMap<String, String>,
        immutable: bool,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() {
            return Err(Error::validation("secret namespace must not be empty"));
        }
        if name.is_empty() {
            return Err(Error::validation("secret name must not be empty"));
        }
        Ok(Self {
            namespace,
            name,
            data,
            immutable,
        })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(
        namespace: String,
        name: String,
        data: BTreeMap<String, String>,
        immutable: bool,
    ) -> GeneratorFactory {
        Box::new(move || {
            Ok(Box::new(Self::new(namespace, name, data, immutable)?) as Box<dyn Generator>)
        })
    }
}

impl Generator for SecretGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        let mut secret = k8s::Secret::new(&self.name, &self.namespace);
        secret.data = self
            .data
            .iter()
            .map(|(key, value)| (key.clone(), STANDARD.encode(value)))
            .collect();
        if self.immutable {
            secret.immutable = Some(true);
        }
        append_kubernetes_object(intent, &secret)?;
        Ok(())
    }
}
