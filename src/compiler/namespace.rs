//! Namespace generator
//!
//! Every application compiles into one Kubernetes namespace named after its
//! project; all namespaced resources the other generators emit land there.

use crate::compiler::{append_kubernetes_object, Generator, GeneratorFactory};
use crate::intent::Intent;
use crate::k8s;
use crate::{Error, Result};

/// Generates the project namespace
#[derive(Debug)]
pub struct NamespaceGenerator {
    project: String,
}

impl NamespaceGenerator {
    /// Create the generator, validating the project name
    pub fn new(project: impl Into<String>) -> Result<Self> {
        let project = project.into();
        if project.is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        Ok(Self { project })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(project: String) -> GeneratorFactory {
        Box::new(move || Ok(Box::new(Self::new(project)?) as Box<dyn Generator>))
    }
}

impl Generator for NamespaceGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        append_kubernetes_object(intent, &k8s::Namespace::new(&self.project))?;
        Ok(())
    }
}
