//! Ordering pass
//!
//! A generator-shaped post-processor that assigns `dependsOn` edges to every
//! Kubernetes resource from a canonical kind-precedence list, so that an
//! engine applying resources in dependency order never applies a workload
//! before its supporting primitives.
//!
//! The pass is a deliberate over-approximation: a resource depends on every
//! resource of every preceding kind, whether or not a real reference exists.
//! This inflates edge counts on large intents but guarantees a sound apply
//! order without a reference-tracking analyzer.

use std::collections::BTreeMap;

use crate::compiler::{Generator, GeneratorFactory};
use crate::intent::{Intent, ResourceType};
use crate::{Error, Result};

/// Canonical apply precedence of Kubernetes kinds, cluster primitives first
static ORDERED_KINDS: [&str; 24] = [
    "Namespace",
    "ResourceQuota",
    "StorageClass",
    "CustomResourceDefinition",
    "ServiceAccount",
    "PodSecurityPolicy",
    "Role",
    "ClusterRole",
    "RoleBinding",
    "ClusterRoleBinding",
    "ConfigMap",
    "Secret",
    "Endpoints",
    "Service",
    "LimitRange",
    "PriorityClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "Deployment",
    "StatefulSet",
    "CronJob",
    "PodDisruptionBudget",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
];

/// The kinds strictly preceding `kind` in the canonical list
///
/// A kind not present in the list collects the entire list: unknown kinds
/// apply after everything known, which is the sound direction.
fn preceding_kinds(kind: &str) -> &'static [&'static str] {
    match ORDERED_KINDS.iter().position(|candidate| *candidate == kind) {
        Some(position) => &ORDERED_KINDS[..position],
        None => &ORDERED_KINDS[..],
    }
}

/// Assigns kind-precedence `dependsOn` edges to every Kubernetes resource
///
/// Terraform resources keep whatever edges and value-level references their
/// own generator set; this pass never touches them.
pub struct OrderedResourcesGenerator;

impl OrderedResourcesGenerator {
    /// Create the ordering pass
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory() -> GeneratorFactory {
        Box::new(|| Ok(Box::new(Self::new()?) as Box<dyn Generator>))
    }
}

impl Generator for OrderedResourcesGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        // First pass: snapshot each Kubernetes resource's kind and collect
        // IDs per kind in insertion order, so edge order is deterministic.
        let mut ids_by_kind: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut kinds: Vec<Option<String>> = Vec::with_capacity(intent.resources.len());
        for resource in &intent.resources {
            if resource.type_ != ResourceType::Kubernetes {
                kinds.push(None);
                continue;
            }
            let kind = resource.kind().ok_or_else(|| {
                Error::validation(format!(
                    "kubernetes resource {} has no kind attribute",
                    resource.id
                ))
            })?;
            ids_by_kind
                .entry(kind.to_string())
                .or_default()
                .push(resource.id.clone());
            kinds.push(Some(kind.to_string()));
        }

        // Second pass: every resource depends on every resource of every
        // preceding kind.
        for (resource, kind) in intent.resources.iter_mut().zip(kinds) {
            let Some(kind) = kind else { continue };
            for preceding in preceding_kinds(&kind) {
                let Some(ids) = ids_by_kind.get(*preceding) else {
                    continue;
                };
                for id in ids {
                    if !resource.depends_on.contains(id) {
                        resource.depends_on.push(id.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Resource;
    use serde_json::{Map, Value};

    fn k8s_resource(id: &str, kind: &str) -> Resource {
        let mut attributes = Map::new();
        attributes.insert("kind".to_string(), Value::String(kind.to_string()));
        Resource {
            id: id.to_string(),
            type_: ResourceType::Kubernetes,
            attributes,
            depends_on: vec![],
            extensions: Map::new(),
        }
    }

    /// Story: a later kind depends on every resource of every earlier kind
    ///
    /// The Deployment depends on both ConfigMaps even though it references
    /// neither; soundness over minimality.
    #[test]
    fn story_later_kinds_depend_on_all_earlier_resources() {
        let mut intent = Intent::new();
        intent.append(k8s_resource("v1:Namespace:demo", "Namespace")).unwrap();
        intent
            .append(k8s_resource("v1:ConfigMap:demo:a", "ConfigMap"))
            .unwrap();
        intent
            .append(k8s_resource("v1:ConfigMap:demo:b", "ConfigMap"))
            .unwrap();
        intent
            .append(k8s_resource("apps/v1:Deployment:demo:web", "Deployment"))
            .unwrap();

        OrderedResourcesGenerator::new()
            .unwrap()
            .generate(&mut intent)
            .unwrap();

        let deployment = intent.get("apps/v1:Deployment:demo:web").unwrap();
        assert_eq!(
            deployment.depends_on,
            vec![
                "v1:Namespace:demo",
                "v1:ConfigMap:demo:a",
                "v1:ConfigMap:demo:b"
            ]
        );

        // The earliest kind depends on nothing
        assert!(intent.get("v1:Namespace:demo").unwrap().depends_on.is_empty());

        // Same-kind resources never depend on each other
        assert!(intent.get("v1:ConfigMap:demo:a").unwrap().depends_on.len() == 1);
    }

    /// Story: a kind outside the canonical list applies after everything
    #[test]
    fn story_unlisted_kind_depends_on_all_listed_kinds() {
        let mut intent = Intent::new();
        intent.append(k8s_resource("v1:Namespace:demo", "Namespace")).unwrap();
        intent
            .append(k8s_resource("v1:Secret:demo:creds", "Secret"))
            .unwrap();
        intent
            .append(k8s_resource("batch/v1:Job:demo:migrate", "Job"))
            .unwrap();

        OrderedResourcesGenerator::new()
            .unwrap()
            .generate(&mut intent)
            .unwrap();

        let job = intent.get("batch/v1:Job:demo:migrate").unwrap();
        assert_eq!(job.depends_on, vec!["v1:Namespace:demo", "v1:Secret:demo:creds"]);
    }

    /// Story: Terraform resources keep their own edges untouched
    #[test]
    fn story_terraform_resources_untouched() {
        let mut intent = Intent::new();
        intent.append(k8s_resource("v1:Namespace:demo", "Namespace")).unwrap();
        intent
            .append(Resource {
                id: "hashicorp:aws:aws_db_instance:web-db".to_string(),
                type_: ResourceType::Terraform,
                attributes: Map::new(),
                depends_on: vec!["hashicorp:random:random_password:web-db".to_string()],
                extensions: Map::new(),
            })
            .unwrap();

        OrderedResourcesGenerator::new()
            .unwrap()
            .generate(&mut intent)
            .unwrap();

        let tf = intent.get("hashicorp:aws:aws_db_instance:web-db").unwrap();
        assert_eq!(
            tf.depends_on,
            vec!["hashicorp:random:random_password:web-db"]
        );
    }

    /// Story: a Kubernetes resource without a kind is a hard error
    #[test]
    fn story_missing_kind_is_an_error() {
        let mut intent = Intent::new();
        intent
            .append(Resource {
                id: "v1:Mystery:demo:x".to_string(),
                type_: ResourceType::Kubernetes,
                attributes: Map::new(),
                depends_on: vec![],
                extensions: Map::new(),
            })
            .unwrap();

        let err = OrderedResourcesGenerator::new()
            .unwrap()
            .generate(&mut intent)
            .unwrap_err();
        assert!(err.to_string().contains("no kind attribute"));
    }
}
