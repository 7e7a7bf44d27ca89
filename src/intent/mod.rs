//! The compiler output vocabulary
//!
//! An [`Intent`] is an ordered sequence of [`Resource`] values, the sole
//! output unit of compilation. Insertion order reflects generation order;
//! the `depends_on` edges are the authoritative ordering contract consumed
//! by the reconciliation engine - insertion order alone is not safe to
//! apply.
//!
//! This module also owns the resource ID grammar and the `$kusion_path`
//! implicit-dependency encoding shared by every generator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::k8s;
use crate::{Error, Result};

pub mod graph;

pub use graph::{GraphRelation, ResourceGraph, ResourceInfo};

/// Extension key holding the Group-Version-Kind string of a Kubernetes resource
pub const GVK_EXTENSION_KEY: &str = "GVK";

/// Extension key holding the Terraform provider address
pub const PROVIDER_EXTENSION_KEY: &str = "provider";

/// Extension key holding provider metadata such as the region
pub const PROVIDER_META_EXTENSION_KEY: &str = "providerMeta";

/// Extension key holding the Terraform resource type
pub const RESOURCE_TYPE_EXTENSION_KEY: &str = "resourceType";

/// Prefix of implicit-dependency placeholders resolved by the reconciliation engine
pub const KUSION_PATH_PREFIX: &str = "$kusion_path";

/// Extension key marking the application's primary workload resource
pub const IS_WORKLOAD_EXTENSION_KEY: &str = "kusion.io/is-workload";

/// The runtime a resource reconciles against
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ResourceType {
    /// Applied to a Kubernetes cluster
    Kubernetes,
    /// Applied through a Terraform provider
    Terraform,
}

/// One output unit of the compiler
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Globally unique ID inside one intent
    pub id: String,

    /// Target runtime
    #[serde(rename = "type")]
    pub type_: ResourceType,

    /// Untyped nested map mirroring the target wire format
    pub attributes: Map<String, Value>,

    /// IDs of resources that must be applied before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Opaque metadata: GVK string, Terraform provider descriptor
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl Resource {
    /// The GVK extension string, when this is a Kubernetes resource
    pub fn gvk(&self) -> Option<&str> {
        self.extensions.get(GVK_EXTENSION_KEY).and_then(Value::as_str)
    }

    /// The `kind` attribute, when this is a Kubernetes resource
    pub fn kind(&self) -> Option<&str> {
        self.attributes.get("kind").and_then(Value::as_str)
    }
}

/// The compiler's output: an ordered resource graph ready for reconciliation
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// Resources in generation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl Intent {
    /// Create an empty intent
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a resource with the given ID exists
    pub fn contains_id(&self, id: &str) -> bool {
        self.resources.iter().any(|r| r.id == id)
    }

    /// Look up a resource by ID
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Append a resource, enforcing ID uniqueness within the intent
    pub fn append(&mut self, resource: Resource) -> Result<()> {
        if self.contains_id(&resource.id) {
            return Err(Error::validation(format!(
                "duplicate resource id: {}",
                resource.id
            )));
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::serialization(e.to_string()))
    }
}

// =============================================================================
// Resource IDs
// =============================================================================

/// Build the canonical ID of a Kubernetes resource:
/// `apiVersion:Kind[:namespace]:name`
pub fn kubernetes_resource_id(
    api_version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
) -> String {
    if namespace.is_empty() {
        format!("{api_version}:{kind}:{name}")
    } else {
        format!("{api_version}:{kind}:{namespace}:{name}")
    }
}

/// The ID of a typed Kubernetes object, derived from the object's own
/// type and object metadata
pub fn kubernetes_object_id(object: &impl k8s::Object) -> String {
    let meta = object.metadata();
    kubernetes_resource_id(
        object.api_version(),
        object.kind(),
        &meta.namespace,
        &meta.name,
    )
}

/// Build the canonical ID of a Terraform resource:
/// `providerNamespace:providerName:resourceType:resourceName`
pub fn terraform_resource_id(
    provider_namespace: &str,
    provider_name: &str,
    resource_type: &str,
    resource_name: &str,
) -> String {
    format!("{provider_namespace}:{provider_name}:{resource_type}:{resource_name}")
}

/// The Group-Version-Kind string stored in the GVK extension, e.g.
/// `apps/v1, Kind=Deployment`; core-group objects render as
/// `/v1, Kind=Namespace`
pub fn gvk_string(api_version: &str, kind: &str) -> String {
    match api_version.split_once('/') {
        Some((group, version)) => format!("{group}/{version}, Kind={kind}"),
        None => format!("/{api_version}, Kind={kind}"),
    }
}

/// Encode an implicit dependency on an attribute of another resource,
/// resolved by the reconciliation engine after apply:
/// `$kusion_path.<resourceID>.<attributeName>`
pub fn kusion_path_dependency(resource_id: &str, attribute: &str) -> String {
    format!("{KUSION_PATH_PREFIX}.{resource_id}.{attribute}")
}
