//! Resource graph for drift and inspection tooling
//!
//! A [`ResourceGraph`] is a lighter view over a compiled intent: resources
//! indexed by ID, the explicit `(dependent, dependency)` pairs, and the
//! designated workload resource. Building the graph also validates the
//! intent's referential integrity - every `dependsOn` target must exist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Intent, ResourceType, IS_WORKLOAD_EXTENSION_KEY, RESOURCE_TYPE_EXTENSION_KEY};
use crate::{Error, Result};

/// Kubernetes kinds treated as the application's primary workload when no
/// resource carries the workload extension
const WORKLOAD_KINDS: [&str; 5] = ["Deployment", "StatefulSet", "Job", "CronJob", "CollaSet"];

/// Summary of one resource in the graph
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Target runtime
    #[serde(rename = "type")]
    pub type_: ResourceType,

    /// Kubernetes kind, or the Terraform resource type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One explicit ordering edge between two resources
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelation {
    /// The resource that must wait
    pub dependent: String,
    /// The resource it waits for
    pub dependency: String,
}

/// Lighter intent view used by drift and inspection tooling
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraph {
    /// Resources indexed by ID
    pub resources: BTreeMap<String, ResourceInfo>,

    /// Every explicit ordering edge in the intent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<GraphRelation>,

    /// ID of the application's primary workload resource, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
}

impl ResourceGraph {
    /// Build a graph from a compiled intent
    ///
    /// Fails when any `dependsOn` edge references an ID that does not exist
    /// in the same intent.
    pub fn from_intent(intent: &Intent) -> Result<Self> {
        let mut resources = BTreeMap::new();
        let mut workload = None;
        let mut workload_by_kind = None;

        for resource in &intent.resources {
            let kind = match resource.type_ {
                ResourceType::Kubernetes => resource.kind().map(String::from),
                ResourceType::Terraform => resource
                    .extensions
                    .get(RESOURCE_TYPE_EXTENSION_KEY)
                    .and_then(Value::as_str)
                    .map(String::from),
            };

            // The explicit workload marker wins; kind-based detection is the
            // fallback for intents assembled without one.
            if workload.is_none()
                && resource
                    .extensions
                    .get(IS_WORKLOAD_EXTENSION_KEY)
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            {
                workload = Some(resource.id.clone());
            }
            if workload_by_kind.is_none()
                && resource.type_ == ResourceType::Kubernetes
                && kind
                    .as_deref()
                    .is_some_and(|k| WORKLOAD_KINDS.contains(&k))
            {
                workload_by_kind = Some(resource.id.clone());
            }

            resources.insert(
                resource.id.clone(),
                ResourceInfo {
                    type_: resource.type_,
                    kind,
                },
            );
        }
        let workload = workload.or(workload_by_kind);

        let mut relations = Vec::new();
        for resource in &intent.resources {
            for dependency in &resource.depends_on {
                if !resources.contains_key(dependency) {
                    return Err(Error::validation(format!(
                        "resource {} depends on unknown resource {}",
                        resource.id, dependency
                    )));
                }
                relations.push(GraphRelation {
                    dependent: resource.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        Ok(Self {
            resources,
            relations,
            workload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Resource;
    use serde_json::Map;

    fn k8s_resource(id: &str, kind: &str, depends_on: Vec<&str>) -> Resource {
        let mut attributes = Map::new();
        attributes.insert("kind".to_string(), Value::String(kind.to_string()));
        Resource {
            id: id.to_string(),
            type_: ResourceType::Kubernetes,
            attributes,
            depends_on: depends_on.into_iter().map(String::from).collect(),
            extensions: Map::new(),
        }
    }

    /// Story: the graph mirrors the intent's explicit edges
    #[test]
    fn story_graph_from_intent() {
        let mut intent = Intent::new();
        intent
            .append(k8s_resource("v1:Namespace:demo", "Namespace", vec![]))
            .unwrap();
        intent
            .append(k8s_resource(
                "apps/v1:Deployment:demo:web",
                "Deployment",
                vec!["v1:Namespace:demo"],
            ))
            .unwrap();

        let graph = ResourceGraph::from_intent(&intent).unwrap();
        assert_eq!(graph.resources.len(), 2);
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(graph.relations[0].dependent, "apps/v1:Deployment:demo:web");
        assert_eq!(graph.relations[0].dependency, "v1:Namespace:demo");
        assert_eq!(
            graph.resources["apps/v1:Deployment:demo:web"].kind.as_deref(),
            Some("Deployment")
        );
    }

    /// Story: the workload resource is designated by its kind
    #[test]
    fn story_workload_detection() {
        let mut intent = Intent::new();
        intent
            .append(k8s_resource("v1:Namespace:demo", "Namespace", vec![]))
            .unwrap();
        intent
            .append(k8s_resource("batch/v1:CronJob:demo:tick", "CronJob", vec![]))
            .unwrap();

        let graph = ResourceGraph::from_intent(&intent).unwrap();
        assert_eq!(graph.workload.as_deref(), Some("batch/v1:CronJob:demo:tick"));
    }

    /// Story: a dangling dependsOn edge fails graph construction
    #[test]
    fn story_dangling_edge_rejected() {
        let mut intent = Intent::new();
        intent
            .append(k8s_resource(
                "apps/v1:Deployment:demo:web",
                "Deployment",
                vec!["v1:Namespace:missing"],
            ))
            .unwrap();

        let err = ResourceGraph::from_intent(&intent).unwrap_err();
        assert!(err.to_string().contains("unknown resource"));
        assert!(err.to_string().contains("v1:Namespace:missing"));
    }
}
