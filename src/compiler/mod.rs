//! The generator/patcher framework and every pipeline pass
//!
//! Compilation runs two strictly sequential phases over one [`Intent`]:
//!
//! 1. [`call_generators`] constructs every [`Generator`] from its factory,
//!    then invokes each in list order; generators append the resources they
//!    own.
//! 2. [`call_patchers`] constructs every [`Patcher`], indexes the generated
//!    resources by Group-Version-Kind, then invokes each patcher in list
//!    order; patchers mutate resources in place without knowing which
//!    generator produced them.
//!
//! Factories validate their arguments and fail before any `generate` call -
//! construction errors and generation errors share one error channel, and
//! the first error aborts the whole pipeline.
//!
//! For the fixed pipeline an application compiles through, see
//! [`app::AppGenerator`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::intent::{
    gvk_string, kubernetes_object_id, Intent, Resource, ResourceType, GVK_EXTENSION_KEY,
};
use crate::k8s;
use crate::{Error, Result};

pub mod app;
pub mod database;
pub mod monitoring;
pub mod namespace;
pub mod ops_rule;
pub mod ordering;
pub mod secret;
pub mod workload;

pub use app::{compile_app, AppGenerator};

/// A component that derives resources from the application configuration
/// and appends them to the intent
pub trait Generator {
    /// Append this component's resources to the intent
    fn generate(&self, intent: &mut Intent) -> Result<()>;
}

/// A component that mutates already-generated resources, indexed by GVK
///
/// Patchers are pure, total functions over the resources they find: absence
/// of a matching GVK or of the triggering configuration is a no-op, never an
/// error.
pub trait Patcher {
    /// Apply this component's mutation to the indexed resources
    fn patch(&self, index: &mut GvkIndex<'_>) -> Result<()>;
}

/// Factory constructing a generator, validating its arguments first
pub type GeneratorFactory = Box<dyn FnOnce() -> Result<Box<dyn Generator>>>;

/// Factory constructing a patcher, validating its arguments first
pub type PatcherFactory = Box<dyn FnOnce() -> Result<Box<dyn Patcher>>>;

/// Generated resources grouped by their GVK extension string
pub type GvkIndex<'a> = BTreeMap<String, Vec<&'a mut Resource>>;

/// Construct every generator, then invoke each in list order
///
/// The first construction or generation error aborts the pipeline; the
/// caller discards the partially-built intent.
pub fn call_generators(intent: &mut Intent, factories: Vec<GeneratorFactory>) -> Result<()> {
    let mut generators = Vec::with_capacity(factories.len());
    for factory in factories {
        generators.push(factory()?);
    }
    debug!(generators = generators.len(), "running generation phase");
    for generator in &generators {
        generator.generate(intent)?;
    }
    Ok(())
}

/// Construct every patcher, index the intent by GVK, then invoke each in
/// list order
pub fn call_patchers(intent: &mut Intent, factories: Vec<PatcherFactory>) -> Result<()> {
    let mut patchers = Vec::with_capacity(factories.len());
    for factory in factories {
        patchers.push(factory()?);
    }
    debug!(patchers = patchers.len(), "running patch phase");
    let mut index = index_by_gvk(&mut intent.resources);
    for patcher in &patchers {
        patcher.patch(&mut index)?;
    }
    Ok(())
}

/// Group resources by their GVK extension string
///
/// Resources without a GVK extension (Terraform resources) are not indexed;
/// patchers never touch them.
pub fn index_by_gvk(resources: &mut [Resource]) -> GvkIndex<'_> {
    let mut index = GvkIndex::new();
    for resource in resources.iter_mut() {
        let gvk = resource.gvk().map(String::from);
        if let Some(gvk) = gvk {
            index.entry(gvk).or_default().push(resource);
        }
    }
    index
}

/// Convert a typed object into a generic attributes map
///
/// This is the single typed-to-generic boundary every generator goes
/// through; conversion failures are surfaced, never swallowed.
pub fn to_attributes<T: Serialize>(object: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(object)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::serialization(
            "resource attributes must serialize to an object",
        )),
    }
}

/// Append a typed Kubernetes object to the intent
///
/// The resource ID and the GVK extension are both derived from the object's
/// own type and object metadata, keeping them consistent by construction.
/// Returns the assigned resource ID.
pub fn append_kubernetes_object(intent: &mut Intent, object: &impl k8s::Object) -> Result<String> {
    let id = kubernetes_object_id(object);
    let attributes = to_attributes(object)?;
    let mut extensions = Map::new();
    extensions.insert(
        GVK_EXTENSION_KEY.to_string(),
        Value::String(gvk_string(object.api_version(), object.kind())),
    );
    intent.append(Resource {
        id: id.clone(),
        type_: ResourceType::Kubernetes,
        attributes,
        depends_on: vec![],
        extensions,
    })?;
    Ok(id)
}

/// Unmarshal every resource of the given GVK into `T`, run the patch
/// function, and marshal the result back into the attributes map
pub fn patch_resource<T, F>(index: &mut GvkIndex<'_>, gvk: &str, mut patch_fn: F) -> Result<()>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> Result<()>,
{
    let Some(resources) = index.get_mut(gvk) else {
        return Ok(());
    };
    for resource in resources.iter_mut() {
        let mut object: T = serde_json::from_value(Value::Object(resource.attributes.clone()))?;
        patch_fn(&mut object)?;
        resource.attributes = to_attributes(&object)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AppendOne {
        name: &'static str,
    }

    impl Generator for AppendOne {
        fn generate(&self, intent: &mut Intent) -> Result<()> {
            append_kubernetes_object(intent, &k8s::Namespace::new(self.name))?;
            Ok(())
        }
    }

    struct FailingGenerator;

    impl Generator for FailingGenerator {
        fn generate(&self, _intent: &mut Intent) -> Result<()> {
            Err(Error::validation("generation failed"))
        }
    }

    /// Story: generators run in list order after all constructions succeed
    #[test]
    fn story_generators_run_in_list_order() {
        let mut intent = Intent::new();
        let factories: Vec<GeneratorFactory> = vec![
            Box::new(|| Ok(Box::new(AppendOne { name: "first" }) as Box<dyn Generator>)),
            Box::new(|| Ok(Box::new(AppendOne { name: "second" }) as Box<dyn Generator>)),
        ];
        call_generators(&mut intent, factories).unwrap();

        let ids: Vec<&str> = intent.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["v1:Namespace:first", "v1:Namespace:second"]);
    }

    /// Story: a construction error aborts before any generator runs
    #[test]
    fn story_construction_error_aborts_before_generation() {
        let mut intent = Intent::new();
        let factories: Vec<GeneratorFactory> = vec![
            Box::new(|| Ok(Box::new(AppendOne { name: "first" }) as Box<dyn Generator>)),
            Box::new(|| Err(Error::validation("bad argument"))),
        ];
        let err = call_generators(&mut intent, factories).unwrap_err();
        assert!(err.to_string().contains("bad argument"));
        // Nothing generated: the first factory's generator never ran
        assert!(intent.resources.is_empty());
    }

    /// Story: the first generation error aborts the rest of the list
    #[test]
    fn story_generation_error_aborts_pipeline() {
        let mut intent = Intent::new();
        let factories: Vec<GeneratorFactory> = vec![
            Box::new(|| Ok(Box::new(FailingGenerator) as Box<dyn Generator>)),
            Box::new(|| Ok(Box::new(AppendOne { name: "never" }) as Box<dyn Generator>)),
        ];
        let err = call_generators(&mut intent, factories).unwrap_err();
        assert!(err.to_string().contains("generation failed"));
        assert!(!intent.contains_id("v1:Namespace:never"));
    }

    /// Story: the GVK index groups resources for patchers
    #[test]
    fn story_index_groups_by_gvk() {
        let mut intent = Intent::new();
        append_kubernetes_object(&mut intent, &k8s::Namespace::new("demo")).unwrap();
        append_kubernetes_object(&mut intent, &k8s::Secret::new("a", "demo")).unwrap();
        append_kubernetes_object(&mut intent, &k8s::Secret::new("b", "demo")).unwrap();

        let index = index_by_gvk(&mut intent.resources);
        assert_eq!(index["/v1, Kind=Namespace"].len(), 1);
        assert_eq!(index["/v1, Kind=Secret"].len(), 2);
    }

    /// Story: patch_resource round-trips attributes through the typed object
    #[test]
    fn story_patch_resource_round_trip() {
        let mut intent = Intent::new();
        append_kubernetes_object(&mut intent, &k8s::Secret::new("app-db", "demo")).unwrap();

        let mut index = index_by_gvk(&mut intent.resources);
        patch_resource::<k8s::Secret, _>(&mut index, "/v1, Kind=Secret", |secret| {
            secret.immutable = Some(true);
            Ok(())
        })
        .unwrap();

        // Absent GVK is a no-op, not an error
        patch_resource::<k8s::Secret, _>(&mut index, "/v1, Kind=ConfigMap", |_| {
            panic!("must not be called")
        })
        .unwrap();

        assert_eq!(intent.resources[0].attributes["immutable"], Value::Bool(true));
    }
}
