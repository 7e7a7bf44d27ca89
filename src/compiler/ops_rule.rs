//! Ops rule trait: rollout constraints
//!
//! The generator half participates in the ordered pipeline but emits nothing
//! for the workload runtimes this model includes: Jobs have no rollout to
//! constrain, and stock Deployments take the rolling-update rewrite in the
//! patch phase below.

use crate::app::{OpsRule, Workload};
use crate::compiler::{
    patch_resource, Generator, GeneratorFactory, GvkIndex, Patcher, PatcherFactory,
};
use crate::intent::{gvk_string, Intent};
use crate::k8s;
use crate::Result;

/// Materializes CR-based ops rules for workload runtimes that need them
pub struct OpsRuleGenerator {
    workload: Workload,
    ops_rule: Option<OpsRule>,
}

impl OpsRuleGenerator {
    /// Create the generator
    pub fn new(workload: Workload, ops_rule: Option<OpsRule>) -> Result<Self> {
        Ok(Self { workload, ops_rule })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(workload: Workload, ops_rule: Option<OpsRule>) -> GeneratorFactory {
        Box::new(move || Ok(Box::new(Self::new(workload, ops_rule)?) as Box<dyn Generator>))
    }
}

impl Generator for OpsRuleGenerator {
    fn generate(&self, _intent: &mut Intent) -> Result<()> {
        if self.ops_rule.is_none() {
            return Ok(());
        }
        match &self.workload {
            // Jobs run to completion; there is no rollout to constrain
            Workload::Job(_) => Ok(()),
            // Deployment rollout constraints are applied by OpsRulePatcher
            Workload::Service(_) => Ok(()),
        }
    }
}

/// Rewrites the Deployment rolling-update strategy from the ops rule
pub struct OpsRulePatcher {
    ops_rule: Option<OpsRule>,
}

impl OpsRulePatcher {
    /// Create the patcher
    pub fn new(ops_rule: Option<OpsRule>) -> Result<Self> {
        Ok(Self { ops_rule })
    }

    /// Factory for use with [`crate::compiler::call_patchers`]
    pub fn factory(ops_rule: Option<OpsRule>) -> PatcherFactory {
        Box::new(move || Ok(Box::new(Self::new(ops_rule)?) as Box<dyn Patcher>))
    }
}

impl Patcher for OpsRulePatcher {
    fn patch(&self, index: &mut GvkIndex<'_>) -> Result<()> {
        let Some(rule) = &self.ops_rule else {
            return Ok(());
        };
        let Some(max_unavailable) = rule
            .max_unavailable
            .as_deref()
            .filter(|value| !value.is_empty())
        else {
            return Ok(());
        };

        patch_resource::<k8s::Deployment, _>(
            index,
            &gvk_string("apps/v1", "Deployment"),
            |deployment| {
                let strategy =
                    deployment
                        .spec
                        .strategy
                        .get_or_insert_with(|| k8s::DeploymentStrategy {
                            type_: String::new(),
                            rolling_update: None,
                        });
                strategy.type_ = "RollingUpdate".to_string();
                strategy
                    .rolling_update
                    .get_or_insert_with(Default::default)
                    .max_unavailable = Some(max_unavailable.to_string());
                Ok(())
            },
        )
    }
}
