//! Developer-facing application model
//!
//! An [`AppConfiguration`] is the single input to the intent compiler: one
//! required workload (a long-running service or a run-to-completion job),
//! optional accessories (a database), optional cross-cutting traits
//! (monitoring, ops rule), and free-form labels/annotations propagated onto
//! the generated workload resources.
//!
//! The configuration may originate from an external DSL evaluator or be
//! constructed programmatically; the compiler has no dependency on how it
//! was produced, and treats it as read-only input.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod accessories;
pub mod workload;

pub use accessories::{Database, DatabaseType, MonitorType, OpsRule, Prometheus};
pub use workload::{Container, Job, Port, Service, Workload};

/// The description of one application: workload + accessories + traits
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfiguration {
    /// The primary runnable unit (required)
    pub workload: Workload,

    /// Database accessory attached to the workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Database>,

    /// Prometheus monitoring trait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Prometheus>,

    /// Operation rule trait (rollout constraints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops_rule: Option<OpsRule>,

    /// Labels merged onto generated workload resources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations merged onto generated workload resources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl AppConfiguration {
    /// Create a configuration holding only a workload
    pub fn new(workload: Workload) -> Self {
        Self {
            workload,
            database: None,
            monitoring: None,
            ops_rule: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}
