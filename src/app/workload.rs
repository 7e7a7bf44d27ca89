//! Workload model: the primary runnable unit of an application
//!
//! A workload is either a long-running [`Service`] or a run-to-completion
//! [`Job`]. The two variants form a tagged sum type so every dispatch point
//! in the compiler matches exhaustively; there is no way to construct a
//! configuration with both or neither.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The primary runnable unit of an application
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Workload {
    /// Long-running service exposed inside (or outside) the cluster
    Service(Service),
    /// Run-to-completion or cron-scheduled job
    Job(Job),
}

impl Workload {
    /// The containers of either variant, keyed by container name
    pub fn containers(&self) -> &BTreeMap<String, Container> {
        match self {
            Workload::Service(service) => &service.containers,
            Workload::Job(job) => &job.containers,
        }
    }

    /// Mutable access to the containers of either variant
    pub fn containers_mut(&mut self) -> &mut BTreeMap<String, Container> {
        match self {
            Workload::Service(service) => &mut service.containers,
            Workload::Job(job) => &mut job.containers,
        }
    }
}

/// A long-running service workload
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Containers keyed by name; emitted in sorted-name order
    pub containers: BTreeMap<String, Container>,

    /// Number of replicas
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Ports exposed by the service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
}

fn default_replicas() -> u32 {
    1
}

/// A run-to-completion or cron-scheduled job workload
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Containers keyed by name; emitted in sorted-name order
    pub containers: BTreeMap<String, Container>,

    /// Cron schedule; absent or empty means a one-shot Job, present means a CronJob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Job {
    /// True when this job runs on a cron schedule
    pub fn is_scheduled(&self) -> bool {
        self.schedule.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// One container of a workload
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container image
    pub image: String,

    /// Entrypoint command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Entrypoint arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Environment variables, keyed by name
    ///
    /// A value may be a literal, `secret://<name>/<key>`, or
    /// `configmap://<name>/<key>`; see the compiler's magic env var
    /// convention.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// One exposed port of a service workload
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Port the service listens on
    pub port: u16,

    /// Port the container listens on; defaults to `port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,

    /// Protocol, TCP or UDP
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Whether the port is reachable from outside the cluster
    #[serde(default)]
    pub public: bool,
}

fn default_protocol() -> String {
    "TCP".to_string()
}
