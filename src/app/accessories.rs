//! Accessories and traits attached to a workload
//!
//! An accessory is a supporting capability module (the database), a trait is
//! a cross-cutting concern applied to already-generated resources
//! (monitoring, ops rule). Both are plain data here; the compiler passes in
//! [`crate::compiler`] give them behavior.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Supported database vendors
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum DatabaseType {
    /// Amazon RDS
    Aws,
    /// Alibaba Cloud RDS
    Alicloud,
    /// In-cluster database for local development
    #[default]
    Local,
}

impl std::str::FromStr for DatabaseType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "alicloud" => Ok(Self::Alicloud),
            "local" => Ok(Self::Local),
            _ => Err(crate::Error::unsupported(format!(
                "database type: {s}, expected one of: aws, alicloud, local"
            ))),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aws => write!(f, "aws"),
            Self::Alicloud => write!(f, "alicloud"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Database accessory specification
///
/// Regardless of vendor, compiling a database yields exactly one Secret named
/// `<app>-db` holding `hostAddress`/`username`/`password`; that secret is the
/// stable contract the workload injection step relies on.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /// Database vendor
    #[serde(rename = "type")]
    pub type_: DatabaseType,

    /// Database engine, e.g. mysql or postgres
    pub engine: String,

    /// Engine version, e.g. 8.0
    pub version: String,

    /// Instance class/type for cloud vendors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    /// Allocated storage in GB
    #[serde(default = "default_size")]
    pub size: u32,

    /// Instance category for vendors that distinguish editions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Admin account name
    #[serde(default = "default_username")]
    pub username: String,

    /// IP addresses or CIDR blocks allowed to reach the instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_ips: Vec<String>,

    /// Subnet (or vswitch) the instance attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Whether the workload reaches the database over the private network
    #[serde(default = "default_true")]
    pub private_routing: bool,
}

fn default_size() -> u32 {
    10
}

fn default_username() -> String {
    "root".to_string()
}

fn default_true() -> bool {
    true
}

/// Monitor kinds supported in Prometheus operator mode
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum MonitorType {
    /// Scrape through a ServiceMonitor custom resource
    #[default]
    Service,
    /// Scrape through a PodMonitor custom resource
    Pod,
}

impl std::str::FromStr for MonitorType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "pod" => Ok(Self::Pod),
            _ => Err(crate::Error::unsupported(format!(
                "monitor type: {s}, expected one of: service, pod"
            ))),
        }
    }
}

impl std::fmt::Display for MonitorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Pod => write!(f, "pod"),
        }
    }
}

/// Prometheus monitoring trait
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prometheus {
    /// Whether Prometheus runs in operator mode (CR-based scrape discovery)
    #[serde(default)]
    pub operator_mode: bool,

    /// Monitor kind to generate in operator mode
    #[serde(default)]
    pub monitor_type: MonitorType,

    /// Scrape interval, e.g. 30s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Scrape timeout, e.g. 15s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Metrics path, e.g. /metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Metrics port name or number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Scrape scheme, http or https
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// Operation rule trait constraining rollouts
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpsRule {
    /// Maximum share of replicas that may be unavailable during a rollout,
    /// as an absolute count or a percentage string like `30%`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<String>,
}
