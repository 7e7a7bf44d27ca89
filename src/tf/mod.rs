//! Terraform provider descriptors and cloud configuration
//!
//! Cloud accessories emit Terraform resources. Which provider build to use
//! and which region to target are environment concerns, so they live in an
//! explicit [`CloudConfig`] passed into generator constructors -
//! [`CloudConfig::from_env`] is the only place process environment is read,
//! once per compile invocation, keeping the compiler itself a pure function
//! of its declared inputs.

use serde_json::{json, Map, Value};

use crate::intent::{
    terraform_resource_id, Resource, ResourceType, PROVIDER_EXTENSION_KEY,
    PROVIDER_META_EXTENSION_KEY, RESOURCE_TYPE_EXTENSION_KEY,
};
use crate::{Error, Result};

/// Default AWS provider build
pub const DEFAULT_AWS_PROVIDER: &str = "registry.terraform.io/hashicorp/aws/5.0.1";

/// Default AliCloud provider build
pub const DEFAULT_ALICLOUD_PROVIDER: &str = "registry.terraform.io/aliyun/alicloud/1.209.1";

/// Default random provider build, used for generated passwords
pub const DEFAULT_RANDOM_PROVIDER: &str = "registry.terraform.io/hashicorp/random/3.5.1";

/// Environment variable overriding the AWS provider build
pub const TF_PROVIDER_AWS_ENV: &str = "TF_PROVIDER_AWS";

/// Environment variable holding the AWS region
pub const AWS_REGION_ENV: &str = "AWS_PROVIDER_REGION";

/// Environment variable overriding the AliCloud provider build
pub const TF_PROVIDER_ALICLOUD_ENV: &str = "TF_PROVIDER_ALICLOUD";

/// Environment variable holding the AliCloud region
pub const ALICLOUD_REGION_ENV: &str = "ALICLOUD_PROVIDER_REGION";

/// A Terraform provider, parsed from its 4-segment registry address
/// `registry.host/namespace/name/version`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provider {
    /// The full source address
    pub url: String,
    /// Registry host, e.g. registry.terraform.io
    pub host: String,
    /// Provider namespace, e.g. hashicorp
    pub namespace: String,
    /// Provider name, e.g. aws
    pub name: String,
    /// Provider version, e.g. 5.0.1
    pub version: String,
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.split('/').collect();
        if segments.len() != 4 || segments.iter().any(|seg| seg.is_empty()) {
            return Err(Error::validation(format!(
                "invalid provider address: {s}, expected registry.host/namespace/name/version"
            )));
        }
        Ok(Self {
            url: s.to_string(),
            host: segments[0].to_string(),
            namespace: segments[1].to_string(),
            name: segments[2].to_string(),
            version: segments[3].to_string(),
        })
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// One vendor's provider build plus the region it targets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider build
    pub provider: Provider,
    /// Target region; required before the vendor's resources can be generated
    pub region: Option<String>,
}

impl ProviderConfig {
    /// The region, or a configuration error naming the environment variable
    /// that should have supplied it
    pub fn require_region(&self, env_var: &str) -> Result<&str> {
        self.region
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                Error::validation(format!(
                    "no region configured for provider {}: set {env_var}",
                    self.provider.name
                ))
            })
    }
}

/// Cloud configuration injected into accessory generators
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudConfig {
    /// AWS provider configuration
    pub aws: ProviderConfig,
    /// AliCloud provider configuration
    pub alicloud: ProviderConfig,
    /// Random provider, region-less
    pub random: Provider,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            aws: ProviderConfig {
                provider: DEFAULT_AWS_PROVIDER.parse().expect("default is well-formed"),
                region: None,
            },
            alicloud: ProviderConfig {
                provider: DEFAULT_ALICLOUD_PROVIDER
                    .parse()
                    .expect("default is well-formed"),
                region: None,
            },
            random: DEFAULT_RANDOM_PROVIDER
                .parse()
                .expect("default is well-formed"),
        }
    }
}

impl CloudConfig {
    /// Build the configuration from process environment variables
    ///
    /// Provider addresses fall back to the pinned defaults when the
    /// `TF_PROVIDER_*` overrides are unset. Regions stay `None` when unset;
    /// vendors requiring one fail at generator construction, not here.
    pub fn from_env() -> Result<Self> {
        let aws_provider = match std::env::var(TF_PROVIDER_AWS_ENV) {
            Ok(addr) => addr.parse()?,
            Err(_) => DEFAULT_AWS_PROVIDER.parse()?,
        };
        let alicloud_provider = match std::env::var(TF_PROVIDER_ALICLOUD_ENV) {
            Ok(addr) => addr.parse()?,
            Err(_) => DEFAULT_ALICLOUD_PROVIDER.parse()?,
        };
        Ok(Self {
            aws: ProviderConfig {
                provider: aws_provider,
                region: std::env::var(AWS_REGION_ENV).ok(),
            },
            alicloud: ProviderConfig {
                provider: alicloud_provider,
                region: std::env::var(ALICLOUD_REGION_ENV).ok(),
            },
            random: DEFAULT_RANDOM_PROVIDER.parse()?,
        })
    }
}

/// Assemble a Terraform [`Resource`] for the given provider
///
/// The ID is derived from the provider namespace/name and the resource
/// type/name; extensions carry the provider address, provider metadata
/// (region, when the provider has one), and the resource type.
pub fn build_resource(
    provider: &Provider,
    region: Option<&str>,
    resource_type: &str,
    resource_name: &str,
    attributes: Map<String, Value>,
    depends_on: Vec<String>,
) -> Resource {
    let mut extensions = Map::new();
    extensions.insert(
        PROVIDER_EXTENSION_KEY.to_string(),
        Value::String(provider.url.clone()),
    );
    if let Some(region) = region {
        extensions.insert(
            PROVIDER_META_EXTENSION_KEY.to_string(),
            json!({ "region": region }),
        );
    }
    extensions.insert(
        RESOURCE_TYPE_EXTENSION_KEY.to_string(),
        Value::String(resource_type.to_string()),
    );

    Resource {
        id: terraform_resource_id(&provider.namespace, &provider.name, resource_type, resource_name),
        type_: ResourceType::Terraform,
        attributes,
        depends_on,
        extensions,
    }
}
