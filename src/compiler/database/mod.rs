//! Database accessory: vendor-polymorphic relational database provisioning
//!
//! Dispatches on the configured vendor to a vendor-specific sub-generator,
//! each of which builds its own Terraform (or Kubernetes) resource chain.
//! Every vendor converges on the same external contract: exactly one Secret
//! named `<app>-db` with data keys `hostAddress`, `username`, and
//! `password`. Attribute values only known after reconciliation (generated
//! passwords, instance addresses) are encoded as `$kusion_path` placeholders
//! the reconciliation engine resolves.
//!
//! The workload side of the contract is [`secret_env`]: three env vars,
//! prepended to every container of the owning workload, that reference the
//! contract secret by name - vendor-agnostically and for both workload
//! variants.

use std::net::IpAddr;

use serde_json::json;
use tracing::debug;

use crate::app::{Database, DatabaseType};
use crate::compiler::{append_kubernetes_object, Generator, GeneratorFactory};
use crate::intent::Intent;
use crate::k8s;
use crate::tf::{CloudConfig, ALICLOUD_REGION_ENV, AWS_REGION_ENV};
use crate::{Error, Result};

mod alicloud;
mod aws;
mod local;

/// Env var carrying the database host address
pub const DB_HOST_ENV: &str = "KUSION_DB_HOST";
/// Env var carrying the database username
pub const DB_USERNAME_ENV: &str = "KUSION_DB_USERNAME";
/// Env var carrying the database password
pub const DB_PASSWORD_ENV: &str = "KUSION_DB_PASSWORD";

/// Secret data key for the host address
pub const HOST_ADDRESS_KEY: &str = "hostAddress";
/// Secret data key for the username
pub const USERNAME_KEY: &str = "username";
/// Secret data key for the password
pub const PASSWORD_KEY: &str = "password";

/// The name of the contract secret for an application
pub fn secret_name(app: &str) -> String {
    format!("{app}-db")
}

/// The env vars the injection step prepends to every container of the
/// owning workload, in order
pub fn secret_env(app: &str) -> Vec<(String, String)> {
    let secret = secret_name(app);
    vec![
        (
            DB_HOST_ENV.to_string(),
            format!("secret://{secret}/{HOST_ADDRESS_KEY}"),
        ),
        (
            DB_USERNAME_ENV.to_string(),
            format!("secret://{secret}/{USERNAME_KEY}"),
        ),
        (
            DB_PASSWORD_ENV.to_string(),
            format!("secret://{secret}/{PASSWORD_KEY}"),
        ),
    ]
}

/// Connection values a vendor sub-generator resolves for the contract secret
struct DbCredentials {
    /// Host address, a literal or a `$kusion_path` placeholder
    host: String,
    /// Admin account name
    username: String,
    /// Password, a literal or a `$kusion_path` placeholder
    password: String,
    /// Resources the contract secret's placeholders reference
    depends_on: Vec<String>,
}

/// Generates the vendor-specific database subgraph and the contract secret
#[derive(Debug)]
pub struct DatabaseGenerator {
    project: String,
    stack: String,
    app: String,
    database: Database,
    cloud: CloudConfig,
}

impl DatabaseGenerator {
    /// Create the generator, validating names, security IPs, and the
    /// vendor's cloud configuration
    ///
    /// Cloud vendors require an instance type and a configured region; the
    /// region comes from the injected [`CloudConfig`], read from the
    /// environment once per compile invocation, and its absence is a hard
    /// configuration error rather than a default.
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        app: impl Into<String>,
        database: Database,
        cloud: CloudConfig,
    ) -> Result<Self> {
        let project = project.into();
        let stack = stack.into();
        let app = app.into();
        if project.is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        if stack.is_empty() {
            return Err(Error::validation("stack name must not be empty"));
        }
        if app.is_empty() {
            return Err(Error::validation("app name must not be empty"));
        }
        if database.engine.is_empty() {
            return Err(Error::validation("database engine must not be empty"));
        }
        validate_security_ips(&database.security_ips)?;

        match database.type_ {
            DatabaseType::Aws => {
                cloud.aws.require_region(AWS_REGION_ENV)?;
                require_instance_type(&database)?;
            }
            DatabaseType::Alicloud => {
                cloud.alicloud.require_region(ALICLOUD_REGION_ENV)?;
                require_instance_type(&database)?;
            }
            DatabaseType::Local => {}
        }

        Ok(Self {
            project,
            stack,
            app,
            database,
            cloud,
        })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(
        project: String,
        stack: String,
        app: String,
        database: Database,
        cloud: CloudConfig,
    ) -> GeneratorFactory {
        Box::new(move || {
            Ok(Box::new(Self::new(project, stack, app, database, cloud)?) as Box<dyn Generator>)
        })
    }

    /// The name every vendor resource of this accessory shares
    fn db_name(&self) -> String {
        secret_name(&self.app)
    }

    /// Whether any allowed security IP reaches in from outside private networks
    fn has_public_access(&self) -> bool {
        has_public_access(&self.database.security_ips)
    }
}

impl Generator for DatabaseGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        debug!(app = %self.app, vendor = %self.database.type_, "generating database accessory");
        let credentials = match self.database.type_ {
            DatabaseType::Aws => aws::generate(self, intent)?,
            DatabaseType::Alicloud => alicloud::generate(self, intent)?,
            DatabaseType::Local => local::generate(self, intent)?,
        };

        // The contract every vendor converges on: one secret, three keys.
        // stringData keeps placeholder values resolvable by the engine.
        let mut secret = k8s::Secret::new(self.db_name(), &self.project);
        secret
            .string_data
            .insert(HOST_ADDRESS_KEY.to_string(), credentials.host);
        secret
            .string_data
            .insert(USERNAME_KEY.to_string(), credentials.username);
        secret
            .string_data
            .insert(PASSWORD_KEY.to_string(), credentials.password);

        let id = append_kubernetes_object(intent, &secret)?;
        if let Some(resource) = intent.resources.iter_mut().find(|r| r.id == id) {
            resource.depends_on = credentials.depends_on;
        }
        Ok(())
    }
}

/// The default server port of a database engine
fn engine_port(engine: &str) -> u16 {
    if engine.to_lowercase().starts_with("postgres") {
        5432
    } else {
        3306
    }
}

fn require_instance_type(database: &Database) -> Result<&str> {
    database
        .instance_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            Error::validation(format!(
                "database instance type must be set for vendor {}",
                database.type_
            ))
        })
}

/// Parse one security entry: a bare IP address or a CIDR block
fn parse_security_entry(entry: &str) -> Result<IpAddr> {
    let (address, prefix) = match entry.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (entry, None),
    };
    let ip: IpAddr = address
        .parse()
        .map_err(|_| Error::validation(format!("invalid security IP: {entry}")))?;
    if let Some(prefix) = prefix {
        let bits: u8 = prefix
            .parse()
            .map_err(|_| Error::validation(format!("invalid security IP: {entry}")))?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return Err(Error::validation(format!("invalid security IP: {entry}")));
        }
    }
    Ok(ip)
}

/// Validate that every entry is an IP address or CIDR block
fn validate_security_ips(entries: &[String]) -> Result<()> {
    for entry in entries {
        parse_security_entry(entry)?;
    }
    Ok(())
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

/// Public access is granted iff any parsed entry is not a private-network
/// address; entries were validated at construction
fn has_public_access(entries: &[String]) -> bool {
    entries
        .iter()
        .filter_map(|entry| parse_security_entry(entry).ok())
        .any(|ip| !is_private(&ip))
}

/// The shared `random_password` resource every cloud vendor chain starts with
fn random_password_resource(generator: &DatabaseGenerator) -> crate::intent::Resource {
    let mut attributes = serde_json::Map::new();
    attributes.insert("length".to_string(), json!(16));
    attributes.insert("special".to_string(), json!(true));
    attributes.insert("override_special".to_string(), json!("_"));
    crate::tf::build_resource(
        &generator.cloud.random,
        None,
        "random_password",
        &generator.db_name(),
        attributes,
        vec![],
    )
}
