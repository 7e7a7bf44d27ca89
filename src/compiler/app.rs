//! Top-level application generator
//!
//! Orchestrates the fixed compilation pipeline for one application:
//!
//! namespace -> database -> workload -> ops rule -> monitoring -> ordering,
//! then the patcher list (ops rule, monitoring).
//!
//! The configuration stays read-only: when a database accessory is present,
//! the orchestrator hands the workload generator the connection env vars to
//! prepend instead of mutating the shared configuration mid-pipeline. The
//! observable contract is identical - every container of the owning workload
//! leads with the three secret-backed vars.

use tracing::info;

use crate::app::AppConfiguration;
use crate::compiler::database::DatabaseGenerator;
use crate::compiler::monitoring::{MonitoringGenerator, MonitoringPatcher};
use crate::compiler::namespace::NamespaceGenerator;
use crate::compiler::ops_rule::{OpsRuleGenerator, OpsRulePatcher};
use crate::compiler::ordering::OrderedResourcesGenerator;
use crate::compiler::workload::WorkloadGenerator;
use crate::compiler::{call_generators, call_patchers, database, Generator, GeneratorFactory, PatcherFactory};
use crate::intent::Intent;
use crate::tf::CloudConfig;
use crate::{Error, Result};

/// Compiles one application into its intent
#[derive(Debug)]
pub struct AppGenerator {
    project: String,
    stack: String,
    app: String,
    config: AppConfiguration,
    cloud: CloudConfig,
}

impl AppGenerator {
    /// Create the generator, validating the compile context
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        app: impl Into<String>,
        config: AppConfiguration,
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
        Ok(Self {
            project,
            stack,
            app,
            config,
            cloud,
        })
    }
}

impl Generator for AppGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        info!(
            project = %self.project,
            stack = %self.stack,
            app = %self.app,
            "compiling application intent"
        );

        // The database contract secret's name is fixed by the compile
        // context, so the injection list can be prepared before any
        // resource exists.
        let injected_env = if self.config.database.is_some() {
            database::secret_env(&self.app)
        } else {
            vec![]
        };

        let mut generators: Vec<GeneratorFactory> = Vec::new();
        generators.push(NamespaceGenerator::factory(self.project.clone()));
        if let Some(db) = &self.config.database {
            generators.push(DatabaseGenerator::factory(
                self.project.clone(),
                self.stack.clone(),
                self.app.clone(),
                db.clone(),
                self.cloud.clone(),
            ));
        }
        generators.push(WorkloadGenerator::factory(
            self.project.clone(),
            self.stack.clone(),
            self.app.clone(),
            self.config.workload.clone(),
            self.config.labels.clone(),
            self.config.annotations.clone(),
            injected_env,
        ));
        generators.push(OpsRuleGenerator::factory(
            self.config.workload.clone(),
            self.config.ops_rule.clone(),
        ));
        generators.push(MonitoringGenerator::factory(
            self.project.clone(),
            self.app.clone(),
            self.config.monitoring.clone(),
        ));
        generators.push(OrderedResourcesGenerator::factory());
        call_generators(intent, generators)?;

        let patchers: Vec<PatcherFactory> = vec![
            OpsRulePatcher::factory(self.config.ops_rule.clone()),
            MonitoringPatcher::factory(self.app.clone(), self.config.monitoring.clone()),
        ];
        call_patchers(intent, patchers)
    }
}

/// Compile an application configuration into a fresh intent
///
/// This is the crate's front door: callers hand in the configuration, the
/// `(project, stack)` context, the application name, and the cloud
/// configuration (usually [`CloudConfig::from_env`]), and receive the
/// complete intent or the first error.
pub fn compile_app(
    project: &str,
    stack: &str,
    app: &str,
    config: AppConfiguration,
    cloud: CloudConfig,
) -> Result<Intent> {
    let generator = AppGenerator::new(project, stack, app, config, cloud)?;
    let mut intent = Intent::new();
    generator.generate(&mut intent)?;
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Container, Service, Workload};
    use std::collections::BTreeMap;

    fn make_config() -> AppConfiguration {
        let mut containers = BTreeMap::new();
        containers.insert(
            "nginx".to_string(),
            Container {
                image: "nginx:v1".to_string(),
                command: None,
                args: None,
                working_dir: None,
                env: BTreeMap::new(),
            },
        );
        AppConfiguration::new(Workload::Service(Service {
            containers,
            replicas: 2,
            ports: vec![],
        }))
    }

    /// Story: the demo scenario compiles into namespace + deployment
    #[test]
    fn story_demo_service_scenario() {
        let intent = compile_app("demo", "dev", "web", make_config(), CloudConfig::default())
            .unwrap();

        let namespace = intent.get("v1:Namespace:demo").expect("namespace exists");
        assert!(namespace.depends_on.is_empty());

        let deployment = intent
            .get("apps/v1:Deployment:demo:demo-dev-web")
            .expect("deployment exists");
        assert_eq!(deployment.attributes["spec"]["replicas"], 2);
        assert!(deployment
            .depends_on
            .contains(&"v1:Namespace:demo".to_string()));
    }

    /// Story: the compile context is validated before anything runs
    #[test]
    fn story_context_validation() {
        let err = AppGenerator::new("", "dev", "web", make_config(), CloudConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("project name"));

        let err = AppGenerator::new("demo", "", "web", make_config(), CloudConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("stack name"));

        let err = AppGenerator::new("demo", "dev", "", make_config(), CloudConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("app name"));
    }

    /// Story: a failing accessory aborts the compile with no partial intent
    #[test]
    fn story_failing_accessory_aborts() {
        let mut config = make_config();
        config.database = Some(crate::app::Database {
            type_: crate::app::DatabaseType::Aws,
            engine: "mysql".to_string(),
            version: "8.0".to_string(),
            instance_type: Some("db.t3.micro".to_string()),
            size: 20,
            category: None,
            username: "root".to_string(),
            security_ips: vec![],
            subnet_id: None,
            private_routing: true,
        });

        // No AWS region configured: construction fails, nothing generated
        let err =
            compile_app("demo", "dev", "web", config, CloudConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no region configured"));
    }
}
