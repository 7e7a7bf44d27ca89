//! Workload generator
//!
//! Dispatches on the [`Workload`] variant: a `Service` compiles into a
//! Deployment (plus a Kubernetes Service when ports are declared), a `Job`
//! into a one-shot Job or, when a cron schedule is set, a CronJob wrapping
//! the same pod template.
//!
//! Containers are declared as a name-keyed map but emitted as an ordered
//! list; the sorted-key iteration of `BTreeMap` is what makes repeated
//! compiles byte-identical.

use std::collections::BTreeMap;

use tracing::debug;

use crate::app::{Container, Service, Workload};
use crate::compiler::{append_kubernetes_object, Generator, GeneratorFactory};
use crate::intent::{Intent, IS_WORKLOAD_EXTENSION_KEY};
use crate::k8s;
use crate::{Error, Result, APP_NAME_LABEL, PART_OF_LABEL};

/// Stamp the workload marker onto the primary resource
fn mark_workload(intent: &mut Intent, id: &str) {
    if let Some(resource) = intent.resources.iter_mut().find(|r| r.id == id) {
        resource.extensions.insert(
            IS_WORKLOAD_EXTENSION_KEY.to_string(),
            serde_json::Value::Bool(true),
        );
    }
}

/// Prefix selecting an env value sourced from a cluster secret
pub const SECRET_ENV_PREFIX: &str = "secret://";

/// Prefix selecting an env value sourced from a config map
pub const CONFIG_MAP_ENV_PREFIX: &str = "configmap://";

/// Resolve the magic env var convention into a typed env var
///
/// Prefixes are checked in order: `secret://<name>/<key>`, then
/// `configmap://<name>/<key>`; anything else is a literal value, matched
/// unconditionally last.
pub fn magic_env_var(name: &str, value: &str) -> Result<k8s::EnvVar> {
    if let Some(reference) = value.strip_prefix(SECRET_ENV_PREFIX) {
        let (secret, key) = reference.split_once('/').ok_or_else(|| {
            Error::validation(format!(
                "invalid secret reference {value} for env {name}, expected secret://<name>/<key>"
            ))
        })?;
        return Ok(k8s::EnvVar::from_secret(name, secret, key));
    }
    if let Some(reference) = value.strip_prefix(CONFIG_MAP_ENV_PREFIX) {
        let (config_map, key) = reference.split_once('/').ok_or_else(|| {
            Error::validation(format!(
                "invalid config map reference {value} for env {name}, expected configmap://<name>/<key>"
            ))
        })?;
        return Ok(k8s::EnvVar::from_config_map(name, config_map, key));
    }
    Ok(k8s::EnvVar::literal(name, value))
}

/// Generates the Kubernetes objects for the application's workload
#[derive(Debug)]
pub struct WorkloadGenerator {
    project: String,
    stack: String,
    app: String,
    workload: Workload,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    injected_env: Vec<(String, String)>,
}

impl WorkloadGenerator {
    /// Create the generator, validating names and the container set
    ///
    /// `injected_env` is prepended to every container's env list in the
    /// given order, ahead of the container's own (sorted) variables; the
    /// database accessory uses it to wire its connection secret in.
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        app: impl Into<String>,
        workload: Workload,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
        injected_env: Vec<(String, String)>,
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
        if workload.containers().is_empty() {
            return Err(Error::validation(format!(
                "workload of app {app} must define at least one container"
            )));
        }
        Ok(Self {
            project,
            stack,
            app,
            workload,
            labels,
            annotations,
            injected_env,
        })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(
        project: String,
        stack: String,
        app: String,
        workload: Workload,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
        injected_env: Vec<(String, String)>,
    ) -> GeneratorFactory {
        Box::new(move || {
            Ok(Box::new(Self::new(
                project, stack, app, workload, labels, annotations, injected_env,
            )?) as Box<dyn Generator>)
        })
    }

    /// The workload resource name: `<project>-<stack>-<app>`
    fn workload_name(&self) -> String {
        format!("{}-{}-{}", self.project, self.stack, self.app)
    }

    /// Labels uniquely selecting this application's pods
    fn unique_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(APP_NAME_LABEL.to_string(), self.app.clone());
        labels.insert(PART_OF_LABEL.to_string(), self.project.clone());
        labels
    }

    /// Selector labels merged with the configuration's extra labels
    fn merged_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.unique_labels();
        labels.extend(self.labels.clone());
        labels
    }

    /// Render containers in sorted-name order
    fn compile_containers(
        &self,
        containers: &BTreeMap<String, Container>,
        ports: &[crate::app::Port],
    ) -> Result<Vec<k8s::Container>> {
        containers
            .iter()
            .map(|(name, container)| {
                let mut env = Vec::new();
                for (env_name, env_value) in &self.injected_env {
                    env.push(magic_env_var(env_name, env_value)?);
                }
                for (env_name, env_value) in &container.env {
                    env.push(magic_env_var(env_name, env_value)?);
                }

                let container_ports = ports
                    .iter()
                    .map(|port| k8s::ContainerPort {
                        container_port: port.target_port.unwrap_or(port.port),
                        protocol: Some(port.protocol.clone()),
                    })
                    .collect();

                Ok(k8s::Container {
                    name: name.clone(),
                    image: container.image.clone(),
                    command: container.command.clone(),
                    args: container.args.clone(),
                    working_dir: container.working_dir.clone(),
                    env,
                    ports: container_ports,
                })
            })
            .collect()
    }

    fn pod_template(
        &self,
        containers: &BTreeMap<String, Container>,
        ports: &[crate::app::Port],
        restart_policy: Option<&str>,
    ) -> Result<k8s::PodTemplateSpec> {
        Ok(k8s::PodTemplateSpec {
            metadata: k8s::PodMeta {
                labels: self.merged_labels(),
                annotations: self.annotations.clone(),
            },
            spec: k8s::PodSpec {
                containers: self.compile_containers(containers, ports)?,
                restart_policy: restart_policy.map(String::from),
            },
        })
    }

    fn object_meta(&self) -> k8s::ObjectMeta {
        k8s::ObjectMeta::namespaced(self.workload_name(), &self.project)
            .with_labels(self.merged_labels())
            .with_annotations(self.annotations.clone())
    }

    fn generate_service_workload(&self, intent: &mut Intent, service: &Service) -> Result<()> {
        let deployment = k8s::Deployment {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            metadata: self.object_meta(),
            spec: k8s::DeploymentSpec {
                replicas: service.replicas,
                selector: k8s::LabelSelector {
                    match_labels: self.unique_labels(),
                },
                template: self.pod_template(&service.containers, &service.ports, None)?,
                strategy: None,
            },
        };
        let id = append_kubernetes_object(intent, &deployment)?;
        mark_workload(intent, &id);

        if !service.ports.is_empty() {
            let name = self.workload_name();
            let ports = service
                .ports
                .iter()
                .map(|port| k8s::ServicePort {
                    name: Some(format!(
                        "{name}-{}-{}",
                        port.port,
                        port.protocol.to_lowercase()
                    )),
                    port: port.port,
                    target_port: port.target_port,
                    protocol: Some(port.protocol.clone()),
                })
                .collect();
            let type_ = if service.ports.iter().any(|port| port.public) {
                "LoadBalancer"
            } else {
                "ClusterIP"
            };

            let svc = k8s::Service {
                api_version: "v1".to_string(),
                kind: "Service".to_string(),
                metadata: self.object_meta(),
                spec: k8s::ServiceSpec {
                    selector: self.unique_labels(),
                    ports,
                    type_: Some(type_.to_string()),
                },
            };
            append_kubernetes_object(intent, &svc)?;
        }
        Ok(())
    }

    fn generate_job_workload(&self, intent: &mut Intent, job: &crate::app::Job) -> Result<()> {
        let spec = k8s::JobSpec {
            template: self.pod_template(&job.containers, &[], Some("Never"))?,
        };

        if job.is_scheduled() {
            let cron_job = k8s::CronJob {
                api_version: "batch/v1".to_string(),
                kind: "CronJob".to_string(),
                metadata: self.object_meta(),
                spec: k8s::CronJobSpec {
                    schedule: job.schedule.clone().unwrap_or_default(),
                    job_template: k8s::JobTemplateSpec { spec },
                },
            };
            let id = append_kubernetes_object(intent, &cron_job)?;
            mark_workload(intent, &id);
        } else {
            let one_shot = k8s::Job {
                api_version: "batch/v1".to_string(),
                kind: "Job".to_string(),
                metadata: self.object_meta(),
                spec,
            };
            let id = append_kubernetes_object(intent, &one_shot)?;
            mark_workload(intent, &id);
        }
        Ok(())
    }
}

impl Generator for WorkloadGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        debug!(app = %self.app, "generating workload resources");
        match &self.workload {
            Workload::Service(service) => self.generate_service_workload(intent, service),
            Workload::Job(job) => self.generate_job_workload(intent, job),
        }
    }
}
