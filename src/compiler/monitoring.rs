//! Monitoring trait: Prometheus scrape wiring
//!
//! In operator mode the generator emits a ServiceMonitor or PodMonitor
//! custom resource and the patcher stamps the discovery label onto pod
//! templates; outside operator mode the patcher injects the well-known
//! `prometheus.io/*` scrape annotations instead.

use tracing::debug;

use crate::app::{MonitorType, Prometheus};
use crate::compiler::{
    append_kubernetes_object, patch_resource, Generator, GeneratorFactory, GvkIndex, Patcher,
    PatcherFactory,
};
use crate::intent::{gvk_string, Intent};
use crate::k8s;
use crate::{Error, Result};

/// Label stamped onto pod templates for CR-based scrape discovery
pub const MONITORING_APP_NAME_LABEL: &str = "kusion_monitoring_appname";

/// Annotation enabling annotation-based scraping
const SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";
/// Annotation carrying the scrape scheme
const SCHEME_ANNOTATION: &str = "prometheus.io/scheme";
/// Annotation carrying the metrics path
const PATH_ANNOTATION: &str = "prometheus.io/path";
/// Annotation carrying the metrics port
const PORT_ANNOTATION: &str = "prometheus.io/port";

/// Emits the operator-mode monitor custom resource
pub struct MonitoringGenerator {
    project: String,
    app: String,
    monitoring: Option<Prometheus>,
}

impl MonitoringGenerator {
    /// Create the generator, validating the project and app names
    pub fn new(
        project: impl Into<String>,
        app: impl Into<String>,
        monitoring: Option<Prometheus>,
    ) -> Result<Self> {
        let project = project.into();
        let app = app.into();
        if project.is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        if app.is_empty() {
            return Err(Error::validation("app name must not be empty"));
        }
        Ok(Self {
            project,
            app,
            monitoring,
        })
    }

    /// Factory for use with [`crate::compiler::call_generators`]
    pub fn factory(
        project: String,
        app: String,
        monitoring: Option<Prometheus>,
    ) -> GeneratorFactory {
        Box::new(move || {
            Ok(Box::new(Self::new(project, app, monitoring)?) as Box<dyn Generator>)
        })
    }

    fn endpoint(monitoring: &Prometheus) -> k8s::MonitorEndpoint {
        k8s::MonitorEndpoint {
            interval: monitoring.interval.clone(),
            scrape_timeout: monitoring.timeout.clone(),
            path: monitoring.path.clone(),
            port: monitoring.port.clone(),
            scheme: monitoring.scheme.clone(),
        }
    }

    fn selector(&self) -> k8s::LabelSelector {
        let mut match_labels = std::collections::BTreeMap::new();
        match_labels.insert(MONITORING_APP_NAME_LABEL.to_string(), self.app.clone());
        k8s::LabelSelector { match_labels }
    }
}

impl Generator for MonitoringGenerator {
    fn generate(&self, intent: &mut Intent) -> Result<()> {
        let Some(monitoring) = &self.monitoring else {
            return Ok(());
        };
        if !monitoring.operator_mode {
            return Ok(());
        }
        debug!(app = %self.app, monitor = %monitoring.monitor_type, "generating monitor resource");

        match monitoring.monitor_type {
            MonitorType::Service => {
                let monitor = k8s::ServiceMonitor {
                    api_version: "monitoring.coreos.com/v1".to_string(),
                    kind: "ServiceMonitor".to_string(),
                    metadata: k8s::ObjectMeta::namespaced(
                        format!("{}-service-monitor", self.app),
                        &self.project,
                    ),
                    spec: k8s::ServiceMonitorSpec {
                        selector: self.selector(),
                        endpoints: vec![Self::endpoint(monitoring)],
                    },
                };
                append_kubernetes_object(intent, &monitor)?;
            }
            MonitorType::Pod => {
                let monitor = k8s::PodMonitor {
                    api_version: "monitoring.coreos.com/v1".to_string(),
                    kind: "PodMonitor".to_string(),
                    metadata: k8s::ObjectMeta::namespaced(
                        format!("{}-pod-monitor", self.app),
                        &self.project,
                    ),
                    spec: k8s::PodMonitorSpec {
                        selector: self.selector(),
                        pod_metrics_endpoints: vec![Self::endpoint(monitoring)],
                    },
                };
                append_kubernetes_object(intent, &monitor)?;
            }
        }
        Ok(())
    }
}

/// Stamps scrape discovery onto already-generated workloads
pub struct MonitoringPatcher {
    app: String,
    monitoring: Option<Prometheus>,
}

impl MonitoringPatcher {
    /// Create the patcher, validating the app name
    pub fn new(app: impl Into<String>, monitoring: Option<Prometheus>) -> Result<Self> {
        let app = app.into();
        if app.is_empty() {
            return Err(Error::validation("app name must not be empty"));
        }
        Ok(Self { app, monitoring })
    }

    /// Factory for use with [`crate::compiler::call_patchers`]
    pub fn factory(app: String, monitoring: Option<Prometheus>) -> PatcherFactory {
        Box::new(move || Ok(Box::new(Self::new(app, monitoring)?) as Box<dyn Patcher>))
    }

    fn scrape_annotations(monitoring: &Prometheus) -> Vec<(String, String)> {
        let mut annotations = vec![(SCRAPE_ANNOTATION.to_string(), "true".to_string())];
        if let Some(scheme) = &monitoring.scheme {
            annotations.push((SCHEME_ANNOTATION.to_string(), scheme.clone()));
        }
        if let Some(path) = &monitoring.path {
            annotations.push((PATH_ANNOTATION.to_string(), path.clone()));
        }
        if let Some(port) = &monitoring.port {
            annotations.push((PORT_ANNOTATION.to_string(), port.clone()));
        }
        annotations
    }

    fn patch_template(
        &self,
        template: &mut k8s::PodTemplateSpec,
        monitoring: &Prometheus,
    ) {
        if monitoring.operator_mode {
            template
                .metadata
                .labels
                .insert(MONITORING_APP_NAME_LABEL.to_string(), self.app.clone());
        } else {
            for (key, value) in Self::scrape_annotations(monitoring) {
                template.metadata.annotations.insert(key, value);
            }
        }
    }
}

impl Patcher for MonitoringPatcher {
    fn patch(&self, index: &mut GvkIndex<'_>) -> Result<()> {
        let Some(monitoring) = self.monitoring.clone() else {
            return Ok(());
        };

        patch_resource::<k8s::Deployment, _>(
            index,
            &gvk_string("apps/v1", "Deployment"),
            |deployment| {
                self.patch_template(&mut deployment.spec.template, &monitoring);
                Ok(())
            },
        )?;

        patch_resource::<k8s::CollaSet, _>(
            index,
            &gvk_string("apps.kusionstack.io/v1alpha1", "CollaSet"),
            |colla_set| {
                self.patch_template(&mut colla_set.spec.template, &monitoring);
                Ok(())
            },
        )
    }
}
