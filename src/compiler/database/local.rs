//! Local in-cluster sub-generator
//!
//! Runs the database engine as a single-replica Deployment plus a ClusterIP
//! Service inside the project namespace. The contract secret carries the
//! Service name as the host address; the engine container reads its own
//! credentials back out of the same secret.
//!
//! Credentials are derived, not random: compiles of identical input must be
//! byte-identical. This vendor is for development loops, not production.

use std::collections::BTreeMap;

use super::{engine_port, DatabaseGenerator, DbCredentials, PASSWORD_KEY};
use crate::compiler::append_kubernetes_object;
use crate::intent::Intent;
use crate::k8s;
use crate::{Result, APP_NAME_LABEL};

pub(super) fn generate(
    generator: &DatabaseGenerator,
    intent: &mut Intent,
) -> Result<DbCredentials> {
    let database = &generator.database;
    let db_name = generator.db_name();
    let port = engine_port(&database.engine);

    let mut labels = BTreeMap::new();
    labels.insert(APP_NAME_LABEL.to_string(), db_name.clone());

    let container = k8s::Container {
        name: db_name.clone(),
        image: format!("{}:{}", database.engine, database.version),
        command: None,
        args: None,
        working_dir: None,
        env: engine_env(&database.engine, &database.username, &db_name),
        ports: vec![k8s::ContainerPort {
            container_port: port,
            protocol: None,
        }],
    };

    let deployment = k8s::Deployment {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        metadata: k8s::ObjectMeta::namespaced(&db_name, &generator.project)
            .with_labels(labels.clone()),
        spec: k8s::DeploymentSpec {
            replicas: 1,
            selector: k8s::LabelSelector {
                match_labels: labels.clone(),
            },
            template: k8s::PodTemplateSpec {
                metadata: k8s::PodMeta {
                    labels: labels.clone(),
                    annotations: BTreeMap::new(),
                },
                spec: k8s::PodSpec {
                    containers: vec![container],
                    restart_policy: None,
                },
            },
            strategy: None,
        },
    };
    append_kubernetes_object(intent, &deployment)?;

    let service = k8s::Service {
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        metadata: k8s::ObjectMeta::namespaced(&db_name, &generator.project)
            .with_labels(labels.clone()),
        spec: k8s::ServiceSpec {
            selector: labels,
            ports: vec![k8s::ServicePort {
                name: None,
                port,
                target_port: None,
                protocol: None,
            }],
            type_: Some("ClusterIP".to_string()),
        },
    };
    append_kubernetes_object(intent, &service)?;

    Ok(DbCredentials {
        // Same-namespace service DNS
        host: db_name,
        username: database.username.clone(),
        password: derived_password(&generator.project, &generator.stack, &generator.app),
        depends_on: vec![],
    })
}

/// Engine container env wiring the credentials back out of the contract secret
fn engine_env(engine: &str, username: &str, secret: &str) -> Vec<k8s::EnvVar> {
    if engine.to_lowercase().starts_with("postgres") {
        return vec![
            k8s::EnvVar::literal("POSTGRES_USER", username),
            k8s::EnvVar::from_secret("POSTGRES_PASSWORD", secret, PASSWORD_KEY),
        ];
    }
    // mysql / mariadb family
    let mut env = vec![k8s::EnvVar::from_secret(
        "MYSQL_ROOT_PASSWORD",
        secret,
        PASSWORD_KEY,
    )];
    if username != "root" {
        env.push(k8s::EnvVar::literal("MYSQL_USER", username));
        env.push(k8s::EnvVar::from_secret("MYSQL_PASSWORD", secret, PASSWORD_KEY));
    }
    env
}

/// Derive the dev-only credential from the compile context
///
/// FNV-1a over `project/stack/app`; stable across platforms and toolchain
/// releases, which the byte-determinism guarantee requires.
fn derived_password(project: &str, stack: &str, app: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in format!("{project}/{stack}/{app}").bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{hash:016x}")
}
