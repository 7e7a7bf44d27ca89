//! End-to-end pipeline scenarios
//!
//! Compiles full application configurations through the public front door
//! and checks the output-level guarantees: determinism, ID uniqueness,
//! kind-precedence ordering, the database contract, and trait patching.

use std::collections::{BTreeMap, BTreeSet};

use trellis::app::{
    AppConfiguration, Container, Database, DatabaseType, Job, MonitorType, OpsRule, Port,
    Prometheus, Service, Workload,
};
use trellis::compiler::compile_app;
use trellis::intent::{Intent, ResourceGraph, ResourceType};
use trellis::tf::CloudConfig;

fn make_container(image: &str) -> Container {
    Container {
        image: image.to_string(),
        command: None,
        args: None,
        working_dir: None,
        env: BTreeMap::new(),
    }
}

fn make_service_config() -> AppConfiguration {
    let mut containers = BTreeMap::new();
    containers.insert("nginx".to_string(), make_container("nginx:v1"));
    AppConfiguration::new(Workload::Service(Service {
        containers,
        replicas: 2,
        ports: vec![Port {
            port: 80,
            target_port: None,
            protocol: "TCP".to_string(),
            public: false,
        }],
    }))
}

fn make_database(type_: DatabaseType) -> Database {
    Database {
        type_,
        engine: "mysql".to_string(),
        version: "8.0".to_string(),
        instance_type: Some("db.t3.micro".to_string()),
        size: 20,
        category: None,
        username: "root".to_string(),
        security_ips: vec!["10.0.0.0/8".to_string()],
        subnet_id: None,
        private_routing: true,
    }
}

fn make_cloud() -> CloudConfig {
    let mut cloud = CloudConfig::default();
    cloud.aws.region = Some("us-east-1".to_string());
    cloud.alicloud.region = Some("cn-beijing".to_string());
    cloud
}

fn full_config() -> AppConfiguration {
    let mut config = make_service_config();
    config.database = Some(make_database(DatabaseType::Aws));
    config.monitoring = Some(Prometheus {
        operator_mode: true,
        monitor_type: MonitorType::Service,
        interval: Some("30s".to_string()),
        timeout: Some("15s".to_string()),
        path: Some("/metrics".to_string()),
        port: Some("8080".to_string()),
        scheme: Some("http".to_string()),
    });
    config.ops_rule = Some(OpsRule {
        max_unavailable: Some("30%".to_string()),
    });
    config
}

/// Precedence positions for the kinds this pipeline emits; unlisted kinds
/// apply after everything listed.
fn kind_rank(kind: &str) -> usize {
    ["Namespace", "Secret", "Service", "Deployment"]
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(usize::MAX)
}

#[test]
fn identical_input_compiles_to_identical_bytes() {
    let first = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();
    let second = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();
    assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn resource_ids_are_unique() {
    let intent = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();
    let ids: BTreeSet<&str> = intent.resources.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), intent.resources.len());
}

#[test]
fn ordering_edges_follow_kind_precedence() {
    let intent = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();

    let kubernetes: Vec<_> = intent
        .resources
        .iter()
        .filter(|r| r.type_ == ResourceType::Kubernetes)
        .collect();

    // Every resource of a later kind depends on every resource of every
    // earlier kind, related or not.
    for later in &kubernetes {
        for earlier in &kubernetes {
            let later_rank = kind_rank(later.kind().unwrap());
            let earlier_rank = kind_rank(earlier.kind().unwrap());
            if earlier_rank < later_rank {
                assert!(
                    later.depends_on.contains(&earlier.id),
                    "{} must depend on {}",
                    later.id,
                    earlier.id
                );
            }
        }
    }
}

#[test]
fn demo_scenario_namespace_and_deployment() {
    let intent = compile_app(
        "demo",
        "dev",
        "web",
        make_service_config(),
        CloudConfig::default(),
    )
    .unwrap();

    let namespace = intent.get("v1:Namespace:demo").expect("namespace exists");
    assert_eq!(namespace.attributes["metadata"]["name"], "demo");

    let deployment = intent
        .get("apps/v1:Deployment:demo:demo-dev-web")
        .expect("deployment exists");
    assert_eq!(deployment.attributes["spec"]["replicas"], 2);
    assert!(deployment
        .depends_on
        .contains(&"v1:Namespace:demo".to_string()));
}

#[test]
fn database_contract_holds_for_every_vendor() {
    for type_ in [DatabaseType::Aws, DatabaseType::Alicloud, DatabaseType::Local] {
        let mut config = make_service_config();
        config.database = Some(make_database(type_));
        let intent = compile_app("demo", "dev", "web", config, make_cloud()).unwrap();

        // Exactly one contract secret with the three fixed keys
        let secrets: Vec<_> = intent
            .resources
            .iter()
            .filter(|r| r.kind() == Some("Secret"))
            .collect();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].id, "v1:Secret:demo:web-db");
        let data = secrets[0].attributes["stringData"].as_object().unwrap();
        assert!(data.contains_key("hostAddress"));
        assert!(data.contains_key("username"));
        assert!(data.contains_key("password"));

        // Every container of the owning workload leads with the three
        // secret-backed env vars
        let deployment = intent
            .get("apps/v1:Deployment:demo:demo-dev-web")
            .expect("workload deployment exists");
        let containers = deployment.attributes["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        for container in containers {
            let env = container["env"].as_array().unwrap();
            assert_eq!(env[0]["name"], "KUSION_DB_HOST");
            assert_eq!(env[1]["name"], "KUSION_DB_USERNAME");
            assert_eq!(env[2]["name"], "KUSION_DB_PASSWORD");
            for var in env.iter().take(3) {
                assert_eq!(var["valueFrom"]["secretKeyRef"]["name"], "web-db");
            }
        }
    }
}

#[test]
fn job_workload_with_database_injection() {
    let mut containers = BTreeMap::new();
    containers.insert("batch".to_string(), make_container("busybox:1.36"));
    let mut config = AppConfiguration::new(Workload::Job(Job {
        containers,
        schedule: Some("0 2 * * *".to_string()),
    }));
    config.database = Some(make_database(DatabaseType::Local));

    let intent = compile_app("demo", "dev", "nightly", config, CloudConfig::default()).unwrap();

    let cron = intent
        .get("batch/v1:CronJob:demo:demo-dev-nightly")
        .expect("cron job exists");
    assert_eq!(cron.attributes["spec"]["schedule"], "0 2 * * *");
    let env = cron.attributes["spec"]["jobTemplate"]["spec"]["template"]["spec"]["containers"][0]
        ["env"]
        .as_array()
        .unwrap();
    assert_eq!(env[0]["name"], "KUSION_DB_HOST");
    assert_eq!(env[0]["valueFrom"]["secretKeyRef"]["name"], "nightly-db");

    // CronJob waits for the namespace and the contract secret
    assert!(cron.depends_on.contains(&"v1:Namespace:demo".to_string()));
    assert!(cron
        .depends_on
        .contains(&"v1:Secret:demo:nightly-db".to_string()));
}

#[test]
fn ops_rule_rewrites_rolling_update() {
    let mut config = make_service_config();
    config.ops_rule = Some(OpsRule {
        max_unavailable: Some("30%".to_string()),
    });
    let intent =
        compile_app("demo", "dev", "web", config, CloudConfig::default()).unwrap();

    let deployment = intent.get("apps/v1:Deployment:demo:demo-dev-web").unwrap();
    assert_eq!(
        deployment.attributes["spec"]["strategy"]["type"],
        "RollingUpdate"
    );
    assert_eq!(
        deployment.attributes["spec"]["strategy"]["rollingUpdate"]["maxUnavailable"],
        "30%"
    );
    // Everything else survives the patch untouched
    assert_eq!(deployment.attributes["spec"]["replicas"], 2);
}

#[test]
fn operator_mode_monitoring_wires_discovery() {
    let intent = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();

    let monitor = intent
        .get("monitoring.coreos.com/v1:ServiceMonitor:demo:web-service-monitor")
        .expect("service monitor exists");
    assert_eq!(
        monitor.attributes["spec"]["selector"]["matchLabels"]["kusion_monitoring_appname"],
        "web"
    );

    let deployment = intent.get("apps/v1:Deployment:demo:demo-dev-web").unwrap();
    assert_eq!(
        deployment.attributes["spec"]["template"]["metadata"]["labels"]
            ["kusion_monitoring_appname"],
        "web"
    );
}

#[test]
fn annotation_mode_monitoring() {
    let mut config = make_service_config();
    config.monitoring = Some(Prometheus {
        operator_mode: false,
        monitor_type: MonitorType::Service,
        interval: None,
        timeout: None,
        path: Some("/metrics".to_string()),
        port: Some("8080".to_string()),
        scheme: None,
    });
    let intent =
        compile_app("demo", "dev", "web", config, CloudConfig::default()).unwrap();

    // No monitor CR outside operator mode
    assert!(intent
        .resources
        .iter()
        .all(|r| r.kind() != Some("ServiceMonitor")));

    let deployment = intent.get("apps/v1:Deployment:demo:demo-dev-web").unwrap();
    let annotations =
        &deployment.attributes["spec"]["template"]["metadata"]["annotations"];
    assert_eq!(annotations["prometheus.io/scrape"], "true");
    assert_eq!(annotations["prometheus.io/path"], "/metrics");
    assert_eq!(annotations["prometheus.io/port"], "8080");
}

#[test]
fn resource_graph_designates_the_workload() {
    let mut config = make_service_config();
    // The local database adds its own Deployment ahead of the workload's;
    // the graph must still designate the application workload.
    config.database = Some(make_database(DatabaseType::Local));
    let intent =
        compile_app("demo", "dev", "web", config, CloudConfig::default()).unwrap();

    let graph = ResourceGraph::from_intent(&intent).unwrap();
    assert_eq!(
        graph.workload.as_deref(),
        Some("apps/v1:Deployment:demo:demo-dev-web")
    );
    assert_eq!(graph.resources.len(), intent.resources.len());
    // Relations mirror the dependsOn edges one-to-one
    let edge_count: usize = intent.resources.iter().map(|r| r.depends_on.len()).sum();
    assert_eq!(graph.relations.len(), edge_count);
}

#[test]
fn compiled_intent_serializes_for_consumers() {
    let intent = compile_app("demo", "dev", "web", full_config(), make_cloud()).unwrap();

    let yaml = intent.to_yaml().unwrap();
    assert!(yaml.contains("$kusion_path.hashicorp:aws:aws_db_instance:web-db.address"));

    let parsed: Intent = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, intent);
}
