//! AWS RDS sub-generator
//!
//! Chain: `random_password` -> `aws_security_group` -> `aws_db_instance`.
//! The instance is publicly accessible iff any allowed security IP reaches
//! in from outside private networks.

use serde_json::{json, Map};

use super::{engine_port, random_password_resource, require_instance_type, DatabaseGenerator, DbCredentials};
use crate::intent::{kusion_path_dependency, Intent};
use crate::tf::{build_resource, AWS_REGION_ENV};
use crate::Result;

pub(super) fn generate(
    generator: &DatabaseGenerator,
    intent: &mut Intent,
) -> Result<DbCredentials> {
    let database = &generator.database;
    let db_name = generator.db_name();
    let region = generator.cloud.aws.require_region(AWS_REGION_ENV)?.to_string();
    let provider = &generator.cloud.aws.provider;

    let random = random_password_resource(generator);
    let random_id = random.id.clone();
    intent.append(random)?;

    let port = engine_port(&database.engine);
    let mut sg_attributes = Map::new();
    sg_attributes.insert(
        "egress".to_string(),
        json!([{
            "cidr_blocks": ["0.0.0.0/0"],
            "protocol": "-1",
            "from_port": 0,
            "to_port": 0,
        }]),
    );
    sg_attributes.insert(
        "ingress".to_string(),
        json!([{
            "cidr_blocks": database.security_ips,
            "protocol": "tcp",
            "from_port": port,
            "to_port": port,
        }]),
    );
    let security_group = build_resource(
        provider,
        Some(&region),
        "aws_security_group",
        &db_name,
        sg_attributes,
        vec![],
    );
    let security_group_id = security_group.id.clone();
    intent.append(security_group)?;

    let mut instance_attributes = Map::new();
    instance_attributes.insert("allocated_storage".to_string(), json!(database.size));
    instance_attributes.insert("engine".to_string(), json!(database.engine));
    instance_attributes.insert("engine_version".to_string(), json!(database.version));
    instance_attributes.insert("identifier".to_string(), json!(db_name));
    instance_attributes.insert(
        "instance_class".to_string(),
        json!(require_instance_type(database)?),
    );
    instance_attributes.insert(
        "password".to_string(),
        json!(kusion_path_dependency(&random_id, "result")),
    );
    instance_attributes.insert(
        "publicly_accessible".to_string(),
        json!(generator.has_public_access()),
    );
    instance_attributes.insert("skip_final_snapshot".to_string(), json!(true));
    instance_attributes.insert("username".to_string(), json!(database.username));
    instance_attributes.insert(
        "vpc_security_group_ids".to_string(),
        json!([kusion_path_dependency(&security_group_id, "id")]),
    );
    if let Some(subnet) = &database.subnet_id {
        instance_attributes.insert("db_subnet_group_name".to_string(), json!(subnet));
    }
    let instance = build_resource(
        provider,
        Some(&region),
        "aws_db_instance",
        &db_name,
        instance_attributes,
        vec![random_id.clone(), security_group_id],
    );
    let instance_id = instance.id.clone();
    intent.append(instance)?;

    Ok(DbCredentials {
        host: kusion_path_dependency(&instance_id, "address"),
        username: database.username.clone(),
        password: kusion_path_dependency(&random_id, "result"),
        depends_on: vec![random_id, instance_id],
    })
}
