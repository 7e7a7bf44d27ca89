//! AliCloud RDS sub-generator
//!
//! Chain: `random_password` -> `alicloud_db_instance` -> optional public
//! `alicloud_db_connection` -> `alicloud_rds_account`. The public connection
//! exists only when the security IPs grant public access and the accessory
//! is not routed privately; the contract host address follows the same
//! choice.

use serde_json::{json, Map};

use super::{random_password_resource, require_instance_type, DatabaseGenerator, DbCredentials};
use crate::intent::{kusion_path_dependency, Intent};
use crate::tf::{build_resource, ALICLOUD_REGION_ENV};
use crate::Result;

/// Instance category used when the accessory does not name one
const DEFAULT_CATEGORY: &str = "Basic";

pub(super) fn generate(
    generator: &DatabaseGenerator,
    intent: &mut Intent,
) -> Result<DbCredentials> {
    let database = &generator.database;
    let db_name = generator.db_name();
    let region = generator
        .cloud
        .alicloud
        .require_region(ALICLOUD_REGION_ENV)?
        .to_string();
    let provider = &generator.cloud.alicloud.provider;

    let random = random_password_resource(generator);
    let random_id = random.id.clone();
    intent.append(random)?;

    let mut instance_attributes = Map::new();
    instance_attributes.insert(
        "category".to_string(),
        json!(database.category.as_deref().unwrap_or(DEFAULT_CATEGORY)),
    );
    instance_attributes.insert("engine".to_string(), json!(database.engine));
    instance_attributes.insert("engine_version".to_string(), json!(database.version));
    instance_attributes.insert("instance_charge_type".to_string(), json!("Postpaid"));
    instance_attributes.insert("instance_storage".to_string(), json!(database.size));
    instance_attributes.insert(
        "instance_type".to_string(),
        json!(require_instance_type(database)?),
    );
    instance_attributes.insert("security_ips".to_string(), json!(database.security_ips));
    if let Some(subnet) = &database.subnet_id {
        instance_attributes.insert("vswitch_id".to_string(), json!(subnet));
    }
    let instance = build_resource(
        provider,
        Some(&region),
        "alicloud_db_instance",
        &db_name,
        instance_attributes,
        vec![random_id.clone()],
    );
    let instance_id = instance.id.clone();
    intent.append(instance)?;

    let mut secret_depends_on = vec![random_id.clone(), instance_id.clone()];

    // The instance's own connection string resolves over the private
    // network; a public connection endpoint is materialized only when the
    // security IPs open the instance up and private routing is off.
    let host = if generator.has_public_access() && !database.private_routing {
        let mut connection_attributes = Map::new();
        connection_attributes.insert(
            "instance_id".to_string(),
            json!(kusion_path_dependency(&instance_id, "id")),
        );
        connection_attributes.insert(
            "connection_prefix".to_string(),
            json!(format!("{db_name}-public")),
        );
        let connection = build_resource(
            provider,
            Some(&region),
            "alicloud_db_connection",
            &db_name,
            connection_attributes,
            vec![instance_id.clone()],
        );
        let connection_id = connection.id.clone();
        intent.append(connection)?;
        secret_depends_on.push(connection_id.clone());
        kusion_path_dependency(&connection_id, "connection_string")
    } else {
        kusion_path_dependency(&instance_id, "connection_string")
    };

    let mut account_attributes = Map::new();
    account_attributes.insert("account_name".to_string(), json!(database.username));
    account_attributes.insert(
        "account_password".to_string(),
        json!(kusion_path_dependency(&random_id, "result")),
    );
    account_attributes.insert("account_type".to_string(), json!("Super"));
    account_attributes.insert(
        "db_instance_id".to_string(),
        json!(kusion_path_dependency(&instance_id, "id")),
    );
    let account = build_resource(
        provider,
        Some(&region),
        "alicloud_rds_account",
        &db_name,
        account_attributes,
        vec![random_id.clone(), instance_id],
    );
    intent.append(account)?;

    Ok(DbCredentials {
        host,
        username: database.username.clone(),
        password: kusion_path_dependency(&random_id, "result"),
        depends_on: secret_depends_on,
    })
}
