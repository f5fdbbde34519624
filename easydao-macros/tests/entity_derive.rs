use chrono::{DateTime, Utc};
use easydao::db::{Column, Entity, FieldKind, IndexKind, MetadataRegistry, Value};

#[derive(Debug, Default, Entity)]
#[table(name = "user_profiles", comment = "user profiles")]
struct UserProfile {
    #[id(sql_type = "BIGINT", comment = "primary id")]
    id: Option<i64>,

    #[column(sql_type = "VARCHAR(36)", nullable = false, unique)]
    uuid: Option<String>,

    #[column(name = "login", index = "INDEX")]
    user_name: Option<String>,

    #[column(default = "1")]
    status: Option<i32>,

    #[created_at]
    created_time: Option<DateTime<Utc>>,

    #[updated_at]
    updated_time: Option<i64>,

    scratch: Vec<String>,
}

#[derive(Debug, Default, Entity)]
#[table(crate = "easydao::db")]
struct AuditLog {
    #[column]
    message: String,
}

#[test]
fn test_entity_info_lists_marked_fields_only() {
    let info = UserProfile::entity_info();
    assert_eq!(info.type_name, "UserProfile");
    assert_eq!(info.table, Some("user_profiles"));
    assert_eq!(info.comment, Some("user profiles"));
    let names: Vec<_> = info.fields.iter().map(|f| f.name).collect();
    assert_eq!(
        names,
        ["id", "uuid", "user_name", "status", "created_time", "updated_time"]
    );
    assert_eq!(info.fields[0].kind, FieldKind::BigInt);
    assert!(info.fields[0].primary_key);
    assert_eq!(info.fields[4].kind, FieldKind::DateTime);
    assert!(info.fields[4].created_at);
    assert!(info.fields[5].updated_at);
}

#[test]
fn test_resolved_descriptor_applies_overrides() {
    let registry = MetadataRegistry::new();
    let table = registry.resolve::<UserProfile>().unwrap();
    assert_eq!(table.name, "user_profiles");
    assert_eq!(table.primary_key, "id");

    let id = table.primary_column().unwrap();
    assert!(id.auto_increment);
    assert!(!id.nullable);
    assert_eq!(id.comment.as_deref(), Some("primary id"));

    let uuid = table.column("uuid").unwrap();
    assert_eq!(uuid.sql_type, "VARCHAR(36)");
    assert!(!uuid.nullable);
    assert!(uuid.unique);

    let login = table.column("login").unwrap();
    assert_eq!(login.field, "user_name");
    assert_eq!(login.index, Some(IndexKind::Index));

    assert_eq!(table.column("status").unwrap().default_value.as_deref(), Some("1"));
    assert_eq!(table.column("updated_time").unwrap().sql_type, "BIGINT");
}

#[test]
fn test_column_tokens_name_fields() {
    let token: Column<UserProfile> = UserProfile::USER_NAME;
    assert_eq!(token.field(), "user_name");
    assert_eq!(UserProfile::CREATED_TIME.field(), "created_time");
}

#[test]
fn test_read_and_write_fields() {
    let mut profile = UserProfile::default();
    profile.write_field("id", Value::BigInt(9)).unwrap();
    profile.write_field("user_name", Value::from("ann")).unwrap();
    assert_eq!(profile.id, Some(9));
    assert_eq!(profile.read_field("user_name"), Some(Value::from("ann")));
    assert_eq!(profile.read_field("status"), Some(Value::Null));
    assert_eq!(profile.read_field("scratch"), None);
}

#[test]
fn test_write_mismatch_is_mapping_error() {
    let mut profile = UserProfile::default();
    let err = profile
        .write_field("status", Value::from("active"))
        .unwrap_err();
    assert_eq!(err.code(), "mapping_error");
    assert!(profile.write_field("scratch", Value::Null).is_err());
}

#[test]
fn test_default_table_name_and_crate_path() {
    let table = MetadataRegistry::new().resolve::<AuditLog>().unwrap();
    assert_eq!(table.name, "audit_log");
    assert_eq!(table.primary_key, "id");
    assert!(table.primary_column().is_none());
    let message = table.column("message").unwrap();
    assert_eq!(message.sql_type, "VARCHAR(255)");
    assert!(message.nullable);
}
