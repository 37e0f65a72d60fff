//! Type-chain composition: derived schemas and handler delegation.

mod common;

use std::sync::Arc;

use holon_object::{
    ComputedField, FieldError, FieldHandler, FieldMap, ObjectClass, ObjectOps, Record, Resolution,
    TypeDefinition, Value,
};
use serde_json::json;

use common::{fields, person_type};

/// Accepts `name` as `{"first": .., "last": ..}`; hands plain strings to the base type.
struct StructuredName;

impl FieldHandler for StructuredName {
    fn intercepts(&self) -> Vec<String> {
        vec!["name".into()]
    }

    fn resolve_set(
        &self,
        _field: &str,
        value: &Value,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        let Some(parts) = value.as_object() else {
            return Ok(Resolution::Delegate);
        };
        let mut changes = FieldMap::new();
        for key in ["first", "last"] {
            changes.insert(key.into(), parts.get(key).cloned().unwrap_or(json!("")));
        }
        Ok(Resolution::Done(changes))
    }
}

/// Derives `badge` from `title` whenever both arrive in one merge.
struct BadgeMerge;

impl FieldHandler for BadgeMerge {
    fn intercepts(&self) -> Vec<String> {
        vec!["badge".into()]
    }

    fn resolve_merge(
        &self,
        changes: &FieldMap,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        let Some(title) = changes.get("title").and_then(Value::as_str) else {
            return Ok(Resolution::Delegate);
        };
        let mut claimed = FieldMap::new();
        claimed.insert("badge".into(), json!(format!("[{title}]")));
        Ok(Resolution::Done(claimed))
    }
}

fn employee_type() -> Arc<TypeDefinition> {
    TypeDefinition::builder("employee")
        .extends(&person_type())
        .field("age", 18)
        .field("title", "")
        .field("badge", "")
        .handler(StructuredName)
        .handler(BadgeMerge)
        .handler(ComputedField::new("initials", |r: &Record| {
            let initial = |f: &str| r.str_field(f).and_then(|s| s.chars().next());
            json!([initial("first"), initial("last")]
                .into_iter()
                .flatten()
                .collect::<String>())
        }))
        .build()
        .unwrap()
}

#[test]
fn test_derived_schema_layout() {
    let employee = employee_type();
    assert_eq!(
        employee.schema().names().collect::<Vec<_>>(),
        ["first", "last", "age", "title", "badge"]
    );
    assert_eq!(employee.schema().default_of("age"), Some(&json!(18)));
    assert!(employee.is_a("person"));
    assert_eq!(employee.chain().depth(), 4);
}

#[tokio::test]
async fn test_derived_handler_runs_first() {
    let obj = ObjectClass::new(employee_type()).spawn_default().await.unwrap();
    assert_eq!(obj.field("age"), Some(&json!(18)));

    obj.set("name", json!({"first": "Ida", "last": "Wells"}))
        .await
        .unwrap();
    assert_eq!(obj.get_field("name").await.unwrap(), Some(json!("Ida Wells")));
    assert_eq!(obj.get_field("initials").await.unwrap(), Some(json!("IW")));
}

#[tokio::test]
async fn test_delegation_reaches_base_handler() {
    let obj = ObjectClass::new(employee_type()).spawn_default().await.unwrap();

    // Plain strings fall through to the person type's splitter.
    obj.set("name", json!("Max Planck")).await.unwrap();
    assert_eq!(
        obj.get_fields(&["first", "last"]).await.unwrap(),
        [Some(json!("Max")), Some(json!("Planck"))]
    );

    // And the base handler's validation still applies.
    let err = obj.set("name", json!(3)).await.unwrap_err();
    assert!(matches!(
        err,
        holon_object::ObjectError::Field(FieldError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn test_merge_override_and_default_merge() {
    let obj = ObjectClass::new(employee_type()).spawn_default().await.unwrap();

    let updated = obj
        .merge(fields([("badge", json!("")), ("title", json!("CTO"))]))
        .await
        .unwrap();
    assert_eq!(updated.field("badge"), Some(&json!("[CTO]")));

    // Without a title the override delegates; keys resolve one by one.
    let updated = obj
        .merge(fields([("badge", json!("guest")), ("name", json!("Ada Byron"))]))
        .await
        .unwrap();
    assert_eq!(updated.field("badge"), Some(&json!("guest")));
    assert_eq!(updated.field("first"), Some(&json!("Ada")));
    assert_eq!(updated.field("title"), Some(&json!("CTO")));
}

#[tokio::test]
async fn test_merge_override_resolves_other_keys_per_field() {
    let obj = ObjectClass::new(employee_type()).spawn_default().await.unwrap();

    let updated = obj
        .merge(fields([
            ("title", json!("CTO")),
            ("badge", json!("")),
            ("name", json!("Ann Lee")),
        ]))
        .await
        .unwrap();
    assert_eq!(updated.field("badge"), Some(&json!("[CTO]")));
    assert_eq!(updated.field("title"), Some(&json!("CTO")));
    assert_eq!(
        updated.get_fields(&["first", "last", "name"]).await.unwrap(),
        [Some(json!("Ann")), Some(json!("Lee")), Some(json!("Ann Lee"))]
    );

    // Structured names still reach the derived handler inside a merge.
    let updated = obj
        .merge(fields([
            ("title", json!("CEO")),
            ("badge", json!("")),
            ("name", json!({"first": "Bo", "last": "Ek"})),
        ]))
        .await
        .unwrap();
    assert_eq!(updated.field("badge"), Some(&json!("[CEO]")));
    assert_eq!(updated.field("last"), Some(&json!("Ek")));
}

#[tokio::test]
async fn test_computed_field_rejects_writes() {
    let obj = ObjectClass::new(employee_type()).spawn_default().await.unwrap();
    let err = obj.set("initials", json!("ZZ")).await.unwrap_err();
    assert!(matches!(
        err,
        holon_object::ObjectError::Field(FieldError::ReadOnly(_))
    ));
}

#[tokio::test]
async fn test_base_type_unaffected_by_derivation() {
    let person = person_type();
    let _employee = employee_type();
    let obj = ObjectClass::new(person).spawn_default().await.unwrap();

    assert_eq!(obj.field("age"), Some(&Value::Null));
    assert_eq!(obj.get_field("initials").await.unwrap(), None);
    assert_eq!(obj.field("title"), None);
}
