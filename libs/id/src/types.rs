//! ID definitions for the object runtime.

use crate::define_id;

define_id!(
    /// Identity of one object worker. Assigned once when the worker starts.
    ObjectId,
    "obj"
);

define_id!(
    /// Key of one outstanding lifecycle observation held in a record's `refs`.
    MonitorToken,
    "mon"
);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_id_roundtrip() {
        let id = ObjectId::new();
        let parsed: ObjectId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("obj_"));
    }

    #[test]
    fn test_monitor_token_rejects_object_prefix() {
        let id = ObjectId::new().to_string();
        let result: Result<MonitorToken, _> = id.parse();
        let err = result.unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<ObjectId, _> = "obj01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::MissingSeparator
        ));
    }

    #[test]
    fn test_empty() {
        let result: Result<ObjectId, _> = "".parse();
        assert!(result.unwrap_err().is_empty());
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<MonitorToken, _> = "mon_invalid".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::InvalidUlid(_)
        ));
    }

    #[test]
    fn test_json_is_string_form() {
        let id = MonitorToken::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: MonitorToken = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_prefixes_unique() {
        assert_ne!(ObjectId::PREFIX, MonitorToken::PREFIX);
    }

    proptest! {
        #[test]
        fn prop_parse_display_agree(raw in any::<u128>()) {
            let id = ObjectId::from_ulid(crate::Ulid::from(raw));
            let parsed = ObjectId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed, id);
            prop_assert_eq!(parsed.ulid(), crate::Ulid::from(raw));
        }
    }
}
