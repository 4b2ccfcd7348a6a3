//! Opaque, type-prefixed external identifiers.
//!
//! A global ID is `base64("<TypeName>:<key>")`. The API boundary
//! decodes global IDs into internal keys before touching storage.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};

pub const USER_TYPE: &str = "user";
pub const ORGANIZATION_TYPE: &str = "organization";
pub const DOMAIN_TYPE: &str = "domain";

/// Encode `(type_name, key)` as an opaque global ID.
pub fn to_global_id(type_name: &str, key: Uuid) -> String {
    STANDARD.encode(format!("{type_name}:{key}"))
}

/// Decode a global ID into its type name and internal key.
pub fn from_global_id(id: &str) -> TrackerResult<(String, Uuid)> {
    let invalid = || TrackerError::Validation {
        message: format!("invalid global id: {id}"),
    };
    let bytes = STANDARD.decode(id.trim()).map_err(|_| invalid())?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (type_name, key) = decoded.split_once(':').ok_or_else(invalid)?;
    let key = Uuid::parse_str(key).map_err(|_| invalid())?;
    Ok((type_name.to_string(), key))
}

/// Decode a global ID, returning its key only if it names `expected`.
///
/// Malformed or mistyped IDs yield `None` so callers can report the
/// referenced entity as unknown.
pub fn key_of(id: &str, expected: &str) -> Option<Uuid> {
    match from_global_id(id) {
        Ok((type_name, key)) if type_name == expected => Some(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let key = Uuid::new_v4();
        let id = to_global_id(ORGANIZATION_TYPE, key);
        assert_eq!(from_global_id(&id).unwrap(), (ORGANIZATION_TYPE.to_string(), key));
    }

    #[test]
    fn key_of_rejects_wrong_type() {
        let id = to_global_id(USER_TYPE, Uuid::new_v4());
        assert!(key_of(&id, DOMAIN_TYPE).is_none());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(from_global_id("not base64 !!").is_err());
        assert!(from_global_id(&STANDARD.encode("no-separator")).is_err());
        assert!(from_global_id(&STANDARD.encode("user:not-a-uuid")).is_err());
        assert!(key_of("", USER_TYPE).is_none());
    }
}
