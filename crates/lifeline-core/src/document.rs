//! Strict decoding of untyped remote documents.
//!
//! Backends that hand back loosely-typed JSON (HTTP bodies, key/value
//! documents) decode through here. Missing required fields fail loudly with
//! [`Error::Decode`]; only fields declared `#[serde(default)]` on the target
//! type may be absent.

use serde::de::DeserializeOwned;

use crate::{
  Error, Result,
  contact::Contact,
  user::{PeerProfile, User},
};

/// A type with a human-readable document kind for error messages.
pub trait Document: DeserializeOwned {
  const KIND: &'static str;
}

impl Document for User {
  const KIND: &'static str = "user";
}

impl Document for Contact {
  const KIND: &'static str = "contact";
}

impl Document for PeerProfile {
  const KIND: &'static str = "peer profile";
}

impl<T: Document> Document for Vec<T> {
  const KIND: &'static str = T::KIND;
}

pub fn decode<T: Document>(value: serde_json::Value) -> Result<T> {
  serde_json::from_value(value).map_err(|source| Error::Decode { kind: T::KIND, source })
}

pub fn decode_slice<T: Document>(bytes: &[u8]) -> Result<T> {
  serde_json::from_slice(bytes).map_err(|source| Error::Decode { kind: T::KIND, source })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn missing_required_field_is_a_decode_error() {
    let doc = json!({ "user_id": uuid::Uuid::new_v4(), "name": "Ada", "note": "" });
    let err = decode::<PeerProfile>(doc).unwrap_err();
    assert!(matches!(err, Error::Decode { kind: "peer profile", .. }));
  }

  #[test]
  fn complete_profile_decodes() {
    let id = uuid::Uuid::new_v4();
    let doc = json!({ "user_id": id, "name": "Ada", "phone_number": "", "note": "" });
    let profile: PeerProfile = decode(doc).unwrap();
    assert_eq!(profile.user_id, id);
  }

  #[test]
  fn contact_list_reports_element_kind() {
    let err = decode_slice::<Vec<Contact>>(br#"[{"peer_id": 3}]"#).unwrap_err();
    assert!(matches!(err, Error::Decode { kind: "contact", .. }));
  }
}
