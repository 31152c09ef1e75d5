//! Shared record types for Metagame profile transfers.
//!
//! This crate contains the types shared between:
//! - the export path (records as the listing endpoint delivers them)
//! - the import path (records as the bulk-create endpoint expects them)
//!
//! Any changes to the wire format should be made here.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Opaque server value used for record ids and cursor positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(Number),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)` so it can be told apart
/// from a missing key (which falls back to `None` via `#[serde(default)]`).
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// An event as delivered by the listing endpoint.
///
/// Every field holds the JSON the server sent, untouched; a key the server
/// left out stays `None` and is not written back. Keys without a dedicated
/// field are kept in `other`, so an exported file holds the record exactly as
/// delivered. Nothing is validated until [`Event::project`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub event_type_id: Option<Value>,

    /// Nested user object, reduced to `user_id` on import
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,

    /// Nested profile object, reduced to `profile_id` on import
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,

    /// Absent and `null` both mean the event has no location
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Error raised when an exported event cannot be turned into a create record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("event {external_id} is missing field `{field}`")]
    MissingField {
        external_id: String,
        field: &'static str,
    },
}

impl Event {
    fn label(&self) -> String {
        match &self.external_id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "<no external_id>".to_string(),
            Some(other) => other.to_string(),
        }
    }

    fn required(&self, value: &Option<Value>, field: &'static str) -> Result<Value, ProjectionError> {
        value.clone().ok_or_else(|| self.missing(field))
    }

    fn missing(&self, field: &'static str) -> ProjectionError {
        ProjectionError::MissingField {
            external_id: self.label(),
            field,
        }
    }

    /// `id` of a nested object, or `None` when the object itself is absent
    /// or `null`. A present object without a string or number `id` is an error.
    fn nested_id(
        &self,
        value: &Option<Value>,
        id_field: &'static str,
    ) -> Result<Option<Scalar>, ProjectionError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(object) => match object.get("id") {
                Some(Value::Number(n)) => Ok(Some(Scalar::Number(n.clone()))),
                Some(Value::String(s)) => Ok(Some(Scalar::Text(s.clone()))),
                _ => Err(self.missing(id_field)),
            },
        }
    }

    /// Project this event into the shape accepted by the bulk-create endpoint.
    ///
    /// Nested `user`, `profile` and `location` objects are reduced to their
    /// ids. Fails if a copied field, the `user`/`profile` object, or the `id`
    /// of a present nested object is missing.
    pub fn project(&self) -> Result<EventCreate, ProjectionError> {
        let user_id = self
            .nested_id(&self.user, "user.id")?
            .ok_or_else(|| self.missing("user"))?;
        let profile_id = self
            .nested_id(&self.profile, "profile.id")?
            .ok_or_else(|| self.missing("profile"))?;
        let location_id = self.nested_id(&self.location, "location.id")?;

        Ok(EventCreate {
            external_id: self.required(&self.external_id, "external_id")?,
            visibility: self.required(&self.visibility, "visibility")?,
            description: self.required(&self.description, "description")?,
            extra_data: self.required(&self.extra_data, "extra_data")?,
            created_at: self.required(&self.created_at, "created_at")?,
            event_type_id: self.required(&self.event_type_id, "event_type_id")?,
            user_id,
            profile_id,
            location_id,
        })
    }
}

/// Project a whole export, stopping at the first malformed event
pub fn project_all(events: &[Event]) -> Result<Vec<EventCreate>, ProjectionError> {
    events.iter().map(Event::project).collect()
}

/// An event in the shape accepted by the bulk-create endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCreate {
    pub external_id: Value,
    pub visibility: Value,
    pub description: Value,
    pub extra_data: Value,
    pub created_at: Value,
    pub event_type_id: Value,
    pub user_id: Scalar,
    pub profile_id: Scalar,
    pub location_id: Option<Scalar>,
}

/// One response from a listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<Scalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<Scalar>,
}

/// Position in a listing, sent back as `to_timestamp` / `to_id`.
///
/// Both halves start unset, which asks the server for the newest end of the
/// collection. Each half only changes when a page carries a new value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub to_timestamp: Option<Scalar>,
    pub to_id: Option<Scalar>,
}

impl Cursor {
    /// Move to the continuation a page returned.
    /// Returns true if the cursor changed.
    pub fn advance(&mut self, last_timestamp: Option<Scalar>, last_id: Option<Scalar>) -> bool {
        let before = self.clone();
        if let Some(ts) = last_timestamp {
            self.to_timestamp = Some(ts);
        }
        if let Some(id) = last_id {
            self.to_id = Some(id);
        }
        *self != before
    }

    /// Query parameters for the halves that are set
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(ts) = &self.to_timestamp {
            pairs.push(("to_timestamp", ts.to_string()));
        }
        if let Some(id) = &self.to_id {
            pairs.push(("to_id", id.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exported_event(location: Value) -> Value {
        json!({
            "id": 991,
            "external_id": "evt-1",
            "visibility": "public",
            "description": null,
            "extra_data": {"score": 3},
            "created_at": "2023-05-01T12:00:00.123456Z",
            "event_type_id": 4,
            "event_type": {"id": 4, "name": "quest_completed"},
            "user": {"id": 12, "username": "ada"},
            "profile": {"id": 34, "username": "ada-profile"},
            "location": location
        })
    }

    #[test]
    fn test_event_keeps_unknown_fields() {
        let raw = exported_event(json!({"id": 7, "name": "Berlin"}));
        let event: Event = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(event.other.get("id"), Some(&json!(991)));
        assert_eq!(event.description, Some(Value::Null));
        assert_eq!(event.location.as_ref().unwrap()["name"], json!("Berlin"));

        // Written back out unchanged
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_event_does_not_add_missing_keys() {
        let raw = json!({"external_id": "e", "profile": {"id": 2}, "user": {"id": 1}});
        let event: Event = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(event.location, None);
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_event_accepts_nested_objects_without_id() {
        let mut raw = exported_event(json!({"name": "Berlin"}));
        raw["user"] = json!({"id": null, "username": "ada"});
        let event: Event = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(serde_json::to_value(&event).unwrap(), raw);
    }

    #[test]
    fn test_event_keeps_large_integers() {
        let raw = r#"{"external_id":"e","extra_data":{"n":123456789012345678901234567890},"total":98765432109876543210987654321}"#;
        let event: Event = serde_json::from_str(raw).unwrap();

        let written = serde_json::to_string(&event).unwrap();
        assert!(written.contains(r#""n":123456789012345678901234567890"#));
        assert!(written.contains(r#""total":98765432109876543210987654321"#));
    }

    #[test]
    fn test_projection_without_location() {
        let event: Event = serde_json::from_value(exported_event(Value::Null)).unwrap();
        let created = event.project().unwrap();

        assert_eq!(created.location_id, None);
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["location_id"], Value::Null);
        assert_eq!(json["user_id"], json!(12));
        assert_eq!(json["profile_id"], json!(34));
    }

    #[test]
    fn test_projection_with_location() {
        let event: Event = serde_json::from_value(exported_event(json!({"id": 7}))).unwrap();
        let created = event.project().unwrap();

        assert_eq!(created.location_id, Some(Scalar::from(7)));
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({
                "external_id": "evt-1",
                "visibility": "public",
                "description": null,
                "extra_data": {"score": 3},
                "created_at": "2023-05-01T12:00:00.123456Z",
                "event_type_id": 4,
                "user_id": 12,
                "profile_id": 34,
                "location_id": 7
            })
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let event: Event = serde_json::from_value(exported_event(json!({"id": "loc-9"}))).unwrap();
        assert_eq!(event.project().unwrap(), event.project().unwrap());
    }

    #[test]
    fn test_projection_missing_user() {
        let mut raw = exported_event(Value::Null);
        raw.as_object_mut().unwrap().remove("user");
        let event: Event = serde_json::from_value(raw).unwrap();

        assert_eq!(
            event.project(),
            Err(ProjectionError::MissingField {
                external_id: "evt-1".to_string(),
                field: "user",
            })
        );
    }

    #[test]
    fn test_projection_absent_location() {
        let mut raw = exported_event(Value::Null);
        raw.as_object_mut().unwrap().remove("location");
        let event: Event = serde_json::from_value(raw).unwrap();

        assert_eq!(event.project().unwrap().location_id, None);
    }

    #[test]
    fn test_projection_nested_object_without_id() {
        let event: Event = serde_json::from_value(exported_event(json!({"name": "Berlin"}))).unwrap();
        assert_eq!(
            event.project(),
            Err(ProjectionError::MissingField {
                external_id: "evt-1".to_string(),
                field: "location.id",
            })
        );

        let mut raw = exported_event(Value::Null);
        raw["user"] = json!({"id": null});
        let event: Event = serde_json::from_value(raw).unwrap();
        let err = event.project().unwrap_err();
        assert_eq!(err.to_string(), "event evt-1 is missing field `user.id`");
    }

    #[test]
    fn test_projection_null_profile() {
        let mut raw = exported_event(Value::Null);
        raw["profile"] = Value::Null;
        let event: Event = serde_json::from_value(raw).unwrap();

        assert!(matches!(
            event.project(),
            Err(ProjectionError::MissingField { field: "profile", .. })
        ));
    }

    #[test]
    fn test_projection_missing_whitelisted_field() {
        let mut raw = exported_event(Value::Null);
        raw.as_object_mut().unwrap().remove("created_at");
        let event: Event = serde_json::from_value(raw).unwrap();

        let err = event.project().unwrap_err();
        assert_eq!(err.to_string(), "event evt-1 is missing field `created_at`");
    }

    #[test]
    fn test_project_all_stops_on_bad_event() {
        let good: Event = serde_json::from_value(exported_event(Value::Null)).unwrap();
        let mut bad = good.clone();
        bad.profile = None;

        assert_eq!(project_all(&[good.clone(), good.clone()]).unwrap().len(), 2);
        assert!(project_all(&[good, bad]).is_err());
    }

    #[test]
    fn test_page_continuation_is_optional() {
        let page: Page<Value> = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.last_timestamp.is_none());
        assert!(page.last_id.is_none());

        let page: Page<Value> = serde_json::from_str(
            r#"{"items": [], "last_timestamp": "2023-05-01T12:00:00Z", "last_id": 50}"#,
        )
        .unwrap();
        assert_eq!(page.last_timestamp, Some(Scalar::from("2023-05-01T12:00:00Z")));
        assert_eq!(page.last_id, Some(Scalar::from(50)));
    }

    #[test]
    fn test_cursor_halves_advance_independently() {
        let mut cursor = Cursor::default();
        assert!(cursor.query_pairs().is_empty());

        assert!(cursor.advance(Some(Scalar::from("t1")), Some(Scalar::from(50))));
        assert!(cursor.advance(None, Some(Scalar::from(100))));
        assert_eq!(cursor.to_timestamp, Some(Scalar::from("t1")));
        assert_eq!(cursor.to_id, Some(Scalar::from(100)));

        assert!(cursor.advance(Some(Scalar::from("t2")), None));
        assert_eq!(cursor.to_id, Some(Scalar::from(100)));

        assert!(!cursor.advance(None, None));
        assert_eq!(
            cursor.query_pairs(),
            vec![("to_timestamp", "t2".to_string()), ("to_id", "100".to_string())]
        );
    }

    #[test]
    fn test_scalar_display_keeps_number_form() {
        let ts: Scalar = serde_json::from_str("1683000000.25").unwrap();
        assert_eq!(ts.to_string(), "1683000000.25");
        assert_eq!(Scalar::from("abc").to_string(), "abc");
    }
}
