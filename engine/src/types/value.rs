//! Typed record values and their JSON representation.
//!
//! Scalars map onto plain JSON. Everything JSON cannot express directly is
//! carried as a `$type`-tagged object:
//!
//! | Value       | JSON                                                    |
//! |-------------|---------------------------------------------------------|
//! | `DateTime`  | `{"$type": "date", "$date": "2006-01-02T15:04:05Z"}`    |
//! | `Reference` | `{"$type": "ref", "$id": "note/1"}`                     |
//! | `Location`  | `{"$type": "geo", "$lat": 1.5, "$lng": 2.5}`            |
//! | `Asset`     | `{"$type": "asset", "$name": "photo.png"}`              |
//! | `Sequence`  | `{"$type": "seq"}` (or the assigned number)             |
//! | `Unknown`   | `{"$type": "unknown", "$underlying_type": "money"}`     |

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value as JsonValue, json};

use crate::types::{JsonDeserializable, JsonSerializable, RecordId};

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in metres (haversine).
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// A value stored in a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    DateTime(DateTime<Utc>),
    /// Name of a stored asset.
    Asset(String),
    /// Reference to another record.
    Reference(RecordId),
    Location(GeoPoint),
    /// Server-assigned sequence; `None` until storage assigns it.
    Sequence(Option<i64>),
    /// Value of a storage-native type the engine does not model,
    /// with the underlying type name if known.
    Unknown(Option<String>),
    List(Vec<Value>),
    /// Untagged nested JSON object.
    Json(JsonValue),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of `Integer`, `Number` and assigned `Sequence` values.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) | Self::Sequence(Some(i)) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl JsonDeserializable<&JsonValue> for Value {
    fn from_json(json_obj: &JsonValue) -> Result<Self, String> {
        match json_obj {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(b) => Ok(Self::Boolean(*b)),
            JsonValue::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| format!("number {n} is out of range")),
            JsonValue::String(s) => Ok(Self::String(s.to_owned())),
            JsonValue::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            JsonValue::Object(map) => match map.get("$type") {
                Some(JsonValue::String(tag)) => tagged_from_json(tag, map),
                Some(_) => Err("$type must be a string".to_owned()),
                None => Ok(Self::Json(json_obj.clone())),
            },
        }
    }
}

fn tagged_from_json(tag: &str, map: &Map<String, JsonValue>) -> Result<Value, String> {
    match tag {
        "date" => {
            let raw = string_field(map, "$date")?;
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| format!("invalid $date \"{raw}\": {e}"))
        }
        "ref" => reference_from_json(map).map(Value::Reference),
        "geo" => {
            let lat = number_field(map, "$lat")?;
            let lng = number_field(map, "$lng")?;
            Ok(Value::Location(GeoPoint::new(lat, lng)))
        }
        "asset" => string_field(map, "$name").map(|name| Value::Asset(name.to_owned())),
        "seq" => Ok(Value::Sequence(None)),
        "unknown" => match map.get("$underlying_type") {
            None | Some(JsonValue::Null) => Ok(Value::Unknown(None)),
            Some(JsonValue::String(s)) => Ok(Value::Unknown(Some(s.to_owned()))),
            Some(_) => Err("$underlying_type must be a string".to_owned()),
        },
        "keypath" | "relation" => Err(format!("$type \"{tag}\" is only valid inside a query")),
        other => Err(format!("unknown $type \"{other}\"")),
    }
}

/// Decode the target of a `ref` object.
///
/// Accepts either `$id: "type/key"` or `$recordType` + `$recordID`.
pub(crate) fn reference_from_json(map: &Map<String, JsonValue>) -> Result<RecordId, String> {
    if let Some(JsonValue::String(raw)) = map.get("$id") {
        return RecordId::parse(raw).map_err(|e| e.to_string());
    }
    let record_type = string_field(map, "$recordType")?;
    let key = string_field(map, "$recordID")?;
    RecordId::parse(&format!("{record_type}/{key}")).map_err(|e| e.to_string())
}

fn string_field<'a>(map: &'a Map<String, JsonValue>, key: &str) -> Result<&'a str, String> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| format!("{key} must be a string"))
}

fn number_field(map: &Map<String, JsonValue>, key: &str) -> Result<f64, String> {
    map.get(key)
        .and_then(JsonValue::as_f64)
        .ok_or_else(|| format!("{key} must be a number"))
}

/// Render a timestamp the way records carry it on the wire.
#[must_use]
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl JsonSerializable<JsonValue> for Value {
    fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => json!(b),
            Self::Integer(i) | Self::Sequence(Some(i)) => json!(i),
            Self::Number(n) => json!(n),
            Self::String(s) => json!(s),
            Self::DateTime(dt) => json!({"$type": "date", "$date": format_datetime(dt)}),
            Self::Asset(name) => json!({"$type": "asset", "$name": name}),
            Self::Reference(id) => json!({
                "$type": "ref",
                "$id": id.to_string(),
                "$recordType": id.record_type,
                "$recordID": id.key,
            }),
            Self::Location(point) => json!({"$type": "geo", "$lat": point.lat, "$lng": point.lng}),
            Self::Sequence(None) => json!({"$type": "seq"}),
            Self::Unknown(underlying) => match underlying {
                Some(name) => json!({"$type": "unknown", "$underlying_type": name}),
                None => json!({"$type": "unknown"}),
            },
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(raw) => raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(Value::from_json(&json!(null)), Ok(Value::Null));
        assert_eq!(Value::from_json(&json!(true)), Ok(Value::Boolean(true)));
        assert_eq!(Value::from_json(&json!(3)), Ok(Value::Number(3.0)));
        assert_eq!(
            Value::from_json(&json!("hi")),
            Ok(Value::String("hi".to_owned()))
        );
    }

    #[test]
    fn test_reference_forms() {
        let expected = Value::Reference(RecordId::new("note", "1"));
        assert_eq!(
            Value::from_json(&json!({"$type": "ref", "$id": "note/1"})),
            Ok(expected.clone())
        );
        assert_eq!(
            Value::from_json(&json!({"$type": "ref", "$recordType": "note", "$recordID": "1"})),
            Ok(expected)
        );
        assert!(Value::from_json(&json!({"$type": "ref", "$id": "note"})).is_err());
    }

    #[test]
    fn test_date_is_normalized_to_utc() {
        let value =
            Value::from_json(&json!({"$type": "date", "$date": "2006-01-02T23:04:05+08:00"}))
                .unwrap();
        assert_eq!(
            value.to_json(),
            json!({"$type": "date", "$date": "2006-01-02T15:04:05Z"})
        );
    }

    #[test]
    fn test_query_only_tags_are_rejected() {
        let err = Value::from_json(&json!({"$type": "keypath", "$val": "a"})).unwrap_err();
        assert!(err.contains("only valid inside a query"));
        assert!(Value::from_json(&json!({"$type": "bogus"})).is_err());
    }

    #[test]
    fn test_untagged_object_is_opaque_json() {
        let raw = json!({"nested": {"a": [1, 2]}});
        assert_eq!(Value::from_json(&raw), Ok(Value::Json(raw.clone())));
        assert_eq!(Value::Json(raw.clone()).to_json(), raw);
    }

    #[test]
    fn test_unknown_and_seq() {
        assert_eq!(
            Value::from_json(&json!({"$type": "unknown", "$underlying_type": "money"})),
            Ok(Value::Unknown(Some("money".to_owned())))
        );
        assert_eq!(
            Value::from_json(&json!({"$type": "seq"})),
            Ok(Value::Sequence(None))
        );
        assert_eq!(Value::Sequence(Some(7)).to_json(), json!(7));
    }

    #[test]
    fn test_geo_distance() {
        let hk = GeoPoint::new(22.3193, 114.1694);
        let same = GeoPoint::new(22.3193, 114.1694);
        assert!(hk.distance_to(&same) < 1e-6);

        // One degree of latitude is roughly 111 km.
        let north = GeoPoint::new(23.3193, 114.1694);
        let d = hk.distance_to(&north);
        assert!((110_000.0..112_500.0).contains(&d), "distance was {d}");
    }
}
