//! Typed attribute values in the store wire format.
//!
//! `AttributeValue` is a tagged union where exactly one variant is present.
//! The JSON wire form is a single-key object such as `{"S": "hello"}` or
//! `{"N": "12.5"}`. Numbers stay string-encoded end to end so that values
//! outside binary-float precision survive a round trip through the driver.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::ScalarAttributeType;

/// A single store attribute value.
///
/// Exactly one variant is present. Numbers are carried as their textual
/// representation; binaries are raw bytes (base64 only on the wire).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, string-encoded for arbitrary precision.
    N(String),
    /// Binary.
    B(bytes::Bytes),
    /// String set.
    Ss(Vec<String>),
    /// Number set (string-encoded).
    Ns(Vec<String>),
    /// Binary set.
    Bs(Vec<bytes::Bytes>),
    /// Boolean.
    Bool(bool),
    /// Null marker.
    Null(bool),
    /// List of values.
    L(Vec<AttributeValue>),
    /// Map of values.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The wire type descriptor for this value ("S", "N", "BOOL", ...).
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }

    /// The scalar key type this value can serve as, if any.
    ///
    /// Only `S`, `N`, and `B` values are legal key material.
    #[must_use]
    pub fn scalar_type(&self) -> Option<ScalarAttributeType> {
        match self {
            Self::S(_) => Some(ScalarAttributeType::S),
            Self::N(_) => Some(ScalarAttributeType::N),
            Self::B(_) => Some(ScalarAttributeType::B),
            _ => None,
        }
    }

    /// Returns the string payload if this is an `S` value.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number text if this is an `N` value.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the map payload if this is an `M` value.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list payload if this is an `L` value.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// Returns `true` if this is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }
}

// Bound-parameter conversions. The driver accepts plain Rust values and
// carries them as typed attribute values from the bind site onward.

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::N(n.to_string())
    }
}

impl From<u64> for AttributeValue {
    fn from(n: u64) -> Self {
        Self::N(n.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        Self::N(format!("{n}"))
    }
}

impl From<bytes::Bytes> for AttributeValue {
    fn from(b: bytes::Bytes) -> Self {
        Self::B(b)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(b: Vec<u8>) -> Self {
        Self::B(bytes::Bytes::from(b))
    }
}

/// Compact rendering for logs: scalars print their payload, collections
/// only their cardinality.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S:{s:?}"),
            Self::N(n) => write!(f, "N:{n}"),
            Self::Bool(b) => write!(f, "BOOL:{b}"),
            Self::Null(_) => f.write_str("NULL"),
            Self::B(b) => write!(f, "B:<{} bytes>", b.len()),
            Self::Ss(v) | Self::Ns(v) => {
                write!(f, "{}:<{} entries>", self.type_descriptor(), v.len())
            }
            Self::Bs(v) => write!(f, "BS:<{} entries>", v.len()),
            Self::L(v) => write!(f, "L:<{} entries>", v.len()),
            Self::M(m) => write!(f, "M:<{} entries>", m.len()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        let b64 = &base64::engine::general_purpose::STANDARD;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => map.serialize_entry("B", &b64.encode(b))?,
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| b64.encode(b)).collect();
                map.serialize_entry("BS", &encoded)?;
            }
            Self::Bool(b) => map.serialize_entry("BOOL", b)?,
            Self::Null(b) => map.serialize_entry("NULL", b)?,
            Self::L(list) => map.serialize_entry("L", list)?,
            Self::M(m) => map.serialize_entry("M", m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an attribute value object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        use base64::Engine;
        let b64 = &base64::engine::general_purpose::STANDARD;

        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom("attribute value must have one type key"));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => {
                let encoded: String = map.next_value()?;
                let decoded = b64.decode(&encoded).map_err(de::Error::custom)?;
                AttributeValue::B(bytes::Bytes::from(decoded))
            }
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded: Result<Vec<bytes::Bytes>, _> = encoded
                    .iter()
                    .map(|e| b64.decode(e).map(bytes::Bytes::from))
                    .collect();
                AttributeValue::Bs(decoded.map_err(de::Error::custom)?)
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => {
                return Err(de::Error::unknown_field(
                    other,
                    &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"],
                ));
            }
        };

        Ok(value)
    }
}
