// SPDX-License-Identifier: Apache-2.0

//! The fixed set of attribute types and their value predicates.

use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute/plural/singular name syntax.
pub const PROP_NAME_PATTERN: &str = "^[a-z_][a-z0-9_./]{0,62}$";
/// Map key syntax (distinct from attribute names).
pub const MAP_KEY_PATTERN: &str = "^[a-z0-9][a-z0-9_.\\-]{0,62}$";

static PROP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(PROP_NAME_PATTERN).expect("property-name regex"));
static MAP_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(MAP_KEY_PATTERN).expect("map-key regex"));

/// Returns true if `name` is a legal attribute (or plural/singular) name.
/// The `"*"` sentinel is not covered here; callers allow it explicitly.
#[must_use]
pub fn is_valid_attribute_name(name: &str) -> bool {
    PROP_NAME_RE.is_match(name)
}

/// Returns true if `key` is a legal key inside a user-supplied map value.
#[must_use]
pub fn is_valid_map_key(key: &str) -> bool {
    MAP_KEY_RE.is_match(key)
}

/// One of the defined attribute types, plus a catch-all for whatever else a
/// user wrote. The catch-all keeps an unknown type string alive through
/// parsing so verification can reject it with its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Any type; skips value checking.
    Any,
    /// true/false.
    Boolean,
    /// Arbitrary-precision decimal number.
    Decimal,
    /// Signed integer.
    Integer,
    /// Unsigned integer.
    UInteger,
    /// Plain string.
    String,
    /// RFC 3339 timestamp.
    Timestamp,
    /// URI.
    Uri,
    /// URI reference.
    UriReference,
    /// URI template.
    UriTemplate,
    /// URL.
    Url,
    /// Nested object with its own attribute collection.
    Object,
    /// Map with a typed element descriptor.
    Map,
    /// Array with a typed element descriptor.
    Array,
    /// Anything else; rejected by verification.
    #[serde(untagged)]
    Unknown(String),
}

impl AttrType {
    /// Returns true for the defined types, false for [`AttrType::Unknown`].
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !matches!(self, AttrType::Unknown(_))
    }

    /// Returns true for every defined type except OBJECT, MAP, ARRAY and
    /// ANY.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            AttrType::Boolean
                | AttrType::Decimal
                | AttrType::Integer
                | AttrType::UInteger
                | AttrType::String
                | AttrType::Timestamp
                | AttrType::Uri
                | AttrType::UriReference
                | AttrType::UriTemplate
                | AttrType::Url
        )
    }

    /// Returns true for the string-shaped types.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            AttrType::String
                | AttrType::Timestamp
                | AttrType::Uri
                | AttrType::UriReference
                | AttrType::UriTemplate
                | AttrType::Url
        )
    }
}

impl Display for AttrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttrType::Any => "any",
            AttrType::Boolean => "boolean",
            AttrType::Decimal => "decimal",
            AttrType::Integer => "integer",
            AttrType::UInteger => "uinteger",
            AttrType::String => "string",
            AttrType::Timestamp => "timestamp",
            AttrType::Uri => "uri",
            AttrType::UriReference => "urireference",
            AttrType::UriTemplate => "uritemplate",
            AttrType::Url => "url",
            AttrType::Object => "object",
            AttrType::Map => "map",
            AttrType::Array => "array",
            AttrType::Unknown(other) => other,
        };
        write!(f, "{name}")
    }
}

/// Checks a runtime value (already deserialized from JSON) against a scalar
/// attribute type.
///
/// Numbers that arrived as JSON floats are accepted for INTEGER/UINTEGER
/// only when they are exact integers; TIMESTAMP strings must parse as
/// RFC 3339.
#[must_use]
pub fn is_of_type(val: &Value, attr_type: &AttrType) -> bool {
    match val {
        Value::Bool(_) => *attr_type == AttrType::Boolean,
        Value::String(s) => {
            if *attr_type == AttrType::Timestamp {
                return chrono::DateTime::parse_from_rfc3339(s).is_ok();
            }
            attr_type.is_string()
        }
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                match attr_type {
                    AttrType::Decimal | AttrType::Integer => true,
                    AttrType::UInteger => n.is_u64() || n.as_i64().is_some_and(|v| v >= 0),
                    _ => false,
                }
            } else {
                let Some(f) = n.as_f64() else { return false };
                match attr_type {
                    AttrType::Decimal => true,
                    AttrType::Integer => f.is_finite() && f.fract() == 0.0,
                    AttrType::UInteger => f.is_finite() && f.fract() == 0.0 && f >= 0.0,
                    _ => false,
                }
            }
        }
        _ => false,
    }
}

/// Renders a scalar the way it reads in diagnostics and `ifValues` keys:
/// strings bare, everything else in its JSON form.
pub(crate) fn value_display(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
