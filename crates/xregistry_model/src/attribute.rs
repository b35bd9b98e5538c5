// SPDX-License-Identifier: Apache-2.0

//! A single declared attribute: scalars, objects, maps, arrays, and the
//! conditional siblings gated on an attribute's value.

use std::collections::BTreeMap;
use std::ops::Not;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::model::Model;
use crate::path::PropPath;
use crate::registry::Registry;
use crate::types::{is_valid_attribute_name, AttrType};
use crate::Error;

/// Produces the serialized value of a spec attribute (e.g. `specversion`).
pub type GetFn = fn(&Registry, &Model) -> Option<Value>;
/// Validates an incoming value for a spec attribute before it is accepted.
pub type CheckFn = fn(&Value) -> Result<(), Error>;
/// Prepares a spec attribute's value for writing (e.g. bumping `epoch`).
pub type UpdateFn = fn(&mut Value) -> Result<(), Error>;

/// Internal descriptor of a spec-defined attribute. Not serialized; user
/// attributes carry the default.
#[derive(Debug, Clone, Default)]
pub(crate) struct AttrInternals {
    /// Digits naming the levels this attribute appears at (0=Registry,
    /// 1=Group, 2=Resource, 3=Version); empty means all levels.
    pub levels: &'static str,
    /// Whether the value may change once set.
    pub immutable: bool,
    /// Whether the value is computed rather than stored.
    pub dont_store: bool,
    /// Custom HTTP header name, when not the default `xRegistry-xxx`.
    pub http_header: Option<&'static str>,
    pub get_fn: Option<GetFn>,
    pub check_fn: Option<CheckFn>,
    pub update_fn: Option<UpdateFn>,
}

// The hooks are process-wide constants keyed by attribute name; two
// internals are interchangeable when their data fields agree.
impl PartialEq for AttrInternals {
    fn eq(&self, other: &Self) -> bool {
        self.levels == other.levels
            && self.immutable == other.immutable
            && self.dont_store == other.dont_store
            && self.http_header == other.http_header
    }
}

/// Conditional siblings for one `ifValues` literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IfValue {
    /// Attributes that appear at this level only when the owning
    /// attribute's serialized value equals the `ifValues` key.
    #[serde(
        rename = "siblingAttributes",
        default,
        skip_serializing_if = "Attributes::is_empty"
    )]
    pub sibling_attributes: Attributes,
}

/// `ifValues` literal -> conditional siblings.
pub type IfValues = BTreeMap<String, IfValue>;

/// One declared property at some level of the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name, or the `"*"` sentinel meaning "any extension
    /// name at this level".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The declared type. Verification rejects a missing or unknown type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttrType>,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Legal values; scalar types only, never empty when present.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Whether values outside `enum` are rejected. Tri-state; absent means
    /// true. Advisory at model level, enforced at instance time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Whether only the server may write the value.
    #[serde(default, skip_serializing_if = "<&bool>::not")]
    pub readonly: bool,

    /// Whether clients must supply a value. Implies `serverrequired`.
    #[serde(
        rename = "clientrequired",
        default,
        skip_serializing_if = "<&bool>::not"
    )]
    pub client_required: bool,

    /// Whether a value must be present on the server.
    #[serde(
        rename = "serverrequired",
        default,
        skip_serializing_if = "<&bool>::not"
    )]
    pub server_required: bool,

    /// Default value; scalar types only, requires `serverrequired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Nested attributes, for OBJECT.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    /// Element descriptor, for MAP and ARRAY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<Item>>,

    /// Conditional siblings gated on this attribute's serialized value.
    #[serde(rename = "ifValues", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub if_values: IfValues,

    #[serde(skip)]
    pub(crate) internals: AttrInternals,
}

impl Attribute {
    /// Creates an attribute of the given type.
    #[must_use]
    pub fn new(name: &str, attr_type: AttrType) -> Self {
        Attribute {
            name: name.to_owned(),
            attr_type: Some(attr_type),
            ..Default::default()
        }
    }

    /// Creates an OBJECT attribute with an empty nested collection.
    #[must_use]
    pub fn object(name: &str) -> Self {
        Attribute::new(name, AttrType::Object)
    }

    /// Creates a MAP attribute over the given element descriptor.
    #[must_use]
    pub fn map(name: &str, item: Item) -> Self {
        Attribute {
            item: Some(Box::new(item)),
            ..Attribute::new(name, AttrType::Map)
        }
    }

    /// Creates an ARRAY attribute over the given element descriptor.
    #[must_use]
    pub fn array(name: &str, item: Item) -> Self {
        Attribute {
            item: Some(Box::new(item)),
            ..Attribute::new(name, AttrType::Array)
        }
    }

    /// Returns true if the declared type is scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.attr_type.as_ref().is_some_and(AttrType::is_scalar)
    }

    /// Returns true if this spec attribute appears at the given level
    /// (0=Registry, 1=Group, 2=Resource, 3=Version).
    #[must_use]
    pub fn in_level(&self, level: u8) -> bool {
        self.internals.levels.is_empty()
            || self.internals.levels.contains(char::from(b'0' + level))
    }

    /// Whether the value may change once set (spec attributes only).
    #[must_use]
    pub fn immutable(&self) -> bool {
        self.internals.immutable
    }

    /// Whether the value is computed rather than stored (spec attributes
    /// only).
    #[must_use]
    pub fn dont_store(&self) -> bool {
        self.internals.dont_store
    }

    /// Custom HTTP header name, when the attribute doesn't travel as
    /// `xRegistry-xxx`.
    #[must_use]
    pub fn http_header(&self) -> Option<&'static str> {
        self.internals.http_header
    }

    /// Value getter hook (spec attributes only).
    #[must_use]
    pub fn get_fn(&self) -> Option<GetFn> {
        self.internals.get_fn
    }

    /// Pre-write validator hook (spec attributes only).
    #[must_use]
    pub fn check_fn(&self) -> Option<CheckFn> {
        self.internals.check_fn
    }

    /// Post-load/pre-save updater hook (spec attributes only).
    #[must_use]
    pub fn update_fn(&self) -> Option<UpdateFn> {
        self.internals.update_fn
    }

    /// Adds a nested attribute (OBJECT attributes). In-memory only; the
    /// tree is persisted when it is attached to a model and saved.
    pub fn add_attribute(&mut self, attr: Attribute) -> Result<&mut Attribute, Error> {
        if attr.name != "*" && !is_valid_attribute_name(&attr.name) {
            return Err(Error::InvalidAttributeName { name: attr.name });
        }
        let name = attr.name.clone();
        self.attributes.add(attr);
        Ok(self
            .attributes
            .get_mut(&name)
            .expect("attribute was just added"))
    }

    /// Adds a nested attribute of the given type.
    pub fn add_attr(&mut self, name: &str, attr_type: AttrType) -> Result<&mut Attribute, Error> {
        self.add_attribute(Attribute::new(name, attr_type))
    }

    /// Adds a nested OBJECT attribute.
    pub fn add_attr_obj(&mut self, name: &str) -> Result<&mut Attribute, Error> {
        self.add_attribute(Attribute::object(name))
    }

    /// Adds a nested MAP attribute.
    pub fn add_attr_map(&mut self, name: &str, item: Item) -> Result<&mut Attribute, Error> {
        self.add_attribute(Attribute::map(name, item))
    }

    /// Adds a nested ARRAY attribute.
    pub fn add_attr_array(&mut self, name: &str, item: Item) -> Result<&mut Attribute, Error> {
        self.add_attribute(Attribute::array(name, item))
    }

    /// Removes a nested attribute.
    pub fn del_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
    }
}

/// Element descriptor for MAP and ARRAY attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The element type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<AttrType>,

    /// Nested attributes, only when the element type is OBJECT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,

    /// Nested element descriptor, when the element type is MAP or ARRAY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<Item>>,
}

impl Item {
    /// Creates an element descriptor of the given type.
    #[must_use]
    pub fn of_type(item_type: AttrType) -> Self {
        Item {
            item_type: Some(item_type),
            ..Default::default()
        }
    }

    /// Creates an OBJECT element descriptor.
    #[must_use]
    pub fn object() -> Self {
        Item::of_type(AttrType::Object)
    }

    /// Creates a MAP element descriptor over a nested element.
    #[must_use]
    pub fn map(item: Item) -> Self {
        Item {
            item: Some(Box::new(item)),
            ..Item::of_type(AttrType::Map)
        }
    }

    /// Creates an ARRAY element descriptor over a nested element.
    #[must_use]
    pub fn array(item: Item) -> Self {
        Item {
            item: Some(Box::new(item)),
            ..Item::of_type(AttrType::Array)
        }
    }

    /// Adds an attribute to an OBJECT element descriptor. In-memory only.
    pub fn add_attribute(&mut self, attr: Attribute) -> Result<&mut Attribute, Error> {
        if attr.name != "*" && !is_valid_attribute_name(&attr.name) {
            return Err(Error::InvalidAttributeName { name: attr.name });
        }
        let name = attr.name.clone();
        self.attributes.get_or_insert_with(Attributes::new).add(attr);
        Ok(self
            .attributes
            .as_mut()
            .and_then(|attrs| attrs.get_mut(&name))
            .expect("attribute was just added"))
    }

    /// Adds an attribute of the given type to an OBJECT element descriptor.
    pub fn add_attr(&mut self, name: &str, attr_type: AttrType) -> Result<&mut Attribute, Error> {
        self.add_attribute(Attribute::new(name, attr_type))
    }

    pub(crate) fn verify(&self, path: &PropPath) -> Result<(), Error> {
        let p = path.p("item");

        let item_type = match &self.item_type {
            None => {
                return Err(Error::ItemMissingType { path: p.ui() });
            }
            Some(t) if !t.is_defined() => {
                return Err(Error::ItemInvalidType {
                    path: p.ui(),
                    attr_type: t.to_string(),
                });
            }
            Some(t) => t,
        };

        if *item_type != AttrType::Object && self.attributes.is_some() {
            return Err(Error::ItemUnexpectedAttributes { path: p.ui() });
        }

        if matches!(item_type, AttrType::Map | AttrType::Array) && self.item.is_none() {
            return Err(Error::MissingItem { path: p.ui() });
        }

        if let Some(attrs) = &self.attributes {
            attrs.verify_nested(&p)?;
        }

        if let Some(inner) = &self.item {
            return inner.verify(&p);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_field_order_and_skips() {
        let mut attr = Attribute::new("env", AttrType::String);
        attr.enum_values = Some(vec![json!("dev"), json!("prod")]);
        attr.server_required = true;
        attr.default = Some(json!("dev"));
        let out = serde_json::to_string(&attr).expect("serialize");
        assert_eq!(
            out,
            r#"{"name":"env","type":"string","enum":["dev","prod"],"serverrequired":true,"default":"dev"}"#
        );
    }

    #[test]
    fn test_resource_boolean_defaults_are_not_serialized() {
        let attr = Attribute::new("flag", AttrType::Boolean);
        let out = serde_json::to_value(&attr).expect("serialize");
        assert_eq!(out, json!({"name": "flag", "type": "boolean"}));
    }

    #[test]
    fn test_item_verify_requires_type() {
        let item = Item::default();
        let err = item
            .verify(&PropPath::new().p("model").p("foo"))
            .expect_err("no type");
        assert_eq!(
            err.to_string(),
            r#""model.foo.item" must have a "type" defined"#
        );
    }

    #[test]
    fn test_item_verify_rejects_attributes_on_non_object() {
        let mut item = Item::of_type(AttrType::String);
        item.attributes = Some(Attributes::new());
        let err = item
            .verify(&PropPath::new().p("model").p("foo"))
            .expect_err("attributes on scalar item");
        assert_eq!(
            err.to_string(),
            r#""model.foo.item" must not have "attributes""#
        );
    }

    #[test]
    fn test_item_verify_map_needs_inner_item() {
        let item = Item::of_type(AttrType::Map);
        let err = item
            .verify(&PropPath::new().p("model").p("labels"))
            .expect_err("map without item");
        assert_eq!(
            err.to_string(),
            r#""model.labels.item" must have an "item" section"#
        );
    }

    #[test]
    fn test_nested_builders() {
        let mut attr = Attribute::object("spec");
        let _ = attr.add_attr("replicas", AttrType::UInteger).expect("add");
        let err = attr.add_attr("Bad", AttrType::String).expect_err("bad name");
        assert_eq!(err.to_string(), "Invalid attribute name: Bad");
        assert!(attr.attributes.get("replicas").is_some());
    }
}
