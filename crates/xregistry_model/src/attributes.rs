// SPDX-License-Identifier: Apache-2.0

//! The attribute collection of one level: name -> [`Attribute`], with
//! spec-aware ordering on serialization and the structural verification
//! entry point.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::attribute::Attribute;
use crate::path::PropPath;
use crate::spec_props::{ordered_spec_props, spec_prop};
use crate::types::{
    is_of_type, is_valid_attribute_name, value_display, AttrType, PROP_NAME_PATTERN,
};
use crate::Error;

/// Accumulated context for verifying one level: the attribute names already
/// declared (including conditionally) and the path for diagnostics.
#[derive(Debug, Clone, Default)]
pub(crate) struct LevelData {
    pub attr_names: BTreeSet<String>,
    pub path: PropPath,
}

/// An ordered-on-serialization collection of attributes.
///
/// Serialization emits spec-defined attributes first, in their fixed order
/// (suppressing the `model` sentinel, which users must not see as a regular
/// attribute), then extensions in ascending name order — so equal logical
/// models serialize byte-identically.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Attribute>);

impl Attributes {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Attributes::default()
    }

    /// Returns true if the collection holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of attributes in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    /// Looks up an attribute by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.0.get_mut(name)
    }

    /// Inserts an attribute under its own name, replacing any previous one.
    pub fn add(&mut self, attr: Attribute) {
        let _ = self.0.insert(attr.name.clone(), attr);
    }

    /// Removes an attribute by name.
    pub fn remove(&mut self, name: &str) {
        let _ = self.0.remove(name);
    }

    /// Iterates name -> attribute in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.0.iter()
    }

    /// Entries in serialization order: spec-defined first (their fixed
    /// order), then extensions ascending. The `model` sentinel is *not*
    /// filtered here; serializers decide.
    fn ordered(&self) -> Vec<(&String, &Attribute)> {
        let spec_names: Vec<&str> = ordered_spec_props()
            .iter()
            .map(|spec| spec.name.as_str())
            .collect();
        let mut out = Vec::with_capacity(self.0.len());
        for name in &spec_names {
            if let Some(entry) = self.0.get_key_value(*name) {
                out.push(entry);
            }
        }
        for entry in &self.0 {
            if !spec_names.contains(&entry.0.as_str()) {
                out.push(entry);
            }
        }
        out
    }

    /// Re-attaches the spec-defined internal descriptors after a load; the
    /// descriptors are not serialized.
    pub(crate) fn set_spec_props_fields(&mut self) {
        for (name, attr) in self.0.iter_mut() {
            if let Some(spec) = spec_prop(name) {
                attr.internals = spec.internals.clone();
            }
        }
    }

    /// Verifies this collection as one level, starting from the caller's
    /// accumulated names so recursion doesn't leak siblings.
    pub(crate) fn verify(&self, ld: &LevelData) -> Result<(), Error> {
        let mut names = ld.attr_names.clone();
        self.verify_level(&mut names, &ld.path)
    }

    /// Verifies a nested collection (OBJECT attributes, object items) with
    /// a fresh name scope.
    pub(crate) fn verify_nested(&self, path: &PropPath) -> Result<(), Error> {
        let mut names = BTreeSet::new();
        self.verify_level(&mut names, path)
    }

    fn verify_level(&self, names: &mut BTreeSet<String>, path: &PropPath) -> Result<(), Error> {
        for (name, attr) in &self.0 {
            if name.is_empty() {
                return Err(Error::EmptyAttributeKey { path: path.ui() });
            }
            if names.contains(name) {
                return Err(Error::DuplicateAttribute {
                    name: name.clone(),
                    path: path.ui(),
                });
            }
            if name != "*" && !is_valid_attribute_name(name) {
                return Err(Error::InvalidAttributeKey {
                    path: path.ui(),
                    name: name.clone(),
                    pattern: PROP_NAME_PATTERN,
                });
            }
            let attr_path = path.p(name);
            if attr.name != *name {
                return Err(Error::NameMismatch {
                    path: attr_path.ui(),
                    name: name.clone(),
                });
            }
            let attr_type = match &attr.attr_type {
                None => {
                    return Err(Error::MissingType {
                        path: attr_path.ui(),
                    });
                }
                Some(t) if !t.is_defined() => {
                    return Err(Error::InvalidType {
                        path: attr_path.ui(),
                        attr_type: t.to_string(),
                    });
                }
                Some(t) => t,
            };

            if let Some(enum_values) = &attr.enum_values {
                if enum_values.is_empty() {
                    return Err(Error::EmptyEnum {
                        path: attr_path.ui(),
                    });
                }
                if !attr_type.is_scalar() {
                    return Err(Error::EnumOnNonScalar {
                        path: attr_path.ui(),
                    });
                }
                for val in enum_values {
                    if !is_of_type(val, attr_type) {
                        return Err(Error::EnumValueType {
                            path: attr_path.ui(),
                            value: value_display(val),
                            attr_type: attr_type.to_string(),
                        });
                    }
                }
            }

            if attr.client_required && !attr.server_required {
                return Err(Error::ClientRequiredWithoutServer {
                    path: attr_path.ui(),
                });
            }

            if let Some(default) = &attr.default {
                if !attr.server_required {
                    return Err(Error::DefaultWithoutServerRequired {
                        path: attr_path.ui(),
                    });
                }
                if !attr_type.is_scalar() {
                    return Err(Error::DefaultOnNonScalar {
                        path: attr_path.ui(),
                    });
                }
                if !is_of_type(default, attr_type) {
                    return Err(Error::DefaultValueType {
                        path: attr_path.ui(),
                        attr_type: attr_type.to_string(),
                    });
                }
            }

            // objects don't need an item, maps and arrays do
            if matches!(attr_type, AttrType::Map | AttrType::Array) && attr.item.is_none() {
                return Err(Error::MissingItem {
                    path: attr_path.ui(),
                });
            }

            if *attr_type == AttrType::Object {
                if attr.item.is_some() {
                    return Err(Error::UnexpectedItem {
                        path: attr_path.ui(),
                    });
                }
                attr.attributes.verify_nested(&attr_path)?;
            }

            if let Some(item) = &attr.item {
                item.verify(&attr_path)?;
            }

            let _ = names.insert(name.clone());
        }

        // With the level's names all known, walk the ifValues. The sibling
        // collections share this level's name scope, so a sibling may not
        // repeat a declared name nor one another branch already declared.
        for (name, attr) in &self.0 {
            for (val_str, if_value) in &attr.if_values {
                if val_str.is_empty() {
                    return Err(Error::EmptyIfValuesKey { path: path.ui() });
                }
                let next = path
                    .p(name)
                    .p("ifvalues")
                    .p(val_str)
                    .p("siblingAttributes");
                if_value.sibling_attributes.verify_level(names, &next)?;
            }
        }

        Ok(())
    }

    /// Materializes the conditional siblings that apply to a concrete
    /// instance object, recursively: a materialized sibling's own
    /// `ifValues` are considered too.
    pub fn apply_if_values(
        &mut self,
        obj: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), Error> {
        let mut pending: Vec<String> = self.0.keys().cloned().collect();
        let mut i = 0;
        while i < pending.len() {
            let name = pending[i].clone();
            i += 1;
            let Some(attr) = self.0.get(&name) else {
                continue;
            };
            if attr.if_values.is_empty() || attr.name == "*" {
                continue;
            }
            let Some(val) = obj.get(&attr.name) else {
                continue;
            };
            let val_str = value_display(val);
            let mut new_attrs = Vec::new();
            for (if_val, data) in &attr.if_values {
                if *if_val != val_str {
                    continue;
                }
                for (_, sibling) in data.sibling_attributes.iter() {
                    new_attrs.push(sibling.clone());
                }
            }
            for sibling in new_attrs {
                if self.0.contains_key(&sibling.name) {
                    return Err(Error::ConflictingSibling {
                        attr: name.clone(),
                        value: val_str.clone(),
                        sibling: sibling.name,
                    });
                }
                pending.push(sibling.name.clone());
                self.add(sibling);
            }
        }
        Ok(())
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, attr) in self.ordered() {
            // users must not see "model" as a regular attribute
            if name.as_str() == "model" {
                continue;
            }
            map.serialize_entry(name, attr)?;
        }
        map.end()
    }
}

/// Serializes the collection for the Registries row: same ordering, but the
/// `model` sentinel is kept, since it only needs hiding from end users.
pub(crate) struct StorageAttributes<'a>(pub &'a Attributes);

impl Serialize for StorageAttributes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, attr) in self.0.ordered() {
            map.serialize_entry(name, attr)?;
        }
        map.end()
    }
}
