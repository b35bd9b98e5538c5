// SPDX-License-Identifier: Apache-2.0

//! The spec-defined attribute baseline.
//!
//! Every model must expose these attributes at the levels their digit
//! string names (0=Registry, 1=Group, 2=Resource, 3=Version; empty means
//! all). The tables are process-wide constants, initialized once and never
//! mutated.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::attribute::{AttrInternals, Attribute, Item};
use crate::model::Model;
use crate::registry::Registry;
use crate::types::{is_of_type, value_display, AttrType};
use crate::{Error, SPEC_VERSION};

fn specversion_get(_reg: &Registry, _model: &Model) -> Option<Value> {
    Some(Value::String(SPEC_VERSION.to_owned()))
}

fn specversion_check(val: &Value) -> Result<(), Error> {
    if val.as_str() == Some(SPEC_VERSION) {
        Ok(())
    } else {
        Err(Error::InvalidSpecVersion {
            value: value_display(val),
            expected: SPEC_VERSION,
        })
    }
}

fn model_get(_reg: &Registry, model: &Model) -> Option<Value> {
    serde_json::to_value(model).ok()
}

fn epoch_check(val: &Value) -> Result<(), Error> {
    if is_of_type(val, &AttrType::UInteger) {
        Ok(())
    } else {
        Err(Error::InvalidEpoch {
            value: value_display(val),
        })
    }
}

fn epoch_update(val: &mut Value) -> Result<(), Error> {
    epoch_check(val)?;
    if let Some(n) = val.as_u64() {
        *val = Value::from(n + 1);
    }
    Ok(())
}

fn spec_attr(
    name: &str,
    attr_type: AttrType,
    server_required: bool,
    readonly: bool,
    internals: AttrInternals,
) -> Attribute {
    Attribute {
        name: name.to_owned(),
        attr_type: Some(attr_type),
        server_required,
        readonly,
        internals,
        ..Default::default()
    }
}

/// The baseline, in serialization order. The `model` sentinel sits last and
/// is suppressed by the user-facing serializer.
static ORDERED_SPEC_PROPS: Lazy<Vec<Attribute>> = Lazy::new(|| {
    vec![
        spec_attr(
            "specversion",
            AttrType::String,
            true,
            true,
            AttrInternals {
                levels: "0",
                immutable: true,
                get_fn: Some(specversion_get),
                check_fn: Some(specversion_check),
                ..Default::default()
            },
        ),
        spec_attr(
            "id",
            AttrType::String,
            true,
            false,
            AttrInternals {
                immutable: true,
                ..Default::default()
            },
        ),
        spec_attr("name", AttrType::String, false, false, AttrInternals::default()),
        spec_attr(
            "epoch",
            AttrType::UInteger,
            true,
            true,
            AttrInternals {
                check_fn: Some(epoch_check),
                update_fn: Some(epoch_update),
                ..Default::default()
            },
        ),
        spec_attr(
            "self",
            AttrType::Url,
            true,
            true,
            AttrInternals {
                dont_store: true,
                ..Default::default()
            },
        ),
        spec_attr(
            "latestversionid",
            AttrType::String,
            false,
            true,
            AttrInternals {
                levels: "2",
                ..Default::default()
            },
        ),
        spec_attr(
            "latestversionurl",
            AttrType::Url,
            false,
            true,
            AttrInternals {
                levels: "2",
                dont_store: true,
                ..Default::default()
            },
        ),
        spec_attr(
            "contenttype",
            AttrType::String,
            false,
            false,
            AttrInternals {
                levels: "23",
                http_header: Some("Content-Type"),
                ..Default::default()
            },
        ),
        spec_attr(
            "description",
            AttrType::String,
            false,
            false,
            AttrInternals::default(),
        ),
        spec_attr(
            "documentation",
            AttrType::Url,
            false,
            false,
            AttrInternals::default(),
        ),
        Attribute {
            item: Some(Box::new(Item::of_type(AttrType::String))),
            ..spec_attr("labels", AttrType::Map, false, false, AttrInternals::default())
        },
        spec_attr(
            "origin",
            AttrType::Uri,
            false,
            false,
            AttrInternals {
                levels: "123",
                ..Default::default()
            },
        ),
        spec_attr(
            "createdby",
            AttrType::String,
            false,
            true,
            AttrInternals::default(),
        ),
        spec_attr(
            "createdon",
            AttrType::Timestamp,
            false,
            true,
            AttrInternals::default(),
        ),
        spec_attr(
            "modifiedby",
            AttrType::String,
            false,
            true,
            AttrInternals::default(),
        ),
        spec_attr(
            "modifiedon",
            AttrType::Timestamp,
            false,
            true,
            AttrInternals::default(),
        ),
        spec_attr(
            "model",
            AttrType::Object,
            false,
            true,
            AttrInternals {
                levels: "0",
                dont_store: true,
                get_fn: Some(model_get),
                ..Default::default()
            },
        ),
    ]
});

static SPEC_PROPS: Lazy<HashMap<&'static str, &'static Attribute>> = Lazy::new(|| {
    ORDERED_SPEC_PROPS
        .iter()
        .map(|attr| (attr.name.as_str(), attr))
        .collect()
});

/// The baseline in its fixed serialization order.
pub(crate) fn ordered_spec_props() -> &'static [Attribute] {
    &ORDERED_SPEC_PROPS
}

/// Looks up a spec-defined attribute by name.
pub(crate) fn spec_prop(name: &str) -> Option<&'static Attribute> {
    SPEC_PROPS.get(name).copied()
}

/// Guards a spec-defined attribute from degradation by a user's copy.
///
/// Users may extend (tighten an enum, reword the description) but may not
/// drop `serverrequired`, drop `readonly` when the spec pairs it with
/// `serverrequired`, or change the type. A user copy of `model` is silently
/// replaced with the spec's.
pub(crate) fn ensure_attr_ok(user: &mut Attribute, spec: &Attribute) -> Result<(), Error> {
    if user.name == "model" {
        *user = spec.clone();
        return Ok(());
    }

    if spec.server_required {
        if !user.server_required {
            return Err(Error::SpecAttrServerRequired {
                name: user.name.clone(),
            });
        }
        if spec.readonly && !user.readonly {
            return Err(Error::SpecAttrReadOnly {
                name: user.name.clone(),
            });
        }
    }

    if spec.attr_type != user.attr_type {
        return Err(Error::SpecAttrType {
            name: user.name.clone(),
            attr_type: spec
                .attr_type
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_levels() {
        let registry_level: Vec<&str> = ordered_spec_props()
            .iter()
            .filter(|a| a.in_level(0))
            .map(|a| a.name.as_str())
            .collect();
        assert!(registry_level.contains(&"specversion"));
        assert!(registry_level.contains(&"model"));
        assert!(!registry_level.contains(&"latestversionid"));

        let resource_level: Vec<&str> = ordered_spec_props()
            .iter()
            .filter(|a| a.in_level(2) || a.in_level(3))
            .map(|a| a.name.as_str())
            .collect();
        assert!(resource_level.contains(&"latestversionid"));
        assert!(resource_level.contains(&"contenttype"));
        assert!(!resource_level.contains(&"specversion"));
    }

    #[test]
    fn test_internals_survive_lookup() {
        let epoch = spec_prop("epoch").expect("epoch is baseline");
        assert!(epoch.check_fn().is_some());
        assert!(epoch.update_fn().is_some());
        let contenttype = spec_prop("contenttype").expect("contenttype is baseline");
        assert_eq!(contenttype.http_header(), Some("Content-Type"));
        assert!(spec_prop("nosuch").is_none());
    }

    #[test]
    fn test_ensure_attr_ok_guards_server_required() {
        let spec = spec_prop("epoch").expect("epoch");
        let mut user = Attribute::new("epoch", AttrType::UInteger);
        let err = ensure_attr_ok(&mut user, spec).expect_err("lowered serverrequired");
        assert_eq!(
            err.to_string(),
            r#""model.epoch" must have its "serverrequired" attribute set to "true""#
        );

        user.server_required = true;
        let err = ensure_attr_ok(&mut user, spec).expect_err("lowered readonly");
        assert_eq!(
            err.to_string(),
            r#""model.epoch" must have its "readonly" attribute set to "true""#
        );

        user.readonly = true;
        assert_eq!(Ok(()), ensure_attr_ok(&mut user, spec));
    }

    #[test]
    fn test_ensure_attr_ok_readonly_unchecked_without_server_required() {
        // readonly is only enforced when the spec also requires the value
        let spec = spec_prop("createdon").expect("createdon");
        let mut user = Attribute::new("createdon", AttrType::Timestamp);
        assert_eq!(Ok(()), ensure_attr_ok(&mut user, spec));
    }

    #[test]
    fn test_ensure_attr_ok_guards_type() {
        let spec = spec_prop("name").expect("name");
        let mut user = Attribute::new("name", AttrType::Integer);
        let err = ensure_attr_ok(&mut user, spec).expect_err("changed type");
        assert_eq!(err.to_string(), r#""model.name" must have a "type" of "string""#);
    }

    #[test]
    fn test_ensure_attr_ok_replaces_user_model() {
        let spec = spec_prop("model").expect("model");
        let mut user = Attribute::new("model", AttrType::String);
        assert_eq!(Ok(()), ensure_attr_ok(&mut user, spec));
        assert_eq!(user.attr_type, Some(AttrType::Object));
    }
}
