// SPDX-License-Identifier: Apache-2.0

//! A resource kind: a named class of resources within a group kind, with
//! version-retention cardinality flags.

use serde::{Deserialize, Serialize};
use xregistry_store::{EntityRow, Write};

use crate::attributes::{Attributes, LevelData};
use crate::path::PropPath;
use crate::registry::Registry;
use crate::spec_props::{ensure_attr_ok, ordered_spec_props};
use crate::types::{is_valid_attribute_name, PROP_NAME_PATTERN};
use crate::{Error, HASDOCUMENT, LATEST, VERSIONID, VERSIONS};

fn default_versions() -> i64 {
    VERSIONS
}

fn default_version_id() -> bool {
    VERSIONID
}

fn default_latest() -> bool {
    LATEST
}

fn default_has_document() -> bool {
    HASDOCUMENT
}

/// A named class of resources within a group kind.
///
/// The three booleans and `versions` always serialize; on parse, absent
/// fields take the spec defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceModel {
    /// Stable opaque identity, assigned at creation; the persistence key.
    #[serde(skip)]
    pub(crate) sid: String,

    /// Plural name; equals the key this kind is stored under.
    #[serde(default)]
    pub plural: String,

    /// Singular name.
    #[serde(default)]
    pub singular: String,

    /// Max retained versions; 0 means unlimited.
    #[serde(default = "default_versions")]
    pub versions: i64,

    /// Whether clients may pick version ids.
    #[serde(rename = "versionid", default = "default_version_id")]
    pub version_id: bool,

    /// Whether a "latest" pointer is kept.
    #[serde(default = "default_latest")]
    pub latest: bool,

    /// Whether resources of this kind carry a document.
    #[serde(rename = "hasdocument", default = "default_has_document")]
    pub has_document: bool,

    /// Resource-level attributes.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Default for ResourceModel {
    fn default() -> Self {
        ResourceModel {
            sid: String::new(),
            plural: String::new(),
            singular: String::new(),
            versions: VERSIONS,
            version_id: VERSIONID,
            latest: LATEST,
            has_document: HASDOCUMENT,
            attributes: Attributes::new(),
        }
    }
}

impl ResourceModel {
    /// The stable persistence identity of this kind.
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Verifies this kind under the key it is stored as; `group_path` is
    /// the owning group's diagnostic path.
    pub(crate) fn verify(&mut self, name: &str, group_path: &PropPath) -> Result<(), Error> {
        if !is_valid_attribute_name(name) {
            return Err(Error::InvalidResourceKey {
                name: name.to_owned(),
                pattern: PROP_NAME_PATTERN,
            });
        }

        if self.plural.is_empty() {
            return Err(Error::ResourceMissingName {
                name: name.to_owned(),
            });
        }
        if self.plural != name {
            return Err(Error::ResourcePluralMismatch {
                name: name.to_owned(),
                plural: self.plural.clone(),
            });
        }

        if self.versions < 0 {
            return Err(Error::ResourceNegativeVersions {
                name: name.to_owned(),
            });
        }

        // resource-level attributes serve both the resource and its
        // versions, so inject both levels of the baseline
        for spec in ordered_spec_props()
            .iter()
            .filter(|a| a.in_level(2) || a.in_level(3))
        {
            match self.attributes.get_mut(&spec.name) {
                None => self.attributes.add(spec.clone()),
                Some(user) => ensure_attr_ok(user, spec)?,
            }
        }

        let ld = LevelData {
            attr_names: Default::default(),
            path: group_path
                .p("resources")
                .p(&self.plural)
                .p("attributes"),
        };
        self.attributes.verify(&ld)
    }

    /// Upserts this kind's row under the owning group's SID.
    pub(crate) fn save(&self, reg: &mut Registry, parent_sid: &str) -> Result<(), Error> {
        let attrs =
            serde_json::to_string(&self.attributes).map_err(|e| Error::json(&e))?;

        reg.tx
            .do_zero_two(Write::UpsertEntity(EntityRow {
                sid: self.sid.clone(),
                registry_sid: reg.db_sid().to_owned(),
                parent_sid: Some(parent_sid.to_owned()),
                plural: self.plural.clone(),
                singular: self.singular.clone(),
                attributes: Some(attrs),
                versions: self.versions,
                version_id: self.version_id,
                latest: self.latest,
                has_document: self.has_document,
            }))
            .map_err(|e| Error::storage(format!("updating resourceModel({})", self.plural), e))
    }

    /// Deletes this kind's row. The in-memory map entry is removed by
    /// `Model::del_resource_model`.
    pub(crate) fn delete(&self, reg: &mut Registry) -> Result<(), Error> {
        log::debug!("deleting resourceModel: {}", self.plural);
        reg.tx
            .do_one(Write::DeleteEntity {
                registry_sid: reg.db_sid().to_owned(),
                sid: self.sid.clone(),
            })
            .map_err(|e| Error::storage(format!("deleting resourceModel({})", self.plural), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_booleans_and_versions() {
        let rm: ResourceModel =
            serde_json::from_str(r#"{"plural": "files", "singular": "file"}"#).expect("parse");
        assert_eq!(rm.versions, VERSIONS);
        assert!(rm.version_id);
        assert!(rm.latest);
        assert!(rm.has_document);
    }

    #[test]
    fn test_cardinality_fields_always_serialize() {
        let rm = ResourceModel {
            plural: "files".to_owned(),
            singular: "file".to_owned(),
            ..Default::default()
        };
        let out = serde_json::to_value(&rm).expect("serialize");
        let obj = out.as_object().expect("object");
        assert!(obj.contains_key("versions"));
        assert!(obj.contains_key("versionid"));
        assert!(obj.contains_key("latest"));
        assert!(obj.contains_key("hasdocument"));
        assert!(!obj.contains_key("attributes"));
    }

    #[test]
    fn test_verify_rejects_negative_versions() {
        let mut rm = ResourceModel {
            plural: "files".to_owned(),
            singular: "file".to_owned(),
            versions: -1,
            ..Default::default()
        };
        let group_path = PropPath::new().p("model").p("groups").p("dirs");
        let err = rm.verify("files", &group_path).expect_err("negative versions");
        assert_eq!(
            err.to_string(),
            r#"Resource "files" must have a 'versions' value >= 0"#
        );
    }

    #[test]
    fn test_verify_injects_resource_level_baseline() {
        let mut rm = ResourceModel {
            plural: "files".to_owned(),
            singular: "file".to_owned(),
            ..Default::default()
        };
        let group_path = PropPath::new().p("model").p("groups").p("dirs");
        rm.verify("files", &group_path).expect("verify");
        assert!(rm.attributes.get("latestversionid").is_some());
        assert!(rm.attributes.get("contenttype").is_some());
        assert!(rm.attributes.get("specversion").is_none());
    }
}
