// SPDX-License-Identifier: Apache-2.0

//! A group kind: a named class of groups (e.g. `dirs`) with its own
//! attribute collection and resource kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xregistry_store::{EntityRow, Write};

use crate::attributes::{Attributes, LevelData};
use crate::path::PropPath;
use crate::registry::Registry;
use crate::resource::ResourceModel;
use crate::spec_props::{ensure_attr_ok, ordered_spec_props};
use crate::types::{is_valid_attribute_name, PROP_NAME_PATTERN};
use crate::{Error, HASDOCUMENT, LATEST, VERSIONID, VERSIONS};

/// A named class of groups within a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupModel {
    /// Stable opaque identity, assigned at creation; the persistence key.
    #[serde(skip)]
    pub(crate) sid: String,

    /// Plural name; equals the key this kind is stored under.
    #[serde(default)]
    pub plural: String,

    /// Singular name.
    #[serde(default)]
    pub singular: String,

    /// Group-level attributes.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    /// Resource kinds, keyed by plural.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceModel>,
}

impl GroupModel {
    /// The stable persistence identity of this kind.
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Looks up a resource kind by plural.
    #[must_use]
    pub fn resource(&self, plural: &str) -> Option<&ResourceModel> {
        self.resources.get(plural)
    }

    /// Verifies this kind under the key it is stored as: name syntax,
    /// plural/singular rules, the spec baseline at group level, the
    /// attribute collection, then every resource kind.
    pub(crate) fn verify(&mut self, name: &str) -> Result<(), Error> {
        if !is_valid_attribute_name(name) {
            return Err(Error::InvalidGroupKey {
                name: name.to_owned(),
                pattern: PROP_NAME_PATTERN,
            });
        }

        if self.plural != name {
            return Err(Error::GroupPluralMismatch {
                name: name.to_owned(),
                plural: self.plural.clone(),
            });
        }

        if !is_valid_attribute_name(&self.singular) {
            return Err(Error::InvalidGroupSingular {
                singular: self.singular.clone(),
                pattern: PROP_NAME_PATTERN,
            });
        }

        // the spec baseline must be present and undamaged at this level
        for spec in ordered_spec_props().iter().filter(|a| a.in_level(1)) {
            match self.attributes.get_mut(&spec.name) {
                None => self.attributes.add(spec.clone()),
                Some(user) => ensure_attr_ok(user, spec)?,
            }
        }

        let path = PropPath::new().p("model").p("groups").p(&self.plural);
        let ld = LevelData {
            attr_names: Default::default(),
            path: path.p("attributes"),
        };
        self.attributes.verify(&ld)?;

        for (rm_name, rm) in self.resources.iter_mut() {
            rm.verify(rm_name, &path)?;
        }

        Ok(())
    }

    /// Upserts this kind's row, then every resource kind's. Insertion of a
    /// brand-new kind goes through `Model::add_group_model`, not here.
    pub(crate) fn save(&self, reg: &mut Registry) -> Result<(), Error> {
        let attrs =
            serde_json::to_string(&self.attributes).map_err(|e| Error::json(&e))?;

        reg.tx
            .do_zero_two(Write::UpsertEntity(EntityRow {
                sid: self.sid.clone(),
                registry_sid: reg.db_sid().to_owned(),
                parent_sid: None,
                plural: self.plural.clone(),
                singular: self.singular.clone(),
                attributes: Some(attrs),
                versions: VERSIONS,
                version_id: VERSIONID,
                latest: LATEST,
                has_document: HASDOCUMENT,
            }))
            .map_err(|e| Error::storage(format!("updating groupModel({})", self.plural), e))?;

        for rm in self.resources.values() {
            rm.save(reg, &self.sid)?;
        }

        Ok(())
    }

    /// Deletes this kind's row; children go with it. The in-memory map
    /// entry is removed by `Model::del_group_model`.
    pub(crate) fn delete(&self, reg: &mut Registry) -> Result<(), Error> {
        log::debug!("deleting groupModel: {}", self.plural);
        reg.tx
            .do_one(Write::DeleteEntity {
                registry_sid: reg.db_sid().to_owned(),
                sid: self.sid.clone(),
            })
            .map_err(|e| Error::storage(format!("deleting groupModel({})", self.plural), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PROP_NAME_PATTERN;

    fn group(plural: &str, singular: &str) -> GroupModel {
        GroupModel {
            plural: plural.to_owned(),
            singular: singular.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_verify_rejects_bad_key_and_plural_mismatch() {
        let mut gm = group("dirs", "dir");
        let err = gm.verify("Dirs").expect_err("bad key");
        assert_eq!(
            err.to_string(),
            format!(r#"Invalid Group name/key "Dirs" - must match {PROP_NAME_PATTERN:?}"#)
        );

        let mut gm = group("folders", "dir");
        let err = gm.verify("dirs").expect_err("plural mismatch");
        assert_eq!(
            err.to_string(),
            r#"Group "dirs" must have a `plural` value of "dirs", not "folders""#
        );

        let mut gm = group("dirs", "Bad");
        let err = gm.verify("dirs").expect_err("bad singular");
        assert_eq!(
            err.to_string(),
            format!(r#"Invalid Group 'singular' value "Bad" - must match {PROP_NAME_PATTERN:?}"#)
        );
    }

    #[test]
    fn test_verify_injects_group_level_baseline() {
        let mut gm = group("dirs", "dir");
        gm.verify("dirs").expect("verify");
        assert!(gm.attributes.get("id").is_some());
        assert!(gm.attributes.get("epoch").is_some());
        assert!(gm.attributes.get("origin").is_some());
        assert!(gm.attributes.get("specversion").is_none());
        assert!(gm.attributes.get("model").is_none());
    }

    #[test]
    fn test_verify_cascades_into_resources() {
        let mut gm = group("dirs", "dir");
        let rm = ResourceModel {
            plural: "wrong".to_owned(),
            singular: "file".to_owned(),
            ..Default::default()
        };
        let _ = gm.resources.insert("files".to_owned(), rm);
        let err = gm.verify("dirs").expect_err("resource plural mismatch");
        assert_eq!(
            err.to_string(),
            r#"Resource "files" must have a 'plural' value of "files", not "wrong""#
        );
    }
}
