// SPDX-License-Identifier: Apache-2.0

//! The root model: registry-level attributes, understood schemas, and the
//! group kinds. All mutation verbs live here so the single save cascade
//! always runs against the whole tree.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xregistry_store::{EntityRow, Query, Row, Write};

use crate::attribute::{Attribute, Item};
use crate::attributes::{Attributes, LevelData, StorageAttributes};
use crate::group::GroupModel;
use crate::path::PropPath;
use crate::registry::Registry;
use crate::resource::ResourceModel;
use crate::spec_props::{ensure_attr_ok, ordered_spec_props};
use crate::types::{is_valid_attribute_name, AttrType};
use crate::{canonical_schema, Error, HASDOCUMENT, LATEST, VERSIONID, VERSIONS};

/// The schema description of one registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// URIs of the spec versions this model's registry understands. Always
    /// contains the canonical entry after verification; sorted, no
    /// duplicates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,

    /// Registry-level attributes.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    /// Group kinds, keyed by plural.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, GroupModel>,
}

impl Model {
    /// Creates an empty model. Verification injects the spec baseline.
    #[must_use]
    pub fn new() -> Self {
        Model::default()
    }

    /// Looks up a group kind by plural.
    #[must_use]
    pub fn group(&self, plural: &str) -> Option<&GroupModel> {
        self.groups.get(plural)
    }

    /// Looks up a group kind by plural, mutably. Callers that change it
    /// must follow up with [`Model::save`].
    pub fn group_mut(&mut self, plural: &str) -> Option<&mut GroupModel> {
        self.groups.get_mut(plural)
    }

    /// Looks up a group kind by plural, case-insensitively.
    #[must_use]
    pub fn find_group_model(&self, plural: &str) -> Option<&GroupModel> {
        self.groups
            .values()
            .find(|gm| gm.plural.eq_ignore_ascii_case(plural))
    }

    /// Verifies the whole tree, injecting the spec baseline where missing:
    /// the canonical schema entry, registry-level attributes, then every
    /// group and resource kind.
    pub fn verify(&mut self) -> Result<(), Error> {
        let canonical = canonical_schema();
        if !self
            .schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&canonical))
        {
            self.schemas.insert(0, canonical);
        }
        self.schemas = std::mem::take(&mut self.schemas)
            .into_iter()
            .sorted()
            .dedup()
            .collect();

        for spec in ordered_spec_props().iter().filter(|a| a.in_level(0)) {
            match self.attributes.get_mut(&spec.name) {
                None => self.attributes.add(spec.clone()),
                Some(user) => ensure_attr_ok(user, spec)?,
            }
        }

        let ld = LevelData {
            attr_names: Default::default(),
            path: PropPath::new().p("model"),
        };
        self.attributes.verify(&ld)?;

        for (name, gm) in self.groups.iter_mut() {
            gm.verify(name)?;
        }

        Ok(())
    }

    /// Verifies and persists the whole tree.
    ///
    /// On a verification failure the in-memory model is replaced with the
    /// last persisted one, so this handle stays consistent with storage —
    /// any outstanding references into the old tree must be re-found.
    pub fn save(&mut self, reg: &mut Registry) -> Result<(), Error> {
        if let Err(err) = self.verify() {
            *self = Model::load(reg)?;
            return Err(err);
        }

        let schemas = self.schemas.clone();
        self.set_schemas(reg, schemas)?;

        // stored with the "model" sentinel kept; only end users must not
        // see it
        let attrs = serde_json::to_string(&StorageAttributes(&self.attributes))
            .map_err(|e| Error::json(&e))?;
        reg.tx
            .do_zero_one(Write::UpdateRegistryAttributes {
                sid: reg.db_sid().to_owned(),
                attributes: attrs,
            })
            .map_err(|e| Error::storage("updating model".to_owned(), e))?;

        for gm in self.groups.values() {
            gm.save(reg)?;
        }

        Ok(())
    }

    /// Reconstructs a model from its three tables: registry attributes,
    /// schemas, then entities (groups arrive before their resources).
    pub fn load(reg: &mut Registry) -> Result<Model, Error> {
        let mut model = Model::default();

        let mut rows = reg
            .tx
            .query(Query::RegistryAttributes {
                sid: reg.db_sid().to_owned(),
            })
            .map_err(|e| Error::storage(format!("loading registries({})", reg.uid()), e))?;
        let Some(Row::Registry { attributes, .. }) = rows.next_row() else {
            log::error!("Can't find registry: {}", reg.uid());
            return Err(Error::RegistryNotFound {
                uid: reg.uid().to_owned(),
            });
        };
        if let Some(json) = attributes {
            model.attributes = serde_json::from_str(&json).map_err(|e| Error::json(&e))?;
        }
        model.attributes.set_spec_props_fields();

        let rows = reg
            .tx
            .query(Query::Schemas {
                registry_sid: reg.db_sid().to_owned(),
            })
            .map_err(|e| Error::storage(format!("loading schemas({})", reg.uid()), e))?;
        for row in rows {
            if let Row::Schema { schema, .. } = row {
                model.schemas.push(schema);
            }
        }

        let rows = reg
            .tx
            .query(Query::Entities {
                registry_sid: reg.db_sid().to_owned(),
            })
            .map_err(|e| Error::storage(format!("loading model({})", reg.uid()), e))?;

        // group SID -> plural, to attach resources on the second kind of row
        let mut group_plurals: HashMap<String, String> = HashMap::new();
        for row in rows {
            let Row::Entity(entity) = row else { continue };
            let mut attrs: Attributes = match &entity.attributes {
                Some(json) => serde_json::from_str(json).map_err(|e| Error::json(&e))?,
                None => Attributes::new(),
            };
            attrs.set_spec_props_fields();

            match entity.parent_sid {
                None => {
                    let gm = GroupModel {
                        sid: entity.sid.clone(),
                        plural: entity.plural.clone(),
                        singular: entity.singular,
                        attributes: attrs,
                        resources: BTreeMap::new(),
                    };
                    let _ = group_plurals.insert(entity.sid, entity.plural.clone());
                    let _ = model.groups.insert(entity.plural, gm);
                }
                Some(parent_sid) => {
                    let Some(gm) = group_plurals
                        .get(&parent_sid)
                        .and_then(|plural| model.groups.get_mut(plural))
                    else {
                        // orphaned row; parents always arrive first
                        continue;
                    };
                    let rm = ResourceModel {
                        sid: entity.sid,
                        plural: entity.plural.clone(),
                        singular: entity.singular,
                        versions: entity.versions,
                        version_id: entity.version_id,
                        latest: entity.latest,
                        has_document: entity.has_document,
                        attributes: attrs,
                    };
                    let _ = gm.resources.insert(entity.plural, rm);
                }
            }
        }

        Ok(model)
    }

    /// Records a schema URI: one row, plus the in-memory list (idempotent
    /// there, kept sorted).
    pub fn add_schema(&mut self, reg: &mut Registry, schema: &str) -> Result<(), Error> {
        reg.tx
            .do_write(Write::InsertSchema {
                registry_sid: reg.db_sid().to_owned(),
                schema: schema.to_owned(),
            })
            .map_err(|e| Error::storage(format!("inserting schema({schema})"), e))?;

        if self.schemas.iter().any(|s| s == schema) {
            return Ok(());
        }
        self.schemas.push(schema.to_owned());
        self.schemas.sort();
        Ok(())
    }

    /// Forgets a schema URI. Idempotent on the in-memory list.
    pub fn del_schema(&mut self, reg: &mut Registry, schema: &str) -> Result<(), Error> {
        reg.tx
            .do_write(Write::DeleteSchema {
                registry_sid: reg.db_sid().to_owned(),
                schema: schema.to_owned(),
            })
            .map_err(|e| Error::storage(format!("deleting schema({schema})"), e))?;

        self.schemas.retain(|s| s != schema);
        Ok(())
    }

    /// Replaces the schema list wholesale, in storage and in memory.
    pub fn set_schemas(&mut self, reg: &mut Registry, schemas: Vec<String>) -> Result<(), Error> {
        reg.tx
            .do_write(Write::DeleteAllSchemas {
                registry_sid: reg.db_sid().to_owned(),
            })
            .map_err(|e| Error::storage("deleting schemas".to_owned(), e))?;
        self.schemas.clear();

        for schema in schemas {
            self.add_schema(reg, &schema)?;
        }
        Ok(())
    }

    /// Adds (or replaces) a registry-level attribute and saves.
    pub fn add_attribute(
        &mut self,
        reg: &mut Registry,
        attr: Attribute,
    ) -> Result<&Attribute, Error> {
        if attr.name != "*" && !is_valid_attribute_name(&attr.name) {
            return Err(Error::InvalidAttributeName { name: attr.name });
        }
        let name = attr.name.clone();
        self.attributes.add(attr);
        self.save(reg)?;
        Ok(self
            .attributes
            .get(&name)
            .expect("attribute survived the save"))
    }

    /// Adds a registry-level attribute of the given type and saves.
    pub fn add_attr(
        &mut self,
        reg: &mut Registry,
        name: &str,
        attr_type: AttrType,
    ) -> Result<&Attribute, Error> {
        self.add_attribute(reg, Attribute::new(name, attr_type))
    }

    /// Adds a registry-level OBJECT attribute and saves.
    pub fn add_attr_obj(&mut self, reg: &mut Registry, name: &str) -> Result<&Attribute, Error> {
        self.add_attribute(reg, Attribute::object(name))
    }

    /// Adds a registry-level MAP attribute and saves.
    pub fn add_attr_map(
        &mut self,
        reg: &mut Registry,
        name: &str,
        item: Item,
    ) -> Result<&Attribute, Error> {
        self.add_attribute(reg, Attribute::map(name, item))
    }

    /// Adds a registry-level ARRAY attribute and saves.
    pub fn add_attr_array(
        &mut self,
        reg: &mut Registry,
        name: &str,
        item: Item,
    ) -> Result<&Attribute, Error> {
        self.add_attribute(reg, Attribute::array(name, item))
    }

    /// Removes a registry-level attribute and saves.
    pub fn del_attribute(&mut self, reg: &mut Registry, name: &str) -> Result<(), Error> {
        self.attributes.remove(name);
        self.save(reg)
    }

    /// Adds a group kind: validates both names, enforces uniqueness of
    /// plural and singular across the model, inserts the row under a fresh
    /// SID, and saves.
    pub fn add_group_model(
        &mut self,
        reg: &mut Registry,
        plural: &str,
        singular: &str,
    ) -> Result<&mut GroupModel, Error> {
        if plural.is_empty() {
            return Err(Error::GroupEmptyPlural);
        }
        if singular.is_empty() {
            return Err(Error::GroupEmptySingular);
        }
        if !is_valid_attribute_name(plural) {
            return Err(Error::InvalidGroupPluralName);
        }
        if !is_valid_attribute_name(singular) {
            return Err(Error::InvalidGroupSingularName);
        }
        for gm in self.groups.values() {
            if gm.plural == plural {
                return Err(Error::GroupPluralExists {
                    plural: plural.to_owned(),
                });
            }
            if gm.singular == singular {
                return Err(Error::GroupSingularExists {
                    singular: singular.to_owned(),
                });
            }
        }

        let sid = Uuid::new_v4().to_string();
        reg.tx
            .do_one(Write::InsertEntity(EntityRow {
                sid: sid.clone(),
                registry_sid: reg.db_sid().to_owned(),
                parent_sid: None,
                plural: plural.to_owned(),
                singular: singular.to_owned(),
                attributes: None,
                versions: VERSIONS,
                version_id: VERSIONID,
                latest: LATEST,
                has_document: HASDOCUMENT,
            }))
            .map_err(|e| Error::storage(format!("inserting groupModel({plural})"), e))?;

        let gm = GroupModel {
            sid,
            plural: plural.to_owned(),
            singular: singular.to_owned(),
            ..Default::default()
        };
        let _ = self.groups.insert(plural.to_owned(), gm);

        self.save(reg)?;

        Ok(self
            .groups
            .get_mut(plural)
            .expect("group survived the save"))
    }

    /// Deletes a group kind, its row, and — transitively — its resource
    /// kinds.
    pub fn del_group_model(&mut self, reg: &mut Registry, plural: &str) -> Result<(), Error> {
        let Some(gm) = self.groups.get(plural) else {
            return Err(Error::UnknownGroup {
                name: plural.to_owned(),
            });
        };
        gm.delete(reg)?;
        let _ = self.groups.remove(plural);
        Ok(())
    }

    /// Adds a resource kind to a group kind: validates names and
    /// `versions`, enforces uniqueness within the group, inserts the row
    /// under the group's SID, and saves.
    pub fn add_resource_model(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        plural: &str,
        singular: &str,
        versions: i64,
        version_id: bool,
        latest: bool,
        has_document: bool,
    ) -> Result<&mut ResourceModel, Error> {
        let Some(gm) = self.groups.get(group_plural) else {
            return Err(Error::UnknownGroup {
                name: group_plural.to_owned(),
            });
        };

        if plural.is_empty() {
            return Err(Error::ResourceEmptyPlural);
        }
        if singular.is_empty() {
            return Err(Error::ResourceEmptySingular);
        }
        if versions < 0 {
            return Err(Error::NegativeVersions { versions });
        }
        if !is_valid_attribute_name(plural) {
            return Err(Error::InvalidResourcePluralName);
        }
        if !is_valid_attribute_name(singular) {
            return Err(Error::InvalidResourceSingularName);
        }
        for rm in gm.resources.values() {
            if rm.plural == plural {
                return Err(Error::ResourcePluralExists {
                    plural: plural.to_owned(),
                    group: gm.plural.clone(),
                });
            }
            if rm.singular == singular {
                return Err(Error::ResourceSingularExists {
                    singular: singular.to_owned(),
                    group: gm.plural.clone(),
                });
            }
        }

        let sid = Uuid::new_v4().to_string();
        reg.tx
            .do_one(Write::InsertEntity(EntityRow {
                sid: sid.clone(),
                registry_sid: reg.db_sid().to_owned(),
                parent_sid: Some(gm.sid().to_owned()),
                plural: plural.to_owned(),
                singular: singular.to_owned(),
                attributes: None,
                versions,
                version_id,
                latest,
                has_document,
            }))
            .map_err(|e| Error::storage(format!("inserting resourceModel({plural})"), e))?;

        let rm = ResourceModel {
            sid,
            plural: plural.to_owned(),
            singular: singular.to_owned(),
            versions,
            version_id,
            latest,
            has_document,
            attributes: Attributes::new(),
        };
        let _ = self
            .groups
            .get_mut(group_plural)
            .expect("group checked above")
            .resources
            .insert(plural.to_owned(), rm);

        self.save(reg)?;

        Ok(self
            .groups
            .get_mut(group_plural)
            .expect("group survived the save")
            .resources
            .get_mut(plural)
            .expect("resource survived the save"))
    }

    /// Deletes a resource kind and its row.
    pub fn del_resource_model(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        plural: &str,
    ) -> Result<(), Error> {
        let Some(gm) = self.groups.get_mut(group_plural) else {
            return Err(Error::UnknownGroup {
                name: group_plural.to_owned(),
            });
        };
        let Some(rm) = gm.resources.get(plural) else {
            return Err(Error::UnknownResource {
                name: plural.to_owned(),
            });
        };
        rm.delete(reg)?;
        let _ = gm.resources.remove(plural);
        Ok(())
    }

    /// Adds (or replaces) a group-level attribute and saves.
    pub fn add_group_attribute(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        attr: Attribute,
    ) -> Result<&Attribute, Error> {
        if attr.name != "*" && !is_valid_attribute_name(&attr.name) {
            return Err(Error::InvalidAttributeName { name: attr.name });
        }
        let Some(gm) = self.groups.get_mut(group_plural) else {
            return Err(Error::UnknownGroup {
                name: group_plural.to_owned(),
            });
        };
        let name = attr.name.clone();
        gm.attributes.add(attr);
        self.save(reg)?;
        Ok(self
            .groups
            .get(group_plural)
            .and_then(|gm| gm.attributes.get(&name))
            .expect("attribute survived the save"))
    }

    /// Removes a group-level attribute and saves.
    pub fn del_group_attribute(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        name: &str,
    ) -> Result<(), Error> {
        let Some(gm) = self.groups.get_mut(group_plural) else {
            return Err(Error::UnknownGroup {
                name: group_plural.to_owned(),
            });
        };
        gm.attributes.remove(name);
        self.save(reg)
    }

    /// Adds (or replaces) a resource-level attribute and saves.
    pub fn add_resource_attribute(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        resource_plural: &str,
        attr: Attribute,
    ) -> Result<&Attribute, Error> {
        if attr.name != "*" && !is_valid_attribute_name(&attr.name) {
            return Err(Error::InvalidAttributeName { name: attr.name });
        }
        let Some(rm) = self
            .groups
            .get_mut(group_plural)
            .ok_or_else(|| Error::UnknownGroup {
                name: group_plural.to_owned(),
            })?
            .resources
            .get_mut(resource_plural)
        else {
            return Err(Error::UnknownResource {
                name: resource_plural.to_owned(),
            });
        };
        let name = attr.name.clone();
        rm.attributes.add(attr);
        self.save(reg)?;
        Ok(self
            .groups
            .get(group_plural)
            .and_then(|gm| gm.resources.get(resource_plural))
            .and_then(|rm| rm.attributes.get(&name))
            .expect("attribute survived the save"))
    }

    /// Removes a resource-level attribute and saves.
    pub fn del_resource_attribute(
        &mut self,
        reg: &mut Registry,
        group_plural: &str,
        resource_plural: &str,
        name: &str,
    ) -> Result<(), Error> {
        let Some(rm) = self
            .groups
            .get_mut(group_plural)
            .ok_or_else(|| Error::UnknownGroup {
                name: group_plural.to_owned(),
            })?
            .resources
            .get_mut(resource_plural)
        else {
            return Err(Error::UnknownResource {
                name: resource_plural.to_owned(),
            });
        };
        rm.attributes.remove(name);
        self.save(reg)
    }

    /// Reconciles this model with a replacement: schemas are reset and
    /// re-added, registry attributes replaced, group and resource kinds
    /// diffed — kinds absent from `new_model` are deleted, surviving kinds
    /// keep their SIDs and are updated in place, new kinds are created —
    /// and the result is saved. A verification failure reverts the
    /// in-memory model to the last persisted state.
    pub fn apply_new_model(&mut self, reg: &mut Registry, new_model: Model) -> Result<(), Error> {
        let Model {
            schemas: new_schemas,
            attributes: new_attributes,
            groups: new_groups,
        } = new_model;

        self.schemas = vec![canonical_schema()];
        reg.tx
            .do_write(Write::DeleteAllSchemas {
                registry_sid: reg.db_sid().to_owned(),
            })
            .map_err(|e| Error::storage("deleting schemas".to_owned(), e))?;
        for schema in &new_schemas {
            self.add_schema(reg, schema)?;
        }

        self.attributes = new_attributes;

        // drop group kinds gone from the new model, and within survivors,
        // resource kinds gone from the new group
        let old_groups: Vec<String> = self.groups.keys().cloned().collect();
        for g_plural in old_groups {
            match new_groups.get(&g_plural) {
                None => self.del_group_model(reg, &g_plural)?,
                Some(new_gm) => {
                    let old_resources: Vec<String> = self
                        .groups
                        .get(&g_plural)
                        .map(|gm| gm.resources.keys().cloned().collect())
                        .unwrap_or_default();
                    for r_plural in old_resources {
                        if !new_gm.resources.contains_key(&r_plural) {
                            self.del_resource_model(reg, &g_plural, &r_plural)?;
                        }
                    }
                }
            }
        }

        // create or update in place; survivors keep their SIDs
        for (_, new_gm) in new_groups {
            let GroupModel {
                plural: g_plural,
                singular: g_singular,
                attributes: g_attributes,
                resources: g_resources,
                ..
            } = new_gm;

            if self.groups.contains_key(&g_plural) {
                let gm = self.groups.get_mut(&g_plural).expect("key just checked");
                gm.singular = g_singular;
                gm.attributes = g_attributes;
            } else {
                let _ = self.add_group_model(reg, &g_plural, &g_singular)?;
                let gm = self.groups.get_mut(&g_plural).expect("group just added");
                gm.attributes = g_attributes;
            }

            for (_, new_rm) in g_resources {
                let exists = self
                    .groups
                    .get(&g_plural)
                    .is_some_and(|gm| gm.resources.contains_key(&new_rm.plural));
                if exists {
                    let rm = self
                        .groups
                        .get_mut(&g_plural)
                        .expect("key just checked")
                        .resources
                        .get_mut(&new_rm.plural)
                        .expect("key just checked");
                    rm.singular = new_rm.singular;
                    rm.versions = new_rm.versions;
                    rm.version_id = new_rm.version_id;
                    rm.latest = new_rm.latest;
                    rm.has_document = new_rm.has_document;
                    rm.attributes = new_rm.attributes;
                } else {
                    let rm = self.add_resource_model(
                        reg,
                        &g_plural,
                        &new_rm.plural,
                        &new_rm.singular,
                        new_rm.versions,
                        new_rm.version_id,
                        new_rm.latest,
                        new_rm.has_document,
                    )?;
                    rm.attributes = new_rm.attributes;
                }
            }
        }

        self.save(reg)
    }
}
