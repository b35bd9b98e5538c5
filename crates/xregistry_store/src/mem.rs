// SPDX-License-Identifier: Apache-2.0

//! In-memory storage engine.
//! Backs tests and embedders that don't want an external database.

use std::collections::{BTreeMap, BTreeSet};

use crate::tx::{EntityRow, Query, Row, Rows, StoreTx, Write};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryRow {
    uid: String,
    attributes: Option<String>,
}

/// The three tables. Cloneable so a transaction can snapshot them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Tables {
    /// SID -> registry row.
    registries: BTreeMap<String, RegistryRow>,
    /// (RegistrySID, Schema) composite keys.
    schemas: BTreeSet<(String, String)>,
    /// SID -> entity row.
    entities: BTreeMap<String, EntityRow>,
}

/// An in-memory store with snapshot-based transaction semantics.
///
/// All statements run against the working copy; `commit` promotes it,
/// `rollback` restores the last committed state. Single-threaded, like the
/// model layer that drives it.
#[derive(Debug, Default)]
pub struct MemStore {
    committed: Tables,
    work: Tables,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        MemStore::default()
    }
}

impl StoreTx for MemStore {
    fn execute(&mut self, write: Write) -> Result<u64, Error> {
        let tables = &mut self.work;
        match write {
            Write::InsertRegistry { sid, uid } => {
                if tables.registries.contains_key(&sid)
                    || tables.registries.values().any(|r| r.uid == uid)
                {
                    return Err(Error::DuplicateKey {
                        key: format!("Registries({sid}/{uid})"),
                    });
                }
                let _ = tables.registries.insert(
                    sid,
                    RegistryRow {
                        uid,
                        attributes: None,
                    },
                );
                Ok(1)
            }
            Write::UpdateRegistryAttributes { sid, attributes } => {
                match tables.registries.get_mut(&sid) {
                    Some(row) => {
                        row.attributes = Some(attributes);
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            Write::DeleteRegistry { sid } => {
                if tables.registries.remove(&sid).is_none() {
                    return Ok(0);
                }
                tables.schemas.retain(|(reg, _)| *reg != sid);
                tables.entities.retain(|_, row| row.registry_sid != sid);
                Ok(1)
            }
            Write::InsertSchema {
                registry_sid,
                schema,
            } => {
                let key = (registry_sid, schema);
                if tables.schemas.contains(&key) {
                    return Err(Error::DuplicateKey {
                        key: format!("Schemas({}/{})", key.0, key.1),
                    });
                }
                let _ = tables.schemas.insert(key);
                Ok(1)
            }
            Write::DeleteSchema {
                registry_sid,
                schema,
            } => {
                if tables.schemas.remove(&(registry_sid, schema)) {
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            Write::DeleteAllSchemas { registry_sid } => {
                let before = tables.schemas.len();
                tables.schemas.retain(|(reg, _)| *reg != registry_sid);
                Ok((before - tables.schemas.len()) as u64)
            }
            Write::InsertEntity(row) => {
                if tables.entities.contains_key(&row.sid) {
                    return Err(Error::DuplicateKey {
                        key: format!("ModelEntities({})", row.sid),
                    });
                }
                let _ = tables.entities.insert(row.sid.clone(), row);
                Ok(1)
            }
            Write::UpsertEntity(row) => {
                let affected = match tables.entities.insert(row.sid.clone(), row) {
                    None => 1,
                    Some(_) => 2,
                };
                Ok(affected)
            }
            Write::DeleteEntity { registry_sid, sid } => {
                let matched = tables
                    .entities
                    .get(&sid)
                    .is_some_and(|row| row.registry_sid == registry_sid);
                if !matched {
                    return Ok(0);
                }
                let _ = tables.entities.remove(&sid);
                // children go with the parent
                tables
                    .entities
                    .retain(|_, row| row.parent_sid.as_deref() != Some(sid.as_str()));
                Ok(1)
            }
        }
    }

    fn query(&mut self, query: Query) -> Result<Rows, Error> {
        let tables = &self.work;
        let rows = match query {
            Query::RegistryAttributes { sid } => tables
                .registries
                .get(&sid)
                .map(|row| Row::Registry {
                    sid,
                    uid: row.uid.clone(),
                    attributes: row.attributes.clone(),
                })
                .into_iter()
                .collect(),
            Query::RegistryByUid { uid } => tables
                .registries
                .iter()
                .find(|(_, row)| row.uid == uid)
                .map(|(sid, row)| Row::Registry {
                    sid: sid.clone(),
                    uid: row.uid.clone(),
                    attributes: row.attributes.clone(),
                })
                .into_iter()
                .collect(),
            Query::Schemas { registry_sid } => tables
                .schemas
                .iter()
                .filter(|(reg, _)| *reg == registry_sid)
                .map(|(reg, schema)| Row::Schema {
                    registry_sid: reg.clone(),
                    schema: schema.clone(),
                })
                .collect::<Vec<_>>(),
            Query::Entities { registry_sid } => {
                let mut rows: Vec<&EntityRow> = tables
                    .entities
                    .values()
                    .filter(|row| row.registry_sid == registry_sid)
                    .collect();
                // NULL parents (groups) first, then by parent, then by SID
                rows.sort_by(|a, b| {
                    (&a.parent_sid, &a.sid).cmp(&(&b.parent_sid, &b.sid))
                });
                rows.into_iter().cloned().map(Row::Entity).collect()
            }
        };
        Ok(Rows::from(rows))
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.committed = self.work.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.work = self.committed.clone();
        Ok(())
    }
}
