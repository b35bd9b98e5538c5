// SPDX-License-Identifier: Apache-2.0

//! The registry handle: stable identity plus the one outstanding
//! transaction every model operation flows through.

use std::fmt;

use uuid::Uuid;
use xregistry_store::{Query, Row, StoreTx, Write};

use crate::model::Model;
use crate::Error;

/// A handle to one registry: its stable identity and the transaction the
/// model layer issues statements through.
///
/// All operations on a registry's model are single-threaded on the caller's
/// thread; the caller decides when to [`commit`](Registry::commit) or
/// [`rollback`](Registry::rollback).
pub struct Registry {
    db_sid: String,
    uid: String,
    pub(crate) tx: Box<dyn StoreTx>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("db_sid", &self.db_sid)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates a registry: inserts its row, assigns a fresh SID, and saves
    /// an empty (baseline-only) model through the normal cascade. An empty
    /// `uid` gets a generated one.
    pub fn create(tx: Box<dyn StoreTx>, uid: &str) -> Result<(Registry, Model), Error> {
        let uid = if uid.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            uid.to_owned()
        };
        let db_sid = Uuid::new_v4().to_string();
        let mut reg = Registry {
            db_sid: db_sid.clone(),
            uid: uid.clone(),
            tx,
        };
        reg.tx
            .do_one(Write::InsertRegistry { sid: db_sid, uid: uid.clone() })
            .map_err(|e| Error::storage(format!("creating registry({uid})"), e))?;

        let mut model = Model::new();
        model.save(&mut reg)?;
        Ok((reg, model))
    }

    /// Finds a registry by its caller-visible id and loads its model.
    pub fn find(mut tx: Box<dyn StoreTx>, uid: &str) -> Result<Option<(Registry, Model)>, Error> {
        let mut rows = tx
            .query(Query::RegistryByUid {
                uid: uid.to_owned(),
            })
            .map_err(|e| Error::storage(format!("finding registry({uid})"), e))?;
        match rows.next_row() {
            Some(Row::Registry { sid, uid, .. }) => {
                let mut reg = Registry {
                    db_sid: sid,
                    uid,
                    tx,
                };
                let model = Model::load(&mut reg)?;
                Ok(Some((reg, model)))
            }
            _ => Ok(None),
        }
    }

    /// The registry's stable persistence identity.
    #[must_use]
    pub fn db_sid(&self) -> &str {
        &self.db_sid
    }

    /// The registry's caller-visible id.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Makes the transaction's work durable.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.tx
            .commit()
            .map_err(|e| Error::storage(format!("committing registry({})", self.uid), e))
    }

    /// Discards the transaction's work.
    pub fn rollback(&mut self) -> Result<(), Error> {
        self.tx
            .rollback()
            .map_err(|e| Error::storage(format!("rolling back registry({})", self.uid), e))
    }

    /// Deletes the registry row and everything hanging off it. The model
    /// dies with its registry.
    pub fn delete(&mut self) -> Result<(), Error> {
        self.tx
            .do_one(Write::DeleteRegistry {
                sid: self.db_sid.clone(),
            })
            .map_err(|e| Error::storage(format!("deleting registry({})", self.uid), e))
    }
}
