// SPDX-License-Identifier: Apache-2.0

//! The transaction surface consumed by the model layer.

use crate::Error;

/// One row of the `ModelEntities` table.
///
/// `parent_sid` is `None` for a group kind and the owning group's SID for a
/// resource kind. `attributes` holds the serialized JSON of the entity's
/// attribute collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    /// Stable opaque identity of the entity (primary key).
    pub sid: String,
    /// The owning registry.
    pub registry_sid: String,
    /// The owning group for resources, `None` for groups.
    pub parent_sid: Option<String>,
    /// Plural name of the kind.
    pub plural: String,
    /// Singular name of the kind.
    pub singular: String,
    /// Serialized attribute collection, if any.
    pub attributes: Option<String>,
    /// Max retained versions (resources only; 0 means unlimited).
    pub versions: i64,
    /// Whether clients may pick version ids (resources only).
    pub version_id: bool,
    /// Whether a "latest" pointer is kept (resources only).
    pub latest: bool,
    /// Whether the resource carries a document (resources only).
    pub has_document: bool,
}

/// A mutating statement against one of the three tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Insert a new `Registries` row with no attributes yet.
    InsertRegistry {
        /// Registry SID (primary key).
        sid: String,
        /// Caller-visible registry id (unique).
        uid: String,
    },
    /// Replace the serialized attributes of a registry.
    UpdateRegistryAttributes {
        /// Registry SID.
        sid: String,
        /// Serialized attribute collection.
        attributes: String,
    },
    /// Delete a registry and everything hanging off it.
    DeleteRegistry {
        /// Registry SID.
        sid: String,
    },
    /// Insert one `Schemas` row.
    InsertSchema {
        /// Owning registry.
        registry_sid: String,
        /// Schema URI.
        schema: String,
    },
    /// Delete one `Schemas` row.
    DeleteSchema {
        /// Owning registry.
        registry_sid: String,
        /// Schema URI.
        schema: String,
    },
    /// Delete every schema of a registry.
    DeleteAllSchemas {
        /// Owning registry.
        registry_sid: String,
    },
    /// Insert a new `ModelEntities` row; fails on an existing SID.
    InsertEntity(EntityRow),
    /// Insert or overwrite a `ModelEntities` row.
    ///
    /// Reports 1 affected row for an insert and 2 for an overwrite, the
    /// convention of `INSERT ... ON DUPLICATE KEY UPDATE`.
    UpsertEntity(EntityRow),
    /// Delete a `ModelEntities` row. Children (rows whose `parent_sid` is
    /// the deleted SID) are deleted with it but do not count as affected.
    DeleteEntity {
        /// Owning registry.
        registry_sid: String,
        /// Entity SID.
        sid: String,
    },
}

/// A read statement. Result ordering is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// The single registry row for a SID.
    RegistryAttributes {
        /// Registry SID.
        sid: String,
    },
    /// The single registry row for a caller-visible id.
    RegistryByUid {
        /// Registry UID.
        uid: String,
    },
    /// All schemas of a registry, ordered ascending.
    Schemas {
        /// Owning registry.
        registry_sid: String,
    },
    /// All model entities of a registry, parents before children
    /// (`ParentSID` ascending with NULL first).
    Entities {
        /// Owning registry.
        registry_sid: String,
    },
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// A `Registries` row.
    Registry {
        /// Registry SID.
        sid: String,
        /// Registry UID.
        uid: String,
        /// Serialized attribute collection, if any.
        attributes: Option<String>,
    },
    /// A `Schemas` row.
    Schema {
        /// Owning registry.
        registry_sid: String,
        /// Schema URI.
        schema: String,
    },
    /// A `ModelEntities` row.
    Entity(EntityRow),
}

/// A forward-only row cursor.
#[derive(Debug)]
pub struct Rows(std::vec::IntoIter<Row>);

impl Rows {
    /// Returns the next row, or `None` when the cursor is exhausted.
    pub fn next_row(&mut self) -> Option<Row> {
        self.0.next()
    }
}

impl From<Vec<Row>> for Rows {
    fn from(rows: Vec<Row>) -> Self {
        Rows(rows.into_iter())
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.0.next()
    }
}

/// A registry-scoped transaction.
///
/// The model layer holds exactly one `StoreTx` per registry and issues every
/// statement through it. `commit`/`rollback` are driven by the caller that
/// owns the registry; the model layer itself never ends the transaction.
pub trait StoreTx {
    /// Executes a mutating statement, returning the number of affected rows.
    fn execute(&mut self, write: Write) -> Result<u64, Error>;

    /// Executes a read statement.
    fn query(&mut self, query: Query) -> Result<Rows, Error>;

    /// Makes the work of this transaction durable.
    fn commit(&mut self) -> Result<(), Error>;

    /// Discards the work of this transaction.
    fn rollback(&mut self) -> Result<(), Error>;

    /// Executes a statement with no expectation on the affected row count.
    fn do_write(&mut self, write: Write) -> Result<(), Error> {
        let _ = self.execute(write)?;
        Ok(())
    }

    /// Executes a statement that must affect exactly one row.
    fn do_one(&mut self, write: Write) -> Result<(), Error> {
        match self.execute(write)? {
            1 => Ok(()),
            affected => Err(Error::RowCount {
                expected: "exactly 1",
                affected,
            }),
        }
    }

    /// Executes a statement that must affect zero or one rows.
    fn do_zero_one(&mut self, write: Write) -> Result<(), Error> {
        match self.execute(write)? {
            0 | 1 => Ok(()),
            affected => Err(Error::RowCount {
                expected: "0 or 1",
                affected,
            }),
        }
    }

    /// Executes a statement that must affect zero, one or two rows (an
    /// upsert that may insert or overwrite).
    fn do_zero_two(&mut self, write: Write) -> Result<(), Error> {
        match self.execute(write)? {
            0..=2 => Ok(()),
            affected => Err(Error::RowCount {
                expected: "0, 1 or 2",
                affected,
            }),
        }
    }
}
