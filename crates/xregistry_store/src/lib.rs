// SPDX-License-Identifier: Apache-2.0

//! Transactional storage adapter for the xRegistry model.
//!
//! The model layer persists itself through three logical tables:
//!
//! - `Registries(SID, UID, Attributes)` — one row per registry,
//! - `Schemas(RegistrySID, Schema)` — composite key,
//! - `ModelEntities(SID, RegistrySID, ParentSID, Plural, Singular, ...)` —
//!   one row per group or resource kind.
//!
//! Statements are typed ([`Write`], [`Query`]) and flow through a
//! [`StoreTx`], the transaction handle held by the owning registry. The
//! count-checked verbs (`do_one`, `do_zero_one`, `do_zero_two`) enforce the
//! row-count contract of each mutation. [`MemStore`] is the built-in
//! in-memory engine.

pub mod mem;
pub mod tx;

pub use mem::MemStore;
pub use tx::{EntityRow, Query, Row, Rows, StoreTx, Write};

/// An error raised by a storage engine or by a row-count contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A statement affected a number of rows outside its contract.
    #[error("statement affected {affected} row(s), expected {expected}")]
    RowCount {
        /// The contract, e.g. `"exactly 1"`.
        expected: &'static str,
        /// The number of rows actually affected.
        affected: u64,
    },

    /// An insert collided with an existing primary key.
    #[error("duplicate key: {key}")]
    DuplicateKey {
        /// The offending key, rendered for diagnostics.
        key: String,
    },
}
