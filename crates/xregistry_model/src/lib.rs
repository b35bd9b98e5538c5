// SPDX-License-Identifier: Apache-2.0

//! Model definition and validation core of the xRegistry registry service.
//!
//! A registry stores a tree of user resources: the Registry contains named
//! group kinds, each group kind contains named resource kinds, and resources
//! may carry versioned documents. The model describes, in data, the legal
//! shape of each level: which attributes exist, their types (including
//! nested objects, maps and arrays), their constraints, and conditional
//! sibling attributes gated on other attribute values.
//!
//! The subsystem is single-threaded per registry: every operation runs on
//! the caller's thread inside the one transaction held by the [`Registry`]
//! handle, and either succeeds or returns a specific [`Error`]. A failed
//! [`Model::save`] reloads the persisted model in place so the caller's
//! handle stays consistent with storage.

pub mod attribute;
pub mod attributes;
pub mod group;
pub mod model;
pub mod path;
pub mod registry;
pub mod resource;
pub mod serializer;
mod spec_props;
pub mod types;

pub use attribute::{Attribute, IfValue, IfValues, Item};
pub use attributes::Attributes;
pub use group::GroupModel;
pub use model::Model;
pub use path::PropPath;
pub use registry::Registry;
pub use resource::ResourceModel;
pub use serializer::{get_model_serializer, register_model_serializer, ModelSerializer};
pub use types::{is_of_type, is_valid_attribute_name, is_valid_map_key, AttrType};

/// Schema family understood by this implementation.
pub const XREG_SCHEMA: &str = "xRegistry-json";
/// Version of the xRegistry spec this implementation understands.
pub const SPEC_VERSION: &str = "0.5";

/// Default max retained versions for a resource kind (0 means unlimited).
pub const VERSIONS: i64 = 0;
/// Default for whether clients may pick version ids.
pub const VERSIONID: bool = true;
/// Default for whether a "latest" pointer is kept.
pub const LATEST: bool = true;
/// Default for whether resources of a kind carry a document.
pub const HASDOCUMENT: bool = true;

/// The canonical `<schema-family>/<spec-version>` URI that every model's
/// `schemas` list must contain.
#[must_use]
pub fn canonical_schema() -> String {
    format!("{XREG_SCHEMA}/{SPEC_VERSION}")
}

/// An error raised while verifying, mutating or persisting a model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// An attribute collection holds an entry under the empty key.
    #[error("{path:?} has an empty attribute key")]
    EmptyAttributeKey {
        /// Path of the collection.
        path: String,
    },

    /// Two attributes collide at one level, possibly via `ifValues`
    /// sibling declarations.
    #[error("Duplicate attribute name ({name}) at: {path}")]
    DuplicateAttribute {
        /// The colliding name.
        name: String,
        /// Path of the collection.
        path: String,
    },

    /// An attribute key does not match the property-name syntax.
    #[error("{path:?} has an invalid attribute key {name:?} - must match {pattern:?}")]
    InvalidAttributeKey {
        /// Path of the collection.
        path: String,
        /// The offending key.
        name: String,
        /// The property-name regex.
        pattern: &'static str,
    },

    /// An attribute's `name` field disagrees with its key.
    #[error("{path:?} must have a \"name\" set to {name:?}")]
    NameMismatch {
        /// Path of the attribute.
        path: String,
        /// The key the name must equal.
        name: String,
    },

    /// An attribute has no `type`.
    #[error("{path:?} is missing a \"type\"")]
    MissingType {
        /// Path of the attribute.
        path: String,
    },

    /// An attribute's `type` is not one of the defined types.
    #[error("{path:?} has an invalid type: {attr_type}")]
    InvalidType {
        /// Path of the attribute.
        path: String,
        /// The offending type string.
        attr_type: String,
    },

    /// An attribute declares an `enum` with no members.
    #[error("{path:?} specifies an \"enum\" but it is empty")]
    EmptyEnum {
        /// Path of the attribute.
        path: String,
    },

    /// An `enum` appears on a non-scalar attribute.
    #[error("{path:?} is not a scalar, so \"enum\" is not allowed")]
    EnumOnNonScalar {
        /// Path of the attribute.
        path: String,
    },

    /// An `enum` member is not of the attribute's declared type.
    #[error("{path:?} enum value \"{value}\" must be of type {attr_type:?}")]
    EnumValueType {
        /// Path of the attribute.
        path: String,
        /// The offending member, rendered.
        value: String,
        /// The declared type.
        attr_type: String,
    },

    /// `clientrequired` set without `serverrequired`.
    #[error("{path:?} must have \"serverrequired\" since \"clientrequired\" is \"true\"")]
    ClientRequiredWithoutServer {
        /// Path of the attribute.
        path: String,
    },

    /// A `default` value on an attribute that is not `serverrequired`.
    #[error("{path:?} must have \"serverrequired\" since a \"default\" value is provided")]
    DefaultWithoutServerRequired {
        /// Path of the attribute.
        path: String,
    },

    /// A `default` value on a non-scalar attribute.
    #[error("{path:?} is not a scalar, so \"default\" is not allowed")]
    DefaultOnNonScalar {
        /// Path of the attribute.
        path: String,
    },

    /// A `default` value that is not of the attribute's declared type.
    #[error("{path:?} \"default\" value must be of type {attr_type:?}")]
    DefaultValueType {
        /// Path of the attribute.
        path: String,
        /// The declared type.
        attr_type: String,
    },

    /// A map or array attribute with no `item` section.
    #[error("{path:?} must have an \"item\" section")]
    MissingItem {
        /// Path of the attribute or item.
        path: String,
    },

    /// An object attribute carrying an `item` section.
    #[error("{path:?} must not have an \"item\" section")]
    UnexpectedItem {
        /// Path of the attribute.
        path: String,
    },

    /// An `ifValues` map keyed by the empty string.
    #[error("{path:?} has an empty ifvalues key")]
    EmptyIfValuesKey {
        /// Path of the collection.
        path: String,
    },

    /// An item with no `type`.
    #[error("{path:?} must have a \"type\" defined")]
    ItemMissingType {
        /// Path of the item.
        path: String,
    },

    /// An item whose `type` is not one of the defined types.
    #[error("{path:?} has an invalid \"type\": {attr_type}")]
    ItemInvalidType {
        /// Path of the item.
        path: String,
        /// The offending type string.
        attr_type: String,
    },

    /// A non-object item carrying an `attributes` section.
    #[error("{path:?} must not have \"attributes\"")]
    ItemUnexpectedAttributes {
        /// Path of the item.
        path: String,
    },

    /// A conditional sibling declaration conflicts with an attribute that
    /// is already present on the instance.
    #[error("Attribute {attr:?} has an ifvalue({value}) that defines a conflicting siblingattribute: {sibling}")]
    ConflictingSibling {
        /// The attribute carrying the `ifValues`.
        attr: String,
        /// The matched `ifValues` key.
        value: String,
        /// The conflicting sibling name.
        sibling: String,
    },

    /// A user-supplied copy of a spec attribute dropped `serverrequired`.
    #[error("\"model.{name}\" must have its \"serverrequired\" attribute set to \"true\"")]
    SpecAttrServerRequired {
        /// The spec attribute name.
        name: String,
    },

    /// A user-supplied copy of a spec attribute dropped `readonly`.
    #[error("\"model.{name}\" must have its \"readonly\" attribute set to \"true\"")]
    SpecAttrReadOnly {
        /// The spec attribute name.
        name: String,
    },

    /// A user-supplied copy of a spec attribute changed its type.
    #[error("\"model.{name}\" must have a \"type\" of {attr_type:?}")]
    SpecAttrType {
        /// The spec attribute name.
        name: String,
        /// The required type.
        attr_type: String,
    },

    /// A group key that does not match the name syntax.
    #[error("Invalid Group name/key {name:?} - must match {pattern:?}")]
    InvalidGroupKey {
        /// The offending key.
        name: String,
        /// The property-name regex.
        pattern: &'static str,
    },

    /// A group whose `plural` disagrees with its key.
    #[error("Group {name:?} must have a `plural` value of {name:?}, not {plural:?}")]
    GroupPluralMismatch {
        /// The key.
        name: String,
        /// The stored plural.
        plural: String,
    },

    /// A group `singular` that does not match the name syntax.
    #[error("Invalid Group 'singular' value {singular:?} - must match {pattern:?}")]
    InvalidGroupSingular {
        /// The offending singular.
        singular: String,
        /// The property-name regex.
        pattern: &'static str,
    },

    /// A resource key that does not match the name syntax.
    #[error("Invalid Resource name/key {name:?} - must match {pattern:?}")]
    InvalidResourceKey {
        /// The offending key.
        name: String,
        /// The property-name regex.
        pattern: &'static str,
    },

    /// A resource with an empty `plural`.
    #[error("Resource {name:?} is missing a \"name\" value")]
    ResourceMissingName {
        /// The key the resource is stored under.
        name: String,
    },

    /// A resource whose `plural` disagrees with its key.
    #[error("Resource {name:?} must have a 'plural' value of {name:?}, not {plural:?}")]
    ResourcePluralMismatch {
        /// The key.
        name: String,
        /// The stored plural.
        plural: String,
    },

    /// A resource with a negative `versions`.
    #[error("Resource {name:?} must have a 'versions' value >= 0")]
    ResourceNegativeVersions {
        /// The key the resource is stored under.
        name: String,
    },

    /// Adding a group kind with no plural name.
    #[error("Can't add a GroupModel with an empty plural name")]
    GroupEmptyPlural,

    /// Adding a group kind with no singular name.
    #[error("Can't add a GroupModel with an empty singular name")]
    GroupEmptySingular,

    /// Adding a resource kind with no plural name.
    #[error("Can't add a ResourceModel with an empty plural name")]
    ResourceEmptyPlural,

    /// Adding a resource kind with no singular name.
    #[error("Can't add a ResourceModel with an empty singular name")]
    ResourceEmptySingular,

    /// Adding a group kind whose plural fails the name syntax.
    #[error("GroupModel plural name is not valid")]
    InvalidGroupPluralName,

    /// Adding a group kind whose singular fails the name syntax.
    #[error("GroupModel singular name is not valid")]
    InvalidGroupSingularName,

    /// Adding a resource kind whose plural fails the name syntax.
    #[error("ResourceModel plural name is not valid")]
    InvalidResourcePluralName,

    /// Adding a resource kind whose singular fails the name syntax.
    #[error("ResourceModel singular name is not valid")]
    InvalidResourceSingularName,

    /// Adding a group kind whose plural is already taken.
    #[error("GroupModel plural {plural:?} already exists")]
    GroupPluralExists {
        /// The taken plural.
        plural: String,
    },

    /// Adding a group kind whose singular is already taken.
    #[error("GroupModel singular {singular:?} already exists")]
    GroupSingularExists {
        /// The taken singular.
        singular: String,
    },

    /// Adding a resource kind whose plural is already taken in its group.
    #[error("Resource model plural {plural:?} already exists for group {group:?}")]
    ResourcePluralExists {
        /// The taken plural.
        plural: String,
        /// The owning group.
        group: String,
    },

    /// Adding a resource kind whose singular is already taken in its group.
    #[error("Resource model singular {singular:?} already exists for group {group:?}")]
    ResourceSingularExists {
        /// The taken singular.
        singular: String,
        /// The owning group.
        group: String,
    },

    /// Adding a resource kind with a negative `versions`.
    #[error("'versions'({versions}) must be >= 0")]
    NegativeVersions {
        /// The offending value.
        versions: i64,
    },

    /// An attribute name that fails the name syntax.
    #[error("Invalid attribute name: {name}")]
    InvalidAttributeName {
        /// The offending name.
        name: String,
    },

    /// A group kind addressed by an unknown plural.
    #[error("Unknown Group type: {name}")]
    UnknownGroup {
        /// The unknown plural.
        name: String,
    },

    /// A resource kind addressed by an unknown plural.
    #[error("Unknown Resource type: {name}")]
    UnknownResource {
        /// The unknown plural.
        name: String,
    },

    /// A malformed user-supplied property path.
    #[error("Unexpected {ch} in {path:?} at pos {pos}")]
    PathParse {
        /// The offending character.
        ch: char,
        /// The full path as supplied.
        path: String,
        /// 1-based position of the offending character.
        pos: usize,
    },

    /// A `specversion` value other than the one this build understands.
    #[error("Invalid \"specversion\": {value}, must be {expected}")]
    InvalidSpecVersion {
        /// The offending value.
        value: String,
        /// The supported version.
        expected: &'static str,
    },

    /// An `epoch` value that is not an unsigned integer.
    #[error("Invalid \"epoch\" value: {value}")]
    InvalidEpoch {
        /// The offending value.
        value: String,
    },

    /// The registry row backing a model is gone.
    #[error("Can't find registry: {uid}")]
    RegistryNotFound {
        /// The registry UID.
        uid: String,
    },

    /// A storage operation failed; the context names the affected entity.
    #[error("Error {context}: {error}")]
    Storage {
        /// What was being done, e.g. `inserting schema(...)`.
        context: String,
        /// The storage-level error.
        error: xregistry_store::Error,
    },

    /// (De)serialization of a persisted attribute collection failed.
    #[error("JSON error: {error}")]
    Json {
        /// The underlying serde error, rendered.
        error: String,
    },
}

impl Error {
    /// Wraps a storage error with the name of the affected entity and logs
    /// it, the way every persistence call site does.
    pub(crate) fn storage(context: String, error: xregistry_store::Error) -> Self {
        let err = Error::Storage { context, error };
        log::error!("{err}");
        err
    }

    pub(crate) fn json(error: &serde_json::Error) -> Self {
        Error::Json {
            error: error.to_string(),
        }
    }
}
