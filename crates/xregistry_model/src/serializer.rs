// SPDX-License-Identifier: Apache-2.0

//! Pluggable model serializers, keyed by `family/version` format names.
//!
//! The native serializer — pretty-printed JSON of the user-facing model —
//! registers itself under the canonical format at first use.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::model::Model;
use crate::{canonical_schema, Error};

/// Serializes a model into a named output format.
pub type ModelSerializer = fn(&Model, &str) -> Result<Vec<u8>, Error>;

static MODEL_SERIALIZERS: Lazy<RwLock<HashMap<String, ModelSerializer>>> = Lazy::new(|| {
    let mut map: HashMap<String, ModelSerializer> = HashMap::new();
    let _ = map.insert(canonical_schema(), model_to_xregistry_json as ModelSerializer);
    RwLock::new(map)
});

/// The native serializer: two-space-indented JSON of the model through the
/// user-facing serialization (the `model` sentinel attribute suppressed).
pub fn model_to_xregistry_json(model: &Model, _format: &str) -> Result<Vec<u8>, Error> {
    serde_json::to_vec_pretty(model).map_err(|e| Error::json(&e))
}

/// Registers a serializer under a `family/version` name, replacing any
/// previous entry. Expected to happen during process initialization.
pub fn register_model_serializer(name: &str, serializer: ModelSerializer) {
    let mut map = MODEL_SERIALIZERS
        .write()
        .expect("serializer registry poisoned");
    let _ = map.insert(name.to_owned(), serializer);
}

/// Looks up a serializer for a format query.
///
/// The query splits on `/` into family and version; families compare
/// case-insensitively. With a version, only the exact entry matches. With
/// no version, the entry with the lexicographically greatest version among
/// the family's registrations wins.
#[must_use]
pub fn get_model_serializer(format: &str) -> Option<ModelSerializer> {
    let format = format.to_lowercase();
    let (family, version) = match format.split_once('/') {
        Some((f, v)) => (f, v),
        None => (format.as_str(), ""),
    };
    if family.is_empty() {
        return None;
    }

    let map = MODEL_SERIALIZERS
        .read()
        .expect("serializer registry poisoned");

    let mut result: Option<ModelSerializer> = None;
    let mut result_version = String::new();

    for (name, serializer) in map.iter() {
        let name = name.to_lowercase();
        let (entry_family, entry_version) = match name.split_once('/') {
            Some((f, v)) => (f.to_owned(), v.to_owned()),
            None => (name, String::new()),
        };
        if entry_family != family {
            continue;
        }

        if !version.is_empty() {
            if entry_version == version {
                // exact match wins immediately
                return Some(*serializer);
            }
            continue;
        }

        if result.is_none() || entry_version > result_version {
            result = Some(*serializer);
            result_version = entry_version;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SPEC_VERSION, XREG_SCHEMA};

    fn serializer_v06(_m: &Model, _f: &str) -> Result<Vec<u8>, Error> {
        Ok(b"v0.6".to_vec())
    }

    fn run(serializer: ModelSerializer) -> Vec<u8> {
        serializer(&Model::new(), "").expect("serializer runs")
    }

    #[test]
    fn test_version_selection_rule() {
        // the native serializer holds xRegistry-json/0.5; add a 0.6
        register_model_serializer("xRegistry-json/0.6", serializer_v06);

        // no version -> greatest registered version of the family
        let best = get_model_serializer("xRegistry-json").expect("family registered");
        assert_eq!(run(best), b"v0.6");

        // explicit version -> exactly that one (the native serializer,
        // which renders an empty model as an empty object)
        let exact = get_model_serializer("xRegistry-json/0.5").expect("0.5 registered");
        assert_eq!(run(exact), b"{}");

        // family matches case-insensitively
        let ci = get_model_serializer("XREGISTRY-JSON/0.6").expect("case-insensitive");
        assert_eq!(run(ci), b"v0.6");

        // unknown family or version -> none
        assert!(get_model_serializer("unknown").is_none());
        assert!(get_model_serializer("xRegistry-json/9.9").is_none());
        assert!(get_model_serializer("").is_none());
    }

    #[test]
    fn test_native_serializer_is_registered() {
        let native = get_model_serializer(&format!("{XREG_SCHEMA}/{SPEC_VERSION}"))
            .expect("native serializer registered at init");
        let out = native(&Model::new(), "").expect("serialize");
        assert_eq!(out, b"{}");
    }

    #[test]
    fn test_native_output_is_pretty_json() {
        let mut model = Model::new();
        model.verify().expect("verify");
        let out = model_to_xregistry_json(&model, "").expect("serialize");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("{\n  \"schemas\""));
    }
}
