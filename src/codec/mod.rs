//! ConfigCodec: `Load(doc) -> Model | ConfigError`,
//! `Dump(model, version?) -> doc | InvalidModelError`.
//!
//! Dispatches by the document's `version` key to a registered loader.

pub mod schema;
pub mod versions;

use crate::error::{ConfigError, InvalidModelError};
use crate::model::Organization;
use crate::validator;
use crate::value_objects::OrderedMap;

/// One operation per loader implementation —
/// today only the default schema is registered, but additional schema
/// versions plug in by adding another `VersionLoader` entry.
struct VersionLoader {
    /// The canonical version string this entry answers to.
    version: &'static str,
    load: fn(&OrderedMap) -> Result<Organization, ConfigError>,
    dump: fn(&Organization) -> OrderedMap,
}

const LOADERS: &[VersionLoader] = &[VersionLoader {
    version: versions::default::VERSION,
    load: versions::default::load,
    dump: versions::default::dump,
}];

fn resolve(requested: Option<&str>) -> &'static VersionLoader {
    let requested = requested.unwrap_or("default");
    if requested != "default" && requested != LOADERS[0].version {
        tracing::warn!(
            requested_version = requested,
            "unknown config schema version, falling back to default"
        );
    }
    &LOADERS[0]
}

/// Loads a declared [`Organization`] from an already-parsed YAML document.
/// The engine never reads the file itself — that I/O is the
/// CLI's responsibility.
pub fn load(doc: &OrderedMap) -> Result<Organization, ConfigError> {
    let requested_version = doc.get("version").and_then(|v| v.as_str());
    let loader = resolve(requested_version);
    (loader.load)(doc)
}

/// Dumps `model` back to an ordered document. Fails with
/// [`InvalidModelError`] if the model does not validate.
pub fn dump(model: &Organization, version: Option<&str>) -> Result<OrderedMap, InvalidModelError> {
    let mut model = model.clone();
    let problems = validator::validate(&mut model);
    if !problems.is_empty() {
        return Err(InvalidModelError { problems });
    }
    let loader = resolve(version);
    Ok((loader.dump)(&model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn parse(yaml: &str) -> OrderedMap {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn round_trip_valid_model() {
        let yaml = r#"
root: "123456789012"
featureset: ALL
accounts:
  - name: account_a
    owner_email: a@example.com
orgunits:
  - name: team-a
    accounts: [account_a]
"#;
        let doc = parse(yaml);
        let org = load(&doc).unwrap();
        assert!(validator::validate(&mut org.clone()).is_empty());

        let dumped = dump(&org, None).unwrap();
        let reloaded = load(&dumped).unwrap();
        let redumped = dump(&reloaded, None).unwrap();
        assert_eq!(dumped, redumped);
    }

    #[test]
    fn policy_with_both_location_and_content_is_rejected() {
        let yaml = r#"
root: "123456789012"
policies:
  - name: deny-all
    description: test
    document:
      location: s3://bucket/policy.json
      content: {}
"#;
        let doc = parse(yaml);
        let err = load(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::MultipleParametersSpecified { .. }));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let mut doc = OrderedMap::new();
        doc.insert("root".into(), Value::from("123456789012"));
        doc.insert("bogus".into(), Value::from("x"));
        let err = load(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::UnrecognisedKey(_)));
    }

    #[test]
    fn dump_of_invalid_model_is_rejected() {
        let mut org = Organization::declared("123456789012");
        org.accounts.insert(
            "orphan".into(),
            crate::model::Account::new("orphan", "o@example.com"),
        );
        let err = dump(&org, None).unwrap_err();
        assert!(!err.problems.is_empty());
    }
}
