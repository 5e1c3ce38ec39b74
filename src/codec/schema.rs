//! Parameter-schema validation: a list of
//! `{name, type, optional?, default?}` checked against a parsed YAML
//! mapping, grounded on
//! `examples/original_source/cumulogenesis/loaders/config_loaders/default_config_loader.py`'s
//! `_validate_each_parameter` / `_validate_one_of_parameters`.

use serde_yaml::Value;

use crate::error::ConfigError;
use crate::value_objects::OrderedMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Bool,
    Mapping,
    List,
    /// A provider identifier: accepted as either a YAML string or a bare
    /// number (declared `root: 123456789` is common).
    Id,
}

impl ParamType {
    fn name(self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::Bool => "bool",
            ParamType::Mapping => "mapping",
            ParamType::List => "list",
            ParamType::Id => "string-or-number",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::Str => value.is_string(),
            ParamType::Bool => value.is_bool(),
            ParamType::Mapping => value.is_mapping(),
            ParamType::List => value.is_sequence(),
            ParamType::Id => value.is_string() || value.is_number(),
        }
    }
}

/// Renders a string or a bare-number YAML scalar as a `String`
/// (`ParamType::Id`).
pub fn as_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => panic!("caller validated type"),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub optional: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            optional: true,
        }
    }
}

/// Checks every parameter in `params` against `config`, raising
/// `MissingRequiredParameter` / `ParameterTypeMismatch` as appropriate.
pub fn validate_each_parameter(
    category: &str,
    name: &str,
    config: &OrderedMap,
    params: &[ParamSpec],
) -> Result<(), ConfigError> {
    for param in params {
        match config.get(param.name) {
            None if !param.optional => {
                return Err(ConfigError::MissingRequiredParameter {
                    category: category.to_string(),
                    name: name.to_string(),
                    parameter: param.name.to_string(),
                })
            }
            None => {}
            Some(value) if !param.param_type.matches(value) => {
                return Err(ConfigError::ParameterTypeMismatch {
                    category: category.to_string(),
                    name: name.to_string(),
                    parameter: param.name.to_string(),
                    expected: param.param_type.name().to_string(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Checks that exactly one of `params` is present in `config`, returning
/// its name.
pub fn validate_one_of(
    category: &str,
    name: &str,
    config: &OrderedMap,
    params: &[ParamSpec],
) -> Result<&'static str, ConfigError> {
    let found: Vec<&ParamSpec> = params.iter().filter(|p| config.contains_key(p.name)).collect();

    match found.len() {
        0 => Err(ConfigError::OneOfMissing {
            category: category.to_string(),
            name: name.to_string(),
            parameters: params.iter().map(|p| p.name.to_string()).collect(),
        }),
        1 => {
            let chosen = found[0];
            let value = &config[chosen.name];
            if !chosen.param_type.matches(value) {
                return Err(ConfigError::ParameterTypeMismatch {
                    category: category.to_string(),
                    name: name.to_string(),
                    parameter: chosen.name.to_string(),
                    expected: chosen.param_type.name().to_string(),
                });
            }
            Ok(chosen.name)
        }
        _ => Err(ConfigError::MultipleParametersSpecified {
            category: category.to_string(),
            name: name.to_string(),
            parameters: found.iter().map(|p| p.name.to_string()).collect(),
        }),
    }
}

/// Builds the `name -> entity` map for a list of entity configs, raising
/// `DuplicateNames` on a repeated `name` key at this nesting level.
pub fn duplicate_check(category: &str, names: &[String]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateNames {
                category: category.to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

pub fn as_str<'a>(value: &'a Value) -> &'a str {
    value.as_str().expect("caller validated type")
}

pub fn as_bool(value: &Value) -> bool {
    value.as_bool().expect("caller validated type")
}

pub fn as_mapping(value: &Value) -> OrderedMap {
    let mapping = value.as_mapping().expect("caller validated type");
    let mut out = OrderedMap::new();
    for (k, v) in mapping {
        if let Some(key) = k.as_str() {
            out.insert(key.to_string(), v.clone());
        }
    }
    out
}

pub fn as_list<'a>(value: &'a Value) -> &'a [Value] {
    value.as_sequence().expect("caller validated type")
}

pub fn as_string_list(value: &Value) -> Vec<String> {
    as_list(value)
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Value)]) -> OrderedMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn missing_required_parameter() {
        let config = mapping(&[]);
        let params = [ParamSpec::required("name", ParamType::Str)];
        let err = validate_each_parameter("accounts", "x", &config, &params).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequiredParameter { .. }));
    }

    #[test]
    fn wrong_type() {
        let config = mapping(&[("name", Value::from(5))]);
        let params = [ParamSpec::required("name", ParamType::Str)];
        let err = validate_each_parameter("accounts", "x", &config, &params).unwrap_err();
        assert!(matches!(err, ConfigError::ParameterTypeMismatch { .. }));
    }

    #[test]
    fn one_of_exactly_one() {
        let config = mapping(&[("location", Value::from("s3://x"))]);
        let params = [
            ParamSpec::required("location", ParamType::Str),
            ParamSpec::required("content", ParamType::Mapping),
        ];
        assert_eq!(
            validate_one_of("policies", "p", &config, &params).unwrap(),
            "location"
        );
    }

    #[test]
    fn one_of_both_present_is_an_error() {
        let config = mapping(&[
            ("location", Value::from("s3://x")),
            ("content", Value::from(serde_yaml::Mapping::new())),
        ]);
        let params = [
            ParamSpec::required("location", ParamType::Str),
            ParamSpec::required("content", ParamType::Mapping),
        ];
        let err = validate_one_of("policies", "p", &config, &params).unwrap_err();
        assert!(matches!(err, ConfigError::MultipleParametersSpecified { .. }));
    }

    #[test]
    fn one_of_neither_present_is_an_error() {
        let config = mapping(&[]);
        let params = [
            ParamSpec::required("location", ParamType::Str),
            ParamSpec::required("content", ParamType::Mapping),
        ];
        let err = validate_one_of("policies", "p", &config, &params).unwrap_err();
        assert!(matches!(err, ConfigError::OneOfMissing { .. }));
    }
}
