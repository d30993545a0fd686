//! Logic for loading configuration in to an object model
use displaydoc::Display;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// Schema derivation options.
///
/// Can be created through `serde::Deserialize` from various formats, or loaded from YAML with
/// [`Configuration::from_yaml`].
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Packages scanned for annotated classes and operations. Empty scans every class.
    pub packages: Vec<String>,

    /// Suffix of the object type emitted for a concrete entity that other entities extend.
    pub direct_suffix: String,

    /// Suffix of input types derived from entities that are both inputs and outputs.
    pub input_suffix: String,

    /// Class of the global request context object, injectable into resolvers by type.
    pub global_context: Option<String>,

    /// Validate the assembled schema before handing it out.
    pub validate: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            direct_suffix: "_DIRECT".to_string(),
            input_suffix: "Input".to_string(),
            global_context: None,
            validate: true,
        }
    }
}

impl Configuration {
    pub fn from_yaml(raw_yaml: &str) -> Result<Self, ConfigurationError> {
        if raw_yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw_yaml).map_err(|e| ConfigurationError::InvalidConfiguration {
            message: "failed to parse configuration",
            error: e.to_string(),
        })
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = true;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    settings.into_generator().into_root_schema_for::<Configuration>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_default() {
        let configuration = Configuration::from_yaml("  \n").unwrap();
        assert_eq!(configuration.direct_suffix, "_DIRECT");
        assert_eq!(configuration.input_suffix, "Input");
        assert!(configuration.validate);
    }

    #[test]
    fn yaml_overrides() {
        let configuration = Configuration::from_yaml(
            r#"
packages:
  - app.users
  - app.billing
global_context: RequestContext
validate: false
"#,
        )
        .unwrap();
        assert_eq!(configuration.packages, vec!["app.users", "app.billing"]);
        assert_eq!(configuration.global_context.as_deref(), Some("RequestContext"));
        assert!(!configuration.validate);
        assert_eq!(configuration.input_suffix, "Input");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Configuration::from_yaml("packagez: []").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse configuration"));
    }

    #[test]
    fn schema_lists_every_option() {
        let schema = serde_json::to_value(generate_config_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        let mut names: Vec<_> = properties.keys().cloned().collect();
        names.sort();
        insta::assert_snapshot!(names.join(","), @"direct_suffix,global_context,input_suffix,packages,validate");
    }
}
