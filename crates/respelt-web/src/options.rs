#![forbid(unsafe_code)]

//! `responsiveElt` options object.
//!
//! The JS object is serialized with `JSON.stringify` and parsed here, so the
//! mapping onto [`ChainConfig`] is testable without a browser.

use std::fmt;

use respelt_core::{ChainConfig, ResponsiveError};
use serde::Deserialize;

/// The options value could not be read as [`ChainOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionsError {
    NotAnObject,
    /// Parser message, naming the offending value and the expected type.
    Malformed(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "invalid responsiveElt options: expected a plain object"),
            Self::Malformed(msg) => write!(f, "invalid responsiveElt options: {msg}"),
        }
    }
}

impl std::error::Error for OptionsError {}

/// `claimAttribute`: a name, `true` for the default, `false` to disable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ClaimOption {
    Enabled(bool),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ChainOptions {
    pub claim_attribute: Option<ClaimOption>,
    pub max_generations: Option<u64>,
    pub size_epsilon: Option<f64>,
    pub transition_log_capacity: Option<usize>,
    /// Log every substitution with `console.debug`.
    pub debug: bool,
}

impl ChainOptions {
    pub(crate) fn from_json(json: &str) -> Result<Self, OptionsError> {
        serde_json::from_str(json).map_err(|err| OptionsError::Malformed(err.to_string()))
    }

    pub(crate) fn to_config(&self) -> Result<ChainConfig, ResponsiveError> {
        let mut config = ChainConfig::default();
        match &self.claim_attribute {
            Some(ClaimOption::Enabled(false)) => config = config.without_claim(),
            Some(ClaimOption::Name(name)) => config = config.with_claim_attribute(name.clone()),
            Some(ClaimOption::Enabled(true)) | None => {}
        }
        if let Some(limit) = self.max_generations {
            config = config.with_max_generations(limit);
        }
        if let Some(epsilon) = self.size_epsilon {
            config = config.with_size_epsilon(epsilon);
        }
        if let Some(capacity) = self.transition_log_capacity {
            config = config.with_transition_log_capacity(capacity);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use respelt_core::config::DEFAULT_CLAIM_ATTRIBUTE;

    #[test]
    fn empty_object_gives_default_config() {
        let options = ChainOptions::from_json("{}").expect("empty object");
        assert_eq!(options, ChainOptions::default());
        assert_eq!(options.to_config(), Ok(ChainConfig::default()));
    }

    #[test]
    fn camel_case_fields_map_onto_config() {
        let options = ChainOptions::from_json(
            r#"{"claimAttribute":"data-owner","maxGenerations":3,"sizeEpsilon":0.5,"transitionLogCapacity":8,"debug":true}"#,
        )
        .expect("valid options");
        assert!(options.debug);

        let config = options.to_config().expect("valid config");
        assert_eq!(config.claim_attribute.as_deref(), Some("data-owner"));
        assert_eq!(config.max_generations, Some(3));
        assert_eq!(config.size_epsilon, 0.5);
        assert_eq!(config.transition_log_capacity, 8);
    }

    #[test]
    fn claim_attribute_false_disables_claim() {
        let options = ChainOptions::from_json(r#"{"claimAttribute":false}"#).expect("bool");
        assert_eq!(options.to_config().map(|c| c.claim_attribute), Ok(None));

        let options = ChainOptions::from_json(r#"{"claimAttribute":true}"#).expect("bool");
        assert_eq!(
            options.to_config().map(|c| c.claim_attribute),
            Ok(Some(DEFAULT_CLAIM_ATTRIBUTE.to_owned()))
        );
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        // JSON.stringify turns NaN into null.
        let options =
            ChainOptions::from_json(r#"{"sizeEpsilon":null,"maxGenerations":null}"#).expect("nulls");
        assert_eq!(options.to_config(), Ok(ChainConfig::default()));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let options = ChainOptions::from_json(r#"{"sizeEpsilon":-1}"#).expect("parses");
        assert!(matches!(
            options.to_config(),
            Err(ResponsiveError::InvalidConfig(_))
        ));

        let options = ChainOptions::from_json(r#"{"maxGenerations":0}"#).expect("parses");
        assert!(options.to_config().is_err());

        let options =
            ChainOptions::from_json(r#"{"claimAttribute":"data respelt"}"#).expect("parses");
        assert!(matches!(
            options.to_config(),
            Err(ResponsiveError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_options_are_rejected() {
        assert!(matches!(
            ChainOptions::from_json(r#""text""#),
            Err(OptionsError::Malformed(_))
        ));
    }

    #[test]
    fn type_errors_keep_the_parser_message() {
        let err = ChainOptions::from_json(r#"{"maxGenerations":1.5}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("invalid responsiveElt options: "), "{message}");
        assert!(message.contains("1.5"), "{message}");
        assert!(message.contains("u64"), "{message}");

        let message = ChainOptions::from_json(r#"{"maxGenerations":-1}"#)
            .unwrap_err()
            .to_string();
        assert!(message.contains("-1"), "{message}");
        assert!(message.contains("u64"), "{message}");
    }

    #[test]
    fn non_objects_name_the_expected_shape() {
        assert_eq!(
            OptionsError::NotAnObject.to_string(),
            "invalid responsiveElt options: expected a plain object"
        );
    }
}
