#![forbid(unsafe_code)]

use crate::attrs::is_attribute_name;
use crate::error::ResponsiveError;

/// Attribute a chain writes on its current element unless configured otherwise.
pub const DEFAULT_CLAIM_ATTRIBUTE: &str = "data-respelt-chain";

/// Default bound on retained [`crate::chain::ChainTransition`] records.
pub const DEFAULT_TRANSITION_LOG_CAPACITY: usize = 512;

/// Policy knobs for responsive chains.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Attribute used to mark an element as owned by a chain. `None` turns the
    /// double-start check off.
    pub claim_attribute: Option<String>,
    /// Stop the chain instead of performing replacement number
    /// `max_generations + 1`. `None` means unbounded.
    pub max_generations: Option<u64>,
    /// A resize only retriggers when an axis moves by more than this many
    /// pixels. `0.0` compares exactly.
    pub size_epsilon: f64,
    /// Number of transition records kept before the oldest is dropped.
    pub transition_log_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            claim_attribute: Some(DEFAULT_CLAIM_ATTRIBUTE.to_owned()),
            max_generations: None,
            size_epsilon: 0.0,
            transition_log_capacity: DEFAULT_TRANSITION_LOG_CAPACITY,
        }
    }
}

impl ChainConfig {
    #[must_use]
    pub fn with_claim_attribute(mut self, name: impl Into<String>) -> Self {
        self.claim_attribute = Some(name.into());
        self
    }

    #[must_use]
    pub fn without_claim(mut self) -> Self {
        self.claim_attribute = None;
        self
    }

    #[must_use]
    pub fn with_max_generations(mut self, limit: u64) -> Self {
        self.max_generations = Some(limit);
        self
    }

    #[must_use]
    pub fn with_size_epsilon(mut self, epsilon: f64) -> Self {
        self.size_epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn with_transition_log_capacity(mut self, capacity: usize) -> Self {
        self.transition_log_capacity = capacity;
        self
    }

    /// Reject values a chain cannot run with.
    pub fn validate(&self) -> Result<(), ResponsiveError> {
        if !self.size_epsilon.is_finite() || self.size_epsilon < 0.0 {
            return Err(ResponsiveError::InvalidConfig(
                "size_epsilon must be finite and non-negative",
            ));
        }
        if self.max_generations == Some(0) {
            return Err(ResponsiveError::InvalidConfig(
                "max_generations must allow at least one replacement",
            ));
        }
        if self
            .claim_attribute
            .as_deref()
            .is_some_and(|name| !is_attribute_name(name))
        {
            return Err(ResponsiveError::InvalidConfig(
                "claim_attribute must be a valid attribute name",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_unbounded() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_generations, None);
        assert_eq!(config.claim_attribute.as_deref(), Some(DEFAULT_CLAIM_ATTRIBUTE));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(
            ChainConfig::default()
                .with_size_epsilon(-1.0)
                .validate()
                .is_err()
        );
        assert!(
            ChainConfig::default()
                .with_size_epsilon(f64::NAN)
                .validate()
                .is_err()
        );
        assert!(
            ChainConfig::default()
                .with_max_generations(0)
                .validate()
                .is_err()
        );
        assert!(
            ChainConfig::default()
                .with_claim_attribute(" ")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn rejects_claim_names_the_host_would_refuse() {
        for name in ["data respelt", "9lives", "data-respelt=1", ""] {
            assert_eq!(
                ChainConfig::default().with_claim_attribute(name).validate(),
                Err(ResponsiveError::InvalidConfig(
                    "claim_attribute must be a valid attribute name"
                )),
                "{name}"
            );
        }
        assert!(
            ChainConfig::default()
                .with_claim_attribute("data-owner")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn claim_can_be_disabled() {
        let config = ChainConfig::default().without_claim();
        assert_eq!(config.claim_attribute, None);
        assert!(config.validate().is_ok());
    }
}
