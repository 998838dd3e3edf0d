#![forbid(unsafe_code)]

use core::fmt;

use crate::dom::DomError;

/// Errors raised by responsive element adapters and chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsiveError {
    /// The element factory cannot be called.
    NotInvocable,
    /// The replacement target is not an element.
    NotAnElement,
    /// The replacement target is not contained in the document.
    NotInDocument,
    /// The element factory returned something other than an element.
    CreatedNotAnElement,
    /// The element factory itself failed.
    Factory(String),
    /// The target is already owned by another chain (claim value attached).
    AlreadyClaimed { by: String },
    /// `start` was called on a chain that already left `Idle`.
    AlreadyStarted,
    /// A configuration value is out of range.
    InvalidConfig(&'static str),
    /// A host operation failed.
    Dom(DomError),
}

impl ResponsiveError {
    /// Whether this is one of the synchronous argument checks.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::NotInvocable | Self::NotAnElement | Self::NotInDocument | Self::CreatedNotAnElement
        )
    }
}

impl fmt::Display for ResponsiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInvocable => write!(f, "Provided argument is not a function!"),
            Self::NotAnElement => write!(f, "Provided element is not an Element!"),
            Self::NotInDocument => write!(f, "Provided element is not contained in document!"),
            Self::CreatedNotAnElement => {
                write!(f, "Return value of provided function is not an Element!")
            }
            Self::Factory(msg) => write!(f, "element factory failed: {msg}"),
            Self::AlreadyClaimed { by } => {
                write!(f, "element is already driven by responsive chain {by}")
            }
            Self::AlreadyStarted => write!(f, "responsive chain was already started"),
            Self::InvalidConfig(msg) => write!(f, "invalid chain config: {msg}"),
            Self::Dom(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ResponsiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for ResponsiveError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_are_classified() {
        assert!(ResponsiveError::NotInvocable.is_invalid_argument());
        assert!(ResponsiveError::NotInDocument.is_invalid_argument());
        assert!(ResponsiveError::CreatedNotAnElement.is_invalid_argument());
        assert!(!ResponsiveError::Factory("boom".to_owned()).is_invalid_argument());
        assert!(!ResponsiveError::Dom(DomError::Detached).is_invalid_argument());
    }

    #[test]
    fn dom_errors_keep_their_source() {
        use std::error::Error as _;
        let err = ResponsiveError::from(DomError::NotAnElement);
        assert_eq!(err.to_string(), "node is not an element");
        assert!(err.source().is_some());
    }
}
