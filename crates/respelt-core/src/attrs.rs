#![forbid(unsafe_code)]

//! Attribute copying between elements.

use serde::Serialize;

use crate::dom::{Dom, DomError};

/// One attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Whether `name` is an XML `Name`, the rule `setAttribute` enforces.
///
/// Non-ASCII characters are accepted wholesale; the ASCII subset follows the
/// production exactly.
#[must_use]
pub fn is_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start = |c: char| c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii();
    start(first)
        && chars.all(|c| start(c) || c.is_ascii_digit() || c == '-' || c == '.')
        && !name.chars().any(char::is_whitespace)
}

/// Copy every attribute of `source` onto `destination`, in stored order.
///
/// Same-named attributes on `destination` are overwritten; attributes that
/// `source` does not carry are left alone. Nothing is removed.
pub fn clone_attrs<D: Dom>(
    dom: &mut D,
    source: &D::Node,
    destination: &D::Node,
) -> Result<(), DomError> {
    for Attribute { name, value } in dom.attributes(source)? {
        dom.set_attribute(destination, &name, &value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_follow_the_xml_name_rule() {
        for name in ["id", "data-respelt-chain", "_x", "xml:lang", "a.b", "\u{e9}t\u{e9}"] {
            assert!(is_attribute_name(name), "{name}");
        }
        for name in ["", "data respelt", "1st", "-x", ".x", "a=b", "a\u{a0}b", "\"q\""] {
            assert!(!is_attribute_name(name), "{name}");
        }
    }
}
