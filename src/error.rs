//! Error types for schema compilation, XML transformation, and the XML tree
//! layer.
//!
//! Modeled on the manual, non-`thiserror` error-enum style used throughout
//! `xso`/`minidom`: a single flat enum, hand-written `Display` and
//! [`std::error::Error`] impls, and `From` conversions at the natural
//! boundaries.

use std::fmt;

use crate::qname::Qname;

/// Error variants produced while compiling a schema or transforming XML
/// data to or from a [`crate::Value`].
#[derive(Debug)]
pub enum Error {
    /// An attribute was present on the input element but not declared by
    /// the schema, and `ignore_unexpected` was off.
    UnexpectedAttribute(Qname),

    /// A mandatory attribute (no default) was absent from the input.
    MissingAttribute(Qname),

    /// A child element was present on the input but not declared by the
    /// schema, and `ignore_unexpected` was off.
    UnexpectedElement(Qname),

    /// A non-repeating child appeared twice, or two distinct input elements
    /// resolved to the same `result_name`.
    DuplicateElement { qname: Qname, result_name: String },

    /// A mandatory child was absent, or a mandatory repeating child
    /// produced an empty list.
    MissingElement { qname: Qname, result_name: String },

    /// The document root's qname did not match the compiled schema's root
    /// qname.
    IncorrectRoot { expected: Qname, found: Qname },

    /// A scalar coder rejected the text it was given.
    BadScalar {
        qname: Qname,
        text: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A structural problem in the example schema itself: mixed content,
    /// more than one declared root, an unknown `xsbe:type` value, and
    /// similar.
    SchemaError(String),

    /// At encode time, the caller-supplied [`crate::Value`] had the wrong
    /// shape for the schema position it was placed in (e.g. a list expected
    /// but a scalar given).
    TypeError { qname: Qname, message: String },

    /// Underlying XML tokenizer or I/O failure.
    Xml(rxml::Error),
}

impl Error {
    pub fn bad_scalar<E: std::error::Error + Send + Sync + 'static>(
        qname: Qname,
        text: impl Into<String>,
        source: E,
    ) -> Self {
        Error::BadScalar {
            qname,
            text: text.into(),
            source: Box::new(source),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedAttribute(q) => write!(f, "unexpected attribute: {}", q),
            Error::MissingAttribute(q) => write!(f, "missing required attribute: {}", q),
            Error::UnexpectedElement(q) => write!(f, "unexpected element: {}", q),
            Error::DuplicateElement { qname, result_name } => write!(
                f,
                "duplicate element {} (result name {:?})",
                qname, result_name
            ),
            Error::MissingElement { qname, result_name } => write!(
                f,
                "missing required element {} (result name {:?})",
                qname, result_name
            ),
            Error::IncorrectRoot { expected, found } => write!(
                f,
                "incorrect document root: expected {}, found {}",
                expected, found
            ),
            Error::BadScalar { qname, text, source } => {
                write!(f, "bad scalar value {:?} at {}: {}", text, qname, source)
            }
            Error::SchemaError(msg) => write!(f, "invalid schema: {}", msg),
            Error::TypeError { qname, message } => {
                write!(f, "type error at {}: {}", qname, message)
            }
            Error::Xml(e) => write!(f, "xml error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BadScalar { source, .. } => Some(&**source),
            Error::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rxml::Error> for Error {
    fn from(other: rxml::Error) -> Self {
        Error::Xml(other)
    }
}

/// Whether an error of a kind that `ignore_unexpected` governs should be
/// reported (see SPEC_FULL.md §7 and §4.9).
pub fn should_report(ignore_unexpected: bool, err: &Error) -> bool {
    if !ignore_unexpected {
        return true;
    }
    !matches!(err, Error::UnexpectedAttribute(_) | Error::UnexpectedElement(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_unexpected_silences_only_its_two_kinds() {
        let unexpected_attr = Error::UnexpectedAttribute(Qname::local("x"));
        let unexpected_elem = Error::UnexpectedElement(Qname::local("x"));
        let missing = Error::MissingAttribute(Qname::local("x"));
        assert!(!should_report(true, &unexpected_attr));
        assert!(!should_report(true, &unexpected_elem));
        assert!(should_report(true, &missing));
        assert!(should_report(false, &unexpected_attr));
    }
}
