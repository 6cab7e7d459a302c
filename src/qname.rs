//! Qualified XML names: an optional namespace URI paired with a local name.

use std::fmt;

/// The reserved namespace carrying schema-by-example metadata attributes
/// and elements.
pub const XSBE_NS: &str = "http://xsbe.couling.uk";

/// The `xsi` namespace; attributes in this namespace are stripped on parse.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// A qualified name: `(namespace?, local)`. Equality is structural on both
/// components, matching the data model's definition of a qname.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qname {
    pub namespace: Option<String>,
    pub local: String,
}

impl Qname {
    pub fn new(namespace: Option<impl Into<String>>, local: impl Into<String>) -> Self {
        Qname {
            namespace: namespace.map(Into::into),
            local: local.into(),
        }
    }

    /// Build a qname with no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Qname {
            namespace: None,
            local: local.into(),
        }
    }

    /// Build a qname in the reserved XSBE namespace.
    pub fn xsbe(local: impl Into<String>) -> Self {
        Qname {
            namespace: Some(XSBE_NS.to_string()),
            local: local.into(),
        }
    }

    pub fn is_xsbe(&self) -> bool {
        self.namespace.as_deref() == Some(XSBE_NS)
    }

    pub fn is_xsi(&self) -> bool {
        self.namespace.as_deref() == Some(XSI_NS)
    }

    /// The `{ns}local` form used when an attribute's namespace differs from
    /// its owning element's namespace (see SPEC_FULL.md §4.4).
    pub fn clark_notation(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for Qname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clark_notation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural_on_both_parts() {
        let a = Qname::new(Some("urn:a"), "foo");
        let b = Qname::new(Some("urn:a"), "foo");
        let c = Qname::new(Some("urn:b"), "foo");
        let d = Qname::local("foo");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn clark_notation_only_applies_with_namespace() {
        assert_eq!(Qname::local("id").clark_notation(), "id");
        assert_eq!(
            Qname::new(Some("urn:x"), "id").clark_notation(),
            "{urn:x}id"
        );
    }
}
