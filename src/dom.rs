//! A minimal, owned XML tree: the shape [`crate::compile`] walks to build a
//! schema, and [`crate::node`] walks to decode or encode data (SPEC_FULL.md
//! §4.8).
//!
//! Parsing is driven by [`rxml`]'s pull parser, which already resolves
//! element and attribute names to `(namespace, local)` pairs — there is no
//! `xmlns:*` bookkeeping left to do on the way in. Serialization goes the
//! other way: this crate owns namespace-prefix assignment itself, to
//! reproduce the `xmlns:<prefix>` declared-once-at-the-root shape of the
//! data this crate reads (see [`assign_prefixes`]), so it is hand-written
//! rather than routed through `rxml::writer`.

use std::collections::BTreeMap;
use std::io::{self, Cursor};

use crate::error::Error;
use crate::qname::Qname;

/// An XML element: qualified name, attributes, ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub qname: Qname,
    pub attributes: BTreeMap<Qname, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(qname: Qname) -> Self {
        Element {
            qname,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// This element's child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Find an attribute by local name, ignoring its namespace (used to
    /// resolve XSBE's `value-from`, which names an attribute by bare local
    /// name — see DESIGN.md).
    pub fn find_attribute_by_local(&self, local: &str) -> Option<(&Qname, &String)> {
        self.attributes.iter().find(|(qname, _)| qname.local == local)
    }

    /// The concatenation of this element's direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// A child of an [`Element`]: either text or a nested element.
///
/// Comments and processing instructions are dropped during parsing; they
/// have no place in the data model this tree feeds.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
}

fn is_xml_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn namespace_to_option(ns: &rxml::Namespace) -> Option<String> {
    if *ns == rxml::Namespace::NONE {
        None
    } else {
        Some(ns.as_str().to_string())
    }
}

fn map_nonio_error(e: io::Error) -> Error {
    match e.into_inner() {
        Some(inner) => match inner.downcast::<rxml::Error>() {
            Ok(xml_err) => Error::from(*xml_err),
            Err(other) => Error::SchemaError(other.to_string()),
        },
        None => Error::SchemaError(e.to_string()),
    }
}

/// Parse a complete XML document into its root [`Element`].
///
/// Whitespace-only text between elements is dropped, matching how
/// pretty-printed example documents are read; a text node that is not pure
/// whitespace is always kept.
pub fn parse_document(bytes: &[u8]) -> Result<Element, Error> {
    let mut cursor = Cursor::new(bytes);
    let reader = rxml::Reader::new(&mut cursor);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    for event in reader {
        let event = event.map_err(map_nonio_error)?;
        match event {
            rxml::Event::XmlDeclaration(_, _) => {}
            rxml::Event::StartElement(_, (ns, name), attrs) => {
                let qname = Qname::new(namespace_to_option(&ns), name.as_str());
                let mut element = Element::new(qname);
                for ((attr_ns, attr_name), value) in attrs.into_iter() {
                    let namespace = namespace_to_option(&attr_ns);
                    if namespace.as_deref() == Some(crate::qname::XSI_NS) {
                        continue;
                    }
                    let attr_qname = Qname::new(namespace, attr_name.as_str());
                    element.attributes.insert(attr_qname, value);
                }
                stack.push(element);
            }
            rxml::Event::Text(_, text) => {
                if is_xml_whitespace(&text) {
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Text(text));
                }
            }
            rxml::Event::EndElement(_) => {
                let finished = stack.pop().expect("EndElement without matching start");
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(finished)),
                    None => root = Some(finished),
                }
            }
        }
    }

    root.ok_or_else(|| Error::SchemaError("document contained no root element".to_string()))
}

/// The infinite `a, b, ..., z, aa, ab, ..., zz, aaa, ...` prefix sequence
/// used to name discovered namespaces that have no declared prefix of their
/// own (SPEC_FULL.md §4.8).
fn prefix_sequence() -> impl Iterator<Item = String> {
    PrefixSequence { next: 0 }
}

struct PrefixSequence {
    next: usize,
}

impl Iterator for PrefixSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        // Fixed-width base-26 counter: 0 -> "a", 25 -> "z", 26 -> "aa", ...
        let mut n = self.next;
        self.next += 1;
        let mut width = 1usize;
        let mut span = 26usize;
        let mut offset = n;
        loop {
            if offset < span {
                break;
            }
            offset -= span;
            width += 1;
            span *= 26;
        }
        n = offset;
        let mut letters = vec![0u8; width];
        for slot in letters.iter_mut().rev() {
            *slot = b'a' + (n % 26) as u8;
            n /= 26;
        }
        Some(String::from_utf8(letters).expect("ascii"))
    }
}

/// Discover every distinct namespace URI used by `root` or its descendants
/// (on element names and attribute names alike), in first-encountered
/// document order, and assign each a synthesized prefix.
pub fn assign_prefixes(root: &Element) -> BTreeMap<String, String> {
    let mut order: Vec<String> = Vec::new();
    discover_namespaces(root, &mut order);

    let mut prefixes = BTreeMap::new();
    let mut sequence = prefix_sequence();
    for ns in order {
        let prefix = loop {
            let candidate = sequence.next().expect("prefix sequence is infinite");
            if !prefixes.values().any(|p: &String| p == &candidate) {
                break candidate;
            }
        };
        prefixes.insert(ns, prefix);
    }
    prefixes
}

fn discover_namespaces(element: &Element, order: &mut Vec<String>) {
    if let Some(ns) = &element.qname.namespace {
        if !order.contains(ns) {
            order.push(ns.clone());
        }
    }
    for qname in element.attributes.keys() {
        if let Some(ns) = &qname.namespace {
            if !order.contains(ns) {
                order.push(ns.clone());
            }
        }
    }
    for child in element.child_elements() {
        discover_namespaces(child, order);
    }
}

fn qualify(qname: &Qname, prefixes: &BTreeMap<String, String>) -> String {
    match &qname.namespace {
        None => qname.local.clone(),
        Some(ns) => match prefixes.get(ns) {
            Some(prefix) => format!("{}:{}", prefix, qname.local),
            None => qname.local.clone(),
        },
    }
}

/// Serialize `root` (and its subtree) to a complete XML document string,
/// with every namespace used anywhere in the tree declared once, on the
/// root element, via a synthesized `xmlns:<prefix>`.
pub fn serialize_document(root: &Element) -> String {
    let prefixes = assign_prefixes(root);
    let mut out = String::from("<?xml version='1.0' encoding='utf-8'?>\n");
    write_element(root, &prefixes, true, &mut out);
    out
}

fn write_element(element: &Element, prefixes: &BTreeMap<String, String>, is_root: bool, out: &mut String) {
    let tag = qualify(&element.qname, prefixes);
    out.push('<');
    out.push_str(&tag);

    if is_root {
        let mut declared: Vec<(&String, &String)> = prefixes.iter().collect();
        declared.sort_by(|a, b| a.1.cmp(b.1));
        for (ns, prefix) in declared {
            out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attr(ns)));
        }
    }

    for (qname, value) in &element.attributes {
        out.push(' ');
        out.push_str(&qualify(qname, prefixes));
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(child) => write_element(child, prefixes, false, out),
        }
    }
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
