//! The compiled transformer tree and its two directions of travel:
//! `decode_node` (XML → [`Value`]) and `encode_node` ([`Value`] → XML).
//!
//! Produced once by [`crate::compile`] and read-only from then on (SPEC_FULL.md
//! §3 "Lifecycle"); the same tree decodes and encodes any number of documents.

use std::collections::BTreeMap;

use crate::dom;
use crate::error::Error;
use crate::qname::Qname;
use crate::scalar::Coder;
use crate::value::{Value, VALUE_KEY};

/// The two shapes a compiled node can take.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Carries child transformers, keyed by their own `node_name`.
    ///
    /// Iteration order is qname order, not schema-declaration order —
    /// a documented approximation (see DESIGN.md) that keeps the tree
    /// `BTreeMap`-keyed like the rest of this crate.
    Element { children: BTreeMap<Qname, NodeTransformer> },

    /// Carries a scalar coder for the element body, and optionally reads
    /// that body from a named attribute instead (`value_from`).
    ///
    /// `value_from` is matched and written by local name only, regardless
    /// of namespace (see DESIGN.md Open Question (a)).
    Text {
        coder: Coder,
        value_from: Option<Qname>,
    },
}

/// One compiled position in the schema tree.
#[derive(Debug, Clone)]
pub struct NodeTransformer {
    pub node_name: Qname,
    pub result_name: String,
    pub is_optional: bool,
    pub is_repeating: bool,
    pub flatten: bool,
    pub default: Option<Value>,
    pub attrs: BTreeMap<Qname, Coder>,
    pub kind: NodeKind,
}

/// The root of a compiled schema: a node transformer pinned to an expected
/// document root qname.
#[derive(Debug, Clone)]
pub struct DocumentTransformer {
    pub root_qname: Qname,
    pub root: NodeTransformer,
    /// Whether unexpected attributes/elements are silently skipped rather
    /// than rejected. Fixed at compile time (`compile::CompileOptions`) and
    /// carried here so `decode_from_xml` needs no policy argument of its
    /// own.
    pub ignore_unexpected: bool,
}

/// Decode a parsed document against a compiled schema.
pub fn decode_from_xml(dt: &DocumentTransformer, xml: &dom::Element) -> Result<Value, Error> {
    log::debug!(
        "decoding document rooted at {} against schema root {} (ignore_unexpected={})",
        xml.qname,
        dt.root_qname,
        dt.ignore_unexpected
    );
    if xml.qname != dt.root_qname {
        return Err(Error::IncorrectRoot {
            expected: dt.root_qname.clone(),
            found: xml.qname.clone(),
        });
    }
    decode_node(&dt.root, xml, dt.ignore_unexpected)
}

/// Encode a value against a compiled schema, producing an XML tree rooted
/// at the schema's expected root qname.
pub fn encode_to_xml(dt: &DocumentTransformer, value: &Value) -> Result<dom::Element, Error> {
    log::debug!(
        "encoding value against schema root {} (ignore_unexpected={})",
        dt.root_qname,
        dt.ignore_unexpected
    );
    encode_node(&dt.root, value)
}

pub fn decode_node(node: &NodeTransformer, element: &dom::Element, ignore_unexpected: bool) -> Result<Value, Error> {
    match &node.kind {
        NodeKind::Text { coder, value_from } => decode_text_node(node, coder, value_from, element, ignore_unexpected),
        NodeKind::Element { children } => decode_element_node(node, children, element, ignore_unexpected),
    }
}

pub fn encode_node(node: &NodeTransformer, value: &Value) -> Result<dom::Element, Error> {
    match &node.kind {
        NodeKind::Text { coder, value_from } => encode_text_node(node, coder, value_from, value),
        NodeKind::Element { children } => encode_element_node(node, children, value),
    }
}

/// SPEC_FULL.md §4.2.
fn decode_text_node(
    node: &NodeTransformer,
    coder: &Coder,
    value_from: &Option<Qname>,
    element: &dom::Element,
    ignore_unexpected: bool,
) -> Result<Value, Error> {
    let raw: Option<String> = match value_from {
        Some(pointer) => {
            if let Some(stray) = element.child_elements().next() {
                if !ignore_unexpected {
                    return Err(Error::UnexpectedElement(stray.qname.clone()));
                }
            }
            element.find_attribute_by_local(&pointer.local).map(|(_, v)| v.clone())
        }
        None => {
            if let Some(stray) = element.child_elements().next() {
                if !ignore_unexpected {
                    return Err(Error::UnexpectedElement(stray.qname.clone()));
                }
            }
            let trimmed = element.text();
            let trimmed = trimmed.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    };

    let value = match raw {
        Some(text) => coder.decode(&node.node_name, &text)?,
        None if node.is_optional => node.default.clone().unwrap_or(Value::Null),
        None => {
            return Err(Error::MissingElement {
                qname: node.node_name.clone(),
                result_name: node.result_name.clone(),
            })
        }
    };

    if node.attrs.is_empty() {
        Ok(value)
    } else {
        let mut mapping = decode_attrs(&node.attrs, element, ignore_unexpected)?;
        mapping.insert(VALUE_KEY.to_string(), value);
        Ok(Value::Mapping(mapping))
    }
}

/// SPEC_FULL.md §4.5 decode direction.
fn decode_attrs(
    attrs: &BTreeMap<Qname, Coder>,
    element: &dom::Element,
    ignore_unexpected: bool,
) -> Result<BTreeMap<String, Value>, Error> {
    let mut out = BTreeMap::new();

    for (qname, raw) in &element.attributes {
        match attrs.get(qname) {
            Some(coder) => {
                let key = coder.result_name.clone().unwrap_or_else(|| qname.local.clone());
                out.insert(key, coder.decode(qname, raw)?);
            }
            None => {
                if !ignore_unexpected {
                    return Err(Error::UnexpectedAttribute(qname.clone()));
                }
            }
        }
    }

    for (qname, coder) in attrs {
        if element.attributes.contains_key(qname) {
            continue;
        }
        if let Some(default) = &coder.default {
            let key = coder.result_name.clone().unwrap_or_else(|| qname.local.clone());
            out.entry(key).or_insert_with(|| default.clone());
        }
    }

    Ok(out)
}

/// SPEC_FULL.md §4.3.
fn decode_element_node(
    node: &NodeTransformer,
    children: &BTreeMap<Qname, NodeTransformer>,
    element: &dom::Element,
    ignore_unexpected: bool,
) -> Result<Value, Error> {
    let mut out = BTreeMap::new();

    for child in children.values() {
        if child.is_repeating {
            out.insert(child.result_name.clone(), Value::List(Vec::new()));
        }
    }

    for child_elem in element.child_elements() {
        let child = match children.get(&child_elem.qname) {
            Some(child) => child,
            None => {
                if ignore_unexpected {
                    continue;
                }
                return Err(Error::UnexpectedElement(child_elem.qname.clone()));
            }
        };

        let decoded = decode_node(child, child_elem, ignore_unexpected)?;

        if child.is_repeating {
            match out.get_mut(&child.result_name) {
                Some(Value::List(list)) => list.push(decoded),
                _ => unreachable!("repeating child was pre-seeded with an empty list"),
            }
        } else if child.flatten {
            match decoded {
                Value::Mapping(m) => out.extend(m),
                other => {
                    return Err(Error::TypeError {
                        qname: child.node_name.clone(),
                        message: format!("flattened child decoded to {}, expected a mapping", other),
                    })
                }
            }
        } else {
            if out.contains_key(&child.result_name) {
                return Err(Error::DuplicateElement {
                    qname: child.node_name.clone(),
                    result_name: child.result_name.clone(),
                });
            }
            out.insert(child.result_name.clone(), decoded);
        }
    }

    for child in children.values() {
        if child.flatten {
            continue;
        }
        if child.is_repeating {
            // A mandatory repeating child cannot currently be produced by
            // the compiler (`xsbe:type` is single-valued), but the check is
            // kept for the same reason the original source keeps it.
            if !child.is_optional {
                if let Some(Value::List(list)) = out.get(&child.result_name) {
                    if list.is_empty() {
                        return Err(Error::MissingElement {
                            qname: child.node_name.clone(),
                            result_name: child.result_name.clone(),
                        });
                    }
                }
            }
            continue;
        }
        if out.contains_key(&child.result_name) {
            continue;
        }
        if child.is_optional {
            if let Some(default) = &child.default {
                out.insert(child.result_name.clone(), default.clone());
            }
        } else {
            return Err(Error::MissingElement {
                qname: child.node_name.clone(),
                result_name: child.result_name.clone(),
            });
        }
    }

    if !node.attrs.is_empty() {
        out.extend(decode_attrs(&node.attrs, element, ignore_unexpected)?);
    }

    Ok(Value::Mapping(out))
}

fn expect_mapping<'a>(node: &NodeTransformer, value: &'a Value) -> Result<&'a BTreeMap<String, Value>, Error> {
    value.as_mapping().ok_or_else(|| Error::TypeError {
        qname: node.node_name.clone(),
        message: format!("expected a mapping, found {}", value),
    })
}

/// SPEC_FULL.md §4.5 encode direction.
fn encode_attrs(
    attrs: &BTreeMap<Qname, Coder>,
    mapping: &BTreeMap<String, Value>,
    element: &mut dom::Element,
) -> Result<(), Error> {
    for (qname, coder) in attrs {
        let key = coder.result_name.as_deref().unwrap_or(&qname.local);
        let value = match mapping.get(key) {
            Some(v) => Some(v),
            None => coder.default.as_ref(),
        };
        if let Some(v) = value {
            if !v.is_null() {
                element.attributes.insert(qname.clone(), coder.encode(qname, v)?);
            }
        }
    }
    Ok(())
}

/// SPEC_FULL.md §4.7, element-node branch.
fn encode_element_node(
    node: &NodeTransformer,
    children: &BTreeMap<Qname, NodeTransformer>,
    value: &Value,
) -> Result<dom::Element, Error> {
    let mapping = expect_mapping(node, value)?;
    let mut element = dom::Element::new(node.node_name.clone());

    encode_attrs(&node.attrs, mapping, &mut element)?;

    for child in children.values() {
        if child.is_repeating {
            let items: Vec<&Value> = match mapping.get(&child.result_name) {
                Some(Value::List(list)) => list.iter().collect(),
                Some(other) => {
                    return Err(Error::TypeError {
                        qname: child.node_name.clone(),
                        message: format!("expected a list, found {}", other),
                    })
                }
                None => Vec::new(),
            };
            for item in items {
                element.children.push(dom::Node::Element(encode_node(child, item)?));
            }
        } else if child.flatten {
            // The flattened child's fields live directly in `mapping`; hand
            // down the same value so it can pick out what it needs.
            element.children.push(dom::Node::Element(encode_node(child, value)?));
        } else {
            let chosen = match mapping.get(&child.result_name) {
                Some(v) => Some(v.clone()),
                None => child.default.clone(),
            };
            match chosen {
                Some(v) if !v.is_null() => {
                    element.children.push(dom::Node::Element(encode_node(child, &v)?));
                }
                Some(_) => {} // explicit null or null default: omit
                None if child.is_optional => {}
                None => {
                    return Err(Error::MissingElement {
                        qname: child.node_name.clone(),
                        result_name: child.result_name.clone(),
                    })
                }
            }
        }
    }

    Ok(element)
}

/// SPEC_FULL.md §4.7, text-node branch.
fn encode_text_node(
    node: &NodeTransformer,
    coder: &Coder,
    value_from: &Option<Qname>,
    value: &Value,
) -> Result<dom::Element, Error> {
    let mut element = dom::Element::new(node.node_name.clone());

    let body = if node.attrs.is_empty() {
        value.clone()
    } else {
        let mapping = expect_mapping(node, value)?;
        encode_attrs(&node.attrs, mapping, &mut element)?;
        mapping.get(VALUE_KEY).cloned().unwrap_or(Value::Null)
    };

    if !body.is_null() {
        let text = coder.encode(&node.node_name, &body)?;
        match value_from {
            Some(pointer) => {
                element.attributes.insert(Qname::local(pointer.local.clone()), text);
            }
            None => element.children.push(dom::Node::Text(text)),
        }
    }

    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarKind;

    fn text_leaf(node_name: &str, kind: ScalarKind) -> NodeTransformer {
        NodeTransformer {
            node_name: Qname::local(node_name),
            result_name: node_name.to_string(),
            is_optional: true,
            is_repeating: false,
            flatten: false,
            default: None,
            attrs: BTreeMap::new(),
            kind: NodeKind::Text {
                coder: Coder::new(kind),
                value_from: None,
            },
        }
    }

    #[test]
    fn repeating_child_decodes_to_a_list() {
        let mut children = BTreeMap::new();
        let mut person = text_leaf("person", ScalarKind::Text);
        person.is_optional = true;
        person.is_repeating = true;
        person.result_name = "people".to_string();
        children.insert(person.node_name.clone(), person);

        let root = NodeTransformer {
            node_name: Qname::local("people"),
            result_name: "people".to_string(),
            is_optional: false,
            is_repeating: false,
            flatten: false,
            default: None,
            attrs: BTreeMap::new(),
            kind: NodeKind::Element { children },
        };

        let mut xml_root = dom::Element::new(Qname::local("people"));
        for name in ["Alan", "Also Alan"] {
            let mut p = dom::Element::new(Qname::local("person"));
            p.children.push(dom::Node::Text(name.to_string()));
            xml_root.children.push(dom::Node::Element(p));
        }

        let decoded = decode_node(&root, &xml_root, false).unwrap();
        let mapping = decoded.as_mapping().unwrap();
        match mapping.get("people").unwrap() {
            Value::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Value::String("Alan".to_string()));
            }
            other => panic!("expected a list, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_non_repeating_child_is_rejected() {
        let mut children = BTreeMap::new();
        let person = text_leaf("person", ScalarKind::Text);
        children.insert(person.node_name.clone(), person);

        let root = NodeTransformer {
            node_name: Qname::local("people"),
            result_name: "people".to_string(),
            is_optional: false,
            is_repeating: false,
            flatten: false,
            default: None,
            attrs: BTreeMap::new(),
            kind: NodeKind::Element { children },
        };

        let mut xml_root = dom::Element::new(Qname::local("people"));
        for _ in 0..2 {
            let mut p = dom::Element::new(Qname::local("person"));
            p.children.push(dom::Node::Text("Alan".to_string()));
            xml_root.children.push(dom::Node::Element(p));
        }

        let err = decode_node(&root, &xml_root, false).unwrap_err();
        assert!(matches!(err, Error::DuplicateElement { .. }));
    }

    #[test]
    fn unexpected_element_is_silenced_by_ignore_unexpected() {
        let root = NodeTransformer {
            node_name: Qname::local("people"),
            result_name: "people".to_string(),
            is_optional: false,
            is_repeating: false,
            flatten: false,
            default: None,
            attrs: BTreeMap::new(),
            kind: NodeKind::Element {
                children: BTreeMap::new(),
            },
        };

        let mut xml_root = dom::Element::new(Qname::local("people"));
        xml_root
            .children
            .push(dom::Node::Element(dom::Element::new(Qname::local("surprise"))));

        assert!(decode_node(&root, &xml_root, false).is_err());
        assert!(decode_node(&root, &xml_root, true).is_ok());
    }

    #[test]
    fn text_node_with_attrs_round_trips_through_value_sentinel() {
        let mut attrs = BTreeMap::new();
        attrs.insert(Qname::local("id"), Coder::new(ScalarKind::Int));

        let node = NodeTransformer {
            node_name: Qname::local("person"),
            result_name: "person".to_string(),
            is_optional: false,
            is_repeating: false,
            flatten: false,
            default: None,
            attrs,
            kind: NodeKind::Text {
                coder: Coder::new(ScalarKind::Text),
                value_from: None,
            },
        };

        let mut element = dom::Element::new(Qname::local("person"));
        element.attributes.insert(Qname::local("id"), "21".to_string());
        element.children.push(dom::Node::Text("Alan".to_string()));

        let decoded = decode_node(&node, &element, false).unwrap();
        let mapping = decoded.as_mapping().unwrap();
        assert_eq!(mapping.get("id"), Some(&Value::Int(21)));
        assert_eq!(mapping.get(VALUE_KEY), Some(&Value::String("Alan".to_string())));

        let encoded = encode_node(&node, &decoded).unwrap();
        assert_eq!(encoded.attributes.get(&Qname::local("id")), Some(&"21".to_string()));
        assert_eq!(encoded.text(), "Alan");
    }
}
