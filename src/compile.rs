//! The schema compiler: walks an example XML tree and produces a
//! [`crate::node::DocumentTransformer`] (SPEC_FULL.md §4.4).

use std::collections::BTreeMap;

use crate::dom;
use crate::error::Error;
use crate::node::{DocumentTransformer, NodeKind, NodeTransformer};
use crate::qname::Qname;
use crate::scalar::{infer_scalar_kind, Coder};
use crate::value::Value;

/// The one caller-supplied compile-time knob: whether unexpected attributes
/// and child elements are skipped rather than rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub ignore_unexpected: bool,
}

/// Compile an example schema document into a reusable, read-only
/// transformer tree.
pub fn compile(schema: &dom::Element, options: CompileOptions) -> Result<DocumentTransformer, Error> {
    log::debug!(
        "compiling schema rooted at {} (ignore_unexpected={})",
        schema.qname,
        options.ignore_unexpected
    );
    let example_root = find_example_root(schema)?;
    let root = compile_node(example_root)?;
    Ok(DocumentTransformer {
        root_qname: root.node_name.clone(),
        root,
        ignore_unexpected: options.ignore_unexpected,
    })
}

/// Locate the example root element, supporting both the full
/// `{xsbe}schema-by-example`/`{xsbe}root` envelope and the lite form where
/// the schema document itself is the example root.
fn find_example_root(schema: &dom::Element) -> Result<&dom::Element, Error> {
    if !(schema.qname.is_xsbe() && schema.qname.local == "schema-by-example") {
        return Ok(schema);
    }

    let root_wrapper = schema
        .child_elements()
        .find(|c| c.qname.is_xsbe() && c.qname.local == "root")
        .ok_or_else(|| Error::SchemaError("{xsbe}schema-by-example has no {xsbe}root child".to_string()))?;

    let mut user_children = root_wrapper.child_elements().filter(|c| !c.qname.is_xsbe());
    let example_root = user_children
        .next()
        .ok_or_else(|| Error::SchemaError("{xsbe}root must wrap exactly one example element".to_string()))?;
    if user_children.next().is_some() {
        return Err(Error::SchemaError(
            "{xsbe}root must wrap exactly one example element".to_string(),
        ));
    }
    Ok(example_root)
}

struct TypeFlags {
    is_optional: bool,
    is_repeating: bool,
    flatten: bool,
}

fn xsbe_attr<'a>(element: &'a dom::Element, local: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(q, _)| q.is_xsbe() && q.local == local)
        .map(|(_, v)| v.as_str())
}

fn read_type_flags(element: &dom::Element) -> Result<TypeFlags, Error> {
    let mut flags = TypeFlags {
        is_optional: true,
        is_repeating: false,
        flatten: false,
    };
    match xsbe_attr(element, "type") {
        None | Some("optional") => {}
        Some("mandatory") => flags.is_optional = false,
        Some("repeating") => flags.is_repeating = true,
        Some("flatten") => flags.flatten = true,
        Some(other) => return Err(Error::SchemaError(format!("unknown xsbe:type value {:?}", other))),
    }
    Ok(flags)
}

fn node_result_name(element: &dom::Element) -> String {
    xsbe_attr(element, "name")
        .map(|s| s.to_string())
        .unwrap_or_else(|| element.qname.local.clone())
}

fn read_default(element: &dom::Element, coder: Option<&Coder>, node_name: &Qname) -> Result<Option<Value>, Error> {
    match (xsbe_attr(element, "default"), coder) {
        (None, _) => Ok(None),
        (Some(text), Some(coder)) => Ok(Some(coder.decode(node_name, text)?)),
        (Some(_), None) => Err(Error::SchemaError(format!(
            "{} has xsbe:default but is not a scalar node",
            node_name
        ))),
    }
}

/// The `result_name` an attribute coder is stored under: its local name,
/// unless the attribute's namespace differs from its owning element's, in
/// which case the full `{ns}local` form disambiguates it (SPEC_FULL.md
/// §4.4).
fn attribute_result_name(attr: &Qname, owner: &Qname) -> String {
    match &attr.namespace {
        None => attr.local.clone(),
        Some(ns) if Some(ns.as_str()) == owner.namespace.as_deref() => attr.local.clone(),
        Some(_) => attr.clark_notation(),
    }
}

fn compile_attrs(element: &dom::Element, value_from: Option<&Qname>) -> BTreeMap<Qname, Coder> {
    let mut attrs = BTreeMap::new();
    for (qname, raw) in &element.attributes {
        if qname.is_xsbe() {
            continue;
        }
        if let Some(pointer) = value_from {
            if qname.local == pointer.local {
                continue;
            }
        }
        let mut coder = Coder::new(infer_scalar_kind(raw));
        coder.result_name = Some(attribute_result_name(qname, &element.qname));
        attrs.insert(qname.clone(), coder);
    }
    attrs
}

/// Classify and compile one example element and its subtree (SPEC_FULL.md
/// §4.4).
pub fn compile_node(element: &dom::Element) -> Result<NodeTransformer, Error> {
    let node_name = element.qname.clone();
    let result_name = node_result_name(element);
    let flags = read_type_flags(element)?;
    let value_from_attr = xsbe_attr(element, "value-from").map(|s| s.to_string());

    let child_elements: Vec<&dom::Element> = element.child_elements().collect();
    let body = element.text();
    let trimmed_body = body.trim();

    let (kind, leaf_coder) = if child_elements.is_empty() && !trimmed_body.is_empty() {
        log::trace!("{} classified as text-node (body literal {:?})", node_name, trimmed_body);
        let coder = Coder::new(infer_scalar_kind(trimmed_body));
        (
            NodeKind::Text {
                coder: coder.clone(),
                value_from: None,
            },
            Some(coder),
        )
    } else if let Some(pointer) = &value_from_attr {
        if !child_elements.is_empty() {
            return Err(Error::SchemaError(format!(
                "{} carries xsbe:value-from alongside child elements",
                node_name
            )));
        }
        let (_, sample) = element.find_attribute_by_local(pointer).ok_or_else(|| {
            Error::SchemaError(format!(
                "xsbe:value-from={:?} on {} does not name a present attribute",
                pointer, node_name
            ))
        })?;
        log::trace!("{} classified as text-node via value-from={:?}", node_name, pointer);
        let coder = Coder::new(infer_scalar_kind(sample));
        (
            NodeKind::Text {
                coder: coder.clone(),
                value_from: Some(Qname::local(pointer.clone())),
            },
            Some(coder),
        )
    } else {
        if !trimmed_body.is_empty() {
            return Err(Error::SchemaError(format!(
                "{} has both text and child elements (mixed content)",
                node_name
            )));
        }
        log::trace!("{} classified as element-node ({} children)", node_name, child_elements.len());
        let mut children = BTreeMap::new();
        for child in &child_elements {
            let compiled = compile_node(child)?;
            if children.contains_key(&compiled.node_name) {
                return Err(Error::SchemaError(format!(
                    "duplicate sibling node name {}",
                    compiled.node_name
                )));
            }
            children.insert(compiled.node_name.clone(), compiled);
        }
        (NodeKind::Element { children }, None)
    };

    let value_from_qname = match &kind {
        NodeKind::Text { value_from, .. } => value_from.clone(),
        NodeKind::Element { .. } => None,
    };
    let attrs = compile_attrs(element, value_from_qname.as_ref());
    let default = read_default(element, leaf_coder.as_ref(), &node_name)?;

    Ok(NodeTransformer {
        node_name,
        result_name,
        is_optional: flags.is_optional,
        is_repeating: flags.is_repeating,
        flatten: flags.flatten,
        default,
        attrs,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::decode_from_xml;

    fn parse(xml: &str) -> dom::Element {
        dom::parse_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn lite_envelope_compiles_the_bare_example_root() {
        let _ = env_logger::try_init();
        let schema = parse(r#"<person id="20"><name>Philip</name></person>"#);
        let dt = compile(&schema, CompileOptions::default()).unwrap();
        assert_eq!(dt.root_qname, Qname::local("person"));
        match &dt.root.kind {
            NodeKind::Element { children } => assert_eq!(children.len(), 1),
            NodeKind::Text { .. } => panic!("expected element-node"),
        }
    }

    #[test]
    fn full_envelope_unwraps_schema_by_example_root() {
        let schema = parse(
            r#"<xsbe:schema-by-example xmlns:xsbe="http://xsbe.couling.uk">
                 <xsbe:root><person id="20"><name>Philip</name></person></xsbe:root>
               </xsbe:schema-by-example>"#,
        );
        let dt = compile(&schema, CompileOptions::default()).unwrap();
        assert_eq!(dt.root_qname, Qname::local("person"));
    }

    #[test]
    fn unknown_type_value_is_a_schema_error() {
        let schema = parse(
            r#"<person xmlns:xsbe="http://xsbe.couling.uk" xsbe:type="bogus">Philip</person>"#,
        );
        let err = compile(&schema, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn flatten_child_merges_into_parent_on_decode() {
        let schema = parse(
            r#"<person xmlns:xsbe="http://xsbe.couling.uk" id="20" xsbe:type="flatten"><name>Philip</name></person>"#,
        );
        let dt = compile(&schema, CompileOptions::default()).unwrap();
        let input = parse(r#"<person id="21"><name>Alan</name></person>"#);
        let value = decode_from_xml(&dt, &input).unwrap();
        let mapping = value.as_mapping().unwrap();
        assert_eq!(mapping.get("id"), Some(&Value::Int(21)));
        assert_eq!(mapping.get("name"), Some(&Value::String("Alan".to_string())));
    }

    #[test]
    fn value_from_decodes_body_from_named_attribute() {
        let schema = parse(
            r#"<person xmlns:xsbe="http://xsbe.couling.uk" name="Philip" xsbe:value-from="name"/>"#,
        );
        let dt = compile(&schema, CompileOptions::default()).unwrap();
        let input = parse(r#"<person name="Alan"/>"#);
        let value = decode_from_xml(&dt, &input).unwrap();
        assert_eq!(value, Value::String("Alan".to_string()));
    }
}
