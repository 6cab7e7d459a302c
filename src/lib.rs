//! A bidirectional translator between XML documents and a dynamic
//! [`Value`] tree, driven entirely by an *example* XML document: feed the
//! compiler one annotated instance and it infers scalar types, attribute
//! shapes, and repetition/flattening rules for the whole schema.
//!
//! ```text
//! let schema = xsbe::compile_str(EXAMPLE_XML, xsbe::CompileOptions::default())?;
//! let value = xsbe::decode_str(&schema, INPUT_XML)?;
//! let xml = xsbe::encode_string(&schema, &value)?;
//! ```
//!
//! See [`compile`] for the schema compiler, [`node`] for the compiled
//! transformer tree and its decode/encode directions, [`scalar`] for the
//! type-inferring scalar codecs, and [`dom`] for the XML tree this crate
//! reads and writes.

pub mod compile;
pub mod dom;
pub mod error;
pub mod node;
pub mod qname;
pub mod scalar;
pub mod value;

pub use compile::{compile, CompileOptions};
pub use error::Error;
pub use node::{decode_from_xml, encode_to_xml, DocumentTransformer};
pub use qname::Qname;
pub use value::Value;

/// Parse `schema` as XML and compile it into a [`DocumentTransformer`].
pub fn compile_str(schema: &str, options: CompileOptions) -> Result<DocumentTransformer, Error> {
    let element = dom::parse_document(schema.as_bytes())?;
    compile::compile(&element, options)
}

/// Decode an XML document given as a string against a compiled schema.
pub fn decode_str(dt: &DocumentTransformer, xml: &str) -> Result<Value, Error> {
    decode_bytes(dt, xml.as_bytes())
}

/// Decode an XML document given as bytes against a compiled schema.
pub fn decode_bytes(dt: &DocumentTransformer, xml: &[u8]) -> Result<Value, Error> {
    let element = dom::parse_document(xml)?;
    node::decode_from_xml(dt, &element)
}

/// Encode a value against a compiled schema, producing a complete XML
/// document string.
pub fn encode_string(dt: &DocumentTransformer, value: &Value) -> Result<String, Error> {
    let element = node::encode_to_xml(dt, value)?;
    Ok(dom::serialize_document(&element))
}

/// Encode a value against a compiled schema, producing a complete XML
/// document as bytes.
pub fn encode_bytes(dt: &DocumentTransformer, value: &Value) -> Result<Vec<u8>, Error> {
    Ok(encode_string(dt, value)?.into_bytes())
}
