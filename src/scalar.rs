//! Scalar coders: bidirectional codecs between raw XML text and typed
//! [`Value`]s (SPEC_FULL.md §4.1, §4.6).
//!
//! Each [`ScalarKind`] is inferred once, from a single literal in the
//! example schema, and frozen into a [`Coder`] at compile time (see
//! [`crate::compile`]). The same `Coder` is then used for every instance
//! decode/encode at that schema position.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::Error;
use crate::qname::Qname;
use crate::value::Value;

/// The seven scalar kinds a schema leaf may be inferred as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Identity codec: text passes through unchanged.
    Text,
    /// Base-10 integer literal.
    Int,
    /// Decimal literal containing a `.`.
    Float,
    /// Case-insensitive `y`/`yes`/`true`/`t`/`n`/`no`/`false`/`f`.
    Bool,
    /// `YYYY-MM-DD[(T| )HH:MM:SS[±HH:MM]]`, offset optional.
    IsoDate,
    /// Same body as [`Self::IsoDate`], but a `Z` suffix is required.
    IsoZuluDate,
    /// RFC 822 date, e.g. `Mon, 16 Nov 2009 13:32:02 +0400`.
    Rfc822Date,
}

/// A bidirectional codec bundling a [`ScalarKind`] with the metadata the
/// schema compiler attaches to every leaf it decodes: the key this value
/// appears under in the decoded mapping (`result_name`, used for attribute
/// coders — see SPEC_FULL.md §4.5) and the decoded default substituted when
/// the source is absent and optional.
#[derive(Debug, Clone)]
pub struct Coder {
    pub kind: ScalarKind,
    pub result_name: Option<String>,
    pub default: Option<Value>,
}

impl Coder {
    pub fn new(kind: ScalarKind) -> Self {
        Coder {
            kind,
            result_name: None,
            default: None,
        }
    }

    /// Decode `text`, read at `qname`, through this coder's scalar kind.
    pub fn decode(&self, qname: &Qname, text: &str) -> Result<Value, Error> {
        decode_scalar(self.kind, text).map_err(|source| Error::bad_scalar(qname.clone(), text, source))
    }

    /// Encode `value` through this coder's scalar kind.
    ///
    /// `value` must be the variant matching this coder's kind (a type
    /// mismatch here reflects a caller bug, not a schema violation — see
    /// SPEC_FULL.md §4.7, which places the burden of supplying shape-correct
    /// values on the caller).
    pub fn encode(&self, qname: &Qname, value: &Value) -> Result<String, Error> {
        encode_scalar(self.kind, value).ok_or_else(|| Error::TypeError {
            qname: qname.clone(),
            message: format!("value {} does not match scalar kind {:?}", value, self.kind),
        })
    }
}

#[derive(Debug)]
struct ScalarError(String);

impl fmt::Display for ScalarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ScalarError {}

type ScalarResult = Result<Value, ScalarError>;

fn decode_scalar(kind: ScalarKind, text: &str) -> ScalarResult {
    match kind {
        ScalarKind::Text => Ok(Value::String(text.to_string())),
        ScalarKind::Int => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| ScalarError(format!("not an integer literal: {e}"))),
        ScalarKind::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| ScalarError(format!("not a float literal: {e}"))),
        ScalarKind::Bool => decode_bool(text).map(Value::Bool),
        ScalarKind::IsoDate => decode_iso_date(text),
        ScalarKind::IsoZuluDate => decode_iso_zulu_date(text),
        ScalarKind::Rfc822Date => decode_rfc822_date(text),
    }
}

fn encode_scalar(kind: ScalarKind, value: &Value) -> Option<String> {
    match (kind, value) {
        (ScalarKind::Text, Value::String(s)) => Some(s.clone()),
        (ScalarKind::Int, Value::Int(i)) => Some(i.to_string()),
        (ScalarKind::Float, Value::Float(f)) => Some(f.to_string()),
        (ScalarKind::Bool, Value::Bool(b)) => Some(if *b { "true".to_string() } else { "false".to_string() }),
        (
            ScalarKind::IsoDate,
            Value::Date {
                value,
                has_time,
                has_offset,
            },
        ) => Some(encode_iso_date(*value, *has_time, *has_offset)),
        (ScalarKind::IsoZuluDate, Value::Date { value, .. }) => {
            Some(value.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string())
        }
        (ScalarKind::Rfc822Date, Value::Date { value, .. }) => {
            Some(value.with_timezone(&Utc).fixed_offset().to_rfc2822())
        }
        _ => None,
    }
}

fn decode_bool(text: &str) -> Result<bool, ScalarError> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "t" => Ok(true),
        "n" | "no" | "false" | "f" => Ok(false),
        other => Err(ScalarError(format!("not a boolean literal: {other:?}"))),
    }
}

fn zero_offset() -> FixedOffset {
    FixedOffset::east_opt(0).expect("zero is a valid fixed offset")
}

fn decode_iso_date(text: &str) -> ScalarResult {
    let text = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
        return Ok(Value::Date {
            value: zero_offset().from_local_datetime(&naive).single().expect("unambiguous offset"),
            has_time: false,
            has_offset: false,
        });
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Ok(Value::Date {
                value: dt,
                has_time: true,
                has_offset: true,
            });
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(Value::Date {
                value: zero_offset().from_local_datetime(&naive).single().expect("unambiguous offset"),
                has_time: true,
                has_offset: false,
            });
        }
    }

    Err(ScalarError(format!("not an iso-date literal: {text:?}")))
}

fn decode_iso_zulu_date(text: &str) -> ScalarResult {
    let text = text.trim();
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ")
        .map_err(|e| ScalarError(format!("not an iso-zulu-date literal: {e}")))?;
    let utc = Utc.from_utc_datetime(&naive);
    Ok(Value::Date {
        value: utc.fixed_offset(),
        has_time: true,
        has_offset: true,
    })
}

fn decode_rfc822_date(text: &str) -> ScalarResult {
    let dt = DateTime::parse_from_rfc2822(text.trim())
        .map_err(|e| ScalarError(format!("not an rfc822 date literal: {e}")))?;
    Ok(Value::Date {
        value: dt,
        has_time: true,
        has_offset: true,
    })
}

fn encode_iso_date(value: DateTime<FixedOffset>, has_time: bool, has_offset: bool) -> String {
    if !has_time {
        value.format("%Y-%m-%d").to_string()
    } else if has_offset {
        value.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Order of probes for §4.6 type inference: boolean, then numeric (`.`
/// decides float vs int), then each date coder in turn, finally text.
pub fn infer_scalar_kind(text: &str) -> ScalarKind {
    if decode_bool(text).is_ok() {
        return ScalarKind::Bool;
    }
    if text.trim().parse::<f64>().is_ok() {
        return if text.contains('.') {
            ScalarKind::Float
        } else {
            ScalarKind::Int
        };
    }
    for kind in [ScalarKind::IsoDate, ScalarKind::IsoZuluDate, ScalarKind::Rfc822Date] {
        if decode_scalar(kind, text).is_ok() {
            return kind;
        }
    }
    ScalarKind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qn() -> Qname {
        Qname::local("value")
    }

    #[test]
    fn infers_bool_before_numeric() {
        assert_eq!(infer_scalar_kind("yes"), ScalarKind::Bool);
        assert_eq!(infer_scalar_kind("27"), ScalarKind::Int);
        assert_eq!(infer_scalar_kind("1.41421356237"), ScalarKind::Float);
        assert_eq!(infer_scalar_kind("lorem ipsum dolor"), ScalarKind::Text);
    }

    #[test]
    fn infers_date_kinds_in_probe_order() {
        assert_eq!(infer_scalar_kind("2020-12-31"), ScalarKind::IsoDate);
        assert_eq!(infer_scalar_kind("2020-12-31T10:00:00Z"), ScalarKind::IsoZuluDate);
        assert_eq!(infer_scalar_kind("Mon, 16 Nov 2009 13:32:02 +0400"), ScalarKind::Rfc822Date);
    }

    #[test]
    fn int_coder_rejects_non_numeric_instance() {
        let coder = Coder::new(ScalarKind::Int);
        let err = coder.decode(&qn(), "lorem ipsum").unwrap_err();
        assert!(matches!(err, Error::BadScalar { .. }));
    }

    #[test]
    fn iso_date_coder_rejects_rfc822_instance() {
        // Scenario 5: type is fixed at compile time, not re-inferred per instance.
        let coder = Coder::new(ScalarKind::IsoDate);
        let err = coder
            .decode(&qn(), "Mon, 16 Nov 2009 13:32:02 +0400")
            .unwrap_err();
        assert!(matches!(err, Error::BadScalar { .. }));
    }

    #[test]
    fn iso_date_round_trips_bare_date() {
        let coder = Coder::new(ScalarKind::IsoDate);
        let decoded = coder.decode(&qn(), "2020-12-31").unwrap();
        let encoded = coder.encode(&qn(), &decoded).unwrap();
        assert_eq!(encoded, "2020-12-31");
        assert_eq!(coder.decode(&qn(), &encoded).unwrap(), decoded);
    }

    #[test]
    fn iso_date_round_trips_with_offset() {
        let coder = Coder::new(ScalarKind::IsoDate);
        let decoded = coder.decode(&qn(), "2020-12-31T10:15:00+02:00").unwrap();
        let encoded = coder.encode(&qn(), &decoded).unwrap();
        assert_eq!(coder.decode(&qn(), &encoded).unwrap(), decoded);
    }

    #[test]
    fn bool_decode_is_case_insensitive() {
        assert_eq!(decode_bool("YES").unwrap(), true);
        assert_eq!(decode_bool("F").unwrap(), false);
    }

    #[test]
    fn iso_zulu_date_round_trips() {
        let coder = Coder::new(ScalarKind::IsoZuluDate);
        let decoded = coder.decode(&qn(), "2020-12-31T10:15:00Z").unwrap();
        let encoded = coder.encode(&qn(), &decoded).unwrap();
        assert_eq!(encoded, "2020-12-31T10:15:00Z");
        assert_eq!(coder.decode(&qn(), &encoded).unwrap(), decoded);
    }

    #[test]
    fn iso_zulu_date_rejects_missing_z_suffix() {
        let coder = Coder::new(ScalarKind::IsoZuluDate);
        assert!(coder.decode(&qn(), "2020-12-31T10:15:00").is_err());
    }

    #[test]
    fn rfc822_date_round_trips() {
        let coder = Coder::new(ScalarKind::Rfc822Date);
        let decoded = coder.decode(&qn(), "Mon, 16 Nov 2009 13:32:02 +0400").unwrap();
        let encoded = coder.encode(&qn(), &decoded).unwrap();
        assert_eq!(coder.decode(&qn(), &encoded).unwrap(), decoded);
    }

    #[test]
    fn full_date_probe_matrix_locks_expected_kind() {
        // Scenario 9: every probe branch in §4.6 is reachable from its own
        // matching literal.
        let cases = [
            ("2020-12-31", ScalarKind::IsoDate),
            ("2020-12-31T10:15:00", ScalarKind::IsoDate),
            ("2020-12-31 10:15:00", ScalarKind::IsoDate),
            ("2020-12-31T10:15:00+02:00", ScalarKind::IsoDate),
            ("2020-12-31 10:15:00+02:00", ScalarKind::IsoDate),
            ("2020-12-31T10:15:00Z", ScalarKind::IsoZuluDate),
            ("Mon, 16 Nov 2009 13:32:02 +0400", ScalarKind::Rfc822Date),
            ("Mon, 16 Nov 2009 13:32:02 GMT", ScalarKind::Rfc822Date),
        ];
        for (literal, expected) in cases {
            assert_eq!(infer_scalar_kind(literal), expected, "literal {:?}", literal);
            let coder = Coder::new(expected);
            assert!(coder.decode(&qn(), literal).is_ok(), "literal {:?}", literal);
        }
    }
}
