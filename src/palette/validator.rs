//! Candidate palette validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! ```text
//! shape (schema table) → durations → color count → allow-list
//! ```
//!
//! The structural pass is driven by [`PALETTE_SCHEMA`] rather than per-field
//! code, so adding a field means adding a row.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::palette::model::Palette;
use crate::palette::rules::PaletteRules;

/// Primitive shape a payload field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    StringList,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Integer => matches!(value, Value::Number(n) if n.is_i64() || n.is_u64()),
            FieldKind::StringList => matches!(
                value,
                Value::Array(items) if items.iter().all(Value::is_string)
            ),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldKind::Integer => "an integer",
            FieldKind::StringList => "a list of strings",
        }
    }
}

/// One row of the payload schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const DISPLAY_DURATION: &str = "display_duration_ms";
pub const FADEOUT_DURATION: &str = "fadeout_duration_ms";
pub const COLORS: &str = "colors";

/// Required payload fields, in the order they are checked.
pub const PALETTE_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: DISPLAY_DURATION,
        kind: FieldKind::Integer,
    },
    FieldSpec {
        name: FADEOUT_DURATION,
        kind: FieldKind::Integer,
    },
    FieldSpec {
        name: COLORS,
        kind: FieldKind::StringList,
    },
];

/// Structural problems with a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("Could not parse body as JSON.")]
    NotJson,

    #[error("Payload must be a JSON object.")]
    NotAnObject,

    #[error("Expected key missing: {0}")]
    MissingField(&'static str),

    #[error("{field} must be {expected}.")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Unexpected key: {0}")]
    UnexpectedField(String),
}

/// Why a candidate palette was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    MalformedPayload(#[from] Malformed),

    #[error("{subject} must be in the range [{min}, {max}]. Received: {received}")]
    OutOfRangeValue {
        subject: String,
        min: i64,
        max: i64,
        received: String,
    },

    #[error("Unrecognized color: {0}")]
    UnrecognizedColor(String),
}

/// Validate a raw request body.
///
/// Parse failures are reported through the same channel as any other
/// malformed payload.
pub fn validate_bytes(body: &[u8], rules: &PaletteRules) -> Result<Palette, Rejection> {
    let payload: Value = serde_json::from_slice(body).map_err(|_| Malformed::NotJson)?;
    validate(&payload, rules)
}

/// Validate an already-parsed payload. Total over every JSON value.
pub fn validate(payload: &Value, rules: &PaletteRules) -> Result<Palette, Rejection> {
    let fields = check_shape(payload)?;

    let display_duration_ms = checked_duration(fields, DISPLAY_DURATION, rules)?;
    let fadeout_duration_ms = checked_duration(fields, FADEOUT_DURATION, rules)?;

    let raw_colors = string_list(fields, COLORS);
    if !rules.color_count_in_range(raw_colors.len()) {
        return Err(Rejection::OutOfRangeValue {
            subject: "Number of colors".to_string(),
            min: rules.min_colors as i64,
            max: rules.max_colors as i64,
            received: raw_colors.len().to_string(),
        });
    }

    let mut colors = Vec::with_capacity(raw_colors.len());
    for color in raw_colors {
        let normalized = color.to_ascii_uppercase();
        if !rules.allows(&normalized) {
            return Err(Rejection::UnrecognizedColor(normalized));
        }
        colors.push(normalized);
    }

    Ok(Palette {
        colors,
        display_duration_ms,
        fadeout_duration_ms,
    })
}

fn check_shape(payload: &Value) -> Result<&Map<String, Value>, Malformed> {
    let fields = payload.as_object().ok_or(Malformed::NotAnObject)?;

    for spec in PALETTE_SCHEMA {
        if !fields.contains_key(spec.name) {
            return Err(Malformed::MissingField(spec.name));
        }
    }

    for spec in PALETTE_SCHEMA {
        if !spec.kind.matches(&fields[spec.name]) {
            return Err(Malformed::WrongType {
                field: spec.name,
                expected: spec.kind.describe(),
            });
        }
    }

    let mut unexpected: Vec<&String> = fields
        .keys()
        .filter(|k| !PALETTE_SCHEMA.iter().any(|spec| spec.name == k.as_str()))
        .collect();
    unexpected.sort();
    if let Some(key) = unexpected.first() {
        return Err(Malformed::UnexpectedField((*key).clone()));
    }

    Ok(fields)
}

fn checked_duration(
    fields: &Map<String, Value>,
    field: &'static str,
    rules: &PaletteRules,
) -> Result<u32, Rejection> {
    let value = &fields[field];
    let in_range = value
        .as_i64()
        .filter(|ms| rules.duration_in_range(*ms))
        .and_then(|ms| u32::try_from(ms).ok());

    in_range.ok_or_else(|| Rejection::OutOfRangeValue {
        subject: format!("'{}'", field),
        min: i64::from(rules.min_duration_ms),
        max: i64::from(rules.max_duration_ms),
        received: value.to_string(),
    })
}

fn string_list<'a>(fields: &'a Map<String, Value>, field: &str) -> Vec<&'a str> {
    fields[field]
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> PaletteRules {
        PaletteRules::default()
    }

    #[test]
    fn test_accepts_valid_payload_and_uppercases() {
        let payload = json!({
            "colors": ["ff0000", "00FF00"],
            "display_duration_ms": 0,
            "fadeout_duration_ms": 4000,
        });
        let palette = validate(&payload, &rules()).unwrap();
        assert_eq!(palette.colors, vec!["FF0000", "00FF00"]);
        assert_eq!(palette.display_duration_ms, 0);
        assert_eq!(palette.fadeout_duration_ms, 4000);
    }

    #[test]
    fn test_rejects_unparseable_body() {
        let err = validate_bytes(b"{not json", &rules()).unwrap_err();
        assert_eq!(err, Rejection::MalformedPayload(Malformed::NotJson));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = validate(&json!([1, 2, 3]), &rules()).unwrap_err();
        assert_eq!(err, Rejection::MalformedPayload(Malformed::NotAnObject));
    }

    #[test]
    fn test_missing_field_wins_over_range_violation() {
        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": 999999,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(
            err,
            Rejection::MalformedPayload(Malformed::MissingField(FADEOUT_DURATION))
        );
        assert_eq!(err.to_string(), "Expected key missing: fadeout_duration_ms");
    }

    #[test]
    fn test_wrong_shapes() {
        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": 10.5,
            "fadeout_duration_ms": 10,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(err.to_string(), "display_duration_ms must be an integer.");

        let payload = json!({
            "colors": "000000",
            "display_duration_ms": 10,
            "fadeout_duration_ms": 10,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(err.to_string(), "colors must be a list of strings.");

        let payload = json!({
            "colors": ["000000", 7],
            "display_duration_ms": 10,
            "fadeout_duration_ms": 10,
        });
        assert!(matches!(
            validate(&payload, &rules()),
            Err(Rejection::MalformedPayload(Malformed::WrongType { field: COLORS, .. }))
        ));
    }

    #[test]
    fn test_extra_field_rejected() {
        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": 10,
            "fadeout_duration_ms": 10,
            "zz_extra": true,
            "brightness": 3,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected key: brightness");
    }

    #[test]
    fn test_duration_out_of_range() {
        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": 100,
            "fadeout_duration_ms": 4001,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'fadeout_duration_ms' must be in the range [0, 4000]. Received: 4001"
        );

        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": -1,
            "fadeout_duration_ms": 100,
        });
        assert!(matches!(
            validate(&payload, &rules()),
            Err(Rejection::OutOfRangeValue { .. })
        ));

        let payload = json!({
            "colors": ["000000"],
            "display_duration_ms": u64::MAX,
            "fadeout_duration_ms": 100,
        });
        assert!(matches!(
            validate(&payload, &rules()),
            Err(Rejection::OutOfRangeValue { .. })
        ));
    }

    #[test]
    fn test_color_count_bounds() {
        let payload = json!({
            "colors": [],
            "display_duration_ms": 500,
            "fadeout_duration_ms": 500,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Number of colors must be in the range [1, 10]. Received: 0"
        );

        let payload = json!({
            "colors": vec!["000000"; 11],
            "display_duration_ms": 500,
            "fadeout_duration_ms": 500,
        });
        assert!(matches!(
            validate(&payload, &rules()),
            Err(Rejection::OutOfRangeValue { .. })
        ));
    }

    #[test]
    fn test_unrecognized_color_names_first_offender() {
        let payload = json!({
            "colors": ["000000", "gggggg", "123456"],
            "display_duration_ms": 500,
            "fadeout_duration_ms": 500,
        });
        let err = validate(&payload, &rules()).unwrap_err();
        assert_eq!(err, Rejection::UnrecognizedColor("GGGGGG".into()));
        assert_eq!(err.to_string(), "Unrecognized color: GGGGGG");
    }

    #[test]
    fn test_configured_bounds_apply() {
        let custom = PaletteRules {
            supported_colors: vec!["123456".into()],
            min_colors: 2,
            max_colors: 3,
            min_duration_ms: 100,
            max_duration_ms: 15000,
        };
        let payload = json!({
            "colors": ["123456", "123456"],
            "display_duration_ms": 15000,
            "fadeout_duration_ms": 100,
        });
        assert!(validate(&payload, &custom).is_ok());
        assert!(validate(&payload, &rules()).is_err());
    }
}
