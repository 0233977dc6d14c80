use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const SIZE_LABELS: [&str; 4] = ["S", "M", "L", "XL"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TechPackError {
    #[error("tech pack response was empty")]
    Empty,
    #[error("tech pack response is not valid JSON for the schema: {0}")]
    Malformed(String),
    #[error("tech pack has no bill of materials rows")]
    EmptyBom,
    #[error("bill of materials row {row} has an empty {field}")]
    EmptyBomField { row: usize, field: &'static str },
    #[error("tech pack has no measurement rows")]
    EmptyMeasurements,
    #[error("measurement row {row} has an empty point of measure")]
    EmptyMeasurementPoint { row: usize },
}

/// Structured manufacturing spec attached to a single design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechPack {
    pub bom: Vec<BomItem>,
    pub measurements: Vec<Measurement>,
    pub construction_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    pub component: String,
    pub material: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,
    pub sizes: SizeChart,
}

/// Graded values for the fixed size run. Unknown size keys in a response are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeChart {
    #[serde(rename = "S", deserialize_with = "string_or_number")]
    pub s: String,
    #[serde(rename = "M", deserialize_with = "string_or_number")]
    pub m: String,
    #[serde(rename = "L", deserialize_with = "string_or_number")]
    pub l: String,
    #[serde(rename = "XL", deserialize_with = "string_or_number")]
    pub xl: String,
}

impl SizeChart {
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("S", self.s.as_str()),
            ("M", self.m.as_str()),
            ("L", self.l.as_str()),
            ("XL", self.xl.as_str()),
        ]
    }
}

impl TechPack {
    /// Parses the service's structured text and enforces the required fields.
    pub fn from_response_text(raw: &str) -> Result<Self, TechPackError> {
        let trimmed = strip_code_fence(raw.trim());
        if trimmed.is_empty() {
            return Err(TechPackError::Empty);
        }
        let parsed: TechPack = serde_json::from_str(trimmed)
            .map_err(|err| TechPackError::Malformed(err.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), TechPackError> {
        if self.bom.is_empty() {
            return Err(TechPackError::EmptyBom);
        }
        for (row, item) in self.bom.iter().enumerate() {
            let fields = [
                ("component", &item.component),
                ("material", &item.material),
                ("details", &item.details),
            ];
            for (field, value) in fields {
                if value.trim().is_empty() {
                    return Err(TechPackError::EmptyBomField { row, field });
                }
            }
        }
        if self.measurements.is_empty() {
            return Err(TechPackError::EmptyMeasurements);
        }
        for (row, measurement) in self.measurements.iter().enumerate() {
            if measurement.point.trim().is_empty() {
                return Err(TechPackError::EmptyMeasurementPoint { row });
            }
        }
        Ok(())
    }
}

/// Output schema declared to the service for spec extraction.
pub fn tech_pack_response_schema() -> Value {
    let size_properties = SIZE_LABELS
        .iter()
        .map(|label| ((*label).to_string(), json!({ "type": "STRING" })))
        .collect::<serde_json::Map<String, Value>>();
    json!({
        "type": "OBJECT",
        "properties": {
            "bom": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "component": { "type": "STRING" },
                        "material": { "type": "STRING" },
                        "details": { "type": "STRING" }
                    },
                    "required": ["component", "material", "details"]
                }
            },
            "measurements": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "point": { "type": "STRING" },
                        "tolerance": { "type": "STRING" },
                        "sizes": {
                            "type": "OBJECT",
                            "properties": size_properties,
                            "required": SIZE_LABELS
                        }
                    },
                    "required": ["point", "sizes"]
                }
            },
            "constructionNotes": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            }
        },
        "required": ["bom", "measurements", "constructionNotes"]
    })
}

// Models occasionally wrap JSON mode output in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a size value, got {other}"
        ))),
    }
}
