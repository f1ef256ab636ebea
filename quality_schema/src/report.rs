use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Three-level categorical quality signal.
///
/// The numeric codes are fixed by the report service: 1 is red, 2 is yellow,
/// 3 is green. Nothing in the viewer derives a label from a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Red,
    Yellow,
    Green,
}

impl TrafficLight {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TrafficLight::Red),
            2 => Some(TrafficLight::Yellow),
            3 => Some(TrafficLight::Green),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TrafficLight::Red => 1,
            TrafficLight::Yellow => 2,
            TrafficLight::Green => 3,
        }
    }

    /// Asset key of the traffic-light image shown for this label.
    pub fn image_key(self) -> &'static str {
        match self {
            TrafficLight::Red => "traffic_light_red",
            TrafficLight::Yellow => "traffic_light_yellow",
            TrafficLight::Green => "traffic_light_green",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficLight::Red => "red",
            TrafficLight::Yellow => "yellow",
            TrafficLight::Green => "green",
        }
    }
}

impl fmt::Display for TrafficLight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label as it appears on the wire. Numeric codes are canonical; some fixtures
/// carry the code as a string or the color name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LabelPayload {
    Code(i64),
    Text(String),
}

impl LabelPayload {
    fn resolve(&self) -> Option<TrafficLight> {
        match self {
            LabelPayload::Code(code) => TrafficLight::from_code(*code),
            LabelPayload::Text(text) => {
                let trimmed = text.trim();
                if let Ok(code) = trimmed.parse::<i64>() {
                    return TrafficLight::from_code(code);
                }
                match trimmed.to_ascii_lowercase().as_str() {
                    "red" => Some(TrafficLight::Red),
                    "yellow" => Some(TrafficLight::Yellow),
                    "green" => Some(TrafficLight::Green),
                    _ => None,
                }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            LabelPayload::Code(code) => code.to_string(),
            LabelPayload::Text(text) => format!("{text:?}"),
        }
    }
}

/// Response document returned by `<endpoint>/dynamic_report/<name>`.
///
/// Every field is optional here so that a document with holes still decodes;
/// [`Report::from_response`] decides whether it is complete enough to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<IndicatorPayload>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultPayload {
    #[serde(default)]
    pub label: Option<LabelPayload>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorPayload {
    #[serde(default)]
    pub metadata: Option<IndicatorMetadataPayload>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub label: Option<LabelPayload>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorMetadataPayload {
    #[serde(default)]
    pub name: Option<String>,
}

/// A response that decoded but cannot be rendered as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderInconsistency {
    #[error("report is missing required field `{0}`")]
    MissingField(String),
    #[error("field `{field}` carries unknown traffic-light label {raw}")]
    InvalidLabel { field: String, raw: String },
}

#[derive(Debug, Error)]
pub enum ReportDecodeError {
    #[error("report document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Inconsistent(#[from] RenderInconsistency),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallResult {
    pub label: TrafficLight,
    pub value: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub metadata_name: String,
    pub value: f64,
    pub label: TrafficLight,
    pub text: String,
}

/// Fully validated quality report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub overall: OverallResult,
    pub indicators: Vec<Indicator>,
}

impl Report {
    /// Decode a response body and validate it in one step.
    pub fn parse_json(body: &str) -> Result<Self, ReportDecodeError> {
        let response: ReportResponse = serde_json::from_str(body)?;
        Ok(Report::from_response(response)?)
    }

    /// Validate a decoded response. A missing `indicators` key is read as an
    /// empty list; anything missing from `result` or from an individual
    /// indicator rejects the whole document.
    pub fn from_response(response: ReportResponse) -> Result<Self, RenderInconsistency> {
        let result = response
            .result
            .ok_or_else(|| RenderInconsistency::MissingField("result".to_string()))?;
        let overall = OverallResult {
            label: required_label(result.label.as_ref(), "result.label")?,
            value: required(result.value, "result.value")?,
            text: required(result.text, "result.text")?,
        };

        let indicators = response
            .indicators
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, payload)| indicator_from_payload(index, payload))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Report {
            overall,
            indicators,
        })
    }
}

fn indicator_from_payload(
    index: usize,
    payload: IndicatorPayload,
) -> Result<Indicator, RenderInconsistency> {
    let metadata_name = payload
        .metadata
        .and_then(|metadata| metadata.name)
        .ok_or_else(|| {
            RenderInconsistency::MissingField(format!("indicators[{index}].metadata.name"))
        })?;
    Ok(Indicator {
        metadata_name,
        value: required(payload.value, &format!("indicators[{index}].value"))?,
        label: required_label(payload.label.as_ref(), &format!("indicators[{index}].label"))?,
        text: required(payload.text, &format!("indicators[{index}].text"))?,
    })
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, RenderInconsistency> {
    value.ok_or_else(|| RenderInconsistency::MissingField(field.to_string()))
}

fn required_label(
    label: Option<&LabelPayload>,
    field: &str,
) -> Result<TrafficLight, RenderInconsistency> {
    let payload = label.ok_or_else(|| RenderInconsistency::MissingField(field.to_string()))?;
    payload
        .resolve()
        .ok_or_else(|| RenderInconsistency::InvalidLabel {
            field: field.to_string(),
            raw: payload.describe(),
        })
}

pub fn report_response_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ReportResponse)
}
