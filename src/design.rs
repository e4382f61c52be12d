//! Circuit design payload as produced by the upstream design service.
//!
//! The service emits snake_case JSON (`circuit_info`, `signal_flow`,
//! `from_block`); camelCase spellings are accepted too. Everything beyond
//! `blocks` and `signal_flow` is optional and defaults to empty.

use crate::error::DesignError;
use crate::graph::Position;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitDesign {
    #[serde(default, alias = "circuit_info", alias = "circuitInfo")]
    pub info: CircuitInfo,
    pub blocks: Vec<BlockSpec>,
    #[serde(alias = "signalFlow")]
    pub signal_flow: Vec<Connection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, alias = "supplyVoltage", skip_serializing_if = "Option::is_none")]
    pub supply_voltage: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(
        default,
        alias = "main_components",
        alias = "mainComponents",
        deserialize_with = "null_as_default"
    )]
    pub components: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<Port>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<Port>,
    #[serde(default, alias = "howItWorks", skip_serializing_if = "Option::is_none")]
    pub how_it_works: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<String>,
    #[serde(default, alias = "testPoints", deserialize_with = "null_as_default")]
    pub test_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub troubleshooting: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alternatives: Vec<Alternative>,
    /// Placement suggested by the design service. Carried as payload only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl BlockSpec {
    /// Identifier connections use to address this block.
    ///
    /// Falls back to `block-<index>` when the payload carries no id.
    pub fn key(&self, index: usize) -> Cow<'_, str> {
        match self.explicit_id() {
            Some(id) => Cow::Borrowed(id),
            None => Cow::Owned(format!("block-{index}")),
        }
    }

    /// The declared id, trimmed; `None` when missing or blank.
    pub fn explicit_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn display_name(&self, index: usize) -> Cow<'_, str> {
        if self.name.trim().is_empty() {
            self.key(index)
        } else {
            Cow::Borrowed(self.name.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default, alias = "signalType")]
    pub signal_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pros: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cons: Vec<String>,
}

/// Parameter value (`"gain": "20dB"`, `"cutoff_hz": 1000`). Lists and
/// objects are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Null,
    Other(serde_json::Value),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(value) => write!(f, "{value}"),
            ParameterValue::Number(value) => write!(f, "{value}"),
            ParameterValue::Text(value) => f.write_str(value),
            ParameterValue::Null => f.write_str("-"),
            ParameterValue::Other(value) => write!(f, "{value}"),
        }
    }
}

/// One declared signal-flow entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, alias = "signalType", deserialize_with = "null_as_default")]
    pub signal_type: String,
    #[serde(
        default,
        alias = "fromBlock",
        alias = "source",
        deserialize_with = "null_as_default"
    )]
    pub from_block: String,
    #[serde(default, alias = "fromPort", alias = "sourcePort", skip_serializing_if = "Option::is_none")]
    pub from_port: Option<PortRef>,
    #[serde(
        default,
        alias = "toBlock",
        alias = "target",
        deserialize_with = "null_as_default"
    )]
    pub to_block: String,
    #[serde(default, alias = "toPort", alias = "targetPort", skip_serializing_if = "Option::is_none")]
    pub to_port: Option<PortRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reference to a port inside a block: by name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Index(idx) => write!(f, "#{idx}"),
            PortRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl CircuitDesign {
    /// Parse a design payload, accepting JSON5 when strict JSON fails.
    pub fn from_json(input: &str) -> Result<Self, DesignError> {
        let value = match serde_json::from_str::<serde_json::Value>(input) {
            Ok(value) => value,
            Err(err) => json5::from_str::<serde_json::Value>(input)
                .map_err(|_| DesignError::Parse(err.to_string()))?,
        };
        Self::from_value(value)
    }

    /// Build a design from an already-decoded JSON value.
    ///
    /// Each top-level field is decoded on its own so errors name the field
    /// that failed.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DesignError> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(DesignError::NotAnObject(json_kind(&value)));
        };

        let info = match take_field(&mut map, &["circuit_info", "circuitInfo", "info"]) {
            Some((field, raw)) => decode_field::<CircuitInfo>(field, raw)?,
            None => CircuitInfo::default(),
        };
        let (field, raw) =
            take_field(&mut map, &["blocks"]).ok_or(DesignError::MissingField("blocks"))?;
        let blocks = decode_field::<Vec<BlockSpec>>(field, raw)?;
        let (field, raw) = take_field(&mut map, &["signal_flow", "signalFlow"])
            .ok_or(DesignError::MissingField("signal_flow"))?;
        let signal_flow = decode_field::<Vec<Connection>>(field, raw)?;

        Ok(Self {
            info,
            blocks,
            signal_flow,
        })
    }
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn take_field(
    map: &mut serde_json::Map<String, serde_json::Value>,
    names: &[&'static str],
) -> Option<(&'static str, serde_json::Value)> {
    names.iter().find_map(|name| match map.remove(*name) {
        Some(serde_json::Value::Null) | None => None,
        Some(value) => Some((*name, value)),
    })
}

fn decode_field<T: serde::de::DeserializeOwned>(
    field: &str,
    raw: serde_json::Value,
) -> Result<T, DesignError> {
    serde_json::from_value(raw).map_err(|err| DesignError::InvalidField {
        field: field.to_string(),
        message: err.to_string(),
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Pull the outermost JSON object out of a free-text model response.
pub fn extract_design_json(text: &str) -> Result<&str, DesignError> {
    let start = text.find('{').ok_or(DesignError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(DesignError::NoJsonObject)?;
    if end < start {
        return Err(DesignError::NoJsonObject);
    }
    Ok(&text[start..=end])
}
