use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Value of a listing field as exchanged with the marketplace API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Blank text and non-finite numbers carry no information.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Number(number) => !number.is_finite(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(_) => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One merged field returned by a lookup or a resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub field_name: String,
    #[serde(default)]
    pub field_value: Option<FieldValue>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_timestamp: Option<String>,
    #[serde(default)]
    pub is_certified: bool,
}

impl FieldResult {
    pub fn certified(
        field_name: impl Into<String>,
        value: impl Into<FieldValue>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: Some(value.into()),
            source: Some(source.into()),
            source_timestamp: None,
            is_certified: true,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.source_timestamp = Some(timestamp.into());
        self
    }
}
