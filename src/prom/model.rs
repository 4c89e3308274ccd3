use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Label name to label value, identifying one time series.
pub type Labels = BTreeMap<String, String>;

/// One observation taken from an instant query response.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success { result: Vec<ResultItem> },
    Error { message: String },
}

/// One series of an instant vector, before conversion into a [`Sample`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub metric: Map<String, Value>,
    pub epoch_seconds: f64,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEnvelope {
    pub status: String,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawData {
    #[serde(rename = "resultType", default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawResultItem {
    #[serde(default)]
    pub metric: Map<String, Value>,
    pub value: (f64, Value),
}

impl From<RawResultItem> for ResultItem {
    fn from(raw: RawResultItem) -> Self {
        let (epoch_seconds, value) = raw.value;
        ResultItem {
            metric: raw.metric,
            epoch_seconds,
            value,
        }
    }
}
