use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::QueryError;
use super::model::{Envelope, Labels, RawEnvelope, RawResultItem, ResultItem, Sample};

const VECTOR_RESULT: &str = "vector";

/// Decodes a raw response body into an [`Envelope`], validating the fields an
/// instant vector response must carry.
pub fn decode_envelope(body: &[u8]) -> Result<Envelope, QueryError> {
    let raw: RawEnvelope = serde_json::from_slice(body)?;

    if raw.status != "success" {
        let message = match raw.error {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => raw
                .error_type
                .unwrap_or_else(|| format!("query failed with status {:?}", raw.status)),
        };
        return Ok(Envelope::Error { message });
    }

    let data = raw
        .data
        .ok_or_else(|| QueryError::InvalidResponse("missing `data` field".to_string()))?;

    if let Some(kind) = data.result_type.as_deref() {
        if kind != VECTOR_RESULT {
            return Err(QueryError::InvalidResponse(format!(
                "unsupported result type `{kind}`, expected `{VECTOR_RESULT}`"
            )));
        }
    }

    let result = data
        .result
        .ok_or_else(|| QueryError::InvalidResponse("missing `data.result` field".to_string()))?;
    let items: Vec<RawResultItem> = serde_json::from_value(result)?;

    Ok(Envelope::Success {
        result: items.into_iter().map(ResultItem::from).collect(),
    })
}

/// Parses an instant query response body.
///
/// Returns `Ok(None)` when the query matched no series at all, which callers
/// must treat differently from a list of samples.
pub fn parse_response(body: &[u8]) -> Result<Option<Vec<Sample>>, QueryError> {
    match decode_envelope(body)? {
        Envelope::Error { message } => Err(QueryError::Backend(message)),
        Envelope::Success { result } if result.is_empty() => Ok(None),
        Envelope::Success { result } => result
            .into_iter()
            .map(Sample::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
    }
}

impl TryFrom<ResultItem> for Sample {
    type Error = QueryError;

    fn try_from(item: ResultItem) -> Result<Self, Self::Error> {
        let labels: Labels = item
            .metric
            .iter()
            .map(|(name, value)| (name.clone(), label_text(value)))
            .collect();

        Ok(Sample {
            labels,
            timestamp: timestamp_from_seconds(item.epoch_seconds)?,
            value: parse_value(&item.value),
        })
    }
}

/// Label values are coerced the way JavaScript's `String()` would: arrays
/// join their elements with `,` and objects become `[object Object]`.
fn label_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number_text(number),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => label_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

fn number_text(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e21 => {
            format!("{float:.0}")
        }
        _ => number.to_string(),
    }
}

/// Sample values arrive as strings and are read like JavaScript's
/// `parseFloat`: the longest numeric prefix wins and anything without one is
/// `NaN`. Prometheus' own `+Inf` and `-Inf` are accepted as exact values.
pub(crate) fn parse_value(value: &Value) -> f64 {
    match value {
        Value::String(text) => parse_float(text),
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn parse_float(text: &str) -> f64 {
    match text.trim() {
        "+Inf" => return f64::INFINITY,
        "-Inf" => return f64::NEG_INFINITY,
        _ => {}
    }

    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    if text[end..].starts_with("Infinity") {
        return if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count()
    };

    let integer = digits(end);
    end += integer;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits(end + 1);
        if integer > 0 || fraction > 0 {
            end += 1 + fraction;
        }
    }
    if integer == 0 && fraction == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = digits(exponent);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }

    text[..end].parse().unwrap_or(f64::NAN)
}

/// Whole milliseconds, truncated toward zero like a JavaScript `Date`.
fn timestamp_from_seconds(seconds: f64) -> Result<DateTime<Utc>, QueryError> {
    let millis = (seconds * 1000.0).trunc();
    if !millis.is_finite() {
        return Err(QueryError::InvalidResponse(format!(
            "sample timestamp {seconds} is not a finite number"
        )));
    }
    DateTime::from_timestamp_millis(millis as i64).ok_or_else(|| {
        QueryError::InvalidResponse(format!("sample timestamp {seconds} is out of range"))
    })
}
