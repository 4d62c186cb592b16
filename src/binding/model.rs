use crate::interface::model::{DataType, ParamKind};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A parameter value after coercion to its declared data type.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    /// ISO-8601 text, kept exactly as submitted.
    Date(String),
    /// ISO-8601 text, kept exactly as submitted.
    DateTime(String),
    Json(Value),
}

impl ParamValue {
    /// Native JSON form, used for JSON request bodies and for the audit record.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::String(text) | ParamValue::Date(text) | ParamValue::DateTime(text) => {
                Value::String(text.clone())
            }
            ParamValue::Integer(number) => Value::from(*number),
            ParamValue::Long(number) => Value::from(*number),
            ParamValue::Double(number) => Number::from_f64(*number).map_or(Value::Null, Value::Number),
            ParamValue::Boolean(flag) => Value::Bool(*flag),
            ParamValue::Json(value) => value.clone(),
        }
    }

    /// Text form, used for query strings, headers and form bodies.
    pub fn to_text(&self) -> String {
        match self {
            ParamValue::String(text) | ParamValue::Date(text) | ParamValue::DateTime(text) => text.clone(),
            ParamValue::Integer(number) => number.to_string(),
            ParamValue::Long(number) => number.to_string(),
            ParamValue::Double(number) => number.to_string(),
            ParamValue::Boolean(flag) => flag.to_string(),
            ParamValue::Json(Value::String(text)) => text.clone(),
            ParamValue::Json(value) => value.to_string(),
        }
    }
}

pub type BoundValues = BTreeMap<String, ParamValue>;

/// Output of binding, partitioned by where each value goes in the request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundParams {
    pub url: BoundValues,
    pub headers: BoundValues,
    pub body: BoundValues,
}

impl BoundParams {
    pub fn target_mut(&mut self, kind: ParamKind) -> &mut BoundValues {
        match kind {
            ParamKind::UrlParam => &mut self.url,
            ParamKind::HeaderParam => &mut self.headers,
            ParamKind::BodyParam => &mut self.body,
        }
    }
}

pub fn to_json_object(values: &BoundValues) -> Value {
    let object: Map<String, Value> = values
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    Value::Object(object)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("{kind} {name} is required")]
    Missing { name: String, kind: ParamKind },
    #[error("{kind} {name} expects {expected}: {reason}")]
    Coercion {
        name: String,
        kind: ParamKind,
        expected: DataType,
        reason: String,
    },
}
