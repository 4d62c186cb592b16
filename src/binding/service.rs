use crate::binding::model::{BindingError, BoundParams, ParamValue};
use crate::interface::model::{ApiInterface, ApiParam, DataType, ParamKind};
use crate::invocation::model::InvocationRequest;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

const PARAM_KINDS: [ParamKind; 3] = [ParamKind::UrlParam, ParamKind::HeaderParam, ParamKind::BodyParam];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Merges schema defaults with the caller's values and coerces each to its declared type.
/// Pure: no I/O happens here.
pub fn bind(interface: &ApiInterface, request: &InvocationRequest) -> Result<BoundParams, BindingError> {
    let mut bound = BoundParams::default();
    for kind in PARAM_KINDS {
        for param in interface.params_of(kind) {
            let supplied = supplied_value(param, request);
            let chosen = if param.changeable {
                supplied.filter(is_present).or_else(|| default_value(param))
            } else {
                if supplied.is_some() {
                    debug!("ignoring caller value for locked {} {}", param.kind, param.name);
                }
                default_value(param)
            };
            match chosen {
                Some(raw) => {
                    let value = coerce(param, &raw)?;
                    bound.target_mut(kind).insert(param.name.clone(), value);
                }
                None if param.required => {
                    return Err(BindingError::Missing {
                        name: param.display_name(),
                        kind,
                    })
                }
                None => {}
            }
        }
    }
    log_undeclared(interface, request);
    Ok(bound)
}

pub fn coerce(param: &ApiParam, raw: &Value) -> Result<ParamValue, BindingError> {
    let failure = |reason: String| BindingError::Coercion {
        name: param.display_name(),
        kind: param.kind,
        expected: param.data_type,
        reason,
    };
    match param.data_type {
        DataType::String => match raw {
            Value::String(text) => Ok(ParamValue::String(text.clone())),
            Value::Number(number) => Ok(ParamValue::String(number.to_string())),
            Value::Bool(flag) => Ok(ParamValue::String(flag.to_string())),
            other => Err(failure(format!("got {}", describe(other)))),
        },
        DataType::Integer => parse_whole::<i32>(raw).map(ParamValue::Integer).map_err(failure),
        DataType::Long => parse_whole::<i64>(raw).map(ParamValue::Long).map_err(failure),
        DataType::Double => {
            let number = match raw {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            match number {
                Some(number) if number.is_finite() => Ok(ParamValue::Double(number)),
                _ => Err(failure(format!("{} is not a decimal number", describe(raw)))),
            }
        }
        DataType::Boolean => match raw {
            Value::Bool(flag) => Ok(ParamValue::Boolean(*flag)),
            Value::String(text) if text.trim().eq_ignore_ascii_case("true") => Ok(ParamValue::Boolean(true)),
            Value::String(text) if text.trim().eq_ignore_ascii_case("false") => Ok(ParamValue::Boolean(false)),
            other => Err(failure(format!("{} is not true or false", describe(other)))),
        },
        DataType::Date => match raw {
            Value::String(text) if NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_ok() => {
                Ok(ParamValue::Date(text.trim().to_string()))
            }
            other => Err(failure(format!("{} is not an ISO-8601 date", describe(other)))),
        },
        DataType::Datetime => match raw {
            Value::String(text) if is_datetime(text.trim()) => Ok(ParamValue::DateTime(text.trim().to_string())),
            other => Err(failure(format!("{} is not an ISO-8601 date-time", describe(other)))),
        },
        DataType::Json => match raw {
            Value::String(text) => serde_json::from_str::<Value>(text)
                .map(ParamValue::Json)
                .map_err(|err| failure(format!("invalid json text: {}", err))),
            structure => Ok(ParamValue::Json(structure.clone())),
        },
    }
}

fn supplied_value(param: &ApiParam, request: &InvocationRequest) -> Option<Value> {
    match param.kind {
        ParamKind::UrlParam => request.url_params.get(&param.name).cloned(),
        ParamKind::BodyParam => request.body_params.get(&param.name).cloned(),
        ParamKind::HeaderParam => request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&param.name))
            .map(|(_, value)| Value::String(value.clone())),
    }
}

/// The schema default, unless it is null or blank.
pub fn default_value(param: &ApiParam) -> Option<Value> {
    param.default_value.clone().filter(is_present)
}

/// Null and blank text count as "not supplied".
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

fn parse_whole<T>(raw: &Value) -> Result<T, String>
where
    T: FromStr + TryFrom<i64>,
{
    match raw {
        Value::Number(number) => number
            .as_i64()
            .and_then(|whole| T::try_from(whole).ok())
            .ok_or_else(|| format!("{} is not a whole number in range", number)),
        Value::String(text) => text
            .trim()
            .parse::<T>()
            .map_err(|_| format!("\"{}\" is not a whole number in range", text)),
        other => Err(format!("got {}", describe(other))),
    }
}

fn is_datetime(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => format!("\"{}\"", text),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

fn log_undeclared(interface: &ApiInterface, request: &InvocationRequest) {
    for name in request.url_params.keys() {
        if interface.find_param(ParamKind::UrlParam, name).is_none() {
            debug!("dropping undeclared url parameter {} for interface {}", name, interface.id);
        }
    }
    for name in request.body_params.keys() {
        if interface.find_param(ParamKind::BodyParam, name).is_none() {
            debug!("dropping undeclared body parameter {} for interface {}", name, interface.id);
        }
    }
}
