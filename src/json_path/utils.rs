use crate::json_path::model::Expression;
use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::warn;

pub fn evaluate_expression(context: &Value, exp: &Expression) -> Result<Vec<Value>, String> {
    let json_path = JsonPath::parse(&exp.normalized()).map_err(|err| err.to_string())?;
    Ok(json_path.query(context).all().into_iter().cloned().collect())
}

/// Pulls the configured value out of a response body. Extraction never fails the call:
/// unparseable bodies, bad expressions and unmatched paths all yield `None`.
pub fn extract_value(body: &str, expression: Option<&Expression>) -> Option<String> {
    let expression = expression.filter(|exp| !exp.is_blank())?;
    let context: Value = match serde_json::from_str(body) {
        Ok(context) => context,
        Err(err) => {
            warn!("response is not json, skipping extraction of {}: {}", expression.value, err);
            return None;
        }
    };
    let mut nodes = match evaluate_expression(&context, expression) {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!("invalid extraction path {}: {}", expression.value, err);
            return None;
        }
    };
    match nodes.len() {
        0 => None,
        1 => as_text(nodes.remove(0)),
        _ => Some(Value::Array(nodes).to_string()),
    }
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        structure => Some(structure.to_string()),
    }
}
