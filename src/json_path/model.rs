use serde::{Deserialize, Serialize};

/// A JSONPath expression as configured on an interface, e.g. `$.data.items[0].id`.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(transparent)]
pub struct Expression {
    pub value: String,
}

impl Expression {
    pub fn new(value: impl Into<String>) -> Self {
        Expression {
            value: value.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Accepts the `data.id` shorthand by rooting it at `$`.
    pub fn normalized(&self) -> String {
        let trimmed = self.value.trim();
        if trimmed.starts_with('$') {
            trimmed.to_string()
        } else if trimmed.starts_with('[') {
            format!("${}", trimmed)
        } else {
            format!("$.{}", trimmed)
        }
    }
}
