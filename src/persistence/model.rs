use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

/// Accumulates `AND`-joined conditions with their placeholder names and values,
/// ready to hand to a query or scan builder.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ConditionSet {
    conditions: Vec<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `#attribute <operator> :placeholder`. The placeholder must be unique within the set.
    pub fn compare(
        mut self,
        attribute: &str,
        operator: &str,
        placeholder: &str,
        value: AttributeValue,
    ) -> Self {
        let name_key = format!("#{}", attribute);
        let value_key = format!(":{}", placeholder);
        self.conditions
            .push(format!("{} {} {}", name_key, operator, value_key));
        self.names.insert(name_key, attribute.to_string());
        self.values.insert(value_key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn expression(&self) -> Option<String> {
        if self.conditions.is_empty() {
            None
        } else {
            Some(self.conditions.join(" AND "))
        }
    }

    pub fn names(&self) -> Option<HashMap<String, String>> {
        Some(self.names.clone()).filter(|names| !names.is_empty())
    }

    pub fn values(&self) -> Option<HashMap<String, AttributeValue>> {
        Some(self.values.clone()).filter(|values| !values.is_empty())
    }

    /// Merges another set's placeholders without adding its conditions. Used when the other
    /// set becomes a key condition rather than a filter.
    pub fn with_placeholders_of(mut self, other: &ConditionSet) -> Self {
        self.names.extend(other.names.clone());
        self.values.extend(other.values.clone());
        self
    }
}
