use crate::api::AppError;
use crate::binding::model::BindingError;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Builder)]
pub struct InvocationRequest {
    #[builder(into)]
    pub interface_id: String,
    /// Merged over the bound header parameters; names outside the schema pass through verbatim.
    #[builder(default)]
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[builder(default)]
    #[serde(default)]
    pub url_params: HashMap<String, Value>,
    #[builder(default)]
    #[serde(default)]
    pub body_params: HashMap<String, Value>,
    /// Seconds.
    pub timeout: Option<u64>,
    pub remark: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Actor { id: id.into(), name }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("user {}", self.id))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InvocationResult {
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub extracted_value: Option<String>,
    pub elapsed_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Reasons an invocation is rejected before any request is sent. None of these are recorded.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("interface {0} not found")]
    NotFound(String),
    #[error("interface {0} is disabled")]
    Disabled(String),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<InvocationError> for AppError {
    fn from(error: InvocationError) -> Self {
        match error {
            InvocationError::NotFound(_) => AppError::NotFound(error.to_string()),
            InvocationError::Disabled(_) => AppError::Forbidden(error.to_string()),
            InvocationError::Binding(BindingError::Missing { .. }) => AppError::Validation(error.to_string()),
            InvocationError::Binding(BindingError::Coercion { .. }) => AppError::Processing(error.to_string()),
            InvocationError::Store(app_error) => app_error,
        }
    }
}
