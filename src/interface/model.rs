use crate::api::AppError;
use crate::binding::service::{coerce, default_value};
use crate::clock::now_millis;
use crate::http::{HttpMethod, MAX_TIMEOUT_SECS};
use crate::json_path::model::Expression;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// How body parameters are encoded for POST/PUT/PATCH.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BodyKind {
    #[default]
    #[serde(rename = "application/json", alias = "json")]
    Json,
    #[serde(rename = "application/x-www-form-urlencoded", alias = "form-urlencoded")]
    FormUrlEncoded,
}

impl BodyKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyKind::Json => "application/json",
            BodyKind::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

/// Informational only; the engine treats both the same.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamKind {
    UrlParam,
    HeaderParam,
    BodyParam,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::UrlParam => f.write_str("URL parameter"),
            ParamKind::HeaderParam => f.write_str("header parameter"),
            ParamKind::BodyParam => f.write_str("body parameter"),
        }
    }
}

/// Widget hint for the admin UI.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    #[default]
    Text,
    Select,
    MultiSelect,
    Date,
    Datetime,
    Number,
    Textarea,
    Code,
    Password,
    Email,
    Url,
    Checkbox,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
    Datetime,
    #[serde(alias = "JSON_OBJECT")]
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "STRING",
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::Double => "DOUBLE",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Datetime => "DATETIME",
            DataType::Json => "JSON",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceStatus {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
pub struct ApiParam {
    #[builder(into)]
    pub name: String,
    pub label: Option<String>,
    pub kind: ParamKind,
    #[builder(default)]
    #[serde(default)]
    pub input_type: InputType,
    #[builder(default)]
    #[serde(default)]
    pub data_type: DataType,
    #[builder(default)]
    #[serde(default)]
    pub required: bool,
    pub default_value: Option<Value>,
    /// A locked (non-changeable) parameter always binds its default.
    #[builder(default = true)]
    #[serde(default = "changeable_by_default")]
    pub changeable: bool,
    #[builder(default)]
    #[serde(default)]
    pub options: Vec<SelectOption>,
    pub description: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub sort: i32,
}

fn changeable_by_default() -> bool {
    true
}

impl ApiParam {
    /// `label (name)` when a label is set, for messages shown to operators.
    pub fn display_name(&self) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => format!("{} ({})", label, self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
pub struct ApiInterface {
    #[builder(default = uuid::Uuid::new_v4().to_string())]
    #[serde(default = "new_id")]
    pub id: String,
    #[builder(into)]
    pub name: String,
    pub method: HttpMethod,
    #[builder(into)]
    pub url: String,
    pub description: Option<String>,
    pub body_kind: Option<BodyKind>,
    #[builder(default)]
    #[serde(default)]
    pub environment: Environment,
    /// Seconds.
    pub timeout: Option<u64>,
    pub value_path: Option<Expression>,
    #[builder(default)]
    #[serde(default)]
    pub params: Vec<ApiParam>,
    #[builder(default)]
    #[serde(default)]
    pub status: InterfaceStatus,
    #[builder(default = now_millis())]
    #[serde(default = "now_millis")]
    pub created_at: u64,
    #[builder(default = now_millis())]
    #[serde(default = "now_millis")]
    pub updated_at: u64,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ApiInterface {
    pub fn is_enabled(&self) -> bool {
        self.status == InterfaceStatus::Enabled
    }

    pub fn params_of(&self, kind: ParamKind) -> Vec<&ApiParam> {
        let mut params: Vec<&ApiParam> = self.params.iter().filter(|param| param.kind == kind).collect();
        params.sort_by_key(|param| param.sort);
        params
    }

    pub fn find_param(&self, kind: ParamKind, name: &str) -> Option<&ApiParam> {
        self.params
            .iter()
            .find(|param| param.kind == kind && param_name_matches(kind, &param.name, name))
    }

    pub fn body_kind_or_default(&self) -> BodyKind {
        self.body_kind.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("interface name must not be empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(AppError::Validation("interface url must not be empty".to_string()));
        }
        if self.method.is_body_bearing() && self.body_kind.is_none() {
            return Err(AppError::Validation(format!(
                "body kind is required for {} interfaces",
                self.method
            )));
        }
        match self.timeout {
            Some(0) => return Err(AppError::Validation("timeout must be at least one second".to_string())),
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(AppError::Validation(format!(
                    "timeout must not exceed {} seconds",
                    MAX_TIMEOUT_SECS
                )))
            }
            _ => {}
        }
        let mut seen: HashSet<(ParamKind, String)> = HashSet::new();
        for param in &self.params {
            if param.name.trim().is_empty() {
                return Err(AppError::Validation(format!("{} name must not be empty", param.kind)));
            }
            let scoped_name = match param.kind {
                ParamKind::HeaderParam => param.name.to_ascii_lowercase(),
                _ => param.name.clone(),
            };
            if !seen.insert((param.kind, scoped_name)) {
                return Err(AppError::Validation(format!(
                    "duplicate {} {}",
                    param.kind, param.name
                )));
            }
            if let Some(raw) = default_value(param) {
                coerce(param, &raw).map_err(|err| AppError::Validation(format!("invalid default: {}", err)))?;
            }
        }
        Ok(())
    }

    pub fn copy_of(&self) -> ApiInterface {
        let now = now_millis();
        ApiInterface {
            id: new_id(),
            name: format!("{}_copy", self.name),
            status: InterfaceStatus::Enabled,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Header names compare case-insensitively; url and body names are exact.
pub fn param_name_matches(kind: ParamKind, declared: &str, supplied: &str) -> bool {
    match kind {
        ParamKind::HeaderParam => declared.eq_ignore_ascii_case(supplied),
        _ => declared == supplied,
    }
}
