use crate::config::AppConfig;
use crate::execution_record::api::{
    cleanup, count_between, get_record, most_used, recent_by_executor, recent_by_interface, search_records,
    stats,
};
use crate::execution_record::service::{ExecutionRecordStore, UsageAnalytics};
use crate::http::ApiClient;
use crate::interface::api::{copy, create_interface, get_interface, update_interface_status};
use crate::interface::service::InterfaceStore;
use crate::invocation::api::execute;
use crate::invocation::model::{Actor, ClientInfo};
use crate::invocation::service::InvocationEngine;
use async_trait::async_trait;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InvocationEngine>,
    pub analytics: Arc<UsageAnalytics>,
    pub interfaces: Arc<dyn InterfaceStore>,
}

impl AppState {
    pub fn new(
        interfaces: Arc<dyn InterfaceStore>,
        records: Arc<dyn ExecutionRecordStore>,
        config: &AppConfig,
    ) -> Self {
        let engine = InvocationEngine::new(
            interfaces.clone(),
            records.clone(),
            Arc::new(ApiClient::new()),
            config.default_timeout_secs,
        );
        AppState {
            engine: Arc::new(engine),
            analytics: Arc::new(UsageAnalytics::new(interfaces.clone(), records)),
            interfaces,
        }
    }
}

pub fn build_api(app_state: AppState, config: &AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/interfaces/execute", post(execute))
        .route("/interfaces/most-used", get(most_used))
        .route("/interfaces/:id/status", patch(update_interface_status))
        .route("/interfaces/:id/copy", post(copy))
        .route("/interfaces/:id/records", get(recent_by_interface))
        .route("/interfaces/:id", get(get_interface))
        .route("/interfaces", post(create_interface))
        .route("/execution-records/count", get(count_between))
        .route("/execution-records/cleanup", delete(cleanup))
        .route("/execution-records/stats/:interface_id", get(stats))
        .route("/execution-records/executors/:executor_id", get(recent_by_executor))
        .route("/execution-records/:id", get(get_record))
        .route("/execution-records", get(search_records))
        .layer(cors)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new().include_headers(true))
            .on_request(
                DefaultOnRequest::new()
                    .level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Micros)
            ))
        .with_state(app_state)
}

/// Who is calling and from where. The identity is asserted by the auth layer in front of
/// this service through `x-user-id` and `x-user-name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Actor,
    pub client: ClientInfo,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let user_id = header_value(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;
        let forwarded_ip = header_value(FORWARDED_FOR_HEADER).and_then(|forwarded| {
            forwarded
                .split(',')
                .next()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        });
        let ip = forwarded_ip.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(address)| address.ip().to_string())
        });
        Ok(RequestContext {
            actor: Actor::new(user_id, header_value(USER_NAME_HEADER)),
            client: ClientInfo {
                ip,
                user_agent: header_value(header::USER_AGENT.as_str()),
            },
        })
    }
}

pub struct ApiResponse<T>(pub T);

impl<T> ApiResponse<T> {
    pub fn from(result: Result<T, AppError>) -> Result<ApiResponse<T>, AppError> {
        result.map(ApiResponse)
    }

    pub fn from_option(result: Result<Option<T>, AppError>) -> Result<ApiResponse<T>, AppError> {
        match result {
            Ok(Some(val)) => Ok(ApiResponse(val)),
            Ok(None) => Err(AppError::NotFound("Not found".to_string())),
            Err(e) => Err(e),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Processing(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            AppError::Processing(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            AppError::Internal(message) => {
                tracing::error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
