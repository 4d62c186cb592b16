use crate::api::{ApiResponse, AppError, AppState};
use crate::execution_record::model::{ExecutionRecord, ExecutionRecordQuery, ExecutionStats, InterfaceSummary, Page};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MOST_USED_DAYS: u64 = 30;
pub const DEFAULT_MOST_USED_LIMIT: usize = 5;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Deserialize)]
pub struct MostUsedParams {
    pub days: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct CountParams {
    pub start_time: u64,
    pub end_time: u64,
}

#[derive(Deserialize)]
pub struct CleanupParams {
    pub before_time: u64,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub deleted: usize,
}

pub async fn most_used(
    State(app_state): State<AppState>,
    Query(params): Query<MostUsedParams>,
) -> Result<ApiResponse<Vec<InterfaceSummary>>, AppError> {
    let result = app_state
        .analytics
        .most_used(
            params.days.unwrap_or(DEFAULT_MOST_USED_DAYS),
            params.limit.unwrap_or(DEFAULT_MOST_USED_LIMIT),
        )
        .await;
    ApiResponse::from(result)
}

pub async fn stats(
    Path(interface_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<ExecutionStats>, AppError> {
    match app_state.analytics.stats(&interface_id).await? {
        Some(stats) => Ok(ApiResponse(stats)),
        None => Err(AppError::NotFound(format!(
            "no executions recorded for interface {}",
            interface_id
        ))),
    }
}

pub async fn count_between(
    State(app_state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Result<ApiResponse<CountResponse>, AppError> {
    let result = app_state
        .analytics
        .count_between(params.start_time, params.end_time)
        .await
        .map(|count| CountResponse { count });
    ApiResponse::from(result)
}

pub async fn cleanup(
    State(app_state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Result<ApiResponse<CleanupResponse>, AppError> {
    let result = app_state
        .analytics
        .cleanup(params.before_time)
        .await
        .map(|deleted| CleanupResponse { deleted });
    ApiResponse::from(result)
}

pub async fn search_records(
    State(app_state): State<AppState>,
    Query(query): Query<ExecutionRecordQuery>,
) -> Result<ApiResponse<Page<ExecutionRecord>>, AppError> {
    let result = app_state.analytics.search_records(&query).await;
    ApiResponse::from(result)
}

pub async fn get_record(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<ExecutionRecord>, AppError> {
    let result = app_state.analytics.get_record(&id).await;
    ApiResponse::from_option(result)
}

pub async fn recent_by_interface(
    Path(interface_id): Path<String>,
    State(app_state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<ApiResponse<Vec<ExecutionRecord>>, AppError> {
    let result = app_state
        .analytics
        .recent_by_interface(&interface_id, params.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await;
    ApiResponse::from(result)
}

pub async fn recent_by_executor(
    Path(executor_id): Path<String>,
    State(app_state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<ApiResponse<Vec<ExecutionRecord>>, AppError> {
    let result = app_state
        .analytics
        .recent_by_executor(&executor_id, params.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await;
    ApiResponse::from(result)
}
