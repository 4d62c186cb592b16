use crate::api::{ApiResponse, AppError, AppState};
use crate::interface::model::{ApiInterface, InterfaceStatus};
use crate::interface::service::{change_status, copy_interface, register_interface};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: InterfaceStatus,
}

pub async fn create_interface(
    State(app_state): State<AppState>,
    Json(interface): Json<ApiInterface>,
) -> Result<ApiResponse<ApiInterface>, AppError> {
    let result = register_interface(app_state.interfaces.as_ref(), interface).await;
    ApiResponse::from(result)
}

pub async fn get_interface(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<ApiInterface>, AppError> {
    let result = app_state.interfaces.get(&id).await;
    ApiResponse::from_option(result)
}

pub async fn update_interface_status(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    Json(change): Json<StatusChange>,
) -> Result<ApiResponse<ApiInterface>, AppError> {
    let result = change_status(app_state.interfaces.as_ref(), &id, change.status).await;
    ApiResponse::from_option(result)
}

pub async fn copy(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<ApiInterface>, AppError> {
    let result = copy_interface(app_state.interfaces.as_ref(), &id).await;
    ApiResponse::from_option(result)
}
