use crate::api::{ApiResponse, AppError, AppState, RequestContext};
use crate::invocation::model::{InvocationRequest, InvocationResult};
use axum::extract::State;
use axum::Json;

pub async fn execute(
    State(app_state): State<AppState>,
    context: RequestContext,
    Json(request): Json<InvocationRequest>,
) -> Result<ApiResponse<InvocationResult>, AppError> {
    let result = app_state
        .engine
        .execute(request, &context.actor, &context.client)
        .await
        .map_err(AppError::from);
    ApiResponse::from(result)
}
