use axum::Json;
use axum::extract::State;

use crate::domain::models::BatchReport;
use crate::server::AppState;
use crate::server::responses::ApiError;

/// Run one delivery pass. The request body is ignored.
pub async fn process_deliveries(
    State(state): State<AppState>,
) -> Result<Json<BatchReport>, ApiError> {
    let runner = state.runner()?;

    let report = runner.run_once().await.inspect_err(|e| {
        tracing::error!(error = %e, "Webhook delivery pass aborted");
    })?;

    Ok(Json(report))
}
