use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// GET root greeting, also useful as a smoke test for load balancers.
pub(crate) async fn welcome() -> impl IntoResponse {
    Json(json!({"message": "Welcome to Mercurio"}))
}

/// GET liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is alive")
    )
)]
pub(crate) async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
