use crate::params::notification::IndexParams;
use crate::response::notification::{
    MarkStatusResponse, NotificationListResponse, NotificationResponse,
};
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use domain::{notification as NotificationApi, Id};

use log::*;

/// GET a recipient's notification history, optionally filtered by read state.
#[utoipa::path(
    get,
    path = "/api/clients/{client_id}/notifications",
    params(
        ("client_id" = String, Path, description = "Recipient whose notifications to list"),
        IndexParams
    ),
    responses(
        (status = 200, description = "The recipient's notifications in insertion order", body = NotificationListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn index(
    State(app_state): State<AppState>,
    Path(client_id): Path<String>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("Getting notifications of client {client_id}");

    let status = params.status.unwrap_or_default();
    let notifications =
        NotificationApi::find_by_status(app_state.db_conn_ref(), &client_id, &status).await?;

    Ok(Json(NotificationListResponse {
        client_id,
        notifications: notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    }))
}

/// GET a single notification owned by the recipient. A notification owned by
/// someone else is a 404, indistinguishable from a missing one.
#[utoipa::path(
    get,
    path = "/api/clients/{client_id}/notifications/{notification_id}",
    params(
        ("client_id" = String, Path, description = "Recipient the notification belongs to"),
        ("notification_id" = i64, Path, description = "Notification id to retrieve")
    ),
    responses(
        (status = 200, description = "The notification", body = NotificationResponse),
        (status = 400, description = "Non-numeric notification id"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification absent or not owned")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn read(
    State(app_state): State<AppState>,
    Path((client_id, notification_id)): Path<(String, Id)>,
) -> Result<impl IntoResponse, Error> {
    debug!("Getting notification {notification_id} of client {client_id}");

    let notification =
        NotificationApi::find_by_id(app_state.db_conn_ref(), &client_id, notification_id).await?;

    Ok(Json(NotificationResponse::from(notification)))
}

/// PUT a notification into the read state. Idempotent: marking twice
/// refreshes the timestamp but the state stays "read".
#[utoipa::path(
    put,
    path = "/api/clients/{client_id}/notifications/{notification_id}/read",
    params(
        ("client_id" = String, Path, description = "Recipient the notification belongs to"),
        ("notification_id" = i64, Path, description = "Notification id to mark read")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = MarkStatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification absent or not owned")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn mark_read(
    State(app_state): State<AppState>,
    Path((client_id, notification_id)): Path<(String, Id)>,
) -> Result<impl IntoResponse, Error> {
    NotificationApi::mark_read(app_state.db_conn_ref(), &client_id, notification_id).await?;

    info!("Marking notification {notification_id} of client {client_id} as read");

    Ok(Json(MarkStatusResponse { status: "read" }))
}

/// PUT a notification back into the unread state. Idempotent.
#[utoipa::path(
    put,
    path = "/api/clients/{client_id}/notifications/{notification_id}/unread",
    params(
        ("client_id" = String, Path, description = "Recipient the notification belongs to"),
        ("notification_id" = i64, Path, description = "Notification id to mark unread")
    ),
    responses(
        (status = 200, description = "Notification marked unread", body = MarkStatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification absent or not owned")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn mark_unread(
    State(app_state): State<AppState>,
    Path((client_id, notification_id)): Path<(String, Id)>,
) -> Result<impl IntoResponse, Error> {
    NotificationApi::mark_unread(app_state.db_conn_ref(), &client_id, notification_id).await?;

    info!("Marking notification {notification_id} of client {client_id} as unread");

    Ok(Json(MarkStatusResponse { status: "unread" }))
}
