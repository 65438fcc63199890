use crate::error::WebErrorKind;
use crate::response::notification::EventAccepted;
use crate::{AppState, Error};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use broker::{BroadcastEvent, Event};

use log::*;

/// POST an event for a single recipient. The notification is persisted
/// before the broker routes it, so a 200 means the row exists even when the
/// recipient is offline.
#[utoipa::path(
    post,
    path = "/api/events/unicast",
    request_body = Event,
    responses(
        (status = 200, description = "Event accepted and persisted", body = EventAccepted),
        (status = 400, description = "Malformed event payload"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to persist the notification")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn unicast(
    State(app_state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(event) = payload.map_err(|e| {
        debug!("Rejecting unicast event payload: {e}");
        Error::Web(WebErrorKind::Input)
    })?;

    if event.source_id.is_empty() || event.destination_id.is_empty() {
        debug!("Rejecting unicast event with an empty source or destination");
        return Err(Error::Web(WebErrorKind::Input));
    }

    info!(
        "Receiving event for client {} from source {}",
        event.destination_id, event.source_id
    );

    let notification = app_state.broker.notify_event(event).await?;

    Ok(Json(EventAccepted::from(&notification)))
}

/// POST an event for many recipients. Destinations are fanned out in order
/// and share one event id; persistence fails fast, so earlier notifications
/// survive a mid-broadcast storage error.
#[utoipa::path(
    post,
    path = "/api/events/broadcast",
    request_body = BroadcastEvent,
    responses(
        (status = 200, description = "Event accepted for every destination", body = [EventAccepted]),
        (status = 400, description = "Malformed event payload"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to persist a notification")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn broadcast(
    State(app_state): State<AppState>,
    payload: Result<Json<BroadcastEvent>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(broadcast_event) = payload.map_err(|e| {
        debug!("Rejecting broadcast event payload: {e}");
        Error::Web(WebErrorKind::Input)
    })?;

    if broadcast_event.source_id.is_empty() {
        debug!("Rejecting broadcast event with an empty source");
        return Err(Error::Web(WebErrorKind::Input));
    }

    info!(
        "Receiving event to broadcast from source {} to {} destinations",
        broadcast_event.source_id,
        broadcast_event.destinations.len()
    );

    let notifications = app_state.broker.broadcast_event(broadcast_event).await?;

    let accepted: Vec<EventAccepted> = notifications.iter().map(EventAccepted::from).collect();

    Ok(Json(accepted))
}
