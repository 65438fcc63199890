use crate::response::notification::StreamFrame;
use crate::AppState;
use async_stream::stream;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use broker::{Broker, Client};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;

use log::*;

/// GET a long-lived notification stream for one recipient.
///
/// The session registers its client with the broker and then forwards every
/// notification handed to its sink as one `data:` frame. Deregistration is
/// guaranteed on every exit path — normal return, serialization failure, and
/// request cancellation — by the drop guard baked into the stream.
#[utoipa::path(
    get,
    path = "/api/clients/{client_id}/notifications/stream",
    params(
        ("client_id" = String, Path, description = "Recipient to stream notifications for")
    ),
    responses(
        (status = 200, description = "An open text/event-stream of notifications"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn stream(
    State(app_state): State<AppState>,
    Path(client_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing notification stream for client {client_id}");

    let (client, mut receiver) = Client::new(client_id.clone());

    app_state.broker.notify_client_connected(client.clone()).await;

    let guard = DisconnectGuard {
        broker: app_state.broker.clone(),
        client: Some(client),
    };

    let stream = stream! {
        // Owned by the generator so that dropping the response body —
        // including on request cancellation — deregisters exactly once.
        let _guard = guard;

        while let Some(notification) = receiver.recv().await {
            let frame = StreamFrame::from(notification);

            match serde_json::to_string(&frame) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => {
                    error!("Failed to serialize a notification frame for client {}: {e}", frame.client_id);
                    break;
                }
            }
        }

        debug!("Notification stream closed for client {client_id}");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Issues the client's deregistration when the SSE session ends, however it
/// ends. The broker treats a stale deregistration as a no-op, so racing with
/// a reconnect is harmless.
struct DisconnectGuard {
    broker: Arc<Broker>,
    client: Option<Client>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let broker = self.broker.clone();
            tokio::spawn(async move {
                broker.notify_client_disconnected(client).await;
            });
        }
    }
}
