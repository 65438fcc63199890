//! Wire shapes returned by the event and notification endpoints. These are
//! deliberately separate from the entity model: the HTTP surface promises
//! exact field names and shapes to its clients.

use domain::notifications::Model;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement for an accepted event, one per created notification.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct EventAccepted {
    #[serde(rename = "notificationID")]
    pub notification_id: i64,
    #[serde(rename = "eventID")]
    pub event_id: String,
}

impl From<&Model> for EventAccepted {
    fn from(notification: &Model) -> Self {
        EventAccepted {
            notification_id: notification.id,
            event_id: notification.event_id.clone(),
        }
    }
}

/// A single historical notification.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct NotificationResponse {
    #[serde(rename = "notificationID")]
    pub notification_id: i64,
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    pub data: String,
    #[schema(value_type = String, format = DateTime)]
    #[serde(rename = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = Option<String>, format = DateTime)]
    #[serde(rename = "readAt", skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTimeWithTimeZone>,
}

impl From<Model> for NotificationResponse {
    fn from(notification: Model) -> Self {
        NotificationResponse {
            notification_id: notification.id,
            event_id: notification.event_id,
            source_id: notification.source_id,
            data: notification.data,
            created_at: notification.created_at,
            read_at: notification.read_at,
        }
    }
}

/// A recipient's notification history.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct NotificationListResponse {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub notifications: Vec<NotificationResponse>,
}

/// Result of a mark-read / mark-unread operation.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MarkStatusResponse {
    pub status: &'static str,
}

/// One SSE frame: a notification as seen by the listening client.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct StreamFrame {
    #[serde(rename = "notificationID")]
    pub notification_id: i64,
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    /// The recipient (the notification's destination)
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub data: String,
}

impl From<Model> for StreamFrame {
    fn from(notification: Model) -> Self {
        StreamFrame {
            notification_id: notification.id,
            event_id: notification.event_id,
            source_id: notification.source_id,
            client_id: notification.destination_id,
            data: notification.data,
        }
    }
}
