use serde::Deserialize;
use utoipa::ToSchema;

/// An incoming publication intent for a single recipient. Transient: the
/// broker materializes it into a persistent notification.
///
/// Unknown JSON fields are rejected so that publisher typos surface as 400s
/// instead of silently dropped payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Event {
    /// Optional event id; the broker assigns a fresh UUID when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "sourceID")]
    pub source_id: String,

    #[serde(rename = "destinationID")]
    pub destination_id: String,

    #[serde(default)]
    pub data: String,
}

/// An incoming publication intent for many recipients. Fanned out into one
/// notification per destination, all sharing a single event id. Duplicate
/// destinations are preserved: each produces its own notification.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BroadcastEvent {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "sourceID")]
    pub source_id: String,

    pub destinations: Vec<String>,

    #[serde(default)]
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_decodes_the_public_field_names() {
        let event: Event = serde_json::from_str(
            r#"{"sourceID":"test","destinationID":"123","data":"hello"}"#,
        )
        .unwrap();

        assert_eq!(event.source_id, "test");
        assert_eq!(event.destination_id, "123");
        assert_eq!(event.data, "hello");
        assert!(event.id.is_none());
    }

    #[test]
    fn event_rejects_unknown_fields() {
        let result = serde_json::from_str::<Event>(
            r#"{"sourceID":"test","destinationID":"123","data":"hello","extra":true}"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn broadcast_event_keeps_destination_order_and_duplicates() {
        let event: BroadcastEvent = serde_json::from_str(
            r#"{"sourceID":"test","destinations":["a","b","a"],"data":"hi"}"#,
        )
        .unwrap();

        assert_eq!(event.destinations, vec!["a", "b", "a"]);
    }
}
