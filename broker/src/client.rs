use entity::notifications;
use tokio::sync::mpsc;

/// Bounded capacity of a client's delivery sink. The loop drops deliveries
/// for a sink that stays full; the recipient recovers through pull.
const SINK_CAPACITY: usize = 16;

/// The in-memory binding between a connected recipient and their delivery
/// sink on this node. Lives exactly as long as the recipient's SSE session.
#[derive(Debug, Clone)]
pub struct Client {
    /// Recipient identifier (the notification destination)
    pub id: String,
    sender: mpsc::Sender<notifications::Model>,
}

impl Client {
    /// Creates a client and the receiving half of its sink. The receiver is
    /// consumed by the SSE session that owns this client.
    pub fn new(id: impl Into<String>) -> (Self, mpsc::Receiver<notifications::Model>) {
        let (sender, receiver) = mpsc::channel(SINK_CAPACITY);

        (
            Client {
                id: id.into(),
                sender,
            },
            receiver,
        )
    }

    /// Hands a notification to the sink without waiting. Returns false when
    /// the sink is full or its session is gone.
    pub fn deliver(&self, notification: notifications::Model) -> bool {
        self.sender.try_send(notification).is_ok()
    }

    /// Whether two client values refer to the same underlying sink, i.e. the
    /// same live session. Distinguishes a stale disconnect for a replaced
    /// session from a disconnect of the current one.
    pub fn same_sink(&self, other: &Client) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_notification(id: i64) -> notifications::Model {
        notifications::Model {
            id,
            event_id: "d5b1c7e2-4a7f-4b36-9f05-3e9e5d2c8a01".to_owned(),
            source_id: "test".to_owned(),
            destination_id: "123".to_owned(),
            data: "hello".to_owned(),
            created_at: chrono::Utc::now().into(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn deliver_hands_off_to_the_receiving_session() {
        let (client, mut receiver) = Client::new("123");

        assert!(client.deliver(test_notification(1)));
        assert_eq!(receiver.recv().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn deliver_reports_a_gone_session() {
        let (client, receiver) = Client::new("123");
        drop(receiver);

        assert!(!client.deliver(test_notification(1)));
    }

    #[tokio::test]
    async fn deliver_never_blocks_on_a_full_sink() {
        let (client, _receiver) = Client::new("123");

        for i in 0..SINK_CAPACITY {
            assert!(client.deliver(test_notification(i as i64)));
        }

        // Sink is full and nobody is draining it; the hand-off is refused
        // instead of stalling the caller.
        assert!(!client.deliver(test_notification(99)));
    }

    #[tokio::test]
    async fn same_sink_distinguishes_two_sessions_for_one_recipient() {
        let (first, _first_receiver) = Client::new("123");
        let (second, _second_receiver) = Client::new("123");

        assert!(first.same_sink(&first.clone()));
        assert!(!first.same_sink(&second));
    }
}
