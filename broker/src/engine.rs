use crate::client::Client;
use crate::event::{BroadcastEvent, Event};
use domain::error::Error;
use domain::notification;
use domain::notifications::Model;
use messaging::{IncomingMessage, RabbitMqChannel, Settings};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use log::*;

/// Connect and disconnect hand-offs are unbuffered in spirit: the sender
/// parks until the loop picks the client up.
const CLIENT_STREAM_CAPACITY: usize = 1;
const NOTIFICATION_STREAM_CAPACITY: usize = 16;
const BUS_STREAM_CAPACITY: usize = 16;

/// The core notification routing service. See the crate docs for the
/// fan-out model; the public methods below are the only way in.
pub struct Broker {
    db: Arc<DatabaseConnection>,
    bus: Option<Arc<RabbitMqChannel>>,
    node_id: String,
    running: Arc<AtomicBool>,
    new_clients_tx: mpsc::Sender<Client>,
    closing_clients_tx: mpsc::Sender<Client>,
    notifications_tx: mpsc::Sender<Model>,
    inputs: Mutex<Option<InputStreams>>,
    shutdown: CancellationToken,
}

/// Receiving halves of the broker's input streams, handed to the loop task
/// on start.
struct InputStreams {
    new_clients: mpsc::Receiver<Client>,
    closing_clients: mpsc::Receiver<Client>,
    notifications: mpsc::Receiver<Model>,
}

impl Broker {
    /// Creates a broker over the given store. When bus settings are provided
    /// the AMQP topology is set up immediately; a connect failure surfaces
    /// here rather than at the first publish.
    pub async fn new(
        db: Arc<DatabaseConnection>,
        node_id: String,
        mq_settings: Option<Settings>,
    ) -> Result<Self, Error> {
        let bus = match mq_settings {
            Some(settings) => Some(Arc::new(RabbitMqChannel::connect(&settings).await?)),
            None => None,
        };

        let (new_clients_tx, new_clients_rx) = mpsc::channel(CLIENT_STREAM_CAPACITY);
        let (closing_clients_tx, closing_clients_rx) = mpsc::channel(CLIENT_STREAM_CAPACITY);
        let (notifications_tx, notifications_rx) = mpsc::channel(NOTIFICATION_STREAM_CAPACITY);

        Ok(Broker {
            db,
            bus,
            node_id,
            running: Arc::new(AtomicBool::new(false)),
            new_clients_tx,
            closing_clients_tx,
            notifications_tx,
            inputs: Mutex::new(Some(InputStreams {
                new_clients: new_clients_rx,
                closing_clients: closing_clients_rx,
                notifications: notifications_rx,
            })),
            shutdown: CancellationToken::new(),
        })
    }

    /// Starts the fan-out loop. When the bus is configured, its consumer is
    /// opened first; a consume failure leaves the broker not running.
    pub async fn start(&self) -> Result<(), Error> {
        let inputs = match self.inputs.lock().expect("broker input streams lock").take() {
            Some(inputs) => inputs,
            None => {
                warn!("Broker already started");
                return Ok(());
            }
        };

        let (bus_tx, bus_rx) = mpsc::channel::<IncomingMessage>(BUS_STREAM_CAPACITY);

        if let Some(bus) = &self.bus {
            let mut consumer = match bus.consume_notifications().await {
                Ok(consumer) => consumer,
                Err(e) => {
                    // Put the streams back so a later start can retry.
                    *self.inputs.lock().expect("broker input streams lock") = Some(inputs);
                    return Err(e.into());
                }
            };

            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        message = consumer.next_message() => match message {
                            Some(message) => {
                                if bus_tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                warn!("Bus consumer stream ended");
                                break;
                            }
                        }
                    }
                }
            });
        }
        // Without a bus, bus_tx drops here and the loop's bus branch stays quiet.

        self.running.store(true, Ordering::SeqCst);

        let state = EngineState {
            registry: HashMap::new(),
            node_id: self.node_id.clone(),
            bus: self.bus.clone(),
        };

        tokio::spawn(run_loop(
            state,
            inputs,
            bus_rx,
            self.running.clone(),
            self.shutdown.clone(),
        ));

        Ok(())
    }

    /// Signals the loop to exit at its next iteration. Outstanding client
    /// sinks are not drained; their SSE sessions observe cancellation on
    /// their own.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registers a newly connected recipient. Parks until the loop consumes
    /// the hand-off.
    pub async fn notify_client_connected(&self, client: Client) {
        if self.new_clients_tx.send(client).await.is_err() {
            warn!("Fan-out loop is gone; dropping a client registration");
        }
    }

    /// Deregisters a recipient. Safe to call more than once per client: a
    /// disconnect for an already-unregistered session is a no-op.
    pub async fn notify_client_disconnected(&self, client: Client) {
        if self.closing_clients_tx.send(client).await.is_err() {
            warn!("Fan-out loop is gone; dropping a client deregistration");
        }
    }

    /// Materializes an event into a persistent notification and hands it to
    /// the loop for live routing. Persistence completes before the hand-off,
    /// so every pushed notification has a store row behind it.
    pub async fn notify_event(&self, event: Event) -> Result<Model, Error> {
        let event_id = match event.id {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let notification = notification::create(
            &self.db,
            event_id,
            event.source_id,
            event.destination_id,
            event.data,
        )
        .await?;

        if self.notifications_tx.send(notification.clone()).await.is_err() {
            warn!(
                "Fan-out loop is gone; notification {} is stored but will only reach its recipient by pull",
                notification.id
            );
        }

        Ok(notification)
    }

    /// Fans a broadcast out into one notification per destination, in order,
    /// all sharing a single event id. Fails fast on the first persistence
    /// error; notifications created before the failure remain persisted.
    pub async fn broadcast_event(
        &self,
        broadcast_event: BroadcastEvent,
    ) -> Result<Vec<Model>, Error> {
        let event_id = broadcast_event
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut notifications = Vec::with_capacity(broadcast_event.destinations.len());

        for destination_id in broadcast_event.destinations {
            let event = Event {
                id: Some(event_id.clone()),
                source_id: broadcast_event.source_id.clone(),
                destination_id,
                data: broadcast_event.data.clone(),
            };

            notifications.push(self.notify_event(event).await?);
        }

        Ok(notifications)
    }
}

/// The single writer. Owns the client registry; everything else reaches it
/// through the input streams.
struct EngineState {
    registry: HashMap<String, Client>,
    node_id: String,
    bus: Option<Arc<RabbitMqChannel>>,
}

async fn run_loop(
    mut state: EngineState,
    mut inputs: InputStreams,
    mut bus_messages: mpsc::Receiver<IncomingMessage>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(client) = inputs.new_clients.recv() => state.client_connected(client),
            Some(client) = inputs.closing_clients.recv() => state.client_disconnected(&client),
            Some(notification) = inputs.notifications.recv() => state.route_notification(notification).await,
            Some(message) = bus_messages.recv() => state.route_bus_message(message),
            else => break,
        }
    }

    if let Some(bus) = &state.bus {
        info!("Closing message bus channel");
        bus.close().await;
    }

    running.store(false, Ordering::SeqCst);
}

impl EngineState {
    /// A second connect for the same recipient replaces the prior entry; the
    /// orphaned session reclaims itself through its own cancellation watcher.
    fn client_connected(&mut self, client: Client) {
        self.registry.insert(client.id.clone(), client);
        info!("Client added ({} registered clients)", self.registry.len());
    }

    /// Removes the entry only when it still belongs to the departing
    /// session. A late disconnect from a replaced session must not evict the
    /// replacement.
    fn client_disconnected(&mut self, client: &Client) {
        let owns_entry = self
            .registry
            .get(&client.id)
            .is_some_and(|registered| registered.same_sink(client));

        if owns_entry {
            self.registry.remove(&client.id);
            info!("Removed client ({} registered clients)", self.registry.len());
        }
    }

    /// Routes a locally ingested notification: push when the recipient is
    /// connected here, publish to the bus when they are not.
    async fn route_notification(&mut self, notification: Model) {
        let client_id = notification.destination_id.clone();

        debug!(
            "Got notification {} for client {} (known = {})",
            notification.id,
            client_id,
            self.registry.contains_key(&client_id)
        );

        if let Some(client) = self.registry.get(&client_id) {
            // Best-effort hand-off. A refused delivery is not re-published;
            // the pull endpoints remain the recovery path.
            if client.deliver(notification.clone()) {
                debug!("Sent notification {} to client {}", notification.id, client_id);
            } else {
                warn!(
                    "Client {} sink refused notification {}; recipient can recover by pull",
                    client_id, notification.id
                );
            }
            return;
        }

        if let Some(bus) = &self.bus {
            debug!(
                "Publishing notification {} for client {} to the bus (unknown to this node)",
                notification.id, client_id
            );

            // Logged and dropped on failure: the row is already persisted.
            if let Err(e) = bus.publish_notification(&notification).await {
                warn!(
                    "Failed to publish notification {} to the bus: {e}",
                    notification.id
                );
            }
        }
    }

    /// Routes a notification forwarded by another node. Our own echoes are
    /// discarded, and a recipient unknown here means the message is dropped:
    /// forwarding again would loop between nodes.
    fn route_bus_message(&mut self, message: IncomingMessage) {
        if message.body.is_empty() {
            return;
        }

        if message.app_id.as_deref() == Some(self.node_id.as_str()) {
            return;
        }

        let notification = match messaging::decode_notification(&message.body) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Could not decode a bus message body: {e}");
                return;
            }
        };

        let client_id = notification.destination_id.clone();

        debug!(
            "Got notification {} from the bus for client {} (known = {})",
            notification.id,
            client_id,
            self.registry.contains_key(&client_id)
        );

        if let Some(client) = self.registry.get(&client_id) {
            if client.deliver(notification.clone()) {
                debug!(
                    "Sent notification {} from the bus to client {}",
                    notification.id, client_id
                );
            } else {
                warn!(
                    "Client {} sink refused notification {} from the bus; recipient can recover by pull",
                    client_id, notification.id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> EngineState {
        EngineState {
            registry: HashMap::new(),
            node_id: "node-a".to_owned(),
            bus: None,
        }
    }

    fn test_notification(id: i64, destination_id: &str) -> Model {
        Model {
            id,
            event_id: "0d9e2f3a-40cb-4f0d-9a51-64c2b9e07d11".to_owned(),
            source_id: "test".to_owned(),
            destination_id: destination_id.to_owned(),
            data: "hello".to_owned(),
            created_at: chrono::Utc::now().into(),
            read_at: None,
        }
    }

    fn bus_message(app_id: &str, notification: &Model) -> IncomingMessage {
        IncomingMessage {
            app_id: Some(app_id.to_owned()),
            body: serde_json::to_vec(notification).unwrap(),
        }
    }

    #[tokio::test]
    async fn a_connected_client_receives_a_local_notification() {
        let mut state = test_state();
        let (client, mut receiver) = Client::new("123");
        state.client_connected(client);

        state.route_notification(test_notification(1, "123")).await;

        assert_eq!(receiver.recv().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn a_notification_for_an_unknown_client_is_ignored_without_a_bus() {
        let mut state = test_state();

        // No registry entry and no bus; the store row is the only trace.
        state.route_notification(test_notification(1, "456")).await;

        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn at_most_one_client_per_destination() {
        let mut state = test_state();
        let (first, mut first_receiver) = Client::new("123");
        let (second, mut second_receiver) = Client::new("123");

        state.client_connected(first);
        state.client_connected(second);

        assert_eq!(state.registry.len(), 1);

        // Only the replacement holds the live registration.
        state.route_notification(test_notification(1, "123")).await;
        assert!(first_receiver.try_recv().is_err());
        assert_eq!(second_receiver.recv().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn a_stale_disconnect_does_not_evict_the_replacement_session() {
        let mut state = test_state();
        let (first, _first_receiver) = Client::new("123");
        let (second, mut second_receiver) = Client::new("123");

        state.client_connected(first.clone());
        state.client_connected(second);

        // The orphaned first session reclaims itself after being replaced.
        state.client_disconnected(&first);

        assert_eq!(state.registry.len(), 1);
        state.route_notification(test_notification(1, "123")).await;
        assert_eq!(second_receiver.recv().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn disconnecting_twice_is_harmless() {
        let mut state = test_state();
        let (client, _receiver) = Client::new("123");

        state.client_connected(client.clone());
        state.client_disconnected(&client);
        state.client_disconnected(&client);

        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn own_bus_echoes_are_suppressed() {
        let mut state = test_state();
        let (client, mut receiver) = Client::new("123");
        state.client_connected(client);

        let notification = test_notification(1, "123");
        state.route_bus_message(bus_message("node-a", &notification));

        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn a_bus_message_from_another_node_is_pushed_locally() {
        let mut state = test_state();
        let (client, mut receiver) = Client::new("123");
        state.client_connected(client);

        let notification = test_notification(7, "123");
        state.route_bus_message(bus_message("node-b", &notification));

        assert_eq!(receiver.recv().await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn a_bus_message_for_an_unknown_client_is_dropped() {
        let mut state = test_state();

        let notification = test_notification(7, "999");
        state.route_bus_message(bus_message("node-b", &notification));

        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn garbage_bus_payloads_are_discarded() {
        let mut state = test_state();

        state.route_bus_message(IncomingMessage {
            app_id: Some("node-b".to_owned()),
            body: b"not even json".to_vec(),
        });
        state.route_bus_message(IncomingMessage {
            app_id: Some("node-b".to_owned()),
            body: Vec::new(),
        });
    }

    #[tokio::test]
    async fn a_full_sink_does_not_stall_routing() {
        let mut state = test_state();
        let (client, _receiver) = Client::new("123");
        state.client_connected(client);

        // Nobody drains the sink; every routed notification either lands in
        // the bounded buffer or is dropped, the loop never parks.
        for id in 1..=64 {
            state.route_notification(test_notification(id, "123")).await;
        }
    }
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod broker_tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn stored(id: i64, event_id: &str, destination_id: &str) -> Model {
        Model {
            id,
            event_id: event_id.to_owned(),
            source_id: "test".to_owned(),
            destination_id: destination_id.to_owned(),
            data: "shared payload".to_owned(),
            created_at: chrono::Utc::now().into(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn notify_event_assigns_a_fresh_event_id_when_absent() {
        let row = stored(1, "b3c5a1de-97f2-4f0e-8f46-1f25c2d9b7aa", "123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![row.clone()]])
            .into_connection();

        let broker = Broker::new(Arc::new(db), "node-a".to_owned(), None)
            .await
            .unwrap();

        let notification = broker
            .notify_event(Event {
                id: None,
                source_id: "test".to_owned(),
                destination_id: "123".to_owned(),
                data: "shared payload".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(notification.id, 1);
        assert!(!notification.event_id.is_empty());
    }

    #[tokio::test]
    async fn broadcast_creates_one_notification_per_destination_in_order() {
        let event_id = "b3c5a1de-97f2-4f0e-8f46-1f25c2d9b7aa";
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![
                vec![stored(1, event_id, "a")],
                vec![stored(2, event_id, "b")],
                vec![stored(3, event_id, "c")],
            ])
            .into_connection();

        let broker = Broker::new(Arc::new(db), "node-a".to_owned(), None)
            .await
            .unwrap();

        let notifications = broker
            .broadcast_event(BroadcastEvent {
                id: Some(event_id.to_owned()),
                source_id: "test".to_owned(),
                destinations: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
                data: "shared payload".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(notifications.len(), 3);
        assert!(notifications.iter().all(|n| n.event_id == event_id));
        assert_eq!(
            notifications
                .iter()
                .map(|n| n.destination_id.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn the_loop_registers_and_routes_through_its_input_streams() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let broker = Broker::new(Arc::new(db), "node-a".to_owned(), None)
            .await
            .unwrap();

        broker.start().await.unwrap();
        assert!(broker.is_running());

        let (client, mut receiver) = Client::new("123");
        broker.notify_client_connected(client.clone()).await;

        // The connect stream has capacity one, so a second hand-off only
        // completes once the loop has consumed the first. After this await,
        // client "123" is registered regardless of select ordering.
        let (other, _other_receiver) = Client::new("456");
        broker.notify_client_connected(other).await;

        // Hand a pre-persisted notification straight to the loop.
        broker
            .notifications_tx
            .send(stored(1, "b3c5a1de-97f2-4f0e-8f46-1f25c2d9b7aa", "123"))
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().id, 1);

        broker.notify_client_disconnected(client).await;
        broker.stop();
    }
}
