use crate::error::Error;
use crate::settings::Settings;
use entity::notifications;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use log::*;

const CONTENT_TYPE_JSON: &str = "application/json";

/// An open channel pair to a RabbitMQ server: one channel publishes outgoing
/// notifications, the other consumes the node's exclusive queue.
pub struct RabbitMqChannel {
    connection: Connection,
    pub_channel: Channel,
    sub_channel: Channel,
    topic: String,
    routing_key: String,
    queue: String,
    node_id: String,
}

impl RabbitMqChannel {
    /// Opens a TCP connection to the RabbitMQ server and sets up the
    /// exchange/queue topology. The exchange is durable and shared by all
    /// nodes; the queue is exclusive and auto-deleted so that it disappears
    /// with this node.
    pub async fn connect(settings: &Settings) -> Result<Self, Error> {
        let connection = Connection::connect(&settings.url, ConnectionProperties::default())
            .await
            .map_err(Error::connect)?;

        let pub_channel = connection.create_channel().await.map_err(Error::connect)?;
        let sub_channel = connection.create_channel().await.map_err(Error::connect)?;

        pub_channel
            .exchange_declare(
                &settings.topic,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(Error::connect)?;

        let queue = sub_channel
            .queue_declare(
                // A server-generated name; nobody else binds to it
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(Error::connect)?;

        sub_channel
            .queue_bind(
                queue.name().as_str(),
                &settings.topic,
                &settings.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(Error::connect)?;

        info!("Connected to RabbitMQ at '{}'", settings.url);

        Ok(RabbitMqChannel {
            connection,
            pub_channel,
            sub_channel,
            topic: settings.topic.clone(),
            routing_key: settings.routing_key.clone(),
            queue: queue.name().as_str().to_owned(),
            node_id: settings.node_id.clone(),
        })
    }

    /// Publishes a notification to the topic with the configured routing key.
    /// The envelope carries the notification id, this node's identity, and
    /// the JSON content type.
    pub async fn publish_notification(
        &self,
        notification: &notifications::Model,
    ) -> Result<(), Error> {
        let body = serde_json::to_vec(notification).map_err(Error::publish)?;

        let properties = BasicProperties::default()
            .with_message_id(notification.id.to_string().into())
            .with_app_id(self.node_id.clone().into())
            .with_content_type(CONTENT_TYPE_JSON.into());

        self.pub_channel
            .basic_publish(
                &self.topic,
                &self.routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(Error::publish)?
            .await
            .map_err(Error::publish)?;

        Ok(())
    }

    /// Starts consuming the node's queue. Auto-ack: a message lost between
    /// delivery and push is recoverable through the history endpoints.
    pub async fn consume_notifications(&self) -> Result<RabbitMqConsumer, Error> {
        let consumer = self
            .sub_channel
            .basic_consume(
                &self.queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(Error::consume)?;

        Ok(RabbitMqConsumer { inner: consumer })
    }

    /// Closes the underlying channels and connection, logging rather than
    /// surfacing errors since close runs on the shutdown path.
    pub async fn close(&self) {
        if let Err(e) = self.sub_channel.close(200, "bye").await {
            warn!("Failed to close RabbitMQ consume channel: {e}");
        }
        if let Err(e) = self.pub_channel.close(200, "bye").await {
            warn!("Failed to close RabbitMQ publish channel: {e}");
        }
        if let Err(e) = self.connection.close(200, "bye").await {
            warn!("Failed to close RabbitMQ connection: {e}");
        }
    }
}

/// An incoming bus message reduced to the parts the broker routes on.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Identity of the publishing node, used for echo suppression
    pub app_id: Option<String>,
    /// JSON-encoded notification
    pub body: Vec<u8>,
}

/// A wrapper over the AMQP consumer delivery stream.
pub struct RabbitMqConsumer {
    inner: lapin::Consumer,
}

impl RabbitMqConsumer {
    /// Waits for the next delivery. Returns None once the underlying
    /// consumer stream ends (channel closed).
    pub async fn next_message(&mut self) -> Option<IncomingMessage> {
        while let Some(delivery) = self.inner.next().await {
            match delivery {
                Ok(delivery) => {
                    return Some(IncomingMessage {
                        app_id: delivery
                            .properties
                            .app_id()
                            .as_ref()
                            .map(|s| s.as_str().to_owned()),
                        body: delivery.data,
                    });
                }
                Err(e) => {
                    warn!("Failed to receive a bus delivery: {e}");
                }
            }
        }

        None
    }
}

/// Decodes a JSON notification received from the bus.
pub fn decode_notification(body: &[u8]) -> Result<notifications::Model, Error> {
    serde_json::from_slice(body).map_err(Error::consume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagingErrorKind;

    fn test_notification() -> notifications::Model {
        notifications::Model {
            id: 42,
            event_id: "8e9adfe7-8b8d-4c92-9c38-a1f1b6bc904e".to_owned(),
            source_id: "publisher".to_owned(),
            destination_id: "123".to_owned(),
            data: "hello".to_owned(),
            created_at: chrono::Utc::now().into(),
            read_at: None,
        }
    }

    #[test]
    fn notification_round_trips_through_the_bus_payload() {
        let notification = test_notification();
        let body = serde_json::to_vec(&notification).unwrap();

        let decoded = decode_notification(&body).unwrap();

        assert_eq!(decoded, notification);
    }

    #[test]
    fn decode_rejects_a_malformed_payload() {
        let result = decode_notification(b"not even json");

        assert_eq!(
            result.unwrap_err().error_kind,
            MessagingErrorKind::ConsumeFailure
        );
    }

    #[test]
    fn bus_payload_uses_the_public_field_names() {
        let body = serde_json::to_vec(&test_notification()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["id"], 42);
        assert_eq!(value["destinationID"], "123");
        assert_eq!(value["eventID"], "8e9adfe7-8b8d-4c92-9c38-a1f1b6bc904e");
    }
}
