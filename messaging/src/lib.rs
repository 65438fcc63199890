//! Message bus adapter for cross-node notification forwarding.
//!
//! Broker nodes behind a load balancer do not share memory, so a notification
//! ingested on one node may belong to a recipient whose live stream is held by
//! another. This crate is the conduit between nodes: serialized notifications
//! are published to a durable topic exchange, and every node consumes them
//! from its own exclusive, auto-deleted queue.
//!
//! A node has no use for messages published while it was offline (offline
//! recipients recover through the pull endpoints), which is why the queue is
//! exclusive and auto-deleted and consumption is auto-acked. A lost bus
//! message degrades to "recipient refreshes via history", never to data loss,
//! because persistence happens before publish.

pub mod error;
pub mod rabbitmq;
pub mod settings;

pub use error::{Error, MessagingErrorKind};
pub use rabbitmq::{decode_notification, IncomingMessage, RabbitMqChannel, RabbitMqConsumer};
pub use settings::Settings;
