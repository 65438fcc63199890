//! Fan-out engine for real-time notification delivery.
//!
//! The broker is a single-writer cooperative loop that owns the registry of
//! locally connected recipients. Handlers never touch the registry directly:
//! they communicate with the loop over its input streams (new clients,
//! closing clients, locally ingested notifications), and incoming bus
//! messages are funneled into the same loop. Because one task performs every
//! mutation, the registry needs no lock and the at-most-one-client-per-
//! destination invariant holds by construction.
//!
//! # Routing
//!
//! A notification ingested on this node is persisted first, then handed to
//! the loop. If its recipient holds a live stream *here*, it is pushed on the
//! client's sink; otherwise, when the message bus is enabled, it is published
//! so the node that does hold the stream can deliver it. Bus messages from
//! this node's own publishes are discarded by their `app_id` envelope field,
//! and bus messages for recipients unknown here are dropped rather than
//! forwarded again.
//!
//! Live delivery is deliberately best-effort: the store is the source of
//! truth and a recipient that misses a push recovers through the history
//! endpoints. The loop never blocks on a slow client sink.

pub mod client;
pub mod engine;
pub mod event;

pub use client::Client;
pub use engine::Broker;
pub use event::{BroadcastEvent, Event};
