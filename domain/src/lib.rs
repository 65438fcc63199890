//! Domain layer for Mercurio.
//!
//! This crate re-exports the notification entity types so that consumers of
//! `domain` do not need to depend on the `entity` or `entity_api` crates
//! directly. Errors from the entity layer are translated into the domain
//! error tree here and later into HTTP status codes by the `web` crate.
pub use entity_api::{notifications, Id, NotificationStatus};

pub mod error;
pub mod notification;
