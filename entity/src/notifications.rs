//! SeaORM Entity for the notifications table.
//! One row is the durable, per-recipient materialization of a published event.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The serde field names double as the message-bus payload framing, so a
/// Model can round-trip between nodes unchanged.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::notifications::Model)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Id,

    /// Shared by every notification fanned out from one broadcast event
    #[sea_orm(indexed)]
    #[serde(rename = "eventID")]
    pub event_id: String,

    #[sea_orm(indexed)]
    #[serde(rename = "sourceID")]
    pub source_id: String,

    /// Recipient; immutable after insertion
    #[sea_orm(indexed)]
    #[serde(rename = "destinationID")]
    pub destination_id: String,

    /// Opaque payload, passed through verbatim
    pub data: String,

    #[schema(value_type = String, format = DateTime)]
    #[serde(rename = "createdAt")]
    pub created_at: DateTimeWithTimeZone,

    /// Present iff the recipient has marked the notification read
    #[schema(value_type = Option<String>, format = DateTime)]
    #[serde(rename = "readAt")]
    pub read_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
