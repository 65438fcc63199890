use super::error::{EntityApiErrorKind, Error};
use entity::notifications::{ActiveModel, Column, Entity, Model};
use entity::status::NotificationStatus;
use entity::Id;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    DatabaseConnection, QueryOrder, TryIntoModel,
};

use log::*;

/// Persists a new notification row, assigning its id and creation timestamp.
pub async fn create(
    db: &DatabaseConnection,
    event_id: String,
    source_id: String,
    destination_id: String,
    data: String,
) -> Result<Model, Error> {
    debug!(
        "New notification to be inserted for destination {} from source {}",
        destination_id, source_id
    );

    let now = chrono::Utc::now();

    let notification_active_model: ActiveModel = ActiveModel {
        event_id: Set(event_id),
        source_id: Set(source_id),
        destination_id: Set(destination_id),
        data: Set(data),
        created_at: Set(now.into()),
        read_at: Set(None),
        ..Default::default()
    };

    Ok(notification_active_model.save(db).await?.try_into_model()?)
}

/// Finds a notification by id within the given recipient's scope. A row owned
/// by a different destination surfaces as RecordNotFound, never as the row.
pub async fn find_by_id(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .filter(Column::DestinationId.eq(destination_id))
        .one(db)
        .await?
        .ok_or_else(|| Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        })
}

/// All notifications of a recipient matching the status filter, ascending by
/// id (insertion order).
pub async fn find_by_status(
    db: &DatabaseConnection,
    destination_id: &str,
    status: NotificationStatus,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find().filter(Column::DestinationId.eq(destination_id));

    query = match status {
        NotificationStatus::All => query,
        NotificationStatus::Unread => query.filter(Column::ReadAt.is_null()),
        NotificationStatus::Read => query.filter(Column::ReadAt.is_not_null()),
    };

    Ok(query.order_by_asc(Column::Id).all(db).await?)
}

/// Overwrites the read timestamp, the only mutable field of a notification.
pub async fn update_read_at(
    db: &DatabaseConnection,
    notification: Model,
    read_at: Option<DateTimeWithTimeZone>,
) -> Result<Model, Error> {
    debug!(
        "Existing notification {} to have read_at set to {:?}",
        notification.id, read_at
    );

    let active_model: ActiveModel = ActiveModel {
        id: Unchanged(notification.id),
        event_id: Unchanged(notification.event_id),
        source_id: Unchanged(notification.source_id),
        destination_id: Unchanged(notification.destination_id),
        data: Unchanged(notification.data),
        created_at: Unchanged(notification.created_at),
        read_at: Set(read_at),
    };

    Ok(active_model.update(db).await?.try_into_model()?)
}

/// Removes a notification owned by the recipient.
pub async fn delete_by_id(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<(), Error> {
    let result = find_by_id(db, destination_id, id).await?;

    result.delete(db).await?;
    Ok(())
}
