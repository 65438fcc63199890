//! Domain operations over per-recipient notifications.
//!
//! Every operation is scoped by the recipient's `destination_id`: a
//! notification owned by another recipient is indistinguishable from a
//! missing one, which keeps the history endpoints from leaking existence.

use crate::error::Error;
use entity_api::{notification, notifications::Model, status_parse_str, Id};
use sea_orm::DatabaseConnection;

/// Persists a new notification and returns the stored record with its
/// assigned id and creation timestamp.
pub async fn create(
    db: &DatabaseConnection,
    event_id: String,
    source_id: String,
    destination_id: String,
    data: String,
) -> Result<Model, Error> {
    Ok(notification::create(db, event_id, source_id, destination_id, data).await?)
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<Model, Error> {
    Ok(notification::find_by_id(db, destination_id, id).await?)
}

/// Lists a recipient's notifications filtered by read state. An unknown
/// status string is invalid input, not an empty result.
pub async fn find_by_status(
    db: &DatabaseConnection,
    destination_id: &str,
    status: &str,
) -> Result<Vec<Model>, Error> {
    let status = status_parse_str(status)?;

    Ok(notification::find_by_status(db, destination_id, status).await?)
}

/// Marks a notification read. A read notification is simply one that has a
/// read time, so marking twice refreshes the timestamp but the state stays
/// "read".
pub async fn mark_read(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<Model, Error> {
    let existing = notification::find_by_id(db, destination_id, id).await?;
    let read_at = chrono::Utc::now();

    Ok(notification::update_read_at(db, existing, Some(read_at.into())).await?)
}

/// Clears the read time, returning the notification to "unread". Idempotent
/// at the final-state level.
pub async fn mark_unread(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<Model, Error> {
    let existing = notification::find_by_id(db, destination_id, id).await?;

    Ok(notification::update_read_at(db, existing, None).await?)
}

pub async fn delete_by_id(
    db: &DatabaseConnection,
    destination_id: &str,
    id: Id,
) -> Result<(), Error> {
    Ok(notification::delete_by_id(db, destination_id, id).await?)
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn find_by_status_rejects_an_unknown_filter() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let result = find_by_status(&db, "123", "seen").await;

        assert_eq!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid))
        );
    }

    #[tokio::test]
    async fn find_by_id_translates_a_missing_row_to_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let result = find_by_id(&db, "123", 99).await;

        assert_eq!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
        );
    }

    #[tokio::test]
    async fn mark_read_then_unread_round_trips_the_read_state() {
        let now = chrono::Utc::now();
        let unread = Model {
            id: 1,
            event_id: "5e31f0bc-87b9-4f53-a917-c2e3d1a7bd2b".to_owned(),
            source_id: "test".to_owned(),
            destination_id: "123".to_owned(),
            data: "hello".to_owned(),
            created_at: now.into(),
            read_at: None,
        };
        let mut read = unread.clone();
        read.read_at = Some(now.into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // mark_read: find + update
            .append_query_results(vec![vec![unread.clone()], vec![read.clone()]])
            // mark_unread: find + update
            .append_query_results(vec![vec![read.clone()], vec![unread.clone()]])
            .into_connection();

        let notification = mark_read(&db, "123", 1).await.unwrap();
        assert!(notification.read_at.is_some());

        let notification = mark_unread(&db, "123", 1).await.unwrap();
        assert!(notification.read_at.is_none());
    }
}
