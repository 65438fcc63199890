pub use entity::{notifications, status::NotificationStatus, Id};

pub mod error;
pub mod notification;

/// Parses a status filter coming in from the query surface. An unknown value
/// is an invalid query term, not an empty result.
pub fn status_parse_str(status: &str) -> Result<NotificationStatus, error::Error> {
    status.parse().map_err(|_| error::Error {
        source: None,
        error_kind: error::EntityApiErrorKind::InvalidQueryTerm,
    })
}
