use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters accepted by the notification history index.
#[derive(Debug, Deserialize, IntoParams)]
pub(crate) struct IndexParams {
    /// Read-state filter: one of "", "all", "unread", "read". Anything else
    /// is rejected with a 400.
    pub status: Option<String>,
}
