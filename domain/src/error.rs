//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use messaging::error::{Error as MessagingError, MessagingErrorKind};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
///
/// `web` depends on `domain` but must not reach into `entity_api` or
/// `messaging` directly, so errors from those crates are translated here
/// into a small kind tree: internal kinds for anything this process owns
/// (the store), external kinds for its collaborators (the message bus).
/// The original lower-layer error rides along in `source` for logging.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
}

/// What went wrong at the store, reduced to the distinctions the HTTP
/// surface actually responds to.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    /// Row absent, or owned by a different recipient
    NotFound,
    /// The request asked for something the store cannot be queried for
    Invalid,
    /// The database itself misbehaved
    DbTransaction,
}

#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Bus,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm => EntityErrorKind::Invalid,
            EntityApiErrorKind::RecordNotUpdated | EntityApiErrorKind::SystemError => {
                EntityErrorKind::DbTransaction
            }
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

// Bus errors are external: the middleware lives outside this process.
impl From<MessagingError> for Error {
    fn from(err: MessagingError) -> Self {
        let error_kind = match err.error_kind {
            MessagingErrorKind::ConnectFailure
            | MessagingErrorKind::PublishFailure
            | MessagingErrorKind::ConsumeFailure => DomainErrorKind::External(ExternalErrorKind::Bus),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
