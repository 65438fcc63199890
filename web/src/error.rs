//! Error handling for the web layer.
//!
//! Handlers bubble `domain` errors up unchanged; this module is the one
//! place where an error becomes an HTTP response. The surface promises a
//! small set of statuses: bad input is a 400, failed auth a 401, a missing
//! or foreign notification a 404, and anything broken below the HTTP layer
//! an opaque 500.
use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{DomainErrorKind, EntityErrorKind, Error as DomainError, InternalErrorKind};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Raised below the HTTP surface and translated by status_code
    Domain(DomainError),
    /// Raised by the HTTP surface itself
    Web(WebErrorKind),
}

#[derive(Debug)]
pub enum WebErrorKind {
    Input,
    Auth,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Client mistakes are routine; a 5xx means a dependency or an
        // invariant failed and deserves a loud log line.
        if status.is_server_error() {
            error!("Request failed with {status}: {self:?}");
        } else {
            debug!("Request rejected with {status}: {self:?}");
        }

        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Web(WebErrorKind::Input) => StatusCode::BAD_REQUEST,
            Error::Web(WebErrorKind::Auth) => StatusCode::UNAUTHORIZED,
            Error::Domain(domain_error) => match &domain_error.error_kind {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)) => {
                    StatusCode::NOT_FOUND
                }
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid)) => {
                    StatusCode::BAD_REQUEST
                }
                // Store trouble and bus trouble look the same from outside.
                DomainErrorKind::Internal(InternalErrorKind::Entity(
                    EntityErrorKind::DbTransaction,
                ))
                | DomainErrorKind::External(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Error::Domain(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::error::ExternalErrorKind;

    fn domain_error(error_kind: DomainErrorKind) -> Error {
        Error::Domain(DomainError {
            source: None,
            error_kind,
        })
    }

    fn entity_error(entity_error_kind: EntityErrorKind) -> Error {
        domain_error(DomainErrorKind::Internal(InternalErrorKind::Entity(
            entity_error_kind,
        )))
    }

    #[test]
    fn each_error_kind_maps_to_its_promised_status() {
        assert_eq!(
            Error::Web(WebErrorKind::Input).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Web(WebErrorKind::Auth).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            entity_error(EntityErrorKind::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            entity_error(EntityErrorKind::Invalid).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn everything_broken_below_the_surface_is_an_opaque_500() {
        assert_eq!(
            entity_error(EntityErrorKind::DbTransaction).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            domain_error(DomainErrorKind::External(ExternalErrorKind::Bus)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
