//! Error types for the message bus adapter.
use std::error::Error as StdError;
use std::fmt;

/// Errors while talking to the message-oriented middleware, categorized by
/// the operation that failed. Publish failures are expected to be logged and
/// dropped by callers since durability is provided by the notification store.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: MessagingErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum MessagingErrorKind {
    ConnectFailure,
    PublishFailure,
    ConsumeFailure,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Messaging Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub(crate) fn connect(err: lapin::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: MessagingErrorKind::ConnectFailure,
        }
    }

    pub(crate) fn publish(err: impl StdError + Send + Sync + 'static) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: MessagingErrorKind::PublishFailure,
        }
    }

    pub(crate) fn consume(err: impl StdError + Send + Sync + 'static) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: MessagingErrorKind::ConsumeFailure,
        }
    }
}
