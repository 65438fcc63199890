pub mod notifications;
pub mod status;

/// A type alias that represents a Notification's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = i64;
