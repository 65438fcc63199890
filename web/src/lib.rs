//! HTTP surface for the Mercurio notification broker.
//!
//! Routes, controllers, the bearer-token middleware, and the SSE streaming
//! handler live here. Handlers talk to the fan-out engine only through its
//! public notify operations and to the store only through the `domain` crate.

pub(crate) mod controller;
pub mod error;
pub(crate) mod middleware;
pub(crate) mod params;
pub(crate) mod response;
pub mod router;
pub(crate) mod sse;

pub use error::{Error, Result};
pub use service::AppState;
