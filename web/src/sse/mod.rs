//! SSE HTTP handler for the web layer.
//!
//! This module contains only the axum handler and its deregistration guard.
//! The routing machinery (registry, sinks, the fan-out loop) lives in the
//! `broker` crate.

pub(crate) mod handler;
