//! Swappable policy families. Each family is a trait with a boxed resource
//! wrapper; the active implementation is resolved once from [`crate::scenario::params`]
//! kinds during scenario building, never per call.

pub mod acceptance;
pub mod buffering;
pub mod cancellation;
pub mod movement;
pub mod prepositioning;
