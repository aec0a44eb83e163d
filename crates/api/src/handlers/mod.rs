//! Request handlers.
//!
//! Each submodule provides the async handler functions for one resource.
//! Handlers delegate to the repositories in `beacon_db` (or hand events to the
//! trigger hook) and map errors via [`AppError`](crate::error::AppError).

pub mod delivery;
pub mod device;
pub mod hook;
pub mod rule;
pub mod team;
