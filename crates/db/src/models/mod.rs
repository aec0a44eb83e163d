//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row plus the input types its repository accepts.

pub mod delivery;
pub mod device;
pub mod rule;
pub mod settings;
pub mod team;
