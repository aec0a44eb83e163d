//! Request extractors shared by handlers.
//!
//! - [`session::SessionUser`] -- the acting user forwarded by the host application.

pub mod session;
