pub mod channels;
pub mod condition;
pub mod delivery;
pub mod device;
pub mod document;
pub mod error;
pub mod recipient;
pub mod rule;
pub mod search;
pub mod template;
pub mod types;
