//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! `&PgPool`, or `&mut PgConnection` where the caller owns the transaction.

pub mod delivery_attempt_repo;
pub mod device_repo;
pub mod push_delivery_repo;
pub mod push_settings_repo;
pub mod rule_repo;
pub mod team_repo;

pub use delivery_attempt_repo::DeliveryAttemptRepo;
pub use device_repo::DeviceRepo;
pub use push_delivery_repo::PushDeliveryRepo;
pub use push_settings_repo::PushSettingsRepo;
pub use rule_repo::NotificationRuleRepo;
pub use team_repo::TeamRepo;
