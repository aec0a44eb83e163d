//! Push notification pipeline.
//!
//! Document events enter through the [`TriggerHook`], which runs the
//! [`FanoutEngine`] inline to turn each event into durable delivery records
//! before the event is acknowledged. Record ids flow through the [`DispatchQueue`] to the
//! [`DeliveryDispatcher`], which sends them to the push provider. The
//! [`PendingSweeper`] re-enqueues records whose dispatch did not complete.
//!
//! - [`store`] -- storage traits with PostgreSQL and in-memory backends.
//! - [`recipients`] -- rule + document to recipient set resolution.
//! - [`delivery`] -- provider credential exchange and the FCM client.
//! - [`service`] -- PostgreSQL wiring shared by the binaries.

pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod event;
pub mod fanout;
pub mod queue;
pub mod recipients;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod trigger;

pub use config::PushConfig;
pub use delivery::credential::{
    AccessToken, CredentialError, CredentialProvider, StoredCredentialSource, TokenSource,
};
pub use delivery::fcm::{FcmClient, FcmError, PushTransport};
pub use dispatcher::{DeliveryDispatcher, DispatchError, DispatchOutcome};
pub use event::DocumentEvent;
pub use fanout::{FanoutEngine, FanoutError, FanoutReport, SkipReason};
pub use queue::DispatchQueue;
pub use recipients::{RecipientResolver, RecipientStrategy, TeamAssignmentStrategy};
pub use service::{seed_credentials, PushServices, SeedError};
#[cfg(any(test, feature = "test-util"))]
pub use store::MemoryStore;
pub use store::{PgStore, StoreError};
pub use sweeper::{PendingSweeper, SweepReport};
pub use trigger::TriggerHook;
