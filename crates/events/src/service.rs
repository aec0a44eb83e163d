//! Wiring of the PostgreSQL-backed pipeline.
//!
//! [`PushServices`] builds the fan-out engine and the dispatcher over one
//! [`PgStore`] from a [`PushConfig`]. Both the API server and the worker
//! binary start from it.

use std::path::Path;
use std::sync::Arc;

use beacon_db::repositories::PushSettingsRepo;
use beacon_db::DbPool;

use crate::config::PushConfig;
use crate::delivery::credential::{
    CredentialError, CredentialProvider, ServiceAccount, StoredCredentialSource,
};
use crate::delivery::fcm::FcmClient;
use crate::dispatcher::DeliveryDispatcher;
use crate::fanout::FanoutEngine;
use crate::recipients::{RecipientResolver, TeamAssignmentStrategy};
use crate::store::PgStore;

// ---------------------------------------------------------------------------
// Credential seeding
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read credentials file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Failed to store credentials: {0}")]
    Database(#[from] sqlx::Error),
}

/// Copy a service-account file into `push_settings`.
///
/// The file must parse as a service account; a broken file never replaces a
/// working stored blob.
pub async fn seed_credentials(pool: &DbPool, path: &Path) -> Result<(), SeedError> {
    let blob = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let account = ServiceAccount::parse(&blob)?;
    PushSettingsRepo::set_service_account_json(pool, &blob).await?;
    tracing::info!(
        project_id = %account.project_id,
        client_email = %account.client_email,
        "Push credentials loaded from file"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// PushServices
// ---------------------------------------------------------------------------

pub struct PushServices {
    pub store: PgStore,
    pub engine: Arc<FanoutEngine>,
    pub dispatcher: Arc<DeliveryDispatcher>,
}

impl PushServices {
    pub fn new(pool: DbPool, config: &PushConfig) -> Result<Self, reqwest::Error> {
        let store = PgStore::new(pool);
        let shared = Arc::new(store.clone());

        let mut resolver = RecipientResolver::new();
        for doctype in &config.team_doctypes {
            resolver = resolver.with_strategy(
                doctype.clone(),
                Arc::new(TeamAssignmentStrategy::new(shared.clone())),
            );
        }
        let engine = Arc::new(FanoutEngine::new(shared.clone(), shared.clone(), resolver));

        let tokens = StoredCredentialSource::new(
            shared.clone(),
            CredentialProvider::new(config.request_timeout)?,
        );
        let transport = FcmClient::new(config.fcm_api_base.clone(), config.request_timeout)?;
        let dispatcher = Arc::new(DeliveryDispatcher::new(
            shared.clone(),
            shared,
            Arc::new(tokens),
            Arc::new(transport),
        ));

        Ok(Self {
            store,
            engine,
            dispatcher,
        })
    }
}
