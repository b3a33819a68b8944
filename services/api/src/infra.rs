use activity_portal::config::PortalConfig;
use activity_portal::error::AppError;
use activity_portal::portal::{
    AdminAccount, ApplicationTrack, InMemoryPortalStore, PortalService, StaticIdentityProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) type Portal = PortalService<InMemoryPortalStore, StaticIdentityProvider>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load the store from the configured data file, or start empty.
pub(crate) fn load_store(config: &PortalConfig) -> Result<Arc<InMemoryPortalStore>, AppError> {
    let store = match &config.data_file {
        Some(path) => {
            let store = InMemoryPortalStore::load(path)?;
            info!(path = %path.display(), "loaded portal data file");
            store
        }
        None => InMemoryPortalStore::default(),
    };
    Ok(Arc::new(store))
}

/// Write the store back to the data file, when one is configured.
pub(crate) fn persist_store(
    store: &InMemoryPortalStore,
    config: &PortalConfig,
) -> Result<(), AppError> {
    if let Some(path) = &config.data_file {
        store.save(path)?;
        info!(path = %path.display(), "saved portal data file");
    }
    Ok(())
}

pub(crate) fn identity_provider(config: &PortalConfig) -> Arc<StaticIdentityProvider> {
    let accounts = config
        .admin
        .iter()
        .map(|admin| AdminAccount {
            email: admin.email.clone(),
            password_sha256: admin.password_sha256.clone(),
        })
        .collect();
    let provider = StaticIdentityProvider::new(accounts);
    if provider.is_empty() {
        warn!("no administrator account configured; admin sign-in is disabled");
    }
    Arc::new(provider)
}

pub(crate) fn build_portal(
    store: Arc<InMemoryPortalStore>,
    config: &PortalConfig,
) -> Arc<Portal> {
    Arc::new(PortalService::new(
        store,
        identity_provider(config),
        config.utc_offset,
    ))
}

pub(crate) fn parse_track(raw: &str) -> Result<ApplicationTrack, String> {
    raw.parse::<activity_portal::portal::ActivityKind>()
        .map_err(|err| err.to_string())?
        .track()
        .ok_or_else(|| format!("'{raw}' does not take individual applications"))
}
