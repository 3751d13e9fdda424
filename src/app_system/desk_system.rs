use std::sync::Arc;

use tracing::{error, info};

use crate::actors::DeskService;
use crate::clients::{HttpTransport, OrderDeskClient, ScriptClient, ScriptTransport};
use crate::config::DeskConfig;
use crate::domain::Catalog;
use crate::error::ConfigError;
use crate::storage::{FileStore, KeyValueStore, OrderCache};

/// The running desk: the session service plus the client that drives it.
///
/// Responsible for loading the cache, starting the service, wiring the
/// remote transport in, and shutting everything down.
pub struct DeskSystem {
    pub client: OrderDeskClient,
    handle: tokio::task::JoinHandle<()>,
}

impl DeskSystem {
    pub async fn new(config: &DeskConfig) -> Result<Self, ConfigError> {
        let catalog = config.catalog()?;
        let store = FileStore::new(config.storage_dir.clone());
        let transport = HttpTransport::new(config.script_url.clone(), config.opaque_responses);
        let remote_recent_limit = config
            .remote_recent_orders
            .then_some(config.recent_orders_limit);
        Ok(Self::with_parts(catalog, Box::new(store), Arc::new(transport), remote_recent_limit).await)
    }

    pub async fn with_parts(
        catalog: Catalog,
        store: Box<dyn KeyValueStore>,
        transport: Arc<dyn ScriptTransport>,
        remote_recent_limit: Option<usize>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let cache = OrderCache::load(store).await;

        let (service, desk_client) = DeskService::new(32, catalog.clone(), cache);
        let handle = tokio::spawn(service.run());

        let client = OrderDeskClient::new(
            desk_client,
            ScriptClient::new(transport),
            catalog,
            remote_recent_limit,
        );
        info!("Desk system started");
        Self { client, handle }
    }

    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down desk...");
        if let Err(e) = self.client.desk().shutdown().await {
            error!(error = %e, "Shutdown request not delivered");
        }
        drop(self.client);

        if let Err(e) = self.handle.await {
            error!("Desk task failed: {:?}", e);
            return Err(format!("Desk task failed: {:?}", e));
        }

        info!("Desk shutdown complete.");
        Ok(())
    }
}
