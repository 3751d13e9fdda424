use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::clients::DeskClient;
use crate::domain::{Catalog, Order};
use crate::error::DeskError;
use crate::messages::{DeskRequest, ServiceResponse};
use crate::storage::{OrderCache, OrderSummary, OrderView};

// =============================================================================
// DESK SERVICE
// =============================================================================

/// Session controller. Owns the ordering flag and the order cache; every
/// read or write of either goes through this actor's queue.
pub struct DeskService {
    receiver: mpsc::Receiver<DeskRequest>,
    catalog: Arc<Catalog>,
    cache: OrderCache,
    orders_enabled: bool,
}

impl DeskService {
    pub fn new(buffer_size: usize, catalog: Arc<Catalog>, cache: OrderCache) -> (Self, DeskClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let service = Self {
            receiver,
            catalog,
            cache,
            // Optimistic until the remote status says otherwise.
            orders_enabled: true,
        };
        let client = DeskClient::new(sender);
        (service, client)
    }

    #[instrument(name = "desk_service", skip(self))]
    pub async fn run(mut self) {
        info!(cached_orders = self.cache.len(), "DeskService starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                DeskRequest::OrdersEnabled { respond_to } => {
                    let _ = respond_to.send(Ok(self.orders_enabled));
                }
                DeskRequest::SetOrdersEnabled { enabled, respond_to } => {
                    self.handle_set_orders_enabled(enabled, respond_to);
                }
                DeskRequest::RecordOrder { order, respond_to } => {
                    self.handle_record_order(order, respond_to).await;
                }
                DeskRequest::Summary { now, respond_to } => {
                    self.handle_summary(now, respond_to);
                }
                DeskRequest::RecentOrders { limit, now, respond_to } => {
                    self.handle_recent_orders(limit, now, respond_to);
                }
                DeskRequest::ExportOrders { respond_to } => {
                    let _ = respond_to.send(Ok(self.cache.export(&self.catalog)));
                }
                DeskRequest::Shutdown => {
                    info!("DeskService shutting down");
                    break;
                }
                #[cfg(test)]
                DeskRequest::CachedOrderCount { respond_to } => {
                    let _ = respond_to.send(Ok(self.cache.len()));
                }
            }
        }

        info!("DeskService stopped");
    }

    #[instrument(skip(self, respond_to))]
    fn handle_set_orders_enabled(&mut self, enabled: bool, respond_to: ServiceResponse<bool, DeskError>) {
        if self.orders_enabled != enabled {
            info!(previous = self.orders_enabled, "Ordering flag changed");
        }
        self.orders_enabled = enabled;
        let _ = respond_to.send(Ok(enabled));
    }

    #[instrument(fields(order_id = order.id, quantity = order.quantity), skip(self, order, respond_to))]
    async fn handle_record_order(&mut self, order: Order, respond_to: ServiceResponse<usize, DeskError>) {
        debug!("Processing record_order request");
        let result = match self.cache.append(order).await {
            Ok(()) => Ok(self.cache.len()),
            Err(e) => {
                error!(error = %e, "Failed to persist order");
                Err(DeskError::Storage(e))
            }
        };
        let _ = respond_to.send(result);
    }

    fn handle_summary(&self, now: DateTime<Utc>, respond_to: ServiceResponse<OrderSummary, DeskError>) {
        let _ = respond_to.send(Ok(self.cache.summarize(&self.catalog, now)));
    }

    #[instrument(skip(self, now, respond_to))]
    fn handle_recent_orders(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        respond_to: ServiceResponse<Vec<OrderView>, DeskError>,
    ) {
        let views = self.cache.render(&self.catalog, limit, now);
        debug!(shown = views.len(), "Rendered recent orders");
        let _ = respond_to.send(Ok(views));
    }
}
