use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::domain::Order;
use crate::error::DeskError;
use crate::messages::DeskRequest;
use crate::storage::{OrderSummary, OrderView};

pub mod order_desk_client;
pub mod script_client;
pub mod transport;

pub use order_desk_client::OrderDeskClient;
pub use script_client::ScriptClient;
pub use transport::{HttpTransport, ScriptTransport};

// =============================================================================
// Client method macro
// =============================================================================

/// Generate client methods with oneshot channel boilerplate and automatic tracing.
macro_rules! client_method {
    ($client:ty => fn $method:ident($($param:ident: $param_type:ty),*) -> $return_type:ty as $request:ident::$variant:ident, Error = $error_type:ty) => {
        impl $client {
            #[instrument(skip(self))]
            pub async fn $method(&self, $($param: $param_type),*) -> Result<$return_type, $error_type> {
                debug!("Sending request");
                let (respond_to, response) = oneshot::channel();
                self.sender.send($request::$variant {
                    $($param,)*
                    respond_to,
                }).await.map_err(|_| <$error_type>::ActorCommunicationError("Actor closed".to_string()))?;

                response.await.map_err(|_| <$error_type>::ActorCommunicationError("Actor dropped".to_string()))?
            }
        }
    };
}

// =============================================================================
// Desk Client
// =============================================================================

/// Handle to the desk service. Thin wrapper around its message channel.
#[derive(Clone)]
pub struct DeskClient {
    sender: mpsc::Sender<DeskRequest>,
}

impl DeskClient {
    pub fn new(sender: mpsc::Sender<DeskRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), DeskError> {
        debug!("Sending shutdown request");
        self.sender
            .send(DeskRequest::Shutdown)
            .await
            .map_err(|e| DeskError::ActorCommunicationError(e.to_string()))
    }
}

client_method!(DeskClient => fn orders_enabled() -> bool as DeskRequest::OrdersEnabled, Error = DeskError);
client_method!(DeskClient => fn set_orders_enabled(enabled: bool) -> bool as DeskRequest::SetOrdersEnabled, Error = DeskError);
client_method!(DeskClient => fn record_order(order: Order) -> usize as DeskRequest::RecordOrder, Error = DeskError);
client_method!(DeskClient => fn summary(now: DateTime<Utc>) -> OrderSummary as DeskRequest::Summary, Error = DeskError);
client_method!(DeskClient => fn recent_orders(limit: usize, now: DateTime<Utc>) -> Vec<OrderView> as DeskRequest::RecentOrders, Error = DeskError);
client_method!(DeskClient => fn export_orders() -> String as DeskRequest::ExportOrders, Error = DeskError);

// Test-only inspection of the cache size
#[cfg(test)]
client_method!(DeskClient => fn cached_order_count() -> usize as DeskRequest::CachedOrderCount, Error = DeskError);
