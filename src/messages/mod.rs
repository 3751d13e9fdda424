use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::domain::Order;
use crate::error::DeskError;
use crate::storage::{OrderSummary, OrderView};

/// Generic type aliases for service communication
pub type ServiceResult<T, E> = std::result::Result<T, E>;
pub type ServiceResponse<T, E> = oneshot::Sender<ServiceResult<T, E>>;

/// Messages understood by the desk service, the single owner of the
/// ordering flag and the order cache. Each variant carries a oneshot channel
/// for the reply.
#[derive(Debug)]
pub enum DeskRequest {
    OrdersEnabled {
        respond_to: ServiceResponse<bool, DeskError>,
    },
    SetOrdersEnabled {
        enabled: bool,
        respond_to: ServiceResponse<bool, DeskError>,
    },
    RecordOrder {
        order: Order,
        respond_to: ServiceResponse<usize, DeskError>,
    },
    Summary {
        now: DateTime<Utc>,
        respond_to: ServiceResponse<OrderSummary, DeskError>,
    },
    RecentOrders {
        limit: usize,
        now: DateTime<Utc>,
        respond_to: ServiceResponse<Vec<OrderView>, DeskError>,
    },
    ExportOrders {
        respond_to: ServiceResponse<String, DeskError>,
    },
    Shutdown,
    #[cfg(test)]
    CachedOrderCount {
        respond_to: ServiceResponse<usize, DeskError>,
    },
}
