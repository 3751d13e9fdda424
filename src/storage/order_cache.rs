use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::KeyValueStore;
use crate::domain::{format_local_date, format_rupees, Catalog, Order};
use crate::error::StorageError;

pub const ORDERS_KEY: &str = "cgmOrders";
pub const NO_ORDERS_PLACEHOLDER: &str = "No orders yet. Be the first to order!";

const CSV_HEADERS: [&str; 8] = [
    "Name",
    "Phone",
    "Sensor Type",
    "Quantity",
    "Pickup Location",
    "Notes",
    "Emergency Contact",
    "Order Date",
];

/// Newest-first list of this installation's own orders, mirrored to the store
/// under [`ORDERS_KEY`] after every change.
pub struct OrderCache {
    store: Box<dyn KeyValueStore>,
    orders: Vec<Order>,
}

impl OrderCache {
    /// Reads the stored list. Missing or corrupt content is an empty history.
    pub async fn load(store: Box<dyn KeyValueStore>) -> Self {
        let orders = match store.get(ORDERS_KEY).await {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<Order>>(&raw) {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(error = %e, "Stored orders unreadable, starting with empty history");
                    Vec::new()
                }
            },
        };
        debug!(order_count = orders.len(), "Order cache loaded");
        Self { store, orders }
    }

    #[cfg(test)]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Inserts at the front and persists the whole list. A failed write
    /// leaves the cache as it was.
    pub async fn append(&mut self, order: Order) -> Result<(), StorageError> {
        self.orders.insert(0, order);
        if let Err(e) = self.persist().await {
            self.orders.remove(0);
            return Err(e);
        }
        info!(order_count = self.orders.len(), "Order cached");
        Ok(())
    }

    async fn persist(&mut self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.orders)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.store.set(ORDERS_KEY, &raw).await
    }

    pub fn summarize(&self, catalog: &Catalog, now: DateTime<Utc>) -> OrderSummary {
        let total_units = self.orders.iter().map(|o| u64::from(o.quantity)).sum();
        // Orders whose variant left the catalog contribute no savings.
        let total_savings = self
            .orders
            .iter()
            .filter_map(|o| catalog.sensor(&o.sensor_type).map(|s| s.savings * u64::from(o.quantity)))
            .sum();
        OrderSummary {
            total_orders: self.orders.len(),
            total_units,
            total_savings,
            last_order: self
                .orders
                .first()
                .map(|o| time_ago(now.signed_duration_since(o.timestamp).num_seconds())),
        }
    }

    pub fn render(&self, catalog: &Catalog, limit: usize, now: DateTime<Utc>) -> Vec<OrderView> {
        render_orders(&self.orders, catalog, limit, now)
    }

    pub fn export(&self, catalog: &Catalog) -> String {
        export_csv(&self.orders, catalog)
    }
}

/// Counters shown above the recent-orders feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub total_units: u64,
    pub total_savings: u64,
    /// `None` when there are no orders yet.
    pub last_order: Option<String>,
}

impl fmt::Display for OrderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total orders:  {}", self.total_orders)?;
        writeln!(f, "Total sensors: {}", self.total_units)?;
        writeln!(f, "Group savings: {}", format_rupees(self.total_savings))?;
        write!(f, "Last order:    {}", self.last_order.as_deref().unwrap_or("-"))
    }
}

/// Relative age of an event `seconds` ago.
pub fn time_ago(seconds: i64) -> String {
    if seconds < 60 {
        "Just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

/// Display-ready entry of the recent-orders feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub name: String,
    pub time_ago: String,
    pub placed_at: String,
    pub sensor: String,
    pub quantity: u32,
    pub guardian_name: Option<String>,
    pub amount: u64,
    pub pickup: String,
    pub notes: Option<String>,
}

impl fmt::Display for OrderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  [{} · {}]", self.name, self.time_ago, self.placed_at)?;
        writeln!(f, "  {} - {} quantity", self.sensor, self.quantity)?;
        if let Some(guardian) = &self.guardian_name {
            writeln!(f, "  Parent/Guardian: {}", guardian)?;
        }
        writeln!(f, "  Amount: {}", format_rupees(self.amount))?;
        write!(f, "  Pickup: {}", self.pickup)?;
        if let Some(notes) = &self.notes {
            write!(f, "\n  Notes: {}", notes)?;
        }
        Ok(())
    }
}

pub fn render_orders(
    orders: &[Order],
    catalog: &Catalog,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<OrderView> {
    orders
        .iter()
        .take(limit)
        .map(|order| OrderView {
            name: order.name.clone(),
            time_ago: time_ago(now.signed_duration_since(order.timestamp).num_seconds()),
            placed_at: order.placed_at_text(),
            sensor: catalog.sensor_label(&order.sensor_type),
            quantity: order.quantity,
            guardian_name: order.guardian_name.clone(),
            amount: if order.total_amount > 0 {
                order.total_amount
            } else {
                catalog.total_for(&order.sensor_type, order.quantity)
            },
            pickup: catalog.pickup_label(&order.pickup_location),
            notes: order.notes.clone(),
        })
        .collect()
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Header row plus one quoted row per order, in list order.
pub fn export_csv(orders: &[Order], catalog: &Catalog) -> String {
    let header = CSV_HEADERS.iter().map(|h| quote(h)).collect::<Vec<_>>().join(",");
    let rows = orders.iter().map(|order| {
        [
            order.name.clone(),
            order.phone.clone(),
            catalog.sensor_label(&order.sensor_type),
            order.quantity.to_string(),
            catalog.pickup_label(&order.pickup_location),
            order.notes.clone().unwrap_or_default(),
            order.emergency_contact.clone().unwrap_or_default(),
            format_local_date(order.timestamp),
        ]
        .iter()
        .map(|cell| quote(cell))
        .collect::<Vec<_>>()
        .join(",")
    });
    std::iter::once(header).chain(rows).collect::<Vec<_>>().join("\n")
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("cgm-orders-{}.csv", now.format("%Y-%m-%d"))
}
