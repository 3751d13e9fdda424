use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::transport::{ScreenshotUpload, ScriptRequest, ScriptTransport, TransportReply};
use crate::domain::Order;
use crate::error::RemoteError;
use crate::flows::admin::Password;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfo {
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SheetStatus {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `submitOrder`. The file reference shows up either at the top level
/// or under `upload`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub upload: Option<UploadInfo>,
    #[serde(default)]
    pub sheet: Option<SheetStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    orders_enabled: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    orders: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Typed calls against the script endpoint.
#[derive(Clone)]
pub struct ScriptClient {
    transport: Arc<dyn ScriptTransport>,
}

impl ScriptClient {
    pub fn new(transport: Arc<dyn ScriptTransport>) -> Self {
        Self { transport }
    }

    async fn readable_body<T>(&self, request: ScriptRequest) -> Result<T, RemoteError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.transport.post(request).await? {
            TransportReply::Body(value) => {
                serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
            }
            TransportReply::Opaque => Err(RemoteError::Opaque),
        }
    }

    /// Uploads the screenshot with the order details. `Ok(None)` means the
    /// request went out but the reply is opaque.
    #[instrument(fields(filename = %upload.filename), skip(self, upload))]
    pub async fn submit_order(&self, upload: ScreenshotUpload) -> Result<Option<SubmitResponse>, RemoteError> {
        debug!(reply_readable = self.transport.reads_upload_reply(), "Sending request");
        let value = match self.transport.post(ScriptRequest::SubmitOrder(upload)).await? {
            TransportReply::Opaque => return Ok(None),
            TransportReply::Body(value) => value,
        };
        let response: SubmitResponse =
            serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response.error.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        if let Some(SheetStatus { ok: false, error }) = &response.sheet {
            warn!(error = ?error, "Sheet append failed");
        }
        Ok(Some(response))
    }

    /// Current value of the remote ordering flag.
    #[instrument(skip(self))]
    pub async fn get_status(&self) -> Result<bool, RemoteError> {
        debug!("Sending request");
        let response: StatusResponse = self.readable_body(ScriptRequest::GetStatus).await?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response.error.unwrap_or_else(|| "Status unavailable".to_string()),
            ));
        }
        Ok(response.orders_enabled.unwrap_or(false))
    }

    /// Asks the service to set the flag; returns the value the server settled on.
    #[instrument(skip(self, password))]
    pub async fn toggle_orders(&self, enabled: bool, password: Password) -> Result<bool, RemoteError> {
        debug!("Sending request");
        let response: StatusResponse = self
            .readable_body(ScriptRequest::ToggleOrders { enabled, password })
            .await?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "Failed to update order status".to_string()),
            ));
        }
        Ok(response.orders_enabled.unwrap_or(false))
    }

    /// Shared order list for display. Rows that are not orders are dropped.
    #[instrument(skip(self))]
    pub async fn get_orders(&self, limit: usize) -> Result<Vec<Order>, RemoteError> {
        debug!("Sending request");
        let response: OrdersResponse = self.readable_body(ScriptRequest::GetOrders { limit }).await?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response.error.unwrap_or_else(|| "Orders unavailable".to_string()),
            ));
        }
        let total = response.orders.len();
        let orders: Vec<Order> = response
            .orders
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();
        if orders.len() < total {
            warn!(skipped = total - orders.len(), "Skipped unreadable remote order rows");
        }
        Ok(orders)
    }
}
