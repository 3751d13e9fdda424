//! Wire contract of the remote script endpoint and the HTTP transport that
//! carries it.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::OrderDetails;
use crate::error::RemoteError;
use crate::flows::admin::Password;

/// Screenshot plus the order's field set, sent as one `submitOrder` call.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotUpload {
    /// Base64 of the raw file bytes.
    pub screenshot: String,
    pub filename: String,
    pub mime_type: String,
    pub order_details: OrderDetails,
}

impl fmt::Debug for ScreenshotUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenshotUpload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("encoded_len", &self.screenshot.len())
            .field("order_details", &self.order_details)
            .finish()
    }
}

/// Requests understood by the script endpoint, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum ScriptRequest {
    #[serde(rename = "submitOrder")]
    SubmitOrder(ScreenshotUpload),
    #[serde(rename = "getStatus")]
    GetStatus,
    #[serde(rename = "toggleOrders")]
    ToggleOrders { enabled: bool, password: Password },
    #[serde(rename = "getOrders")]
    GetOrders { limit: usize },
}

impl ScriptRequest {
    pub fn action(&self) -> &'static str {
        match self {
            ScriptRequest::SubmitOrder(_) => "submitOrder",
            ScriptRequest::GetStatus => "getStatus",
            ScriptRequest::ToggleOrders { .. } => "toggleOrders",
            ScriptRequest::GetOrders { .. } => "getOrders",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportReply {
    Body(Value),
    /// The request was dispatched but nothing about the reply can be read.
    Opaque,
}

/// One-shot request/response channel to the script endpoint.
#[async_trait]
pub trait ScriptTransport: Send + Sync {
    /// Whether the reply to a screenshot upload can be read. Every other
    /// action always reads its reply.
    fn reads_upload_reply(&self) -> bool;

    async fn post(&self, request: ScriptRequest) -> Result<TransportReply, RemoteError>;
}

/// POSTs JSON text to the configured URL. No timeout is set beyond the
/// client's defaults.
pub struct HttpTransport {
    client: Client,
    url: String,
    /// Uploads are fire-and-forget; their reply body is never read.
    opaque_uploads: bool,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, opaque_uploads: bool) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            opaque_uploads,
        }
    }
}

#[async_trait]
impl ScriptTransport for HttpTransport {
    fn reads_upload_reply(&self) -> bool {
        !self.opaque_uploads
    }

    #[instrument(name = "script_post", fields(action = request.action()), skip(self, request))]
    async fn post(&self, request: ScriptRequest) -> Result<TransportReply, RemoteError> {
        let opaque = self.opaque_uploads && matches!(request, ScriptRequest::SubmitOrder(_));
        let body = serde_json::to_string(&request).map_err(|e| RemoteError::Decode(e.to_string()))?;
        debug!(body_len = body.len(), "Sending request");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if opaque {
            debug!("Request dispatched, reply not readable");
            return Ok(TransportReply::Opaque);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let value = response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        debug!(status = status.as_u16(), "Reply received");
        Ok(TransportReply::Body(value))
    }
}
