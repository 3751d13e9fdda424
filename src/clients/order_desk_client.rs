use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use super::{DeskClient, ScriptClient};
use crate::domain::{Attachment, Catalog, OrderForm};
use crate::error::{AdminError, DeskError, SubmissionError};
use crate::flows::admin::{toggle_failure, Password, ToggleOutcome};
use crate::flows::submission::{self, Confirmation};
use crate::storage::{render_orders, OrderView};

/// Client for the buyer and admin flows.
///
/// Orchestrates the remote script calls around the desk service: remote work
/// happens here, outside the actor, so uploads, status refreshes and toggles
/// never wait on one another.
#[derive(Clone)]
pub struct OrderDeskClient {
    desk: DeskClient,
    script: ScriptClient,
    catalog: Arc<Catalog>,
    /// Fetch limit when the recent feed is read from the remote service.
    remote_recent_limit: Option<usize>,
}

impl OrderDeskClient {
    pub fn new(
        desk: DeskClient,
        script: ScriptClient,
        catalog: Arc<Catalog>,
        remote_recent_limit: Option<usize>,
    ) -> Self {
        Self {
            desk,
            script,
            catalog,
            remote_recent_limit,
        }
    }

    pub fn desk(&self) -> &DeskClient {
        &self.desk
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[instrument(fields(buyer = %form.name, quantity = %form.quantity), skip(self, form, attachments))]
    pub async fn submit_order(
        &self,
        form: &OrderForm,
        attachments: &[Attachment],
    ) -> Result<Confirmation, SubmissionError> {
        info!("Processing submit_order request");

        // Step 1: Gate on the ordering flag
        if !self.desk.orders_enabled().await? {
            warn!("Submission rejected, orders disabled");
            return Err(SubmissionError::OrdersDisabled);
        }

        // Step 2: Validate locally
        let details = submission::validate(form, attachments, &self.catalog).map_err(|e| {
            info!(error = %e, "Form validation failed");
            e
        })?;
        let proof = &attachments[0];

        // Step 3: Upload screenshot with the order details
        let upload = submission::encode_upload(&details, proof, Utc::now());
        let response = self.script.submit_order(upload).await.map_err(|e| {
            error!(error = %e, "Screenshot upload failed");
            SubmissionError::Upload(e)
        })?;
        if response.is_none() {
            debug!("Opaque reply, assuming upload succeeded");
        }
        let proof_url = submission::proof_reference(response.as_ref());

        // Step 4: Price, stamp and record
        let order = submission::finalize(details, &self.catalog, proof_url, Utc::now());
        let confirmation = Confirmation::for_order(&order, &self.catalog);
        let order_id = order.id;
        let cached = self.desk.record_order(order).await?;

        info!(order_id, cached_orders = cached, "Order submitted successfully");
        Ok(confirmation)
    }

    /// Best-effort refresh of the ordering flag. Failures keep the current
    /// value without telling the user.
    #[instrument(skip(self))]
    pub async fn fetch_status(&self) -> Result<bool, DeskError> {
        match self.script.get_status().await {
            Ok(enabled) => {
                info!(orders_enabled = enabled, "Remote order status received");
                self.desk.set_orders_enabled(enabled).await
            }
            Err(e) => {
                debug!(error = %e, "Status refresh failed, keeping current value");
                self.desk.orders_enabled().await
            }
        }
    }

    /// Password-gated change of the ordering flag. `password_input` is the raw
    /// prompt result; `None` means the prompt was cancelled.
    #[instrument(skip(self, password_input))]
    pub async fn set_orders_enabled(&self, desired: bool, password_input: Option<String>) -> ToggleOutcome {
        let previous = match self.desk.orders_enabled().await {
            Ok(value) => value,
            Err(e) => {
                return ToggleOutcome::resolve(!desired, Err(AdminError::from(e)));
            }
        };
        let result = self.toggle(desired, password_input).await;
        if let Err(e) = &result {
            warn!(error = %e, "Order status update failed");
        }
        ToggleOutcome::resolve(previous, result)
    }

    async fn toggle(&self, desired: bool, password_input: Option<String>) -> Result<bool, AdminError> {
        let password = Password::from_prompt(password_input)?;
        let confirmed = self
            .script
            .toggle_orders(desired, password)
            .await
            .map_err(toggle_failure)?;
        if confirmed != desired {
            info!(confirmed, "Server settled on a different value");
        }
        Ok(self.desk.set_orders_enabled(confirmed).await?)
    }

    /// Newest orders for the feed: from the remote service when configured,
    /// falling back to the local cache if that read fails.
    #[instrument(skip(self))]
    pub async fn recent_orders(&self, limit: usize) -> Result<Vec<OrderView>, DeskError> {
        let now = Utc::now();
        if let Some(fetch_limit) = self.remote_recent_limit {
            match self.script.get_orders(fetch_limit).await {
                Ok(orders) => return Ok(render_orders(&orders, &self.catalog, limit, now)),
                Err(e) => warn!(error = %e, "Remote orders unavailable, showing local history"),
            }
        }
        self.desk.recent_orders(limit, now).await
    }
}
