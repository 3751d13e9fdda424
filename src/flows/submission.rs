//! Pure steps of order submission. The client runs them around the network
//! and persistence calls, so every decision here is testable on its own.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::clients::script_client::SubmitResponse;
use crate::clients::transport::ScreenshotUpload;
use crate::domain::{format_rupees, Attachment, Catalog, FormField, Order, OrderDetails, OrderForm};
use crate::error::{FieldError, SubmissionError};

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 10;
pub const PROOF_FIELD: &str = "paymentScreenshot";

lazy_static! {
    static ref PHONE_PATTERN: Regex = Regex::new(r"^\+?[1-9]\d{0,15}$").expect("phone pattern compiles");
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn is_valid_phone(raw: &str) -> bool {
    let compact: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();
    PHONE_PATTERN.is_match(&compact)
}

/// Checks the whole form and the proof attachment, returning every problem at
/// once. Nothing here touches the network.
///
/// Sensor and pickup keys must name catalog entries. A blank sensor becomes
/// the default variant's key.
pub fn validate(
    form: &OrderForm,
    attachments: &[Attachment],
    catalog: &Catalog,
) -> Result<OrderDetails, SubmissionError> {
    let mut errors = Vec::new();

    for field in FormField::ALL {
        if field.is_required() && form.get(field).trim().is_empty() {
            errors.push(FieldError::new(field.as_str(), "This field is required"));
        }
    }

    let phone = form.phone.trim();
    if !phone.is_empty() && !is_valid_phone(phone) {
        errors.push(FieldError::new(FormField::Phone.as_str(), "Please enter a valid phone number"));
    }

    let quantity_text = form.quantity.trim();
    let quantity = match quantity_text.parse::<u32>() {
        Ok(q) if (MIN_QUANTITY..=MAX_QUANTITY).contains(&q) => Some(q),
        _ => {
            if !quantity_text.is_empty() {
                errors.push(FieldError::new(
                    FormField::Quantity.as_str(),
                    format!("Quantity must be between {} and {}", MIN_QUANTITY, MAX_QUANTITY),
                ));
            }
            None
        }
    };

    let sensor_key = form.sensor_type.trim();
    let sensor_type = if sensor_key.is_empty() {
        catalog.default_sensor().key.clone()
    } else {
        if catalog.sensor(sensor_key).is_none() {
            errors.push(FieldError::new(FormField::SensorType.as_str(), "Please select a valid sensor"));
        }
        sensor_key.to_string()
    };

    let pickup_key = form.pickup_location.trim();
    if !pickup_key.is_empty() && catalog.pickup(pickup_key).is_none() {
        errors.push(FieldError::new(
            FormField::PickupLocation.as_str(),
            "Please select a valid pickup location",
        ));
    }

    match attachments.len() {
        1 => {}
        0 => errors.push(FieldError::new(PROOF_FIELD, "Payment screenshot is required")),
        _ => errors.push(FieldError::new(PROOF_FIELD, "Attach exactly one payment screenshot")),
    }

    match quantity {
        Some(quantity) if errors.is_empty() => Ok(OrderDetails {
            name: form.name.trim().to_string(),
            guardian_name: non_empty(&form.guardian_name),
            phone: phone.to_string(),
            sensor_type,
            quantity,
            pickup_location: pickup_key.to_string(),
            notes: non_empty(&form.notes),
            emergency_contact: non_empty(&form.emergency_contact),
        }),
        _ => Err(SubmissionError::Validation(errors)),
    }
}

/// Encodes the attachment for the `submitOrder` call, filling in a file name
/// and MIME type when the file carries none.
pub fn encode_upload(details: &OrderDetails, attachment: &Attachment, now: DateTime<Utc>) -> ScreenshotUpload {
    let filename = attachment
        .filename
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("order_{}_{}.png", details.name, now.timestamp_millis()));
    let mime_type = attachment
        .mime_type
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "image/png".to_string());
    ScreenshotUpload {
        screenshot: STANDARD.encode(&attachment.bytes),
        filename,
        mime_type,
        order_details: details.clone(),
    }
}

/// Proof reference from the upload reply: top-level `fileUrl`, then
/// `upload.fileUrl`, then empty. An opaque reply (`None`) yields empty.
pub fn proof_reference(response: Option<&SubmitResponse>) -> String {
    let Some(response) = response else {
        return String::new();
    };
    let direct = response.file_url.as_deref().filter(|u| !u.is_empty());
    let nested = response
        .upload
        .as_ref()
        .and_then(|u| u.file_url.as_deref())
        .filter(|u| !u.is_empty());
    direct.or(nested).unwrap_or_default().to_string()
}

/// Prices the order against the catalog as it stands now and stamps it.
pub fn finalize(details: OrderDetails, catalog: &Catalog, proof_url: String, now: DateTime<Utc>) -> Order {
    let total = catalog.total_for(&details.sensor_type, details.quantity);
    Order::from_details(details, total, proof_url, now)
}

/// Summary shown to the buyer once the order is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub name: String,
    pub guardian_name: Option<String>,
    pub phone: String,
    pub sensor: String,
    pub quantity: u32,
    pub total: u64,
    pub unit_savings: u64,
    pub savings: u64,
    pub pickup: String,
    pub notes: Option<String>,
    pub payment_proof_url: String,
}

impl Confirmation {
    pub fn for_order(order: &Order, catalog: &Catalog) -> Self {
        let unit_savings = catalog.resolve(&order.sensor_type).savings;
        Self {
            name: order.name.clone(),
            guardian_name: order.guardian_name.clone(),
            phone: order.phone.clone(),
            sensor: catalog.sensor_label(&order.sensor_type),
            quantity: order.quantity,
            total: order.total_amount,
            unit_savings,
            savings: unit_savings * u64::from(order.quantity),
            pickup: catalog.pickup_label(&order.pickup_location),
            notes: order.notes.clone(),
            payment_proof_url: order.payment_proof_url.clone(),
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order Details:")?;
        writeln!(f, "  Name: {}", self.name)?;
        if let Some(guardian) = &self.guardian_name {
            writeln!(f, "  Parent/Guardian: {}", guardian)?;
        }
        writeln!(f, "  Phone: {}", self.phone)?;
        writeln!(f, "  Sensor: {}", self.sensor)?;
        writeln!(f, "  Quantity: {}", self.quantity)?;
        writeln!(f, "  Total Amount: {}", format_rupees(self.total))?;
        if self.unit_savings > 0 {
            writeln!(
                f,
                "  You save: {} ({} × {})",
                format_rupees(self.savings),
                format_rupees(self.unit_savings),
                self.quantity
            )?;
        }
        write!(f, "  Pickup: {}", self.pickup)?;
        if let Some(notes) = &self.notes {
            write!(f, "\n  Notes: {}", notes)?;
        }
        Ok(())
    }
}
