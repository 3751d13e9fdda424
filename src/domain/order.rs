use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A submitted group-buy order. Built once at submission and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub sensor_type: String,
    #[serde(deserialize_with = "quantity_from_number_or_text")]
    pub quantity: u32,
    #[serde(default)]
    pub pickup_location: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub total_amount: u64,
    #[serde(default)]
    pub payment_proof_url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub formatted_time: String,
}

impl Order {
    /// Finalizes validated details into an order placed at `placed_at`.
    ///
    /// The id is the placement time in epoch milliseconds.
    pub fn from_details(
        details: OrderDetails,
        total_amount: u64,
        payment_proof_url: String,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: placed_at.timestamp_millis(),
            name: details.name,
            guardian_name: details.guardian_name,
            phone: details.phone,
            sensor_type: details.sensor_type,
            quantity: details.quantity,
            pickup_location: details.pickup_location,
            notes: details.notes,
            emergency_contact: details.emergency_contact,
            total_amount,
            payment_proof_url,
            timestamp: placed_at,
            formatted_time: format_local_datetime(placed_at),
        }
    }

    /// Stored human-readable time, or one derived from the timestamp for
    /// records written without it.
    pub fn placed_at_text(&self) -> String {
        if self.formatted_time.is_empty() {
            format_local_datetime(self.timestamp)
        } else {
            self.formatted_time.clone()
        }
    }
}

/// `M/D/YYYY, h:mm:ss AM` in local time.
pub fn format_local_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// `M/D/YYYY` in local time.
pub fn format_local_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-m/%-d/%Y").to_string()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// Older records kept the raw form text for quantity.
fn quantity_from_number_or_text<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(u32),
        Text(String),
    }

    match Quantity::deserialize(deserializer)? {
        Quantity::Number(n) => Ok(n),
        Quantity::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid quantity: {text}"))),
    }
}

/// Fields of the order form that a buyer can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    GuardianName,
    Phone,
    SensorType,
    Quantity,
    PickupLocation,
    Notes,
    EmergencyContact,
}

impl FormField {
    pub const ALL: [FormField; 8] = [
        FormField::Name,
        FormField::GuardianName,
        FormField::Phone,
        FormField::SensorType,
        FormField::Quantity,
        FormField::PickupLocation,
        FormField::Notes,
        FormField::EmergencyContact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::GuardianName => "guardian",
            FormField::Phone => "phone",
            FormField::SensorType => "sensor",
            FormField::Quantity => "quantity",
            FormField::PickupLocation => "pickup",
            FormField::Notes => "notes",
            FormField::EmergencyContact => "emergency",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            FormField::Name | FormField::Phone | FormField::Quantity | FormField::PickupLocation
        )
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("Unknown field '{}'", s))
    }
}

/// Raw form contents exactly as typed, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderForm {
    pub name: String,
    pub guardian_name: String,
    pub phone: String,
    pub sensor_type: String,
    pub quantity: String,
    pub pickup_location: String,
    pub notes: String,
    pub emergency_contact: String,
}

impl OrderForm {
    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::GuardianName => &self.guardian_name,
            FormField::Phone => &self.phone,
            FormField::SensorType => &self.sensor_type,
            FormField::Quantity => &self.quantity,
            FormField::PickupLocation => &self.pickup_location,
            FormField::Notes => &self.notes,
            FormField::EmergencyContact => &self.emergency_contact,
        }
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Name => self.name = value,
            FormField::GuardianName => self.guardian_name = value,
            FormField::Phone => self.phone = value,
            FormField::SensorType => self.sensor_type = value,
            FormField::Quantity => self.quantity = value,
            FormField::PickupLocation => self.pickup_location = value,
            FormField::Notes => self.notes = value,
            FormField::EmergencyContact => self.emergency_contact = value,
        }
    }
}

/// Validated field set sent to the remote service as `orderDetails`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    pub phone: String,
    pub sensor_type: String,
    pub quantity: u32,
    pub pickup_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
}

/// The proof-of-payment file attached to the form.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: Option<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let mime_type = path
            .extension()
            .and_then(|ext| mime_for_extension(&ext.to_string_lossy()))
            .map(str::to_string);
        Ok(Self::new(filename, mime_type, bytes))
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
