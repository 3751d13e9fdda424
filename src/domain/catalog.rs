use serde::{Deserialize, Serialize};

/// A purchasable sensor variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorVariant {
    pub key: String,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub savings: u64,
}

impl SensorVariant {
    pub fn new(key: impl Into<String>, name: impl Into<String>, price: u64, savings: u64) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            price,
            savings,
        }
    }

    /// Option label shown to buyers, e.g. `Linx (₹3,900/-)`.
    pub fn label(&self) -> String {
        format!("{} ({}/-)", self.name, format_rupees(self.price))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupLocation {
    pub key: String,
    pub label: String,
}

impl PickupLocation {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Amount preview for the payment panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPreview {
    pub quantity: u32,
    pub total: u64,
    /// Present only when the resolved variant carries a positive saving.
    pub savings: Option<u64>,
}

/// Static price table and pickup points, in configuration order.
///
/// Construction guarantees the default variant exists, so [`Catalog::resolve`]
/// always yields an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    sensors: Vec<SensorVariant>,
    pickup_locations: Vec<PickupLocation>,
    default_index: usize,
}

impl Catalog {
    pub fn new(
        sensors: Vec<SensorVariant>,
        pickup_locations: Vec<PickupLocation>,
        default_sensor: &str,
    ) -> Result<Self, String> {
        let default_index = sensors
            .iter()
            .position(|s| s.key == default_sensor)
            .ok_or_else(|| format!("Default sensor '{}' is not in the catalog", default_sensor))?;
        Ok(Self {
            sensors,
            pickup_locations,
            default_index,
        })
    }

    pub fn sensors(&self) -> &[SensorVariant] {
        &self.sensors
    }

    pub fn pickup_locations(&self) -> &[PickupLocation] {
        &self.pickup_locations
    }

    pub fn default_sensor(&self) -> &SensorVariant {
        &self.sensors[self.default_index]
    }

    pub fn sensor(&self, key: &str) -> Option<&SensorVariant> {
        self.sensors.iter().find(|s| s.key == key)
    }

    /// Looks up `key`, falling back to the default variant for unknown or empty keys.
    pub fn resolve(&self, key: &str) -> &SensorVariant {
        self.sensor(key).unwrap_or_else(|| self.default_sensor())
    }

    /// Display label for a variant key; unknown keys are shown verbatim.
    pub fn sensor_label(&self, key: &str) -> String {
        match self.sensor(key) {
            Some(sensor) => sensor.label(),
            None => key.to_string(),
        }
    }

    pub fn pickup(&self, key: &str) -> Option<&PickupLocation> {
        self.pickup_locations.iter().find(|p| p.key == key)
    }

    pub fn pickup_label(&self, key: &str) -> String {
        self.pickup(key)
            .map(|p| p.label.clone())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn total_for(&self, key: &str, quantity: u32) -> u64 {
        self.resolve(key).price * u64::from(quantity)
    }

    pub fn savings_for(&self, key: &str, quantity: u32) -> u64 {
        self.resolve(key).savings * u64::from(quantity)
    }

    /// Preview for the raw quantity text of the form. Hidden (`None`) unless the
    /// text parses to a positive integer.
    pub fn preview(&self, key: &str, quantity_text: &str) -> Option<PaymentPreview> {
        let quantity = quantity_text.trim().parse::<u32>().ok().filter(|q| *q > 0)?;
        let savings = self.savings_for(key, quantity);
        Some(PaymentPreview {
            quantity,
            total: self.total_for(key, quantity),
            savings: (savings > 0).then_some(savings),
        })
    }
}

/// Formats whole rupees with en-US digit grouping: `₹12,345`.
pub fn format_rupees(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("₹{}", grouped)
}
