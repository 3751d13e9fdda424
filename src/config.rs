//! Static desk configuration: remote endpoint, payment identifier, catalog and
//! display labels. Loaded once at startup from YAML, with a few environment
//! overrides for deployment.

use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{Catalog, PickupLocation, SensorVariant};
use crate::error::ConfigError;

pub const CONFIG_PATH_VAR: &str = "ORDER_DESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "order_desk.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct DeskConfig {
    pub script_url: String,
    pub upi_id: String,
    pub sensors: Vec<SensorVariant>,
    pub pickup_locations: Vec<PickupLocation>,
    pub default_sensor: String,
    #[serde(default)]
    pub delivery_cycle: Option<String>,
    #[serde(default)]
    pub next_run_date: Option<String>,
    /// Read the recent-orders feed from the remote service instead of the local cache.
    #[serde(default)]
    pub remote_recent_orders: bool,
    #[serde(default = "default_recent_limit")]
    pub recent_orders_limit: usize,
    /// Screenshot uploads cannot read the script endpoint's reply.
    #[serde(default)]
    pub opaque_responses: bool,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_recent_limit() -> usize {
    10
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".order-desk")
}

impl DeskConfig {
    /// Resolves the config path from an explicit argument, then the
    /// environment, then the default file name.
    pub fn resolve_path(arg: Option<String>) -> PathBuf {
        arg.or_else(|| env::var(CONFIG_PATH_VAR).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        info!(path = %path.display(), sensors = config.sensors.len(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = override_var::<String>("ORDER_DESK_SCRIPT_URL") {
            self.script_url = url;
        }
        if let Some(dir) = override_var::<PathBuf>("ORDER_DESK_STORAGE_DIR") {
            self.storage_dir = dir;
        }
        if let Some(opaque) = override_var::<bool>("ORDER_DESK_OPAQUE") {
            self.opaque_responses = opaque;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script_url.trim().is_empty() {
            return Err(ConfigError::Invalid("script_url must not be empty".into()));
        }
        if self.sensors.is_empty() {
            return Err(ConfigError::Invalid("at least one sensor is required".into()));
        }
        if self.recent_orders_limit == 0 {
            return Err(ConfigError::Invalid("recent_orders_limit must be at least 1".into()));
        }
        self.catalog().map(|_| ())
    }

    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        Catalog::new(
            self.sensors.clone(),
            self.pickup_locations.clone(),
            &self.default_sensor,
        )
        .map_err(ConfigError::Invalid)
    }

    /// The ordering-cycle label: configured text, else `(Month Year)` for `today`.
    pub fn delivery_cycle_label(&self, today: DateTime<Local>) -> String {
        match self.delivery_cycle.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => today.format("(%B %Y)").to_string(),
        }
    }

    /// Cutoff line shown inline: `<next run date> <label> (tentative)`.
    pub fn next_run_text(&self, today: DateTime<Local>) -> String {
        let label = self.delivery_cycle_label(today);
        match self.next_run_date.as_deref().map(str::trim) {
            Some(date) if !date.is_empty() => format!("{} {} (tentative)", date, label),
            _ => label,
        }
    }
}

fn override_var<T: FromStr>(key: &str) -> Option<T>
where
    T::Err: Display,
{
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => {
            info!("{key} override applied");
            Some(value)
        }
        Err(e) => {
            warn!("Invalid {key} value: {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> DeskConfig {
    DeskConfig::from_yaml(
        r#"
script_url: https://script.example.com/exec
upi_id: groupbuy@okbank
sensors:
  - key: linx
    name: Linx
    price: 3900
    savings: 600
  - key: libre
    name: Libre
    price: 5200
pickup_locations:
  - key: cubbon-park
    label: Cubbon Park
default_sensor: linx
"#,
    )
    .expect("test config parses")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_applied() {
        let config = test_config();
        assert_eq!(config.recent_orders_limit, 10);
        assert!(!config.remote_recent_orders);
        assert!(!config.opaque_responses);
        assert_eq!(config.storage_dir, PathBuf::from(".order-desk"));
        assert_eq!(config.sensors[1].savings, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_sensor_is_invalid() {
        let mut config = test_config();
        config.default_sensor = "dexcom".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_recent_limit_is_invalid() {
        let mut config = test_config();
        config.recent_orders_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.yaml");
        std::fs::write(
            &path,
            "script_url: https://x\nupi_id: u\nsensors:\n  - {key: a, name: A, price: 1}\npickup_locations: []\ndefault_sensor: a\n",
        )
        .unwrap();
        let config = DeskConfig::load(&path).unwrap();
        assert_eq!(config.sensors[0].key, "a");

        let missing = DeskConfig::load(&dir.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_delivery_cycle_labels() {
        let today = Local.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let mut config = test_config();
        assert_eq!(config.delivery_cycle_label(today), "(October 2026)");
        assert_eq!(config.next_run_text(today), "(October 2026)");

        config.delivery_cycle = Some("  (November batch) ".into());
        config.next_run_date = Some("Nov 5".into());
        assert_eq!(config.delivery_cycle_label(today), "(November batch)");
        assert_eq!(config.next_run_text(today), "Nov 5 (November batch) (tentative)");
    }
}
