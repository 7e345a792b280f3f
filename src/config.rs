//! Settings for the wgpu side of the probe and for the parameter optimizer.

use serde::{Deserialize, Serialize};

/// Concurrency hint used when the caller doesn't give one
pub const DEFAULT_CONCURRENCY: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(preference: PowerPreference) -> Self {
        match preference {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// How the probe asks for an adapter and a device
///
/// # Example
/// ```
/// use gpu_probe::config::{PowerPreference, ProbeConfig};
///
/// let config = ProbeConfig::default()
///     .with_power_preference(PowerPreference::LowPower)
///     .with_concurrency(8);
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Label given to the device, it shows up in the wgpu validation messages
    pub label: String,
    pub power_preference: PowerPreference,
    /// Ask for a software adapter instead of a hardware one
    pub force_fallback_adapter: bool,
    /// Number of parallel workers the downstream workload intends to run
    pub concurrency: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            label: env!("CARGO_PKG_NAME").to_string(),
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ProbeConfig {
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    pub fn with_fallback_adapter(mut self, force_fallback_adapter: bool) -> Self {
        self.force_fallback_adapter = force_fallback_adapter;
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }
}

#[cfg(test)]
mod config_test {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: ProbeConfig =
            serde_json::from_str(r#"{ "powerPreference": "low-power" }"#).unwrap();
        assert_eq!(config.power_preference, PowerPreference::LowPower);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.label, "gpu-probe");
        assert!(!config.force_fallback_adapter);
    }
}
