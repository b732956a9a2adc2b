use config::{Config, ConfigError, Environment, File};
use domain::dome::DomePolicy;
use domain::protocol::DeviceProfile;
use serde::{Deserialize, Serialize};

use crate::drivers::TransportConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub profile: DeviceProfile,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default)]
    pub policy: DomePolicy,
}

fn default_device_name() -> String {
    "dome".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_state_file() -> String {
    "data/dome_state.conf".to_string()
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Site configuration, required so the agent never starts half-configured
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Per-environment overrides, e.g. config/simulation.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. DOME__POLL_INTERVAL_MS=500)
            .add_source(Environment::with_prefix("DOME").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.policy.battery.critical_volts > self.policy.battery.low_volts {
            return Err(ConfigError::Message(
                "battery critical threshold must not exceed the low threshold".to_string(),
            ));
        }
        Ok(())
    }
}
