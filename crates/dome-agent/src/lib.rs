//! Command-line surface of the dome agent

use std::path::{Path, PathBuf};

use clap::Parser;
use infrastructure::drivers::{SerialConfig, SimulatorConfig};
use infrastructure::{AgentConfig, TransportConfig};

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config directory; defaults to the crate's `config` folder when
    /// run from the workspace root
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Talk to the firmware on this serial port instead of the configured link
    #[arg(long, conflicts_with = "simulate")]
    pub port: Option<String>,

    /// Run against the in-process simulated dome
    #[arg(long)]
    pub simulate: bool,

    /// Override the poll interval
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl Args {
    /// Directory holding `default.toml` and the per-environment overrides
    pub fn resolve_config_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        let dev_base = Path::new("crates/dome-agent");
        if dev_base.exists() {
            dev_base.join("config")
        } else {
            PathBuf::from("config")
        }
    }

    /// CLI flags win over every configuration source
    pub fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(port) = &self.port {
            let mut serial = match config.transport {
                TransportConfig::Serial(serial) => serial,
                _ => SerialConfig::new(port.as_str()),
            };
            serial.port = port.clone();
            config.transport = TransportConfig::Serial(serial);
        }
        if self.simulate {
            let sim = match config.transport {
                TransportConfig::Simulator(sim) => sim,
                _ => SimulatorConfig::default(),
            };
            config.transport = TransportConfig::Simulator(sim);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        config
    }
}
