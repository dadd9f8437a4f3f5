use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::coordinator::RoundPolicy;

const DEFAULT_DEVICE: &str = "stub://o3r";
const DEFAULT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_ROUNDS: u32 = 1;

#[derive(Debug, Deserialize, Default)]
struct GrabberConfigFile {
    device: Option<String>,
    acquisition: Option<AcquisitionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AcquisitionConfigFile {
    timeout_ms: Option<u64>,
    policy: Option<String>,
    parallel: Option<bool>,
    rounds: Option<u32>,
}

/// Highest-precedence settings, normally from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub timeout_ms: Option<u64>,
    pub policy: Option<RoundPolicy>,
    pub parallel: Option<bool>,
    pub rounds: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct GrabberConfig {
    /// Device URI: `stub://...` or a simulation document path.
    pub device: String,
    pub acquisition: AcquisitionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// Bounded wait applied to every session in a round.
    pub timeout: Duration,
    pub policy: RoundPolicy,
    pub parallel: bool,
    pub rounds: u32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            policy: RoundPolicy::default(),
            parallel: false,
            rounds: DEFAULT_ROUNDS,
        }
    }
}

impl GrabberConfig {
    /// Load from `MULTIHEAD_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MULTIHEAD_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit config file path (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GrabberConfigFile) -> Result<Self> {
        let device = file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string());
        let acq = file.acquisition.unwrap_or_default();
        let defaults = AcquisitionSettings::default();
        let policy = match acq.policy.as_deref() {
            Some(policy) => policy.parse()?,
            None => defaults.policy,
        };
        Ok(Self {
            device,
            acquisition: AcquisitionSettings {
                timeout: acq
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.timeout),
                policy,
                parallel: acq.parallel.unwrap_or(defaults.parallel),
                rounds: acq.rounds.unwrap_or(defaults.rounds),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = env_value("MULTIHEAD_DEVICE") {
            self.device = device;
        }
        if let Some(timeout) = env_value("MULTIHEAD_TIMEOUT_MS") {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("MULTIHEAD_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.acquisition.timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = env_value("MULTIHEAD_POLICY") {
            self.acquisition.policy = policy.parse()?;
        }
        if let Some(parallel) = env_value("MULTIHEAD_PARALLEL") {
            self.acquisition.parallel = parse_bool(&parallel)
                .ok_or_else(|| anyhow!("MULTIHEAD_PARALLEL must be true/false"))?;
        }
        if let Some(rounds) = env_value("MULTIHEAD_ROUNDS") {
            self.acquisition.rounds = rounds
                .trim()
                .parse()
                .map_err(|_| anyhow!("MULTIHEAD_ROUNDS must be a positive integer"))?;
        }
        Ok(())
    }

    /// Apply command-line overrides on top of file and env settings, then
    /// re-validate. Unset fields leave the loaded value alone.
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(ms) = overrides.timeout_ms {
            self.acquisition.timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = overrides.policy {
            self.acquisition.policy = policy;
        }
        if let Some(parallel) = overrides.parallel {
            self.acquisition.parallel = parallel;
        }
        if let Some(rounds) = overrides.rounds {
            self.acquisition.rounds = rounds;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if self.acquisition.timeout.is_zero() {
            return Err(anyhow!("timeout must be greater than zero"));
        }
        if self.acquisition.rounds == 0 {
            return Err(anyhow!("rounds must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<GrabberConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Set and non-blank; a blank variable counts as unset.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
