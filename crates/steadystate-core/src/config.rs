//! Engine configuration
//!
//! Timeouts per lifecycle phase and the stabilization polling policy.
//! Settings live in a YAML file discovered in this order:
//!
//! 1. `STEADYSTATE_CONFIG` environment variable (direct path)
//! 2. `./.steadystate/config.yaml`
//! 3. `~/.config/steadystate/config.yaml`
//!
//! Missing files fall back to defaults.

use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "STEADYSTATE_CONFIG";
pub const CONFIG_DIR: &str = ".steadystate";
pub const CONFIG_FILE: &str = "config.yaml";

/// Poll interval as a fraction of the stabilization timeout
const DEFAULT_INTERVAL_RATIO: u32 = 60;
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle phase, used to select a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Create => write!(f, "create"),
            Phase::Read => write!(f, "read"),
            Phase::Update => write!(f, "update"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// Per-phase timeouts, in seconds on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "secs")]
    pub create: Duration,
    #[serde(with = "secs")]
    pub read: Duration,
    #[serde(with = "secs")]
    pub update: Duration,
    #[serde(with = "secs")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(5 * 60),
            read: Duration::from_secs(60),
            update: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

impl Timeouts {
    pub fn for_phase(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Create => self.create,
            Phase::Read => self.read,
            Phase::Update => self.update,
            Phase::Delete => self.delete,
        }
    }

    /// Same timeout for every phase (handy in tests)
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }
}

/// Polling policy for one stabilization wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizeConfig {
    /// Give up after this long
    pub timeout: Duration,

    /// Spacing between polls
    pub interval: Duration,
}

impl StabilizeConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Interval derived from the timeout (1:60)
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, timeout / DEFAULT_INTERVAL_RATIO)
    }
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self::with_timeout(Timeouts::default().create)
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeouts: Timeouts,

    /// Fixed poll interval in milliseconds; derived from the timeout if unset
    pub poll_interval_ms: Option<u64>,
}

impl EngineConfig {
    /// Stabilization policy for a phase
    pub fn stabilize(&self, phase: Phase) -> StabilizeConfig {
        let timeout = self.timeouts.for_phase(phase);
        match self.poll_interval_ms {
            Some(ms) => StabilizeConfig::new(timeout, Duration::from_millis(ms)),
            None => StabilizeConfig::with_timeout(timeout),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        for (name, value) in [
            ("create", t.create),
            ("read", t.read),
            ("update", t.update),
            ("delete", t.delete),
        ] {
            if value.is_zero() {
                return Err(CoreError::InvalidConfig(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        if self.poll_interval_ms == Some(0) {
            return Err(CoreError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the configuration file, if any
pub fn find_config_file(project_root: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points to missing file {}", CONFIG_ENV, path.display());
    }

    let local = project_root.join(CONFIG_DIR).join(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    let global = dirs::config_dir()?.join("steadystate").join(CONFIG_FILE);
    global.exists().then_some(global)
}

/// Load a YAML settings document, falling back to defaults when no file
/// is found
pub fn load_or_default<T>(project_root: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match find_config_file(project_root) {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            load_file(&path)
        }
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(T::default())
        }
    }
}

pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
