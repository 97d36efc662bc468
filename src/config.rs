use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::data_structure::MetadataBlob;
use crate::dispatch::{DispatchSettings, DEFAULT_WINDOW_SIZE};
use crate::error::ConfigError;
use crate::scheduler::{SchedulingMode, DEFAULT_RT_PRIORITY};
use crate::shm_region::DEFAULT_SHM_NAME;
use crate::warning::DEFAULT_WARN_THRESHOLD_MS;

/// Client configuration, read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub num_dofs: usize,
    pub num_requests: u64,
    pub server_address: String,
    pub robot_client_metadata_path: PathBuf,
    pub use_real_time: bool,

    #[serde(default = "default_shm_name")]
    pub shm_name: String,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_period_us")]
    pub period_us: u64,
    #[serde(default = "default_warn_threshold_ms")]
    pub warn_threshold_ms: f64,
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,
    #[serde(default)]
    pub fill_value: f32,
    #[serde(default)]
    pub stats_csv_path: Option<PathBuf>,
}

fn default_shm_name() -> String {
    DEFAULT_SHM_NAME.to_string()
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_period_us() -> u64 {
    1000
}

fn default_warn_threshold_ms() -> f64 {
    DEFAULT_WARN_THRESHOLD_MS
}

fn default_rt_priority() -> i32 {
    DEFAULT_RT_PRIORITY
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // paths inside the config are used as given, relative to the working directory
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_dofs == 0 {
            return Err(ConfigError::invalid("num_dofs must be positive"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::invalid("window_size must be positive"));
        }
        if self.period_us == 0 {
            return Err(ConfigError::invalid("period_us must be positive"));
        }
        if !self.warn_threshold_ms.is_finite() || self.warn_threshold_ms < 0.0 {
            return Err(ConfigError::invalid(
                "warn_threshold_ms must be a finite, non-negative number",
            ));
        }
        if !(1..=99).contains(&self.rt_priority) {
            return Err(ConfigError::invalid("rt_priority must be within 1..=99"));
        }
        Ok(())
    }

    pub fn scheduling_mode(&self) -> SchedulingMode {
        if self.use_real_time {
            SchedulingMode::RealTime {
                priority: self.rt_priority,
            }
        } else {
            SchedulingMode::Default
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            window_size: self.window_size,
            period: Duration::from_micros(self.period_us),
            warn_threshold_ms: self.warn_threshold_ms,
        }
    }
}

/// Reads the robot client metadata blob and checks that it decodes.
pub fn load_metadata(path: &Path) -> Result<MetadataBlob, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let blob = MetadataBlob::from_bytes(bytes).map_err(|source| ConfigError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;

    let metadata = blob.metadata();
    info!(
        robot_model = %metadata.robot_model,
        dof = metadata.dof,
        hz = metadata.hz,
        bytes = blob.as_bytes().len(),
        "robot client metadata loaded"
    );
    Ok(blob)
}
