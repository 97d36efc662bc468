use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp as stored in the shared state region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i64,
}

impl Timestamp {
    pub fn now() -> Self {
        // a clock set before 1970 reports the epoch rather than failing the iteration
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs() as i64,
            nanos: since_epoch.subsec_nanos() as i64,
        }
    }
}

/// Per-iteration robot state sent with every `ControlUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub timestamp: Timestamp,
    pub joint_positions: Vec<f32>,
    pub joint_velocities: Vec<f32>,
    pub joint_torques_measured: Vec<f32>,
    pub joint_torques_external: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorqueCommand {
    pub timestamp: Timestamp,
    pub joint_torques: Vec<f32>,
}

/// Robot client description sent once with `InitializeClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotClientMetadata {
    pub robot_model: String,
    pub hz: u32,
    pub dof: usize,
    #[serde(default)]
    pub default_kq: Vec<f32>,
    #[serde(default)]
    pub default_kqd: Vec<f32>,
}

/// The metadata file as read from disk together with its decoded view.
/// The server receives the raw bytes unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBlob {
    raw: Vec<u8>,
    decoded: RobotClientMetadata,
}

impl MetadataBlob {
    /// Decodes `raw` to validate it, keeping the original bytes.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, serde_json::Error> {
        let decoded = serde_json::from_slice(&raw)?;
        Ok(Self { raw, decoded })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn metadata(&self) -> &RobotClientMetadata {
        &self.decoded
    }
}

/// Max/min/mean of the samples resident in one window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub samples: usize,
}

/// Running aggregate over every window combined so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub window_count: u64,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
            mean: 0.0,
            window_count: 0,
        }
    }
}
