#![allow(dead_code)]

use std::time::Duration;

use rpc_latency_harness::{
    clock::ManualClock,
    data_structure::{
        GlobalStats, MetadataBlob, RobotClientMetadata, RobotState, TorqueCommand, WindowStats,
    },
    error::{Error, Result, RpcError},
    report::StatsSink,
    rpc::ControllerRpc,
    warning::SlowSample,
};

/// Controller stand-in that advances a shared manual clock by a scripted
/// latency on every control update.
pub struct ScriptedRpc {
    pub clock: ManualClock,
    pub base_latency: Duration,
    pub spikes: Vec<(u64, Duration)>,
    pub fail_at: Option<u64>,
    pub reject_init: bool,
    pub init_calls: u64,
    pub init_body: Option<Vec<u8>>,
    pub update_calls: u64,
    pub last_state: Option<RobotState>,
}

impl ScriptedRpc {
    pub fn new(clock: ManualClock, base_latency: Duration) -> Self {
        Self {
            clock,
            base_latency,
            spikes: Vec::new(),
            fail_at: None,
            reject_init: false,
            init_calls: 0,
            init_body: None,
            update_calls: 0,
            last_state: None,
        }
    }

    pub fn calls(&self) -> u64 {
        self.init_calls + self.update_calls
    }
}

impl ControllerRpc for ScriptedRpc {
    fn init_robot_client(&mut self, metadata: &MetadataBlob) -> Result<(), RpcError> {
        self.init_calls += 1;
        self.init_body = Some(metadata.as_bytes().to_vec());
        if self.reject_init {
            return Err(RpcError::Rejected {
                op: "InitRobotClient",
                message: "robot client already registered".into(),
            });
        }
        Ok(())
    }

    fn control_update(&mut self, state: &RobotState) -> Result<TorqueCommand, RpcError> {
        let call = self.update_calls;
        self.update_calls += 1;
        if self.fail_at == Some(call) {
            return Err(RpcError::Rejected {
                op: "ControlUpdate",
                message: "controller went away".into(),
            });
        }

        let latency = self
            .spikes
            .iter()
            .find(|(at, _)| *at == call)
            .map(|(_, d)| *d)
            .unwrap_or(self.base_latency);
        self.clock.advance(latency);
        self.last_state = Some(state.clone());
        Ok(TorqueCommand::default())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub slow: Vec<SlowSample>,
    pub windows: Vec<(WindowStats, GlobalStats)>,
}

impl StatsSink for RecordingSink {
    fn on_slow_sample(&mut self, sample: &SlowSample) -> Result<()> {
        self.slow.push(*sample);
        Ok(())
    }

    fn on_window(&mut self, window: &WindowStats, global: &GlobalStats) -> Result<()> {
        self.windows.push((*window, *global));
        Ok(())
    }
}

/// Sink whose every report fails, like a CSV file on a full disk.
#[derive(Debug, Default)]
pub struct FailingSink {
    pub attempts: u64,
}

impl StatsSink for FailingSink {
    fn on_slow_sample(&mut self, _sample: &SlowSample) -> Result<()> {
        self.attempts += 1;
        Err(disk_full())
    }

    fn on_window(&mut self, _window: &WindowStats, _global: &GlobalStats) -> Result<()> {
        self.attempts += 1;
        Err(disk_full())
    }
}

fn disk_full() -> Error {
    Error::Report(csv::Error::from(std::io::Error::new(
        std::io::ErrorKind::Other,
        "no space left on device",
    )))
}

pub fn metadata(dof: usize) -> MetadataBlob {
    let decoded = RobotClientMetadata {
        robot_model: "franka_panda".into(),
        hz: 1000,
        dof,
        default_kq: vec![40.0; dof],
        default_kqd: vec![4.0; dof],
    };
    MetadataBlob::from_bytes(serde_json::to_vec(&decoded).unwrap()).unwrap()
}
