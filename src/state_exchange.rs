use tracing::debug;

use crate::data_structure::{RobotState, Timestamp};
use crate::error::RegionError;
use crate::shm_region::{self, FieldEntry, FieldKind, FieldTable, StateRegion};

pub const TIMESTAMP_FIELD: &str = "shm_timestamp";
pub const JOINT_POSITIONS: &str = "joint_positions";
pub const JOINT_VELOCITIES: &str = "joint_velocities";
pub const JOINT_TORQUES_MEASURED: &str = "joint_torques_measured";
pub const JOINT_TORQUES_EXTERNAL: &str = "joint_torques_external";

#[derive(Debug, Clone, Copy)]
struct StateFields {
    timestamp: FieldEntry,
    positions: FieldEntry,
    velocities: FieldEntry,
    torques_measured: FieldEntry,
    torques_external: FieldEntry,
}

/// Stamps and fills the robot state fields of a shared region once per
/// iteration. Single writer: no locking is done around the field writes, so
/// the producer must not write these fields while the loop runs.
pub struct StateExchange<R> {
    region: R,
    fields: StateFields,
    num_dofs: usize,
    fill_value: f32,
}

impl<R: StateRegion> StateExchange<R> {
    /// Resolves every named field up front; a missing or undersized field is fatal.
    pub fn open(region: R, num_dofs: usize, fill_value: f32) -> Result<Self, RegionError> {
        let table = FieldTable::parse(region.bytes())?;
        let vector = |name: &str| -> Result<FieldEntry, RegionError> {
            let entry = table.lookup(name, FieldKind::VectorF32)?;
            if entry.len < num_dofs {
                return Err(RegionError::FieldTooShort {
                    name: name.to_string(),
                    len: entry.len,
                    required: num_dofs,
                });
            }
            Ok(entry)
        };

        let fields = StateFields {
            timestamp: table.lookup(TIMESTAMP_FIELD, FieldKind::Timestamp)?,
            positions: vector(JOINT_POSITIONS)?,
            velocities: vector(JOINT_VELOCITIES)?,
            torques_measured: vector(JOINT_TORQUES_MEASURED)?,
            torques_external: vector(JOINT_TORQUES_EXTERNAL)?,
        };
        debug!(num_dofs, fields = table.len(), "state region fields resolved");

        Ok(Self {
            region,
            fields,
            num_dofs,
            fill_value,
        })
    }

    /// Stamps the timestamp to now, sets every joint entry to the fill value,
    /// and returns the payload for this iteration's control update.
    pub fn refresh(&mut self) -> RobotState {
        let now = Timestamp::now();
        let f = self.fields;
        let bytes = self.region.bytes_mut();

        shm_region::write_timestamp(bytes, &f.timestamp, now);
        for field in [
            &f.positions,
            &f.velocities,
            &f.torques_measured,
            &f.torques_external,
        ] {
            shm_region::fill_vector(bytes, field, self.num_dofs, self.fill_value);
        }

        let joints = vec![self.fill_value; self.num_dofs];
        RobotState {
            timestamp: now,
            joint_positions: joints.clone(),
            joint_velocities: joints.clone(),
            joint_torques_measured: joints.clone(),
            joint_torques_external: joints,
        }
    }

    /// Reads the state currently held in the region.
    pub fn snapshot(&self) -> RobotState {
        let f = &self.fields;
        let bytes = self.region.bytes();
        let vector = |field: &FieldEntry| shm_region::read_vector(bytes, field, self.num_dofs);
        RobotState {
            timestamp: shm_region::read_timestamp(bytes, &f.timestamp),
            joint_positions: vector(&f.positions),
            joint_velocities: vector(&f.velocities),
            joint_torques_measured: vector(&f.torques_measured),
            joint_torques_external: vector(&f.torques_external),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }
}
