//! Named-field view over the robot state shared memory region.
//!
//! The region is created and populated by an external producer. Its layout
//! is little endian:
//!
//! ```text
//! header   magic "RSTSHM01" | u32 field count | u32 reserved
//! entry    [u8; 32] name (NUL padded) | u32 kind | u32 element count | u64 byte offset
//! payload  timestamp: i64 seconds, i64 nanos   vector: count x f32
//! ```

use std::collections::HashMap;

use shared_memory::{Shmem, ShmemConf};

use crate::data_structure::Timestamp;
use crate::error::RegionError;

pub const DEFAULT_SHM_NAME: &str = "RobotStateSharedMemory";

pub const MAGIC: &[u8; 8] = b"RSTSHM01";
const HEADER_LEN: usize = 16;
const ENTRY_LEN: usize = 48;
const NAME_LEN: usize = 32;
const TIMESTAMP_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Timestamp,
    VectorF32,
}

impl FieldKind {
    fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Timestamp),
            1 => Some(Self::VectorF32),
            _ => None,
        }
    }

    fn tag(self) -> u32 {
        match self {
            Self::Timestamp => 0,
            Self::VectorF32 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::VectorF32 => "f32 vector",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub kind: FieldKind,
    pub len: usize,
    pub offset: usize,
}

impl FieldEntry {
    fn byte_len(&self) -> usize {
        match self.kind {
            FieldKind::Timestamp => TIMESTAMP_LEN,
            FieldKind::VectorF32 => self.len * 4,
        }
    }
}

/// Raw bytes of a state region.
pub trait StateRegion {
    fn bytes(&self) -> &[u8];
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl StateRegion for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// An OS shared memory mapping opened by name. Never creates the segment.
pub struct SharedStateRegion {
    shmem: Shmem,
}

impl SharedStateRegion {
    pub fn open(name: &str) -> Result<Self, RegionError> {
        let shmem = ShmemConf::new()
            .os_id(name)
            .open()
            .map_err(|e| RegionError::Open {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { shmem })
    }
}

impl StateRegion for SharedStateRegion {
    fn bytes(&self) -> &[u8] {
        // SAFETY: the mapping lives as long as `self` and this process is the
        // region's only writer while the loop runs.
        unsafe { self.shmem.as_slice() }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `bytes`; `&mut self` keeps the slice unaliased in-process.
        unsafe { self.shmem.as_slice_mut() }
    }
}

/// Parsed directory of the region's named fields.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    fields: HashMap<String, FieldEntry>,
}

impl FieldTable {
    pub fn parse(bytes: &[u8]) -> Result<Self, RegionError> {
        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            return Err(RegionError::Malformed("missing region header".into()));
        }
        let count = read_u32(bytes, 8) as usize;
        let table_end = count
            .checked_mul(ENTRY_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| RegionError::Malformed(format!("{count} entries overrun region")))?;

        let mut fields = HashMap::with_capacity(count);
        for at in (HEADER_LEN..table_end).step_by(ENTRY_LEN) {
            let raw_name = &bytes[at..at + NAME_LEN];
            let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
            let name = std::str::from_utf8(&raw_name[..name_len])
                .map_err(|_| RegionError::Malformed("field name is not utf-8".into()))?
                .to_string();

            let tag = read_u32(bytes, at + NAME_LEN);
            let kind = FieldKind::from_tag(tag).ok_or_else(|| {
                RegionError::Malformed(format!("field `{name}` has kind tag {tag}"))
            })?;
            let entry = FieldEntry {
                kind,
                len: read_u32(bytes, at + NAME_LEN + 4) as usize,
                offset: read_u64(bytes, at + NAME_LEN + 8) as usize,
            };

            if entry.offset.saturating_add(entry.byte_len()) > bytes.len() {
                return Err(RegionError::Malformed(format!(
                    "field `{name}` extends past end of region"
                )));
            }
            fields.insert(name, entry);
        }

        Ok(Self { fields })
    }

    pub fn lookup(&self, name: &str, kind: FieldKind) -> Result<FieldEntry, RegionError> {
        let entry = self
            .fields
            .get(name)
            .copied()
            .ok_or_else(|| RegionError::FieldMissing(name.to_string()))?;
        if entry.kind != kind {
            return Err(RegionError::FieldKind {
                name: name.to_string(),
                expected: kind.name(),
                found: entry.kind.name(),
            });
        }
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub fn write_timestamp(bytes: &mut [u8], field: &FieldEntry, ts: Timestamp) {
    let at = field.offset;
    bytes[at..at + 8].copy_from_slice(&ts.seconds.to_le_bytes());
    bytes[at + 8..at + 16].copy_from_slice(&ts.nanos.to_le_bytes());
}

pub fn read_timestamp(bytes: &[u8], field: &FieldEntry) -> Timestamp {
    let at = field.offset;
    Timestamp {
        seconds: read_u64(bytes, at) as i64,
        nanos: read_u64(bytes, at + 8) as i64,
    }
}

/// Sets the first `count` elements of a vector field to `value`.
pub fn fill_vector(bytes: &mut [u8], field: &FieldEntry, count: usize, value: f32) {
    let raw = value.to_le_bytes();
    let start = field.offset;
    for chunk in bytes[start..start + count * 4].chunks_exact_mut(4) {
        chunk.copy_from_slice(&raw);
    }
}

pub fn read_vector(bytes: &[u8], field: &FieldEntry, count: usize) -> Vec<f32> {
    let start = field.offset;
    bytes[start..start + count * 4]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

/// Lays out a region image in the format above. Used by producers and tests.
#[derive(Debug, Default)]
pub struct RegionBuilder {
    fields: Vec<(String, FieldKind, usize)>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamp(mut self, name: &str) -> Self {
        self.fields.push((name.to_string(), FieldKind::Timestamp, 1));
        self
    }

    pub fn vector(mut self, name: &str, len: usize) -> Self {
        self.fields.push((name.to_string(), FieldKind::VectorF32, len));
        self
    }

    /// The full robot state layout for `num_dofs` joints.
    pub fn robot_state(num_dofs: usize) -> Self {
        Self::new()
            .timestamp(crate::state_exchange::TIMESTAMP_FIELD)
            .vector(crate::state_exchange::JOINT_POSITIONS, num_dofs)
            .vector(crate::state_exchange::JOINT_VELOCITIES, num_dofs)
            .vector(crate::state_exchange::JOINT_TORQUES_MEASURED, num_dofs)
            .vector(crate::state_exchange::JOINT_TORQUES_EXTERNAL, num_dofs)
    }

    pub fn build(self) -> Vec<u8> {
        let mut offset = HEADER_LEN + self.fields.len() * ENTRY_LEN;
        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.fields.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        let mut payload_len = 0;
        for (name, kind, len) in &self.fields {
            let mut raw_name = [0u8; NAME_LEN];
            let n = name.len().min(NAME_LEN);
            raw_name[..n].copy_from_slice(&name.as_bytes()[..n]);
            out.extend_from_slice(&raw_name);
            out.extend_from_slice(&kind.tag().to_le_bytes());
            out.extend_from_slice(&(*len as u32).to_le_bytes());
            out.extend_from_slice(&(offset as u64).to_le_bytes());

            let size = FieldEntry {
                kind: *kind,
                len: *len,
                offset,
            }
            .byte_len();
            offset += size;
            payload_len += size;
        }

        out.resize(out.len() + payload_len, 0);
        out
    }
}
