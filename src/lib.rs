//! Round-trip latency client for a robot controller server.
//!
//! Every period the client stamps and fills the robot state region, sends one
//! control update, and times the round trip. Samples land in a fixed-size
//! window; each closed window is reported and folded into global stats.

pub mod aggregate;
pub mod client;
pub mod clock;
pub mod config;
pub mod data_structure;
pub mod dispatch;
pub mod error;
pub mod report;
pub mod rpc;
pub mod sample_buffer;
pub mod scheduler;
pub mod shm_region;
pub mod state_exchange;
pub mod warning;

pub use error::{Error, Result};
