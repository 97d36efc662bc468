use tracing::{info, warn};

use crate::clock::MonotonicClock;
use crate::config::{load_metadata, ClientConfig};
use crate::data_structure::MetadataBlob;
use crate::dispatch::{DispatchLoop, RunSummary};
use crate::error::{Error, Result, RpcError};
use crate::report::{CsvSink, StatsSink, TracingSink};
use crate::rpc::{AmqpControllerRpc, ControllerRpc};
use crate::shm_region::{SharedStateRegion, StateRegion};
use crate::state_exchange::StateExchange;

/// Resolves the state region, then connects and initializes the robot client.
///
/// The region is checked first so a missing field aborts before the server
/// sees any request.
pub fn start_session<C, R, F>(
    region: R,
    metadata: &MetadataBlob,
    num_dofs: usize,
    fill_value: f32,
    connect: F,
) -> Result<(C, StateExchange<R>)>
where
    C: ControllerRpc,
    R: StateRegion,
    F: FnOnce() -> Result<C, RpcError>,
{
    let exchange = StateExchange::open(region, num_dofs, fill_value)?;
    let metadata_dof = metadata.metadata().dof;
    if metadata_dof != num_dofs {
        warn!(
            metadata_dof,
            num_dofs, "metadata and config disagree on degrees of freedom"
        );
    }

    let mut rpc = connect().map_err(Error::Init)?;
    rpc.init_robot_client(metadata).map_err(Error::Init)?;
    info!("robot client initialized");

    Ok((rpc, exchange))
}

/// Entry point for one client run: owns its config for the whole run.
pub fn run_client(config: ClientConfig) -> Result<RunSummary> {
    let metadata = load_metadata(&config.robot_client_metadata_path)?;

    let region = SharedStateRegion::open(&config.shm_name)?;
    info!(shm_name = %config.shm_name, "shared memory region opened");

    let (rpc, exchange) = start_session(
        region,
        &metadata,
        config.num_dofs,
        config.fill_value,
        || AmqpControllerRpc::connect(&config.server_address),
    )?;

    let sink: Box<dyn StatsSink> = match &config.stats_csv_path {
        Some(path) => {
            info!(path = %path.display(), "writing window stats as csv");
            Box::new((TracingSink, CsvSink::create(path)?))
        }
        None => Box::new(TracingSink),
    };

    let settings = config.dispatch_settings();
    let mut dispatch = DispatchLoop::new(rpc, exchange, MonotonicClock, sink, settings);
    info!(
        iterations = config.num_requests,
        window_size = config.window_size,
        period_us = config.period_us,
        "starting control update loop"
    );
    dispatch.run(config.num_requests)
}
