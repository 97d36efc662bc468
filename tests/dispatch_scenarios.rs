mod common;

use std::time::Duration;

use common::{FailingSink, RecordingSink, ScriptedRpc};
use rpc_latency_harness::{
    clock::{Clock, ManualClock},
    dispatch::{DispatchLoop, DispatchSettings},
    error::{Error, RpcError},
    shm_region::RegionBuilder,
    state_exchange::StateExchange,
};

const DOFS: usize = 7;

type TestLoop = DispatchLoop<ScriptedRpc, Vec<u8>, ManualClock, RecordingSink>;

fn build_loop(rpc: ScriptedRpc, clock: ManualClock, window_size: usize) -> TestLoop {
    let region = RegionBuilder::robot_state(DOFS).build();
    let exchange = StateExchange::open(region, DOFS, 0.0).unwrap();
    let settings = DispatchSettings {
        window_size,
        ..DispatchSettings::default()
    };
    DispatchLoop::new(rpc, exchange, clock, RecordingSink::default(), settings)
}

fn steady_loop(window_size: usize) -> TestLoop {
    let clock = ManualClock::new();
    let rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(100));
    build_loop(rpc, clock, window_size)
}

#[test]
fn full_window_of_iterations_reports_nothing() {
    let mut dispatch = steady_loop(3000);
    let summary = dispatch.run(3000).unwrap();
    assert_eq!(summary.iterations, 3000);
    assert_eq!(summary.windows, 0);
    assert!(dispatch.sink().windows.is_empty());
}

#[test]
fn one_iteration_past_a_window_reports_once() {
    let mut dispatch = steady_loop(3000);
    let summary = dispatch.run(3001).unwrap();
    assert_eq!(summary.windows, 1);

    let (window, global) = dispatch.sink().windows[0];
    assert_eq!(window.samples, 3000);
    assert_eq!(window.max, 0.1);
    assert_eq!(window.min, 0.1);
    assert_eq!(global.window_count, 1);
    assert_eq!(global.max, window.max);
}

#[test]
fn single_spike_warns_once_and_sets_window_max() {
    let clock = ManualClock::new();
    let mut rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(100));
    rpc.spikes.push((4, Duration::from_micros(1500)));
    let mut dispatch = build_loop(rpc, clock, 10);

    let summary = dispatch.run(11).unwrap();
    let sink = dispatch.sink();

    assert_eq!(summary.slow_samples, 1);
    assert_eq!(sink.slow.len(), 1);
    assert_eq!(sink.slow[0].iteration, 4);
    assert_eq!(sink.slow[0].elapsed_ms, 1.5);

    assert_eq!(sink.windows.len(), 1);
    let (window, _) = sink.windows[0];
    assert_eq!(window.max, 1.5);
    assert_eq!(window.min, 0.1);
}

#[test]
fn rpc_failure_stops_the_run_immediately() {
    let clock = ManualClock::new();
    let mut rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(100));
    rpc.fail_at = Some(5);
    let mut dispatch = build_loop(rpc, clock, 3);

    let err = dispatch.run(100).unwrap_err();
    assert!(matches!(
        err,
        Error::ControlUpdate {
            iteration: 5,
            source: RpcError::Rejected { .. }
        }
    ));

    assert_eq!(dispatch.buffer().iteration(), 5);
    assert_eq!(dispatch.rpc().update_calls, 6);
    // only the boundary at iteration 3 was reached
    assert_eq!(dispatch.sink().windows.len(), 1);
    assert_eq!(dispatch.summary().windows, 1);
}

#[test]
fn iterations_are_paced_to_absolute_deadlines() {
    let clock = ManualClock::new();
    let mut rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(250));
    rpc.spikes.push((2, Duration::from_micros(1800)));
    let mut dispatch = build_loop(rpc, clock.clone(), 3000);

    let start = clock.now();
    dispatch.run(5).unwrap();
    // a late iteration is not followed by an extra sleep
    assert_eq!(clock.now() - start, Duration::from_micros(4000 + 1800));
}

#[test]
fn global_stats_follow_successive_windows() {
    let clock = ManualClock::new();
    let mut rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(200));
    // iteration 3 closes window 1, iteration 6 closes window 2
    rpc.spikes.push((5, Duration::from_micros(800)));
    let mut dispatch = build_loop(rpc, clock, 3);

    let summary = dispatch.run(7).unwrap();
    let windows = &dispatch.sink().windows;
    assert_eq!(windows.len(), 2);

    let (w1, g1) = windows[0];
    let (w2, g2) = windows[1];
    assert_eq!(w2.max, 0.8);
    assert!(g2.max >= g1.max && g2.min <= g1.min);
    assert_eq!(g2.window_count, 2);
    let expected = (w1.mean + w2.mean) / 2.0;
    assert!((g2.mean - expected).abs() < 1e-12);
    assert_eq!(summary.global, g2);
}

#[test]
fn every_update_carries_a_zeroed_state() {
    let mut dispatch = steady_loop(3000);
    dispatch.run(3).unwrap();
    let state = dispatch.rpc().last_state.clone().unwrap();
    assert_eq!(state.joint_positions, vec![0.0; DOFS]);
    assert_eq!(state.joint_torques_external, vec![0.0; DOFS]);
    assert!(state.timestamp.seconds > 0);
}

#[test]
fn failing_stats_sink_does_not_stop_the_run() {
    let clock = ManualClock::new();
    let mut rpc = ScriptedRpc::new(clock.clone(), Duration::from_micros(100));
    rpc.spikes.push((1, Duration::from_micros(1200)));
    let region = RegionBuilder::robot_state(DOFS).build();
    let exchange = StateExchange::open(region, DOFS, 0.0).unwrap();
    let settings = DispatchSettings {
        window_size: 3,
        ..DispatchSettings::default()
    };
    let mut dispatch = DispatchLoop::new(rpc, exchange, clock, FailingSink::default(), settings);

    let summary = dispatch.run(10).unwrap();
    assert_eq!(summary.iterations, 10);
    assert_eq!(dispatch.rpc().update_calls, 10);
    // windows close at 3, 6, 9; plus the slow sample at 1
    assert_eq!(summary.windows, 3);
    assert_eq!(summary.slow_samples, 1);
    assert_eq!(summary.report_errors, 4);
    assert_eq!(dispatch.sink().attempts, 4);
}
