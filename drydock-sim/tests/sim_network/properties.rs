//! Coordination and ordering properties.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drydock_sim::{
    CallbackId, HostAndPort, NetworkError, NetworkInterface, RemoteReply, RemoteRequest,
    SimNetwork,
};
use serde_json::json;

use crate::support::{self, Exclusion, ExecutorHarness, StatusLog};

fn ping(host: &str) -> RemoteRequest {
    RemoteRequest::new(HostAndPort::parse(host).expect("host"), json!({"ping": 1}))
}

/// Lock-stepping a real executor thread against the test-body network
/// thread never produces an interleaving: both sides run critical sections
/// through a deliberately non-atomic checker.
#[test]
fn test_exclusivity() {
    support::init_logging();
    const ROUNDS: u64 = 50;
    let net = SimNetwork::new();
    let exclusion = Arc::new(Exclusion::new());

    let deadlines: Vec<Duration> = (1..=ROUNDS).map(|i| Duration::from_millis(i * 10)).collect();
    let executor_side = exclusion.clone();
    let harness = ExecutorHarness::spawn(&net, deadlines, move |_| {
        executor_side.critical_section();
    });

    net.enter_network();
    for i in 1..=ROUNDS {
        net.run_until(Duration::from_millis(i * 10));
        exclusion.critical_section();
    }
    net.exit_network();
    net.shutdown();
    harness.join();

    assert_eq!(exclusion.entries(), 2 * ROUNDS);
}

/// `next_ready_request` on an empty queue parks the network side and hands
/// the executor turns until a submission actually arrives from its thread.
#[test]
fn test_next_ready_request_blocks_until_submission() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();

    let submitter = net.clone();
    let submitter_log = log.clone();
    let harness = ExecutorHarness::spawn(&net, vec![Duration::from_millis(10)], move |_| {
        submitter
            .start_command(
                CallbackId::new(21),
                ping("late:27017"),
                submitter_log.recorder(),
            )
            .expect("submit");
    });

    net.enter_network();
    // Nothing has been submitted yet: this must yield to the executor and
    // return only once its submission lands.
    let op = net.next_ready_request();
    assert_eq!(net.request_for(op).target, HostAndPort::new("late", 27017));
    net.schedule_successful_response_at(op, net.now(), RemoteReply::with_data(json!({"ok": 1})));
    net.run_ready_network_operations();
    net.exit_network();

    net.shutdown();
    harness.join();
    assert_eq!(
        log.snapshot(),
        vec![Ok(RemoteReply::with_data(json!({"ok": 1})))]
    );
}

/// Virtual time never decreases across any sequence of driver operations.
#[test]
fn test_monotonic_time() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();

    let mut observed = vec![net.now()];
    let guard = net.enter();
    observed.push(guard.run_until(Duration::from_millis(10)));

    net.start_command(CallbackId::new(1), ping("h:27017"), log.recorder())
        .expect("submit");
    let op = guard.next_ready_request();
    observed.push(net.now());
    guard.schedule_response(op, Duration::from_millis(25), Ok(RemoteReply::default()));
    observed.push(guard.run_until(Duration::from_millis(30)));
    guard.run_ready_network_operations();
    observed.push(net.now());
    observed.push(guard.run_until(Duration::from_millis(30)));

    assert!(
        observed.windows(2).all(|w| w[0] <= w[1]),
        "time went backwards: {observed:?}"
    );
}

/// Responses scheduled for the same instant fire in scheduling order.
#[test]
fn test_fifo_tie_break() {
    support::init_logging();
    let net = SimNetwork::new();
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

    for id in 0..4u64 {
        let order = order.clone();
        net.start_command(
            CallbackId::new(id),
            ping("h:27017"),
            Box::new(move |_| order.lock().expect("order").push(id)),
        )
        .expect("submit");
    }

    let guard = net.enter();
    let when = Duration::from_millis(5);
    for _ in 0..4 {
        let op = guard.next_ready_request();
        guard.schedule_response(op, when, Ok(RemoteReply::default()));
    }
    guard.run_until(Duration::from_millis(5));

    assert_eq!(*order.lock().expect("order"), vec![0, 1, 2, 3]);
}

/// `exit_network` without a matching `enter_network` is a no-op.
#[test]
fn test_exit_network_idempotent() {
    let net = SimNetwork::new();
    net.exit_network();
    net.exit_network();
    assert!(!net.on_network_thread());

    net.enter_network();
    net.exit_network();
    net.exit_network();
    assert!(!net.on_network_thread());
}

/// Cancelling an operation whose response is already queued loses the race:
/// the original response is delivered untouched.
#[test]
fn test_cancellation_races_completion() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();
    net.start_command(CallbackId::new(5), ping("h:27017"), log.recorder())
        .expect("submit");

    let guard = net.enter();
    let op = guard.next_ready_request();
    guard.schedule_response(
        op,
        net.now(),
        Ok(RemoteReply::with_data(json!({"ok": 1}))),
    );
    net.cancel_command(CallbackId::new(5));
    guard.run_ready_network_operations();

    assert_eq!(
        log.snapshot(),
        vec![Ok(RemoteReply::with_data(json!({"ok": 1})))],
        "queued response must win the race"
    );
}

/// A blackholed operation receives exactly one terminal callback, only at
/// shutdown, and cancellation cannot finalize it.
#[test]
fn test_blackhole_persistence() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();
    net.start_command(CallbackId::new(6), ping("h:27017"), log.recorder())
        .expect("submit");

    {
        let guard = net.enter();
        let op = guard.next_ready_request();
        guard.black_hole(op);
        guard.run_until(Duration::from_millis(100));
    }
    net.cancel_command(CallbackId::new(6));
    {
        let guard = net.enter();
        guard.run_ready_network_operations();
    }
    assert_eq!(log.len(), 0, "blackholed operation must stay silent");

    net.shutdown();
    assert_eq!(log.snapshot(), vec![Err(NetworkError::CallbackCanceled)]);
}

/// A cancelled alarm never runs its action on the network thread.
#[test]
fn test_alarm_cancellation() {
    support::init_logging();
    let net = SimNetwork::new();
    let fired = Arc::new(AtomicU64::new(0));
    let sink = fired.clone();
    net.set_alarm(
        CallbackId::new(11),
        Duration::from_millis(50),
        Box::new(move |status| {
            assert_eq!(status, Ok(()));
            sink.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .expect("set_alarm");
    net.cancel_alarm(CallbackId::new(11));

    let guard = net.enter();
    guard.run_until(Duration::from_millis(100));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

/// Alarms set for the same instant fire in the order they were set.
#[test]
fn test_alarm_fifo_tie_break() {
    support::init_logging();
    let net = SimNetwork::new();
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    for id in 0..3u64 {
        let order = order.clone();
        net.set_alarm(
            CallbackId::new(id),
            Duration::from_millis(40),
            Box::new(move |_| order.lock().expect("order").push(id)),
        )
        .expect("set_alarm");
    }

    let guard = net.enter();
    guard.run_until(Duration::from_millis(40));
    assert_eq!(*order.lock().expect("order"), vec![0, 1, 2]);
}
