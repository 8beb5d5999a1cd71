//! End-to-end scenarios for the simulated network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use drydock_sim::{
    AlarmStatus, CallbackId, ConnectionHook, HostAndPort, NetworkError, NetworkInterface,
    RemoteReply, RemoteRequest, SimNetwork,
};
use serde_json::json;

use crate::support::{self, StatusLog};

fn ping(host: &str) -> RemoteRequest {
    RemoteRequest::new(
        HostAndPort::parse(host).expect("host"),
        json!({"ping": 1}),
    )
}

/// Round-trip: submit at t=0, reply scheduled for t=5, run to t=10.
#[test]
fn test_round_trip() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();
    net.start_command(CallbackId::new(1), ping("h:27017"), log.recorder())
        .expect("submit");

    let guard = net.enter();
    let op = guard.next_ready_request();
    assert_eq!(guard.request_date_for(op), Duration::ZERO);
    assert_eq!(
        guard.request_for(op).target,
        HostAndPort::new("h", 27017)
    );
    guard.schedule_response(
        op,
        Duration::from_millis(5),
        Ok(RemoteReply::with_data(json!({"ok": 1}))),
    );
    let now = guard.run_until(Duration::from_millis(10));

    assert_eq!(now, Duration::from_millis(10));
    assert_eq!(net.now(), Duration::from_millis(10));
    let statuses = log.snapshot();
    assert_eq!(statuses.len(), 1, "reply delivered exactly once");
    assert_eq!(statuses[0], Ok(RemoteReply::with_data(json!({"ok": 1}))));
}

/// An alarm set for t=100 does not fire at t=50 and fires with success at
/// t=100.
#[test]
fn test_alarm_fires_after_timeout() {
    support::init_logging();
    let net = SimNetwork::new();
    let fired: Arc<Mutex<Vec<AlarmStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    net.set_alarm(
        CallbackId::new(7),
        Duration::from_millis(100),
        Box::new(move |status| sink.lock().expect("fired").push(status)),
    )
    .expect("set_alarm");

    let guard = net.enter();
    guard.run_until(Duration::from_millis(50));
    assert!(fired.lock().expect("fired").is_empty(), "alarm fired early");

    guard.run_until(Duration::from_millis(100));
    assert_eq!(*fired.lock().expect("fired"), vec![Ok(())]);
}

/// Cancelling before the driver pulls the request leaves nothing ready and
/// delivers CallbackCanceled.
#[test]
fn test_cancellation_before_pull() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();
    net.start_command(CallbackId::new(3), ping("h:27017"), log.recorder())
        .expect("submit");
    net.cancel_command(CallbackId::new(3));

    let guard = net.enter();
    assert!(!guard.has_ready_requests(), "cancelled request still ready");
    guard.run_ready_network_operations();

    assert_eq!(log.snapshot(), vec![Err(NetworkError::CallbackCanceled)]);
}

struct PostConnectHook;

impl ConnectionHook for PostConnectHook {
    fn validate_host(
        &self,
        _host: &HostAndPort,
        _handshake_reply: &RemoteReply,
    ) -> Result<(), NetworkError> {
        Ok(())
    }

    fn generate_request(
        &self,
        host: &HostAndPort,
    ) -> Result<Option<RemoteRequest>, NetworkError> {
        Ok(Some(RemoteRequest::new(
            host.clone(),
            json!({"getLastError": 1}),
        )))
    }
}

/// With a hook installed, the driver sees the post-connection command
/// first, then the user command; the executor sees only the user reply.
#[test]
fn test_handshake_with_hook() {
    support::init_logging();
    let net = SimNetwork::new();
    net.set_connection_hook(Box::new(PostConnectHook));
    let log = StatusLog::new();
    net.start_command(CallbackId::new(9), ping("new-host:27017"), log.recorder())
        .expect("submit");

    let guard = net.enter();
    let companion = guard.next_ready_request();
    assert_eq!(
        guard.request_for(companion).command,
        json!({"getLastError": 1})
    );
    guard.schedule_response(companion, net.now(), Ok(RemoteReply::with_data(json!({"ok": 1}))));
    guard.run_ready_network_operations();

    let user = guard.next_ready_request();
    assert_eq!(guard.request_for(user).command, json!({"ping": 1}));
    guard.schedule_response(
        user,
        net.now(),
        Ok(RemoteReply::with_data(json!({"ok": 1, "pong": true}))),
    );
    guard.run_ready_network_operations();

    let statuses = log.snapshot();
    assert_eq!(statuses.len(), 1, "executor sees only the user reply");
    assert_eq!(
        statuses[0],
        Ok(RemoteReply::with_data(json!({"ok": 1, "pong": true})))
    );
}

/// A blackholed operation is finalized only by shutdown, with
/// CallbackCanceled.
#[test]
fn test_blackhole_then_shutdown() {
    support::init_logging();
    let net = SimNetwork::new();
    let log = StatusLog::new();
    net.start_command(CallbackId::new(4), ping("h:27017"), log.recorder())
        .expect("submit");

    {
        let guard = net.enter();
        let op = guard.next_ready_request();
        guard.black_hole(op);
        guard.run_until(Duration::from_millis(50));
        assert_eq!(log.len(), 0, "blackholed operation answered early");
    }

    net.shutdown();
    assert_eq!(log.snapshot(), vec![Err(NetworkError::CallbackCanceled)]);
}

/// Responses scheduled out of order are delivered in virtual-time order.
#[test]
fn test_out_of_order_scheduling() {
    support::init_logging();
    let net = SimNetwork::new();
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (id, tag) in [(1u64, "slow"), (2u64, "fast")] {
        let order = order.clone();
        net.start_command(
            CallbackId::new(id),
            ping("h:27017"),
            Box::new(move |status| {
                assert!(status.is_ok());
                order.lock().expect("order").push(tag);
            }),
        )
        .expect("submit");
    }

    let guard = net.enter();
    let slow = guard.next_ready_request();
    let fast = guard.next_ready_request();
    guard.schedule_response(slow, Duration::from_millis(10), Ok(RemoteReply::default()));
    guard.schedule_response(fast, Duration::from_millis(5), Ok(RemoteReply::default()));
    guard.run_until(Duration::from_millis(20));

    assert_eq!(*order.lock().expect("order"), vec!["fast", "slow"]);
}
