//! Connection manager: blocking handoff driven by a simulated event loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actuator_web::adapters::wifi::{
    AccessPointConfig, ConnectionManager, ConnectionOutcome, ConnectionState, LinkEvent,
    SimWifiLink, WirelessCredentials,
};

const DISCONNECT: LinkEvent = LinkEvent::StaDisconnected { reason: 201 };
const GOT_IP: LinkEvent = LinkEvent::GotIp { ip: [10, 0, 0, 2] };

/// Play `script` from an "event loop" thread once the station has started.
fn play(manager: &Arc<ConnectionManager<SimWifiLink>>, script: Vec<LinkEvent>) -> thread::JoinHandle<()> {
    let m = Arc::clone(manager);
    thread::spawn(move || {
        while m.with_link(|l| l.station_starts) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        for event in script {
            m.on_event(event);
        }
    })
}

fn creds(max_retries: u8) -> WirelessCredentials {
    WirelessCredentials::new("HomeNet", "password123", max_retries).unwrap()
}

#[test]
fn connect_blocks_until_address_acquired() {
    let manager = Arc::new(ConnectionManager::new(SimWifiLink::default()));
    let events = play(&manager, vec![LinkEvent::StaStarted, DISCONNECT, GOT_IP]);

    let outcome = manager.connect(&creds(3)).unwrap();
    events.join().unwrap();

    assert_eq!(outcome, ConnectionOutcome::Connected);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.retry_count(), 0);
    // One connect on start, one retry after the disconnect.
    assert_eq!(manager.with_link(|l| l.connect_requests), 2);
    assert_eq!(manager.with_link(|l| l.last_ssid.clone()).as_str(), "HomeNet");
}

#[test]
fn exhausting_retries_fails_the_wait() {
    let max = 3;
    let mut script = vec![LinkEvent::StaStarted];
    script.extend(std::iter::repeat_n(DISCONNECT, usize::from(max) + 1));

    let manager = Arc::new(ConnectionManager::new(SimWifiLink::default()));
    let events = play(&manager, script);

    let outcome = manager.connect(&creds(max)).unwrap();
    events.join().unwrap();

    assert_eq!(outcome, ConnectionOutcome::Failed);
    assert_eq!(manager.state(), ConnectionState::Failed);
    assert_eq!(manager.retry_count(), max);
    assert_eq!(manager.with_link(|l| l.connect_requests), 1 + u32::from(max));
}

#[test]
fn later_transitions_do_not_rearm_the_wait() {
    let manager = Arc::new(ConnectionManager::new(SimWifiLink::default()));
    let events = play(&manager, vec![LinkEvent::StaStarted, GOT_IP]);
    assert_eq!(manager.connect(&creds(1)).unwrap(), ConnectionOutcome::Connected);
    events.join().unwrap();

    // Link drops twice: one retry, then Failed, but nobody is waiting.
    manager.on_event(DISCONNECT);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    manager.on_event(DISCONNECT);
    assert_eq!(manager.state(), ConnectionState::Failed);
}

#[test]
fn background_recovery_reconnects_after_failure() {
    let manager = Arc::new(ConnectionManager::new(SimWifiLink::default()));
    let events = play(&manager, vec![LinkEvent::StaStarted, DISCONNECT]);
    assert_eq!(manager.connect(&creds(0)).unwrap(), ConnectionOutcome::Failed);
    events.join().unwrap();
    let before = manager.with_link(|l| l.connect_requests);

    manager.poll_recovery(10_000); // schedules
    manager.poll_recovery(11_000);
    assert_eq!(manager.with_link(|l| l.connect_requests), before);
    manager.poll_recovery(12_000);
    assert_eq!(manager.with_link(|l| l.connect_requests), before + 1);

    manager.on_event(GOT_IP);
    assert_eq!(manager.state(), ConnectionState::Connected);
    manager.poll_recovery(1_000_000);
    assert_eq!(manager.with_link(|l| l.connect_requests), before + 1);
}

#[test]
fn access_point_starts_immediately_and_ignores_joins() {
    let manager = ConnectionManager::new(SimWifiLink::default());
    let ap = AccessPointConfig::new("actuators", "", 1, 4).unwrap();
    assert!(ap.is_open());
    manager.start_access_point(&ap).unwrap();
    assert_eq!(manager.with_link(|l| l.ap_starts), 1);

    manager.on_event(LinkEvent::ApStationJoined { mac: [2, 0, 0, 0, 0, 1], aid: 1 });
    manager.on_event(LinkEvent::ApStationLeft { mac: [2, 0, 0, 0, 0, 1], aid: 1, reason: 8 });
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(manager.with_link(|l| l.connect_requests), 0);
}
