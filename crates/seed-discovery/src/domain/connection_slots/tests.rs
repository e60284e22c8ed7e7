//! Tests for Connection Slots Management

use std::net::SocketAddr;

use tokio::time::Instant;

use super::*;
use crate::domain::NodeId;

fn make_node_id(byte: u8) -> NodeId {
    let mut id = [0u8; 20];
    id[0] = byte;
    NodeId::new(id)
}

fn record(byte: u8, direction: ConnectionDirection, ip: &str) -> ConnectionRecord<()> {
    ConnectionRecord {
        id: make_node_id(byte),
        direction,
        remote_addr: SocketAddr::new(ip.parse().unwrap(), 26656),
        listen_addr: None,
        connected_at: Instant::now(),
        handle: (),
    }
}

fn slots(config: ConnectionSlotsConfig) -> ConnectionSlots<()> {
    ConnectionSlots::new(make_node_id(0), config)
}

// =============================================================================
// TEST GROUP 1: Caps
// =============================================================================

#[test]
fn test_inbound_cap_rejects_excess() {
    let config = ConnectionSlotsConfig::for_testing();
    let mut slots = slots(config.clone());

    for i in 0..config.max_inbound {
        let ip = format!("8.8.{}.1", i);
        let result = slots.try_admit(record(i as u8 + 1, ConnectionDirection::Inbound, &ip));
        assert_eq!(result, AcceptResult::Accepted);
    }

    let result = slots.try_admit(record(200, ConnectionDirection::Inbound, "9.9.9.9"));
    assert_eq!(result, AcceptResult::Rejected(SlotRejection::InboundFull));
    assert_eq!(slots.inbound_count(), config.max_inbound);
}

#[test]
fn test_caps_are_independent() {
    let config = ConnectionSlotsConfig::for_testing();
    let mut slots = slots(config.clone());

    for i in 0..config.max_inbound {
        slots.try_admit(record(i as u8 + 1, ConnectionDirection::Inbound, "8.8.8.8"));
    }
    // Inbound full does not consume outbound capacity.
    assert_eq!(slots.free_outbound_slots(), config.max_outbound);
    assert!(slots.reserve_dial(make_node_id(100)).is_ok());
}

// =============================================================================
// TEST GROUP 2: Dial Reservations
// =============================================================================

#[test]
fn test_dials_count_against_outbound_cap() {
    let config = ConnectionSlotsConfig::for_testing();
    let mut slots = slots(config.clone());

    for i in 0..config.max_outbound {
        assert!(slots.reserve_dial(make_node_id(i as u8 + 1)).is_ok());
    }
    assert_eq!(slots.free_outbound_slots(), 0);
    assert_eq!(
        slots.reserve_dial(make_node_id(100)),
        Err(SlotRejection::OutboundFull)
    );

    assert!(slots.release_dial(&make_node_id(1)));
    assert_eq!(slots.free_outbound_slots(), 1);
}

#[test]
fn test_reserved_dial_admits_even_when_full() {
    let config = ConnectionSlotsConfig::for_testing();
    let mut slots = slots(config.clone());

    for i in 0..config.max_outbound {
        slots.reserve_dial(make_node_id(i as u8 + 1)).unwrap();
    }
    let result = slots.try_admit(record(1, ConnectionDirection::Outbound, "8.8.8.8"));
    assert_eq!(result, AcceptResult::Accepted);
    assert!(!slots.is_dialing(&make_node_id(1)));
    assert_eq!(slots.outbound_count(), config.max_outbound);

    // An unreserved outbound connection has no slot left.
    let result = slots.try_admit(record(50, ConnectionDirection::Outbound, "8.8.8.9"));
    assert_eq!(result, AcceptResult::Rejected(SlotRejection::OutboundFull));
}

#[test]
fn test_duplicate_dial_refused() {
    let mut slots = slots(ConnectionSlotsConfig::for_testing());
    slots.reserve_dial(make_node_id(1)).unwrap();
    assert_eq!(slots.reserve_dial(make_node_id(1)), Err(SlotRejection::DuplicateId));
    assert_eq!(slots.reserve_dial(make_node_id(0)), Err(SlotRejection::SelfConnection));
}

// =============================================================================
// TEST GROUP 3: Admission Policy
// =============================================================================

#[test]
fn test_self_and_duplicate_id_rejected() {
    let mut slots = slots(ConnectionSlotsConfig::for_testing());

    let result = slots.try_admit(record(0, ConnectionDirection::Inbound, "8.8.8.8"));
    assert_eq!(result, AcceptResult::Rejected(SlotRejection::SelfConnection));

    assert_eq!(
        slots.try_admit(record(1, ConnectionDirection::Inbound, "8.8.8.8")),
        AcceptResult::Accepted
    );
    assert_eq!(
        slots.try_admit(record(1, ConnectionDirection::Outbound, "8.8.4.4")),
        AcceptResult::Rejected(SlotRejection::DuplicateId)
    );
}

#[test]
fn test_duplicate_ip_allowed_by_default() {
    let mut slots = slots(ConnectionSlotsConfig::default());
    assert_eq!(
        slots.try_admit(record(1, ConnectionDirection::Inbound, "8.8.8.8")),
        AcceptResult::Accepted
    );
    assert_eq!(
        slots.try_admit(record(2, ConnectionDirection::Inbound, "8.8.8.8")),
        AcceptResult::Accepted
    );
}

#[test]
fn test_duplicate_ip_rejected_when_disallowed() {
    let config = ConnectionSlotsConfig {
        allow_duplicate_ip: false,
        ..ConnectionSlotsConfig::for_testing()
    };
    let mut slots = slots(config);
    slots.try_admit(record(1, ConnectionDirection::Inbound, "8.8.8.8"));
    assert_eq!(
        slots.try_admit(record(2, ConnectionDirection::Inbound, "8.8.8.8")),
        AcceptResult::Rejected(SlotRejection::DuplicateIp)
    );
}

#[test]
fn test_remove_releases_slot_and_busy_ids() {
    let mut slots = slots(ConnectionSlotsConfig::for_testing());
    slots.try_admit(record(1, ConnectionDirection::Inbound, "8.8.8.8"));
    slots.reserve_dial(make_node_id(2)).unwrap();

    let busy = slots.busy_ids();
    assert!(busy.contains(&make_node_id(1)));
    assert!(busy.contains(&make_node_id(2)));

    assert!(slots.remove(&make_node_id(1)).is_some());
    assert!(slots.is_empty());
    assert_eq!(slots.stats().dialing_count, 1);
}
