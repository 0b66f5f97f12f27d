//! Handshake, authentication gating and orderly disconnect.

use apilink::api::messages::{
    self as m, ConnectRequest, ConnectResponse, DeviceInfoRequest, DeviceInfoResponse,
    DisconnectRequest, GetTimeResponse, HelloRequest, HelloResponse, ListEntitiesRequest,
    PingRequest, decode_message,
};
use apilink::api::session::ConnectionState;
use apilink::config::ApiConfig;
use apilink::error::{DisconnectReason, Error, FramingError, ProtocolViolation};

use crate::mock_device::{DeviceCall, Harness, MockDevice};

fn protected() -> ApiConfig {
    ApiConfig {
        password: "s3cret".into(),
        ..ApiConfig::default()
    }
}

#[test]
fn hello_reports_version_and_names_the_client() {
    let mut h = Harness::new(MockDevice::new());
    h.send(&HelloRequest {
        client_info: "aioesphomeapi".into(),
    });

    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, m::HELLO_RESPONSE);
    let resp: HelloResponse = decode_message(&frames[0].1).unwrap();
    assert_eq!(resp.api_version_major, m::API_VERSION_MAJOR);
    assert_eq!(resp.api_version_minor, m::API_VERSION_MINOR);
    assert_eq!(resp.server_info, "test-node (apilink)");

    assert_eq!(h.conn.state(), ConnectionState::Connected);
    assert_eq!(h.conn.client_info(), "aioesphomeapi (192.168.1.50)");
}

#[test]
fn correct_password_authenticates_and_requests_time() {
    let mut h = Harness::with_config(MockDevice::new(), &protected());
    h.send(&HelloRequest::default());
    h.client.take_frames();

    h.send(&ConnectRequest {
        password: "s3cret".into(),
    });
    let frames = h.client.take_frames();
    assert_eq!(frames[0].0, m::CONNECT_RESPONSE);
    let resp: ConnectResponse = decode_message(&frames[0].1).unwrap();
    assert!(!resp.invalid_password);
    assert_eq!(frames[1].0, m::GET_TIME_REQUEST);
    assert_eq!(h.conn.state(), ConnectionState::Authenticated);

    h.send(&GetTimeResponse {
        epoch_seconds: 1_700_000_000,
    });
    assert_eq!(h.device.calls, vec![DeviceCall::SetTime(1_700_000_000)]);
}

#[test]
fn wrong_password_keeps_session_connected() {
    let mut h = Harness::with_config(MockDevice::new(), &protected());
    h.send(&HelloRequest::default());
    h.client.take_frames();

    h.send(&ConnectRequest {
        password: "guess".into(),
    });
    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1, "no time request after a failed connect");
    let resp: ConnectResponse = decode_message(&frames[0].1).unwrap();
    assert!(resp.invalid_password);
    assert_eq!(h.conn.state(), ConnectionState::Connected);
    assert!(!h.conn.is_terminated());
}

#[test]
fn authenticated_message_before_auth_is_fatal_and_fine_after() {
    let mut h = Harness::with_config(MockDevice::with_entities(1), &protected());
    h.send(&HelloRequest::default());
    h.send(&ListEntitiesRequest);
    assert_eq!(
        h.conn.termination_reason(),
        Some(DisconnectReason::Fatal(Error::Protocol(
            ProtocolViolation::Unauthenticated(m::LIST_ENTITIES_REQUEST)
        )))
    );
    assert!(h.client.is_closed());

    let mut h = Harness::with_config(MockDevice::with_entities(1), &protected());
    h.authenticate("s3cret");
    h.send(&ListEntitiesRequest);
    assert!(!h.conn.is_terminated());
    assert!(h.conn.is_listing());
}

#[test]
fn connect_before_hello_is_fatal() {
    let mut h = Harness::new(MockDevice::new());
    h.send(&ConnectRequest::default());
    assert_eq!(
        h.conn.termination_reason(),
        Some(DisconnectReason::Fatal(Error::Protocol(
            ProtocolViolation::NoSetup(m::CONNECT_REQUEST)
        )))
    );
}

#[test]
fn ping_is_answered_in_any_state() {
    let mut h = Harness::new(MockDevice::new());
    h.send(&PingRequest);
    assert_eq!(h.frame_types(), vec![m::PING_RESPONSE]);
    assert_eq!(h.conn.state(), ConnectionState::Initialized);
}

#[test]
fn device_info_reports_password_use() {
    let mut h = Harness::with_config(MockDevice::new(), &protected());
    h.send(&HelloRequest::default());
    h.client.take_frames();
    h.send(&DeviceInfoRequest);

    let frames = h.client.take_frames();
    assert_eq!(frames[0].0, m::DEVICE_INFO_RESPONSE);
    let info: DeviceInfoResponse = decode_message(&frames[0].1).unwrap();
    assert!(info.uses_password);
    assert_eq!(info.name, "test-node");
    assert_eq!(info.mac_address, "AA:BB:CC:DD:EE:FF");
}

#[test]
fn disconnect_request_is_answered_then_closed() {
    let mut h = Harness::new(MockDevice::new());
    h.authenticate("");
    h.send(&DisconnectRequest);
    assert_eq!(h.frame_types(), vec![m::DISCONNECT_RESPONSE]);
    assert_eq!(
        h.conn.termination_reason(),
        Some(DisconnectReason::ClientRequested)
    );
    assert!(h.client.is_closed());
}

#[test]
fn frames_after_disconnect_in_same_buffer_are_not_dispatched() {
    let mut h = Harness::new(MockDevice::new());
    let mut wire = Vec::new();
    apilink::api::codec::encode_frame(m::DISCONNECT_REQUEST, &[], &mut wire);
    apilink::api::codec::encode_frame(m::PING_REQUEST, &[], &mut wire);
    h.conn.feed_inbound(&wire);
    h.tick();
    assert_eq!(h.frame_types(), vec![m::DISCONNECT_RESPONSE]);
    assert_eq!(h.conn.pending_inbound(), 0);
}

#[test]
fn hello_split_across_two_deliveries_dispatches_once() {
    let mut h = Harness::new(MockDevice::new());
    // length 5, type 1, payload = postcard HelloRequest { client_info: "abcd" }
    let payload = [0x04, b'a', b'b', b'c', b'd'];
    h.conn.feed_inbound(&[0x00, 0x05]);
    h.tick();
    assert!(h.client.take_frames().is_empty());
    assert_eq!(h.conn.pending_inbound(), 2);

    let mut rest = vec![0x01];
    rest.extend_from_slice(&payload);
    h.conn.feed_inbound(&rest);
    h.tick();

    assert_eq!(h.frame_types(), vec![m::HELLO_RESPONSE]);
    assert_eq!(h.conn.stats().frames_received, 1);
    assert_eq!(h.conn.pending_inbound(), 0);
    assert_eq!(h.conn.client_info(), "abcd (192.168.1.50)");
}

#[test]
fn bad_preamble_dispatches_nothing() {
    let mut h = Harness::new(MockDevice::new());
    h.conn.feed_inbound(&[0x01, 0x00, 0x07, 0x00, 0x00, 0x07]);
    h.tick();
    assert!(h.client.take_frames().is_empty());
    assert_eq!(
        h.conn.termination_reason(),
        Some(DisconnectReason::Fatal(Error::Framing(
            FramingError::BadPreamble(0x01)
        )))
    );
}

#[test]
fn malformed_payload_on_known_type_is_fatal() {
    let mut h = Harness::new(MockDevice::new());
    // Length prefix of the string claims 9 bytes, only 1 follows.
    h.send_raw(m::HELLO_REQUEST, &[0x09, b'x']);
    assert_eq!(
        h.conn.termination_reason(),
        Some(DisconnectReason::Fatal(Error::Protocol(
            ProtocolViolation::BadPayload(m::HELLO_REQUEST)
        )))
    );
}

#[test]
fn unknown_and_disabled_types_are_ignored() {
    let mut h = Harness::new(MockDevice::new());
    h.authenticate("");
    h.send_raw(999, &[1, 2, 3]);
    // Camera is off by default, so its request behaves like an unknown type.
    h.send_raw(m::CAMERA_IMAGE_REQUEST, &[1, 0]);
    assert!(!h.conn.is_terminated());
    assert!(h.device.calls.is_empty());
}

#[test]
fn operations_after_termination_are_no_ops() {
    let mut h = Harness::new(MockDevice::new());
    h.conn.request_close();
    assert_eq!(h.frame_types(), vec![m::DISCONNECT_REQUEST]);
    assert!(!h.conn.try_send(m::PING_REQUEST, &[]));
    h.send(&PingRequest);
    assert!(h.client.take_frames().is_empty());
    assert_eq!(h.conn.termination_reason(), Some(DisconnectReason::LocalRequest));
}
