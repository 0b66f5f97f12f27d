//! Entity enumeration, state pushes, logs, service calls and camera chunks.

use apilink::api::messages::{
    self as m, CameraImageRequest, CameraImageResponse, ExecuteServiceRequest,
    HomeAssistantStateResponse, HomeassistantServiceResponse, ListEntitiesRequest, LogLevel,
    OutboundMessage, StateUpdate, SubscribeHomeAssistantStateResponse,
    SubscribeHomeAssistantStatesRequest, SubscribeHomeassistantServicesRequest,
    SubscribeLogsRequest, SubscribeLogsResponse, SubscribeStatesRequest, decode_message,
};
use apilink::config::{ApiConfig, Capabilities};

use crate::mock_device::{DeviceCall, Harness, MockDevice, MockImage};

fn authed(device: MockDevice) -> Harness {
    let mut h = Harness::new(device);
    h.authenticate("");
    h
}

// ── Enumeration ───────────────────────────────────────────────

#[test]
fn list_entities_sends_one_descriptor_per_tick_then_done() {
    let mut h = authed(MockDevice::with_entities(2));
    h.send(&ListEntitiesRequest);
    assert_eq!(h.client.take_frames(), vec![(12, vec![0])]);
    h.tick();
    assert_eq!(h.client.take_frames(), vec![(12, vec![1])]);
    h.tick();
    assert_eq!(h.frame_types(), vec![m::LIST_ENTITIES_DONE_RESPONSE]);
    assert!(!h.conn.is_listing());
    h.tick();
    assert!(h.client.take_frames().is_empty());
}

#[test]
fn entities_without_descriptor_are_skipped() {
    let mut dev = MockDevice::with_entities(3);
    dev.descriptors[1] = None;
    let mut h = authed(dev);
    h.send(&ListEntitiesRequest);
    for _ in 0..4 {
        h.tick();
    }
    assert_eq!(
        h.client.take_frames(),
        vec![
            (12, vec![0]),
            (12, vec![2]),
            (m::LIST_ENTITIES_DONE_RESPONSE, vec![]),
        ]
    );
}

#[test]
fn full_socket_holds_the_list_cursor() {
    let mut h = authed(MockDevice::with_entities(1));
    h.client.set_space(2);
    h.send(&ListEntitiesRequest);
    h.tick();
    assert!(h.client.take_frames().is_empty());
    assert!(h.conn.is_listing());

    h.client.set_space(4096);
    h.tick();
    assert_eq!(h.client.take_frames(), vec![(12, vec![0])]);
    h.tick();
    assert_eq!(h.frame_types(), vec![m::LIST_ENTITIES_DONE_RESPONSE]);
    assert!(!h.conn.is_terminated());
}

#[test]
fn done_marker_is_retried_until_it_fits() {
    let mut h = authed(MockDevice::new());
    h.client.set_space(0);
    h.send(&ListEntitiesRequest);
    assert!(h.conn.is_listing());
    h.client.set_space(4096);
    h.tick();
    assert_eq!(h.frame_types(), vec![m::LIST_ENTITIES_DONE_RESPONSE]);
    assert!(!h.conn.is_listing());
}

#[test]
fn subscribe_states_replays_current_states() {
    let mut dev = MockDevice::with_entities(3);
    dev.states[0] = None;
    let mut h = authed(dev);
    h.send(&SubscribeStatesRequest);
    h.tick();
    h.tick();
    assert_eq!(h.client.take_frames(), vec![(25, vec![1]), (25, vec![2])]);
    assert!(h.conn.is_subscribed_to_states());
}

#[test]
fn listing_takes_priority_over_state_replay() {
    let mut h = authed(MockDevice::with_entities(1));
    let mut wire = Vec::new();
    apilink::api::codec::encode_frame(m::SUBSCRIBE_STATES_REQUEST, &[], &mut wire);
    apilink::api::codec::encode_frame(m::LIST_ENTITIES_REQUEST, &[], &mut wire);
    h.conn.feed_inbound(&wire);
    h.tick();
    h.tick();
    h.tick();
    assert_eq!(
        h.client.take_frames(),
        vec![
            (12, vec![0]),
            (m::LIST_ENTITIES_DONE_RESPONSE, vec![]),
            (25, vec![0]),
        ]
    );
}

#[test]
fn state_push_requires_subscription() {
    let mut h = authed(MockDevice::with_entities(1));
    let update = StateUpdate {
        key: 1,
        message: OutboundMessage::new(25, vec![7]),
    };
    assert!(!h.conn.push_state(&update));

    h.send(&SubscribeStatesRequest);
    h.client.take_frames();
    assert!(h.conn.push_state(&update));
    assert_eq!(h.client.take_frames(), vec![(25, vec![7])]);
}

// ── Logs ──────────────────────────────────────────────────────

#[test]
fn log_lines_respect_the_subscribed_threshold() {
    let mut h = authed(MockDevice::new());
    assert!(!h.conn.push_log(LogLevel::Error, "not subscribed"));

    h.send(&SubscribeLogsRequest {
        level: LogLevel::Info,
        dump_config: false,
    });
    assert_eq!(h.conn.log_level(), LogLevel::Info);
    assert!(!h.conn.push_log(LogLevel::Debug, "too chatty"));
    assert!(h.conn.push_log(LogLevel::Warn, "disk almost full"));

    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, m::SUBSCRIBE_LOGS_RESPONSE);
    let line: SubscribeLogsResponse<'_> = decode_message(&frames[0].1).unwrap();
    assert_eq!(line.level, LogLevel::Warn);
    assert_eq!(line.message, "disk almost full");
    assert!(!line.send_failed);
}

#[test]
fn oversized_log_line_becomes_a_send_failed_marker() {
    let mut h = authed(MockDevice::new());
    h.send(&SubscribeLogsRequest {
        level: LogLevel::VeryVerbose,
        dump_config: false,
    });
    h.client.set_space(16);
    let long = "x".repeat(200);
    assert!(!h.conn.push_log(LogLevel::Info, &long));

    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1);
    let marker: SubscribeLogsResponse<'_> = decode_message(&frames[0].1).unwrap();
    assert!(marker.send_failed);
    assert!(marker.message.is_empty());
    assert!(!h.conn.is_terminated());
}

// ── Home Assistant ────────────────────────────────────────────

#[test]
fn service_calls_need_a_subscription() {
    let mut h = authed(MockDevice::new());
    let call = HomeassistantServiceResponse {
        service: "light.turn_on".into(),
        ..HomeassistantServiceResponse::default()
    };
    assert!(!h.conn.push_service_call(&call));

    h.send(&SubscribeHomeassistantServicesRequest);
    assert!(h.conn.push_service_call(&call));
    let frames = h.client.take_frames();
    assert_eq!(frames[0].0, m::HOMEASSISTANT_SERVICE_RESPONSE);
    let got: HomeassistantServiceResponse = decode_message(&frames[0].1).unwrap();
    assert_eq!(got.service, "light.turn_on");
}

#[test]
fn home_assistant_state_import() {
    let mut dev = MockDevice::new();
    dev.ha_subscriptions = vec!["sun.sun".into(), "person.ada".into()];
    let mut h = authed(dev);

    h.send(&SubscribeHomeAssistantStatesRequest);
    let frames = h.client.take_frames();
    let ids: Vec<String> = frames
        .iter()
        .map(|(t, p)| {
            assert_eq!(*t, m::SUBSCRIBE_HOME_ASSISTANT_STATE_RESPONSE);
            decode_message::<SubscribeHomeAssistantStateResponse>(p)
                .unwrap()
                .entity_id
        })
        .collect();
    assert_eq!(ids, ["sun.sun", "person.ada"]);

    h.send(&HomeAssistantStateResponse {
        entity_id: "sun.sun".into(),
        state: "below_horizon".into(),
    });
    assert_eq!(
        h.device.calls,
        vec![DeviceCall::HomeAssistantState {
            entity_id: "sun.sun".into(),
            state: "below_horizon".into(),
        }]
    );
}

#[test]
fn home_assistant_subscriptions_stop_at_the_first_that_does_not_fit() {
    let mut dev = MockDevice::new();
    dev.ha_subscriptions = vec!["sun.sun".into(), "person.ada".into(), "a.b".into()];
    let mut h = authed(dev);

    // 11 bytes: "sun.sun" and "a.b" fit, "person.ada" (14) does not.
    h.client.set_space(11);
    h.send(&SubscribeHomeAssistantStatesRequest);
    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1);
    let first: SubscribeHomeAssistantStateResponse = decode_message(&frames[0].1).unwrap();
    assert_eq!(first.entity_id, "sun.sun");
    assert_eq!(h.conn.stats().send_shortfalls, 1);
    assert!(!h.conn.is_terminated());
}

#[test]
fn commands_and_services_reach_the_device() {
    let mut dev = MockDevice::new();
    dev.known_services = vec![9];
    let mut h = authed(dev);

    h.send_raw(m::SWITCH_COMMAND_REQUEST, &[0x2a, 0x01]);
    h.send(&ExecuteServiceRequest {
        key: 9,
        args: vec![],
    });
    h.send(&ExecuteServiceRequest {
        key: 10,
        args: vec![],
    });
    assert_eq!(
        h.device.calls,
        vec![
            DeviceCall::Command {
                msg_type: m::SWITCH_COMMAND_REQUEST,
                payload: vec![0x2a, 0x01],
            },
            DeviceCall::Service { key: 9 },
            DeviceCall::Service { key: 10 },
        ]
    );
    assert!(!h.conn.is_terminated(), "unknown service key is not fatal");
}

// ── Camera ────────────────────────────────────────────────────

#[test]
fn camera_request_reaches_device_when_enabled() {
    let config = ApiConfig {
        capabilities: Capabilities {
            camera: true,
            ..Capabilities::default()
        },
        ..ApiConfig::default()
    };
    let mut h = Harness::with_config(MockDevice::new(), &config);
    h.authenticate("");
    h.send(&CameraImageRequest {
        single: true,
        stream: false,
    });
    assert_eq!(
        h.device.calls,
        vec![DeviceCall::CameraRequest {
            single: true,
            stream: false,
        }]
    );
}

#[test]
fn camera_needs_state_subscription() {
    let mut h = authed(MockDevice::new());
    let (image, probe) = MockImage::new(100);
    assert!(!h.conn.push_camera_image(7, Box::new(image)));
    assert!(!probe.borrow().released);
}

#[test]
fn camera_waits_out_low_capacity_then_sends_one_chunk() {
    let mut h = authed(MockDevice::new());
    h.send(&SubscribeStatesRequest);
    h.client.take_frames();

    let (image, probe) = MockImage::new(1000);
    assert!(h.conn.push_camera_image(7, Box::new(image)));
    let (second, _) = MockImage::new(10);
    assert!(!h.conn.push_camera_image(8, Box::new(second)), "one image at a time");

    h.client.set_space(80);
    for _ in 0..3 {
        h.tick();
        assert!(h.client.take_frames().is_empty());
        assert_eq!(probe.borrow().consumed, 0);
    }

    h.client.set_space(600);
    h.tick();
    let frames = h.client.take_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, m::CAMERA_IMAGE_RESPONSE);
    let chunk: CameraImageResponse<'_> = decode_message(&frames[0].1).unwrap();
    assert_eq!(chunk.key, 7);
    assert_eq!(chunk.data.len(), 600 - 24);
    assert!(!chunk.done);
    assert_eq!(probe.borrow().consumed, 576);
    assert!(!probe.borrow().released);

    h.tick();
    let frames = h.client.take_frames();
    let chunk: CameraImageResponse<'_> = decode_message(&frames[0].1).unwrap();
    assert_eq!(chunk.data.len(), 424);
    assert!(chunk.done);
    assert!(probe.borrow().released);
    assert!(!h.conn.is_streaming_image());
}

#[test]
fn terminated_connection_releases_the_image() {
    let mut h = authed(MockDevice::new());
    h.send(&SubscribeStatesRequest);
    let (image, probe) = MockImage::new(1000);
    assert!(h.conn.push_camera_image(7, Box::new(image)));
    h.client.disconnect();
    h.tick();
    assert!(h.conn.is_terminated());
    assert!(probe.borrow().released);
}
