//! Connection registry: admission, reaping, broadcasts and log forwarding.

use apilink::adapters::loopback::{LoopbackPeer, LoopbackTransport, loopback};
use apilink::api::channels;
use apilink::api::codec::encode_frame;
use apilink::api::messages::{
    self as m, ApiMessage, ConnectRequest, HelloRequest, LogLevel, OutboundMessage, StateUpdate,
    SubscribeLogsRequest, SubscribeLogsResponse, SubscribeStatesRequest, decode_message,
};
use apilink::api::server::ApiServer;
use apilink::app::ports::ImageSource;
use apilink::config::{ApiConfig, Capabilities};

use crate::mock_device::{MockDevice, MockImage};

fn frame<M: ApiMessage>(msg: &M) -> Vec<u8> {
    let mut wire = Vec::new();
    encode_frame(M::TYPE, &postcard::to_allocvec(msg).unwrap(), &mut wire);
    wire
}

fn login_bytes() -> Vec<u8> {
    let mut wire = frame(&HelloRequest {
        client_info: "ha".into(),
    });
    wire.extend(frame(&ConnectRequest::default()));
    wire
}

fn server(max_clients: usize) -> ApiServer<LoopbackTransport> {
    let config = ApiConfig {
        max_clients,
        ..ApiConfig::default()
    };
    ApiServer::new(config, "node (apilink)").unwrap()
}

fn camera_server() -> ApiServer<LoopbackTransport> {
    let config = ApiConfig {
        capabilities: Capabilities {
            camera: true,
            ..Capabilities::default()
        },
        ..ApiConfig::default()
    };
    ApiServer::new(config, "node (apilink)").unwrap()
}

fn connect(server: &mut ApiServer<LoopbackTransport>, peer: &str) -> LoopbackPeer {
    let (transport, client) = loopback(peer, 4096);
    assert!(server.accept(transport, 0));
    client
}

#[test]
fn invalid_config_is_rejected() {
    let config = ApiConfig {
        max_clients: 0,
        ..ApiConfig::default()
    };
    assert!(ApiServer::<LoopbackTransport>::new(config, "x").is_err());
}

#[test]
fn clients_beyond_the_limit_are_closed() {
    let mut srv = server(2);
    connect(&mut srv, "10.0.0.1");
    connect(&mut srv, "10.0.0.2");

    let (transport, third) = loopback("10.0.0.3", 4096);
    assert!(!srv.accept(transport, 0));
    assert!(third.is_closed());
    assert_eq!(srv.len(), 2);
}

#[test]
fn service_reads_sockets_and_answers() {
    let mut srv = server(4);
    let client = connect(&mut srv, "10.0.0.1");
    let mut device = MockDevice::new();

    client.send(&login_bytes());
    srv.service(0, &mut device, true);

    let types: Vec<u32> = client.take_frames().into_iter().map(|(t, _)| t).collect();
    assert_eq!(
        types,
        [m::HELLO_RESPONSE, m::CONNECT_RESPONSE, m::GET_TIME_REQUEST]
    );
    assert!(srv.connections()[0].state().is_authenticated());
}

#[test]
fn terminated_connections_are_reaped_on_the_same_pass() {
    let mut srv = server(4);
    let a = connect(&mut srv, "10.0.0.1");
    let _b = connect(&mut srv, "10.0.0.2");
    let mut device = MockDevice::new();

    a.disconnect();
    srv.service(0, &mut device, true);
    assert_eq!(srv.len(), 1);
    assert!(a.is_closed());
    assert_eq!(srv.connections()[0].client_info(), "10.0.0.2");
}

#[test]
fn network_loss_drops_every_client() {
    let mut srv = server(4);
    let a = connect(&mut srv, "10.0.0.1");
    let b = connect(&mut srv, "10.0.0.2");
    let mut device = MockDevice::new();

    srv.service(0, &mut device, false);
    assert!(srv.is_empty());
    assert!(a.is_closed() && b.is_closed());
}

#[test]
fn state_broadcast_reaches_only_subscribers() {
    let mut srv = server(4);
    let a = connect(&mut srv, "10.0.0.1");
    let b = connect(&mut srv, "10.0.0.2");
    let mut device = MockDevice::new();

    let mut wire = login_bytes();
    wire.extend(frame(&SubscribeStatesRequest));
    a.send(&wire);
    b.send(&login_bytes());
    srv.service(0, &mut device, true);
    a.take_frames();
    b.take_frames();

    let update = StateUpdate {
        key: 3,
        message: OutboundMessage::new(25, vec![1]),
    };
    assert_eq!(srv.push_state(&update), 1);
    assert_eq!(a.take_frames(), vec![(25, vec![1])]);
    assert!(b.take_frames().is_empty());
}

#[test]
fn camera_push_makes_one_source_per_idle_subscriber() {
    let mut srv = camera_server();
    let a = connect(&mut srv, "10.0.0.1");
    let b = connect(&mut srv, "10.0.0.2");
    let mut device = MockDevice::new();

    let mut wire = login_bytes();
    wire.extend(frame(&SubscribeStatesRequest));
    a.send(&wire);
    b.send(&wire);
    srv.service(0, &mut device, true);
    a.take_frames();
    b.take_frames();

    let mut made = 0;
    let started = srv.push_camera_image(1, || {
        made += 1;
        Box::new(MockImage::new(100).0) as Box<dyn ImageSource>
    });
    assert_eq!(started, 2);
    assert_eq!(made, 2);

    // Both are busy now; nothing new is created.
    let started = srv.push_camera_image(1, || {
        Box::new(MockImage::new(100).0) as Box<dyn ImageSource>
    });
    assert_eq!(started, 0);

    srv.service(1, &mut device, true);
    for client in [&a, &b] {
        let frames = client.take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, m::CAMERA_IMAGE_RESPONSE);
    }
    assert!(srv.connections().iter().all(|c| !c.is_streaming_image()));
}

#[test]
fn camera_push_is_ignored_without_the_capability() {
    let mut srv = server(4);
    let a = connect(&mut srv, "10.0.0.1");
    let mut device = MockDevice::new();

    let mut wire = login_bytes();
    wire.extend(frame(&SubscribeStatesRequest));
    a.send(&wire);
    srv.service(0, &mut device, true);
    a.take_frames();

    let mut made = 0;
    let started = srv.push_camera_image(1, || {
        made += 1;
        Box::new(MockImage::new(100).0) as Box<dyn ImageSource>
    });
    assert_eq!(started, 0);
    assert_eq!(made, 0);
    assert!(!srv.connections()[0].is_streaming_image());

    srv.service(1, &mut device, true);
    assert!(a.take_frames().is_empty());
}

#[test]
fn queued_log_lines_are_forwarded_to_subscribers() {
    let mut srv = server(4);
    let client = connect(&mut srv, "10.0.0.1");
    let mut device = MockDevice::new();

    let mut wire = login_bytes();
    wire.extend(frame(&SubscribeLogsRequest {
        level: LogLevel::Warn,
        dump_config: false,
    }));
    client.send(&wire);
    srv.service(0, &mut device, true);
    client.take_frames();

    assert!(channels::try_forward(LogLevel::Error, "pump stalled"));
    assert!(channels::try_forward(LogLevel::Debug, "below threshold"));
    assert!(srv.forward_logs() >= 2);

    let lines: Vec<String> = client
        .take_frames()
        .iter()
        .filter(|(t, _)| *t == m::SUBSCRIBE_LOGS_RESPONSE)
        .map(|(_, p)| {
            decode_message::<SubscribeLogsResponse<'_>>(p)
                .unwrap()
                .message
                .to_owned()
        })
        .collect();
    assert!(lines.iter().any(|l| l == "pump stalled"));
    assert!(!lines.iter().any(|l| l == "below threshold"));
}

#[test]
fn close_all_says_goodbye() {
    let mut srv = server(4);
    let a = connect(&mut srv, "10.0.0.1");
    srv.close_all();
    assert!(srv.is_empty());
    assert_eq!(
        a.take_frames().into_iter().map(|(t, _)| t).collect::<Vec<_>>(),
        [m::DISCONNECT_REQUEST]
    );
    assert!(a.is_closed());
}
