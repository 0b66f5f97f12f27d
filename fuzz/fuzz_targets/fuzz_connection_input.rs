//! Fuzz target: `Connection::service_tick`
//!
//! Drives arbitrary inbound bytes through a full session over the
//! loopback transport, a few bytes at a time, with a fuzzer-chosen send
//! window. Asserts that nothing panics and that a terminated connection
//! stays terminated and silent.
//!
//! cargo fuzz run fuzz_connection_input

#![no_main]

use apilink::adapters::loopback::loopback;
use apilink::adapters::registry::EntityRegistry;
use apilink::api::connection::{Connection, ServiceContext};
use apilink::api::messages::OutboundMessage;
use apilink::api::session::Credentials;
use apilink::app::ports::DeviceInfo;
use apilink::config::{ApiConfig, Capabilities};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&window, data)) = data.split_first() else {
        return;
    };

    let config = ApiConfig {
        keepalive_interval_ms: 1_000,
        max_inbound_buffer: 512,
        capabilities: Capabilities {
            camera: true,
            ..Capabilities::default()
        },
        ..ApiConfig::default()
    };
    let mut device = EntityRegistry::new(DeviceInfo::default());
    device.register("relay", OutboundMessage::new(17, vec![1, 2, 3]));

    let (transport, client) = loopback("fuzz", usize::from(window) * 8);
    let mut conn = Connection::new(transport, 0, &config);
    let credentials = Credentials::open();
    let mut ctx = ServiceContext {
        device: &mut device,
        credentials: &credentials,
        capabilities: config.capabilities,
        server_info: "fuzz",
    };

    let mut now = 0u64;
    for piece in data.chunks(7) {
        conn.feed_inbound(piece);
        conn.service_tick(now, &mut ctx);
        now += 100;
        if conn.is_terminated() {
            assert!(client.is_closed());
            client.take_written();
            conn.service_tick(now, &mut ctx);
            assert!(client.take_written().is_empty());
            return;
        }
    }
});
