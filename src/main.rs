//! apilink firmware entry point.
//!
//! Boots ESP-IDF, joins Wi-Fi and serves the native API on its own
//! thread. The main thread then only watches the link.
//!
//! ```text
//!  ┌───────────────┐  entities   ┌─────────────────────────────────┐
//!  │ EntityRegistry│────────────▶│ api-io thread                   │
//!  └───────────────┘             │  accept loop · service loop     │
//!  ┌───────────────┐  link up    │  ApiServer ─▶ Connection × N    │
//!  │ main (Wi-Fi)  │────────────▶│                                 │
//!  └───────────────┘ NetworkFlag └─────────────────────────────────┘
//!  ┌───────────────┐  log lines            ▲
//!  │ ApiLogForwarder│──────────────────────┘ (LOG_CHANNEL)
//!  └───────────────┘
//! ```

#![deny(unused_must_use)]

use std::net::TcpListener;
use std::time::Duration;

use anyhow::{Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{LevelFilter, info, warn};

use apilink::adapters::log_sink::ApiLogForwarder;
use apilink::adapters::network::NetworkFlag;
use apilink::adapters::registry::EntityRegistry;
use apilink::api::io_task;
use apilink::app::ports::DeviceInfo;
use apilink::config::ApiConfig;

/// Build-time network and API settings.
const WIFI_SSID: Option<&str> = option_env!("APILINK_WIFI_SSID");
const WIFI_PASSWORD: Option<&str> = option_env!("APILINK_WIFI_PASSWORD");
const API_CONFIG_JSON: Option<&str> = option_env!("APILINK_CONFIG");

const DEVICE_NAME: &str = "apilink";
const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(1);

fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    ApiLogForwarder::new(EspLogger::new(), LevelFilter::Debug)
        .install(LevelFilter::Debug)
        .map_err(|e| anyhow!("logger: {e}"))?;

    info!("apilink v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = match API_CONFIG_JSON {
        Some(json) => ApiConfig::from_json(json)?,
        None => ApiConfig::default(),
    };
    info!(
        "API: port {}, {} clients, password {}",
        config.port,
        config.max_clients,
        if config.password.is_empty() { "off" } else { "on" }
    );

    // ── 3. Wi-Fi station ──────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;

    let ssid = WIFI_SSID.ok_or_else(|| anyhow!("APILINK_WIFI_SSID not set at build time"))?;
    let password = WIFI_PASSWORD.unwrap_or("");
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: password
            .try_into()
            .map_err(|_| anyhow!("Wi-Fi password too long"))?,
        auth_method: if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;

    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    let mac = wifi.wifi().sta_netif().get_mac()?;
    info!("Wi-Fi up: {}", ip.ip);

    // ── 4. Entities & device identity ─────────────────────────
    let registry = EntityRegistry::new(DeviceInfo {
        name: DEVICE_NAME.into(),
        mac_address: format_mac(mac),
        firmware_version: env!("CARGO_PKG_VERSION").into(),
        compilation_time: option_env!("APILINK_BUILD_TIME").unwrap_or("").into(),
        model: "esp32".into(),
        has_deep_sleep: false,
    });

    // ── 5. API server thread ──────────────────────────────────
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    let network = NetworkFlag::new(true);
    let server_info = format!("{} (apilink v{})", DEVICE_NAME, env!("CARGO_PKG_VERSION"));
    let _api = io_task::spawn(listener, config, server_info, registry, network.clone())?;

    // ── 6. Link supervision ───────────────────────────────────
    loop {
        let up = wifi.is_connected().unwrap_or(false);
        network.set(up);
        if !up {
            warn!("Wi-Fi lost, reconnecting");
            if let Err(e) = wifi.connect().and_then(|()| wifi.wait_netif_up()) {
                warn!("Wi-Fi reconnect failed: {}", e);
            }
        }
        std::thread::sleep(LINK_CHECK_INTERVAL);
    }
}
