//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter         | Implements    | Connects to                  |
//! |-----------------|---------------|------------------------------|
//! | `log_sink`      | `log::Log`    | Platform logger + log channel|
//! | `loopback`      | Transport     | In-memory peer (tests, fuzz) |
//! | `network`       | NetworkPort   | Wi-Fi link state flag        |
//! | `registry`      | DevicePort    | Registered entities/services |
//! | `tcp_transport` | Transport     | Non-blocking `TcpStream`     |
//! | `time`          | Clock         | ESP32 system timer / Instant |

pub mod log_sink;
pub mod loopback;
pub mod network;
pub mod registry;
pub mod tcp_transport;
pub mod time;
