//! Native API session engine.
//!
//! One [`connection::Connection`] per client, driven by the
//! [`server::ApiServer`] from a single cooperative loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Native API stack                        │
//! │                                                              │
//! │  ┌───────────┐   ┌───────────┐   ┌────────────────────────┐  │
//! │  │ Transport │──▶│ Assembler │──▶│ Dispatch (route, gate) │  │
//! │  │  (trait)  │   │ (framing) │   │  → DevicePort          │  │
//! │  └───────────┘   └───────────┘   └────────────────────────┘  │
//! │        ▲                                     │               │
//! │        │       ┌─────────────────────────────┘               │
//! │        │       ▼                                             │
//! │  ┌───────────┐   ┌─────────────────────────────────────┐     │
//! │  │ SendPath  │◀──│ Responses · states · logs · camera  │     │
//! │  │ (space)   │   │ keepalive pings                     │     │
//! │  └───────────┘   └─────────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assembler;
pub mod channels;
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod io_task;
pub mod keepalive;
pub mod messages;
pub mod send;
pub mod server;
pub mod session;
pub mod stream;
pub mod transport;
pub mod varint;
