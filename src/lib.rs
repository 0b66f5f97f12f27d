//! apilink: native API session engine.
//!
//! Serves the ESPHome-style native API over TCP: framing, the
//! hello/connect handshake, keepalive, entity enumeration, log and
//! camera streaming. Everything under [`api`] is platform-neutral and
//! tested on the host; ESP-IDF specifics live in [`adapters`] behind
//! `#[cfg(target_os = "espidf")]`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod app;
pub mod config;
pub mod error;

mod esp_link_shims;
