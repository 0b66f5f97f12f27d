//! API server configuration parameters
//!
//! All tunable parameters for the native API server. Values come from
//! [`ApiConfig::default`] or a JSON document baked into the firmware image
//! and may be persisted as a postcard blob.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optional handler groups, resolved once at startup.
///
/// A disabled capability makes its message types behave exactly like
/// unknown types: the frame is consumed and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Camera image streaming (`CameraImageRequest`, chunked image push).
    pub camera: bool,
    /// Wall clock sync from the client (`GetTimeRequest`/`GetTimeResponse`).
    pub home_assistant_time: bool,
    /// User-defined services and Home Assistant service calls.
    pub user_services: bool,
    /// Importing Home Assistant entity states.
    pub home_assistant_states: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            camera: false,
            home_assistant_time: true,
            user_services: true,
            home_assistant_states: true,
        }
    }
}

/// Core API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    // --- Listener ---
    /// TCP port the API server listens on
    pub port: u16,
    /// Maximum simultaneous client connections
    pub max_clients: usize,

    // --- Authentication ---
    /// Connection password; empty disables password checking
    pub password: String,

    // --- Liveness ---
    /// Silence (ms) before a keepalive probe is sent
    pub keepalive_interval_ms: u32,
    /// Deadline for any reply to a probe, as a percentage of the interval
    pub keepalive_grace_percent: u16,

    // --- Buffers ---
    /// Initial capacity of the inbound buffer (bytes)
    pub recv_buffer_reserve: usize,
    /// Initial capacity of the outbound scratch buffer (bytes)
    pub send_buffer_reserve: usize,
    /// Inbound bytes allowed to pile up without forming a frame
    pub max_inbound_buffer: usize,

    // --- Timing ---
    /// Service loop period (milliseconds)
    pub loop_interval_ms: u32,

    /// Optional handler groups
    pub capabilities: Capabilities,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            // Listener
            port: 6053,
            max_clients: 4,

            // Authentication
            password: String::new(),

            // Liveness
            keepalive_interval_ms: 60_000,
            keepalive_grace_percent: 150,

            // Buffers
            recv_buffer_reserve: 32,
            send_buffer_reserve: 64,
            max_inbound_buffer: 8192,

            // Timing
            loop_interval_ms: 16,

            capabilities: Capabilities::default(),
        }
    }
}

impl ApiConfig {
    /// Parse a JSON document. Missing fields are rejected; use
    /// [`ApiConfig::default`] as the base for partial overrides.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON config"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero"));
        }
        if self.max_clients == 0 {
            return Err(Error::Config("max_clients must be at least 1"));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(Error::Config("keepalive_interval_ms must be non-zero"));
        }
        if self.keepalive_grace_percent <= 100 {
            return Err(Error::Config(
                "keepalive_grace_percent must exceed 100 so a probe can be answered",
            ));
        }
        if self.max_inbound_buffer < 64 {
            return Err(Error::Config("max_inbound_buffer must be at least 64 bytes"));
        }
        if self.loop_interval_ms == 0 || self.loop_interval_ms > 1000 {
            return Err(Error::Config("loop_interval_ms must be 1-1000"));
        }
        Ok(())
    }

    /// Keepalive reply deadline in milliseconds.
    pub fn keepalive_grace_ms(&self) -> u64 {
        u64::from(self.keepalive_interval_ms) * u64::from(self.keepalive_grace_percent) / 100
    }
}
