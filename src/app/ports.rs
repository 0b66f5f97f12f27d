//! Port traits: the boundary between the API core and the rest of the device.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Connection / ApiServer
//! ```
//!
//! Entity storage, image capture, clocks and network status are provided by
//! adapters implementing these traits. The API core only consumes them, so
//! every session path is testable with in-memory mocks.

use crate::api::messages::{ExecuteServiceRequest, OutboundMessage};

// ───────────────────────────────────────────────────────────────
// Device port (entities, services, time)
// ───────────────────────────────────────────────────────────────

/// Static device identity reported in `DeviceInfoResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub mac_address: String,
    pub firmware_version: String,
    pub compilation_time: String,
    pub model: String,
    pub has_deep_sleep: bool,
}

/// Everything the session engine needs from the entity layer.
///
/// Entities are addressed by their position in a stable enumeration order.
pub trait DevicePort {
    fn device_info(&self) -> DeviceInfo;

    /// Number of entities to enumerate.
    fn entity_count(&self) -> usize;

    /// Descriptor for entity `index`, or `None` to skip it.
    fn list_entity(&self, index: usize) -> Option<OutboundMessage>;

    /// Current state for entity `index`, or `None` if it has none yet.
    fn entity_state(&self, index: usize) -> Option<OutboundMessage>;

    /// Forward an opaque entity command (cover/fan/light/switch/climate).
    fn entity_command(&mut self, msg_type: u32, payload: &[u8]);

    /// Run a user-defined service. Returns `false` for unknown keys.
    fn execute_service(&mut self, request: &ExecuteServiceRequest) -> bool;

    /// Home Assistant entity ids the device wants to follow.
    fn home_assistant_subscriptions(&self) -> Vec<String>;

    /// Deliver an imported Home Assistant state.
    fn home_assistant_state(&mut self, entity_id: &str, state: &str);

    /// Set the wall clock from the client.
    fn set_time(&mut self, epoch_seconds: u32);

    /// A client asked for camera images.
    fn request_camera_image(&mut self, single: bool, stream: bool);
}

// ───────────────────────────────────────────────────────────────
// Image source (pull-based)
// ───────────────────────────────────────────────────────────────

/// A captured image being read out in chunks.
pub trait ImageSource {
    /// Bytes not yet consumed.
    fn available(&self) -> usize;

    /// The next `len` unconsumed bytes (`len <= available()`).
    fn peek(&self, len: usize) -> &[u8];

    /// Mark `len` bytes as delivered.
    fn consume(&mut self, len: usize);

    /// Return the frame buffer to the capture pipeline.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock & network
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Reports whether the device still has an IP link.
pub trait NetworkPort {
    fn is_connected(&self) -> bool;
}
