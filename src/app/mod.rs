//! Device-side boundary of the API core.
//!
//! The session engine talks to entities, image capture and platform
//! services only through the **port traits** in [`ports`], keeping it
//! testable without real peripherals.

pub mod ports;
