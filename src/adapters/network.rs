//! Network status adapter.
//!
//! The Wi-Fi event handler runs on the system event task, the service
//! loop on the API thread. They share one atomic flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::NetworkPort;

/// Link-up flag written by the network event handler.
#[derive(Debug, Clone, Default)]
pub struct NetworkFlag {
    up: Arc<AtomicBool>,
}

impl NetworkFlag {
    pub fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
        }
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::Release);
    }
}

impl NetworkPort for NetworkFlag {
    fn is_connected(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}
