//! Connection registry and service loop body.
//!
//! The server owns every live [`Connection`], drives them once per loop
//! pass and drops terminated ones on the same pass, which closes their
//! sockets. It applies no ordering or fairness between connections.

use log::{info, warn};

use crate::app::ports::{DevicePort, ImageSource};
use crate::config::ApiConfig;
use crate::error::Result;

use super::channels;
use super::connection::{Connection, ServiceContext};
use super::messages::{HomeassistantServiceResponse, StateUpdate};
use super::session::Credentials;
use super::transport::Transport;

pub struct ApiServer<T: Transport> {
    config: ApiConfig,
    credentials: Credentials,
    server_info: String,
    connections: Vec<Connection<T>>,
}

impl<T: Transport> ApiServer<T> {
    pub fn new(config: ApiConfig, server_info: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let credentials = Credentials::new(&config.password);
        Ok(Self {
            connections: Vec::with_capacity(config.max_clients),
            config,
            credentials,
            server_info: server_info.into(),
        })
    }

    /// Take ownership of a freshly accepted socket. Beyond `max_clients`
    /// the socket is closed and `false` returned.
    pub fn accept(&mut self, mut transport: T, now_ms: u64) -> bool {
        if self.connections.len() >= self.config.max_clients {
            warn!(
                "API: rejecting {}, {} clients already connected",
                transport.peer(),
                self.connections.len()
            );
            transport.close();
            return false;
        }
        self.connections
            .push(Connection::new(transport, now_ms, &self.config));
        true
    }

    /// One loop pass over every connection, then reap terminated ones.
    pub fn service(&mut self, now_ms: u64, device: &mut dyn DevicePort, network_up: bool) {
        let mut ctx = ServiceContext {
            device,
            credentials: &self.credentials,
            capabilities: self.config.capabilities,
            server_info: &self.server_info,
        };
        for conn in &mut self.connections {
            if !network_up {
                conn.on_network_down();
                continue;
            }
            conn.poll_transport();
            conn.service_tick(now_ms, &mut ctx);
        }
        self.reap();
    }

    fn reap(&mut self) {
        self.connections.retain(|c| {
            if let Some(reason) = c.termination_reason() {
                info!("API[{}]: removed ({})", c.client_info(), reason);
                false
            } else {
                true
            }
        });
    }

    /// Broadcast a state change. Returns how many clients took it.
    pub fn push_state(&mut self, update: &StateUpdate) -> usize {
        self.connections
            .iter_mut()
            .map(|c| c.push_state(update))
            .filter(|&sent| sent)
            .count()
    }

    /// Ask every subscribed client to run a Home Assistant service.
    pub fn push_service_call(&mut self, call: &HomeassistantServiceResponse) -> usize {
        self.connections
            .iter_mut()
            .map(|c| c.push_service_call(call))
            .filter(|&sent| sent)
            .count()
    }

    /// Offer a captured image to every idle, subscribed client.
    /// `reader` makes one independent source per client. Nothing is
    /// streamed unless the camera capability is enabled.
    pub fn push_camera_image<F>(&mut self, key: u32, mut reader: F) -> usize
    where
        F: FnMut() -> Box<dyn ImageSource>,
    {
        if !self.config.capabilities.camera {
            return 0;
        }
        let mut started = 0;
        for conn in &mut self.connections {
            if conn.is_terminated() || !conn.is_subscribed_to_states() || conn.is_streaming_image()
            {
                continue;
            }
            if conn.push_camera_image(key, reader()) {
                started += 1;
            }
        }
        started
    }

    /// Push the lines queued so far to every connection. Lines logged
    /// while forwarding wait for the next call. Returns lines drained.
    pub fn forward_logs(&mut self) -> usize {
        let queued = channels::queued_logs();
        let mut drained = 0;
        while drained < queued {
            let Some(line) = channels::try_recv_log() else {
                break;
            };
            drained += 1;
            for conn in &mut self.connections {
                conn.push_log(line.level, &line.text);
            }
        }
        drained
    }

    /// Orderly close of every client, e.g. before a reboot.
    pub fn close_all(&mut self) {
        for conn in &mut self.connections {
            conn.request_close();
        }
        self.reap();
    }

    pub fn connections(&self) -> &[Connection<T>] {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut [Connection<T>] {
        &mut self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}
