//! In-memory entity registry implementing [`DevicePort`].
//!
//! Entities are registered with an object id; their key is the 32-bit
//! FNV-1 hash of that id, so keys are stable across reboots. Handlers are
//! closures bound at registration time.
//!
//! Entity command payloads start with the target key as a postcard
//! varint; the rest is handed to that entity's command handler.

use log::{debug, warn};

use crate::api::messages::{ExecuteServiceRequest, OutboundMessage, ServiceArgument, StateUpdate};
use crate::app::ports::{DeviceInfo, DevicePort};

pub type CommandHandler = Box<dyn FnMut(u32, &[u8]) + Send>;
pub type ServiceHandler = Box<dyn FnMut(&[ServiceArgument]) + Send>;
pub type StateHandler = Box<dyn FnMut(&str) + Send>;
pub type CameraHandler = Box<dyn FnMut(bool, bool) + Send>;

/// 32-bit FNV-1 hash of an entity object id.
pub fn object_id_hash(object_id: &str) -> u32 {
    object_id.bytes().fold(2_166_136_261u32, |hash, b| {
        hash.wrapping_mul(16_777_619) ^ u32::from(b)
    })
}

struct Entity {
    object_id: String,
    key: u32,
    descriptor: OutboundMessage,
    state: Option<OutboundMessage>,
    on_command: Option<CommandHandler>,
}

pub struct EntityRegistry {
    info: DeviceInfo,
    entities: Vec<Entity>,
    services: Vec<(u32, ServiceHandler)>,
    ha_states: Vec<(String, StateHandler)>,
    on_camera: Option<CameraHandler>,
    epoch_seconds: Option<u32>,
}

impl EntityRegistry {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            entities: Vec::new(),
            services: Vec::new(),
            ha_states: Vec::new(),
            on_camera: None,
            epoch_seconds: None,
        }
    }

    /// Add an entity and return its key. Re-registering an object id
    /// replaces its descriptor.
    pub fn register(&mut self, object_id: &str, descriptor: OutboundMessage) -> u32 {
        let key = object_id_hash(object_id);
        if let Some(e) = self.entities.iter_mut().find(|e| e.key == key) {
            warn!("registry: replacing entity '{}'", e.object_id);
            e.descriptor = descriptor;
            return key;
        }
        self.entities.push(Entity {
            object_id: object_id.to_owned(),
            key,
            descriptor,
            state: None,
            on_command: None,
        });
        key
    }

    /// Bind a command handler. Returns `false` for unknown keys.
    pub fn on_command<F>(&mut self, key: u32, handler: F) -> bool
    where
        F: FnMut(u32, &[u8]) + Send + 'static,
    {
        match self.entities.iter_mut().find(|e| e.key == key) {
            Some(e) => {
                e.on_command = Some(Box::new(handler));
                true
            }
            None => false,
        }
    }

    /// Record a new state and return the update to broadcast.
    pub fn set_state(&mut self, key: u32, state: OutboundMessage) -> Option<StateUpdate> {
        let entity = self.entities.iter_mut().find(|e| e.key == key)?;
        entity.state = Some(state.clone());
        Some(StateUpdate {
            key,
            message: state,
        })
    }

    pub fn register_service<F>(&mut self, key: u32, handler: F)
    where
        F: FnMut(&[ServiceArgument]) + Send + 'static,
    {
        self.services.push((key, Box::new(handler)));
    }

    /// Follow a Home Assistant entity. Clients are asked for it when they
    /// subscribe to Home Assistant states.
    pub fn subscribe_home_assistant_state<F>(&mut self, entity_id: &str, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.ha_states.push((entity_id.to_owned(), Box::new(handler)));
    }

    pub fn on_camera_request<F>(&mut self, handler: F)
    where
        F: FnMut(bool, bool) + Send + 'static,
    {
        self.on_camera = Some(Box::new(handler));
    }

    /// Wall clock received from a client, if any.
    pub fn epoch_seconds(&self) -> Option<u32> {
        self.epoch_seconds
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl DevicePort for EntityRegistry {
    fn device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn list_entity(&self, index: usize) -> Option<OutboundMessage> {
        self.entities.get(index).map(|e| e.descriptor.clone())
    }

    fn entity_state(&self, index: usize) -> Option<OutboundMessage> {
        self.entities.get(index).and_then(|e| e.state.clone())
    }

    fn entity_command(&mut self, msg_type: u32, payload: &[u8]) {
        let Ok((key, rest)) = postcard::take_from_bytes::<u32>(payload) else {
            warn!("registry: command type {} without entity key", msg_type);
            return;
        };
        match self.entities.iter_mut().find(|e| e.key == key) {
            Some(Entity {
                on_command: Some(handler),
                ..
            }) => handler(msg_type, rest),
            Some(e) => debug!("registry: '{}' takes no commands", e.object_id),
            None => debug!("registry: command for unknown key {:#010x}", key),
        }
    }

    fn execute_service(&mut self, request: &ExecuteServiceRequest) -> bool {
        match self.services.iter_mut().find(|(k, _)| *k == request.key) {
            Some((_, handler)) => {
                handler(&request.args);
                true
            }
            None => false,
        }
    }

    fn home_assistant_subscriptions(&self) -> Vec<String> {
        self.ha_states.iter().map(|(id, _)| id.clone()).collect()
    }

    fn home_assistant_state(&mut self, entity_id: &str, state: &str) {
        for (id, handler) in &mut self.ha_states {
            if id == entity_id {
                handler(state);
            }
        }
    }

    fn set_time(&mut self, epoch_seconds: u32) {
        debug!("registry: time set to {}", epoch_seconds);
        self.epoch_seconds = Some(epoch_seconds);
    }

    fn request_camera_image(&mut self, single: bool, stream: bool) {
        if let Some(handler) = self.on_camera.as_mut() {
            handler(single, stream);
        }
    }
}
