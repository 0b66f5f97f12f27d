//! Static route table: message type → session gate, capability, handler.
//!
//! Lookup is the only thing done here. The connection owns the handlers
//! and decides what a [`Handler`] means for its state; this table only
//! says which handler a frame goes to and what session state it needs.
//!
//! ```text
//!   frame.msg_type ──▶ lookup ──▶ None            → ignored (unknown / disabled)
//!                               └─▶ Some(route)   → gate check ─▶ handler
//!                                                     │
//!                                                     └─ fails → fatal
//! ```

use crate::config::Capabilities;

use super::messages as m;

/// Minimum session state a message needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Connected,
    Authenticated,
}

/// Optional handler group a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Camera,
    HomeAssistantTime,
    UserServices,
    HomeAssistantStates,
}

impl Capability {
    pub fn enabled_in(self, caps: &Capabilities) -> bool {
        match self {
            Self::Camera => caps.camera,
            Self::HomeAssistantTime => caps.home_assistant_time,
            Self::UserServices => caps.user_services,
            Self::HomeAssistantStates => caps.home_assistant_states,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Hello,
    Connect,
    DisconnectRequest,
    DisconnectResponse,
    Ping,
    PingResponse,
    DeviceInfo,
    ListEntities,
    SubscribeStates,
    SubscribeLogs,
    /// Opaque entity command forwarded to the device layer.
    EntityCommand,
    SubscribeServiceCalls,
    TimeSync,
    SubscribeHomeAssistantStates,
    HomeAssistantState,
    ExecuteService,
    CameraImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub msg_type: u32,
    pub gate: Gate,
    pub handler: Handler,
    pub capability: Option<Capability>,
}

const fn route(msg_type: u32, gate: Gate, handler: Handler) -> Route {
    Route {
        msg_type,
        gate,
        handler,
        capability: None,
    }
}

const fn gated(msg_type: u32, handler: Handler, capability: Capability) -> Route {
    Route {
        msg_type,
        gate: Gate::Authenticated,
        handler,
        capability: Some(capability),
    }
}

/// Every inbound message type the device understands.
pub static ROUTES: &[Route] = &[
    route(m::HELLO_REQUEST, Gate::Open, Handler::Hello),
    route(m::CONNECT_REQUEST, Gate::Connected, Handler::Connect),
    route(m::DISCONNECT_REQUEST, Gate::Open, Handler::DisconnectRequest),
    route(m::DISCONNECT_RESPONSE, Gate::Open, Handler::DisconnectResponse),
    route(m::PING_REQUEST, Gate::Open, Handler::Ping),
    route(m::PING_RESPONSE, Gate::Open, Handler::PingResponse),
    route(m::DEVICE_INFO_REQUEST, Gate::Connected, Handler::DeviceInfo),
    route(m::LIST_ENTITIES_REQUEST, Gate::Authenticated, Handler::ListEntities),
    route(m::SUBSCRIBE_STATES_REQUEST, Gate::Authenticated, Handler::SubscribeStates),
    route(m::SUBSCRIBE_LOGS_REQUEST, Gate::Authenticated, Handler::SubscribeLogs),
    route(m::COVER_COMMAND_REQUEST, Gate::Authenticated, Handler::EntityCommand),
    route(m::FAN_COMMAND_REQUEST, Gate::Authenticated, Handler::EntityCommand),
    route(m::LIGHT_COMMAND_REQUEST, Gate::Authenticated, Handler::EntityCommand),
    route(m::SWITCH_COMMAND_REQUEST, Gate::Authenticated, Handler::EntityCommand),
    route(m::CLIMATE_COMMAND_REQUEST, Gate::Authenticated, Handler::EntityCommand),
    gated(
        m::SUBSCRIBE_HOMEASSISTANT_SERVICES_REQUEST,
        Handler::SubscribeServiceCalls,
        Capability::UserServices,
    ),
    gated(m::GET_TIME_RESPONSE, Handler::TimeSync, Capability::HomeAssistantTime),
    gated(
        m::SUBSCRIBE_HOME_ASSISTANT_STATES_REQUEST,
        Handler::SubscribeHomeAssistantStates,
        Capability::HomeAssistantStates,
    ),
    gated(
        m::HOME_ASSISTANT_STATE_RESPONSE,
        Handler::HomeAssistantState,
        Capability::HomeAssistantStates,
    ),
    gated(m::EXECUTE_SERVICE_REQUEST, Handler::ExecuteService, Capability::UserServices),
    gated(m::CAMERA_IMAGE_REQUEST, Handler::CameraImage, Capability::Camera),
];

/// Route for `msg_type`, or `None` if unknown or its capability is off.
pub fn lookup(msg_type: u32, caps: &Capabilities) -> Option<&'static Route> {
    ROUTES
        .iter()
        .find(|r| r.msg_type == msg_type)
        .filter(|r| r.capability.is_none_or(|c| c.enabled_in(caps)))
}
