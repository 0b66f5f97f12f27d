//! Typed messages carried in frame payloads.
//!
//! Each message struct names its wire type id through [`ApiMessage::TYPE`]
//! and is encoded with `postcard`. Entity descriptors and entity states are
//! not modelled here: the device layer hands them over ready-made as
//! [`OutboundMessage`] payloads.

use serde::{Deserialize, Serialize};

// ── Message type ids ─────────────────────────────────────────

pub const HELLO_REQUEST: u32 = 1;
pub const HELLO_RESPONSE: u32 = 2;
pub const CONNECT_REQUEST: u32 = 3;
pub const CONNECT_RESPONSE: u32 = 4;
pub const DISCONNECT_REQUEST: u32 = 5;
pub const DISCONNECT_RESPONSE: u32 = 6;
pub const PING_REQUEST: u32 = 7;
pub const PING_RESPONSE: u32 = 8;
pub const DEVICE_INFO_REQUEST: u32 = 9;
pub const DEVICE_INFO_RESPONSE: u32 = 10;
pub const LIST_ENTITIES_REQUEST: u32 = 11;
pub const LIST_ENTITIES_DONE_RESPONSE: u32 = 19;
pub const SUBSCRIBE_STATES_REQUEST: u32 = 20;
pub const SUBSCRIBE_LOGS_REQUEST: u32 = 28;
pub const SUBSCRIBE_LOGS_RESPONSE: u32 = 29;
pub const COVER_COMMAND_REQUEST: u32 = 30;
pub const FAN_COMMAND_REQUEST: u32 = 31;
pub const LIGHT_COMMAND_REQUEST: u32 = 32;
pub const SWITCH_COMMAND_REQUEST: u32 = 33;
pub const SUBSCRIBE_HOMEASSISTANT_SERVICES_REQUEST: u32 = 34;
pub const HOMEASSISTANT_SERVICE_RESPONSE: u32 = 35;
pub const GET_TIME_REQUEST: u32 = 36;
pub const GET_TIME_RESPONSE: u32 = 37;
pub const SUBSCRIBE_HOME_ASSISTANT_STATES_REQUEST: u32 = 38;
pub const SUBSCRIBE_HOME_ASSISTANT_STATE_RESPONSE: u32 = 39;
pub const HOME_ASSISTANT_STATE_RESPONSE: u32 = 40;
pub const EXECUTE_SERVICE_REQUEST: u32 = 42;
pub const CAMERA_IMAGE_RESPONSE: u32 = 44;
pub const CAMERA_IMAGE_REQUEST: u32 = 45;
pub const CLIMATE_COMMAND_REQUEST: u32 = 48;

/// API version announced in [`HelloResponse`].
pub const API_VERSION_MAJOR: u32 = 1;
pub const API_VERSION_MINOR: u32 = 2;

// ── Schema capability ────────────────────────────────────────

/// A message with a fixed wire type id.
pub trait ApiMessage: Serialize {
    const TYPE: u32;
}

/// Decode a typed message from a frame payload.
pub fn decode_message<'a, M: Deserialize<'a>>(payload: &'a [u8]) -> postcard::Result<M> {
    postcard::from_bytes(payload)
}

/// Append the encoding of `msg` to `out`.
pub fn encode_message<M: ApiMessage>(msg: &M, out: Vec<u8>) -> postcard::Result<Vec<u8>> {
    postcard::to_extend(msg, out)
}

macro_rules! api_message {
    ($($ty:ident $(<$lt:lifetime>)? => $id:expr),* $(,)?) => {
        $(impl $(<$lt>)? ApiMessage for $ty $(<$lt>)? {
            const TYPE: u32 = $id;
        })*
    };
}

// ── Handshake ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub client_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub api_version_major: u32,
    pub api_version_minor: u32,
    pub server_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub password: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub invalid_password: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse;

// ── Device info & enumeration ────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfoRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfoResponse {
    pub uses_password: bool,
    pub name: String,
    pub mac_address: String,
    pub firmware_version: String,
    pub compilation_time: String,
    pub model: String,
    pub has_deep_sleep: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntitiesRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntitiesDoneResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeStatesRequest;

// ── Logs ─────────────────────────────────────────────────────

/// Log severity, ordered from quietest to most verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    #[default]
    None,
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
    VeryVerbose,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Verbose,
        }
    }
}

impl LogLevel {
    /// True when a line at `level` passes this threshold.
    pub fn admits(self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeLogsRequest {
    pub level: LogLevel,
    pub dump_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeLogsResponse<'a> {
    pub level: LogLevel,
    pub message: &'a str,
    /// Set on the marker frame sent in place of a line that did not fit.
    pub send_failed: bool,
}

// ── Home Assistant services ──────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeHomeassistantServicesRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
    pub key: String,
    pub value: String,
}

/// Service call the device asks the client to perform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeassistantServiceResponse {
    pub service: String,
    pub data: Vec<ServiceData>,
    pub data_template: Vec<ServiceData>,
    pub variables: Vec<ServiceData>,
    pub is_event: bool,
}

// ── Time ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTimeRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTimeResponse {
    pub epoch_seconds: u32,
}

// ── Home Assistant states ────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeHomeAssistantStatesRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeHomeAssistantStateResponse {
    pub entity_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAssistantStateResponse {
    pub entity_id: String,
    pub state: String,
}

// ── User services ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceArgument {
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteServiceRequest {
    pub key: u32,
    pub args: Vec<ServiceArgument>,
}

// ── Camera ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraImageRequest {
    pub single: bool,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraImageResponse<'a> {
    pub key: u32,
    pub data: &'a [u8],
    pub done: bool,
}

api_message! {
    HelloRequest => HELLO_REQUEST,
    HelloResponse => HELLO_RESPONSE,
    ConnectRequest => CONNECT_REQUEST,
    ConnectResponse => CONNECT_RESPONSE,
    DisconnectRequest => DISCONNECT_REQUEST,
    DisconnectResponse => DISCONNECT_RESPONSE,
    PingRequest => PING_REQUEST,
    PingResponse => PING_RESPONSE,
    DeviceInfoRequest => DEVICE_INFO_REQUEST,
    DeviceInfoResponse => DEVICE_INFO_RESPONSE,
    ListEntitiesRequest => LIST_ENTITIES_REQUEST,
    ListEntitiesDoneResponse => LIST_ENTITIES_DONE_RESPONSE,
    SubscribeStatesRequest => SUBSCRIBE_STATES_REQUEST,
    SubscribeLogsRequest => SUBSCRIBE_LOGS_REQUEST,
    SubscribeLogsResponse<'a> => SUBSCRIBE_LOGS_RESPONSE,
    SubscribeHomeassistantServicesRequest => SUBSCRIBE_HOMEASSISTANT_SERVICES_REQUEST,
    HomeassistantServiceResponse => HOMEASSISTANT_SERVICE_RESPONSE,
    GetTimeRequest => GET_TIME_REQUEST,
    GetTimeResponse => GET_TIME_RESPONSE,
    SubscribeHomeAssistantStatesRequest => SUBSCRIBE_HOME_ASSISTANT_STATES_REQUEST,
    SubscribeHomeAssistantStateResponse => SUBSCRIBE_HOME_ASSISTANT_STATE_RESPONSE,
    HomeAssistantStateResponse => HOME_ASSISTANT_STATE_RESPONSE,
    ExecuteServiceRequest => EXECUTE_SERVICE_REQUEST,
    CameraImageRequest => CAMERA_IMAGE_REQUEST,
    CameraImageResponse<'a> => CAMERA_IMAGE_RESPONSE,
}

// ── Device-produced payloads ─────────────────────────────────

/// A ready-made frame body produced outside the core (entity descriptor,
/// entity state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub msg_type: u32,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(msg_type: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// Encode a typed message into an owned payload.
    pub fn encode<M: ApiMessage>(msg: &M) -> postcard::Result<Self> {
        Ok(Self {
            msg_type: M::TYPE,
            payload: postcard::to_allocvec(msg)?,
        })
    }
}

/// An entity state change to broadcast to subscribed connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub key: u32,
    pub message: OutboundMessage,
}
