//! One client session: inbound framing, dispatch, pushes and supervision.
//!
//! ```text
//!   Transport ──bytes──▶ FrameAssembler ──Frame──▶ route lookup ──▶ handler
//!       ▲                                              │ gate fails
//!       │                                              ▼
//!   SendPath ◀── responses, pushes, probes, chunks   terminate
//! ```
//!
//! A connection is driven from outside: the owner feeds bytes (or lets
//! [`Connection::poll_transport`] read them) and calls
//! [`Connection::service_tick`] every loop pass. Each tick runs, in order:
//! transport checks, frame dispatch, one enumeration step, the keepalive
//! check and one camera chunk.
//!
//! Every fatal condition goes through `terminate`, which records the
//! reason and closes the socket. From then on every operation is a no-op.

use core::ops::ControlFlow;

use log::{debug, info, trace, warn};
use serde::Deserialize;

use crate::app::ports::{DevicePort, ImageSource};
use crate::config::{ApiConfig, Capabilities};
use crate::error::{DisconnectReason, Error, FramingError, ProtocolViolation, TransportFault};

use super::assembler::{DrainOutcome, FrameAssembler};
use super::codec::Frame;
use super::dispatch::{self, Handler};
use super::keepalive::{Keepalive, KeepaliveAction};
use super::messages::{
    API_VERSION_MAJOR, API_VERSION_MINOR, ApiMessage, CameraImageRequest, CameraImageResponse,
    ConnectRequest, ConnectResponse, DeviceInfoResponse, DisconnectRequest, DisconnectResponse,
    ExecuteServiceRequest, GetTimeRequest, GetTimeResponse, HelloRequest, HelloResponse,
    HomeAssistantStateResponse, HomeassistantServiceResponse, ListEntitiesDoneResponse, LogLevel,
    PingRequest, PingResponse, StateUpdate, SubscribeHomeAssistantStateResponse,
    SubscribeLogsRequest, SubscribeLogsResponse, decode_message,
};
use super::send::{SendError, SendPath, SendStats};
use super::session::{ConnectionState, Credentials};
use super::stream::{CameraStream, StreamCursor};
use super::transport::{Transport, TransportEvent};

/// Reads attempted per `poll_transport` call.
const READS_PER_POLL: usize = 16;

/// Stack buffer for one socket read.
const READ_CHUNK: usize = 256;

/// Shared, read-only inputs for one tick.
pub struct ServiceContext<'a> {
    pub device: &'a mut dyn DevicePort,
    pub credentials: &'a Credentials,
    pub capabilities: Capabilities,
    /// Reported in `HelloResponse`.
    pub server_info: &'a str,
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub frames_received: u32,
    pub bytes_received: u64,
    pub frames_sent: u32,
    pub send_shortfalls: u32,
}

pub struct Connection<T: Transport> {
    out: SendPath<T>,
    rx: FrameAssembler,
    peer: String,
    client_info: String,
    state: ConnectionState,
    keepalive: Keepalive,

    // Subscriptions
    state_subscription: bool,
    log_level: LogLevel,
    service_call_subscription: bool,

    // Cooperators
    list_cursor: StreamCursor,
    state_cursor: StreamCursor,
    camera: Option<CameraStream>,

    terminated: Option<DisconnectReason>,
    frames_received: u32,
    bytes_received: u64,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, now_ms: u64, config: &ApiConfig) -> Self {
        let peer = transport.peer().to_owned();
        info!("API[{}]: accepted", peer);
        Self {
            out: SendPath::new(transport, config.send_buffer_reserve),
            rx: FrameAssembler::new(config.recv_buffer_reserve, config.max_inbound_buffer),
            client_info: peer.clone(),
            peer,
            state: ConnectionState::Initialized,
            keepalive: Keepalive::new(
                u64::from(config.keepalive_interval_ms),
                config.keepalive_grace_ms(),
                now_ms,
            ),
            state_subscription: false,
            log_level: LogLevel::None,
            service_call_subscription: false,
            list_cursor: StreamCursor::new(),
            state_cursor: StreamCursor::new(),
            camera: None,
            terminated: None,
            frames_received: 0,
            bytes_received: 0,
        }
    }

    // ── Transport side ───────────────────────────────────────

    /// Apply a lifecycle notification from the socket layer.
    pub fn on_transport_event(&mut self, event: TransportEvent<'_>) {
        match event {
            TransportEvent::Connected => debug!("API[{}]: socket connected", self.client_info),
            TransportEvent::Data(bytes) => self.feed_inbound(bytes),
            TransportEvent::Disconnected => self.terminate(TransportFault::Closed.into()),
            TransportEvent::Error(code) => self.terminate(TransportFault::Error(code).into()),
            TransportEvent::Timeout(ms) => self.terminate(TransportFault::Timeout(ms).into()),
        }
    }

    /// Append received bytes. Parsing waits for the next tick.
    pub fn feed_inbound(&mut self, bytes: &[u8]) {
        if self.terminated.is_some() {
            return;
        }
        self.bytes_received += bytes.len() as u64;
        self.rx.extend(bytes);
    }

    /// Pull whatever the socket has ready into the inbound buffer.
    pub fn poll_transport(&mut self) {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..READS_PER_POLL {
            if self.terminated.is_some() {
                return;
            }
            match self.out.transport_mut().read(&mut buf) {
                Ok(0) => {
                    if self.out.transport().is_disconnected() {
                        self.terminate(TransportFault::Closed.into());
                    }
                    return;
                }
                Ok(n) => self.feed_inbound(&buf[..n]),
                Err(e) => {
                    debug!("API[{}]: read failed: {:?}", self.client_info, e);
                    let fault = if self.out.transport().is_disconnected() {
                        TransportFault::Closed
                    } else {
                        TransportFault::Error(self.out.transport().error_code())
                    };
                    self.terminate(fault.into());
                    return;
                }
            }
        }
    }

    /// Run one cooperative pass.
    pub fn service_tick(&mut self, now_ms: u64, ctx: &mut ServiceContext<'_>) {
        if self.terminated.is_some() {
            return;
        }

        if self.out.transport().is_disconnected() {
            self.terminate(TransportFault::Closed.into());
            return;
        }
        if self.out.transport_mut().flush().is_err() {
            let code = self.out.transport().error_code();
            self.terminate(TransportFault::Error(code).into());
            return;
        }

        self.process_inbound(now_ms, ctx);
        if self.terminated.is_some() {
            return;
        }

        self.enumeration_step(&*ctx.device);

        match self.keepalive.poll(now_ms) {
            KeepaliveAction::Idle => {}
            KeepaliveAction::SendPing => {
                trace!("API[{}]: sending keepalive probe", self.client_info);
                if !self.send_message(&PingRequest) {
                    debug!("API[{}]: keepalive probe not sent", self.client_info);
                }
            }
            KeepaliveAction::Expired => {
                self.terminate(Error::Liveness.into());
                return;
            }
        }

        self.camera_step();
    }

    fn process_inbound(&mut self, now_ms: u64, ctx: &mut ServiceContext<'_>) {
        let mut rx = core::mem::take(&mut self.rx);
        let outcome = rx.drain_frames(|frame| self.handle_frame(frame, now_ms, ctx));
        self.rx = rx;
        if self.terminated.is_some() {
            self.rx.clear();
            return;
        }

        match outcome {
            DrainOutcome::NeedMore | DrainOutcome::Stopped => {}
            DrainOutcome::Malformed(byte) => {
                self.terminate(FramingError::BadPreamble(byte).into());
            }
            DrainOutcome::Overflow(n) => {
                self.terminate(FramingError::BufferOverflow(n).into());
            }
        }
    }

    fn handle_frame(
        &mut self,
        frame: Frame<'_>,
        now_ms: u64,
        ctx: &mut ServiceContext<'_>,
    ) -> ControlFlow<()> {
        self.frames_received += 1;
        self.keepalive.on_traffic(now_ms);
        trace!(
            "API[{}]: recv type {} ({} bytes)",
            self.client_info,
            frame.msg_type,
            frame.payload.len()
        );

        let Some(route) = dispatch::lookup(frame.msg_type, &ctx.capabilities) else {
            trace!("API[{}]: ignoring type {}", self.client_info, frame.msg_type);
            return ControlFlow::Continue(());
        };

        let result = self
            .state
            .admits(route.gate, frame.msg_type)
            .and_then(|()| self.dispatch(route.handler, frame, ctx));
        if let Err(violation) = result {
            self.terminate(violation.into());
        }

        if self.terminated.is_some() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    // ── Handlers ─────────────────────────────────────────────

    fn dispatch(
        &mut self,
        handler: Handler,
        frame: Frame<'_>,
        ctx: &mut ServiceContext<'_>,
    ) -> Result<(), ProtocolViolation> {
        match handler {
            Handler::Hello => {
                let req: HelloRequest = decode(&frame)?;
                self.client_info = format!("{} ({})", req.client_info, self.peer);
                self.state.advance_to(ConnectionState::Connected);
                info!("API[{}]: hello", self.client_info);
                self.respond(&HelloResponse {
                    api_version_major: API_VERSION_MAJOR,
                    api_version_minor: API_VERSION_MINOR,
                    server_info: ctx.server_info.to_owned(),
                });
            }
            Handler::Connect => {
                let req: ConnectRequest = decode(&frame)?;
                let valid = ctx.credentials.check(&req.password);
                self.respond(&ConnectResponse {
                    invalid_password: !valid,
                });
                if !valid {
                    warn!("API[{}]: invalid password", self.client_info);
                } else if !self.state.is_authenticated() {
                    self.state.advance_to(ConnectionState::Authenticated);
                    info!("API[{}]: authenticated", self.client_info);
                    if ctx.capabilities.home_assistant_time {
                        self.send_message(&GetTimeRequest);
                    }
                }
            }
            Handler::DisconnectRequest => {
                self.respond(&DisconnectResponse);
                self.terminate(DisconnectReason::ClientRequested);
            }
            Handler::DisconnectResponse => self.terminate(DisconnectReason::ClientRequested),
            Handler::Ping => self.respond(&PingResponse),
            Handler::PingResponse => {}
            Handler::DeviceInfo => {
                let info = ctx.device.device_info();
                self.respond(&DeviceInfoResponse {
                    uses_password: ctx.credentials.uses_password(),
                    name: info.name,
                    mac_address: info.mac_address,
                    firmware_version: info.firmware_version,
                    compilation_time: info.compilation_time,
                    model: info.model,
                    has_deep_sleep: info.has_deep_sleep,
                });
            }
            Handler::ListEntities => self.list_cursor.begin(),
            Handler::SubscribeStates => {
                self.state_subscription = true;
                self.state_cursor.begin();
            }
            Handler::SubscribeLogs => {
                let req: SubscribeLogsRequest = decode(&frame)?;
                self.log_level = req.level;
                debug!("API[{}]: log level {:?}", self.client_info, req.level);
            }
            Handler::EntityCommand => ctx.device.entity_command(frame.msg_type, frame.payload),
            Handler::SubscribeServiceCalls => self.service_call_subscription = true,
            Handler::TimeSync => {
                let resp: GetTimeResponse = decode(&frame)?;
                ctx.device.set_time(resp.epoch_seconds);
            }
            Handler::SubscribeHomeAssistantStates => {
                // The list goes out in order; the first one that does not fit ends it.
                for entity_id in ctx.device.home_assistant_subscriptions() {
                    let result = self
                        .out
                        .send_message(&SubscribeHomeAssistantStateResponse { entity_id });
                    if !self.settle(result) {
                        if self.terminated.is_none() {
                            warn!(
                                "API[{}]: Home Assistant subscription list cut short",
                                self.client_info
                            );
                        }
                        break;
                    }
                }
            }
            Handler::HomeAssistantState => {
                let resp: HomeAssistantStateResponse = decode(&frame)?;
                ctx.device.home_assistant_state(&resp.entity_id, &resp.state);
            }
            Handler::ExecuteService => {
                let req: ExecuteServiceRequest = decode(&frame)?;
                if !ctx.device.execute_service(&req) {
                    warn!("API[{}]: no service with key {}", self.client_info, req.key);
                }
            }
            Handler::CameraImage => {
                let req: CameraImageRequest = decode(&frame)?;
                ctx.device.request_camera_image(req.single, req.stream);
            }
        }
        Ok(())
    }

    // ── Cooperators ──────────────────────────────────────────

    fn enumeration_step(&mut self, device: &dyn DevicePort) {
        if let Some(pos) = self.list_cursor.position() {
            if pos < device.entity_count() {
                match device.list_entity(pos) {
                    None => self.list_cursor.advance(),
                    Some(msg) => {
                        if self.try_send(msg.msg_type, &msg.payload) {
                            self.list_cursor.advance();
                        }
                    }
                }
            } else if self.send_message(&ListEntitiesDoneResponse) {
                debug!("API[{}]: entity list sent", self.client_info);
                self.list_cursor.finish();
            }
            return;
        }

        if let Some(pos) = self.state_cursor.position() {
            if pos >= device.entity_count() {
                self.state_cursor.finish();
                return;
            }
            match device.entity_state(pos) {
                None => self.state_cursor.advance(),
                Some(msg) => {
                    if self.try_send(msg.msg_type, &msg.payload) {
                        self.state_cursor.advance();
                    }
                }
            }
        }
    }

    fn camera_step(&mut self) {
        let (plan, result) = {
            let Some(cam) = self.camera.as_ref() else {
                return;
            };
            let Some(plan) = cam.plan(self.out.space()) else {
                return;
            };
            let chunk = CameraImageResponse {
                key: cam.key(),
                data: cam.chunk(plan),
                done: plan.last,
            };
            (plan, self.out.send_message(&chunk))
        };

        if self.settle(result) {
            let finished = self.camera.as_mut().is_some_and(|cam| cam.commit(plan));
            if finished {
                debug!("API[{}]: image sent", self.client_info);
                self.camera = None;
            }
        }
    }

    // ── Send helpers ─────────────────────────────────────────

    /// Frame and send a raw payload. `false` on shortfall or after
    /// termination.
    pub fn try_send(&mut self, msg_type: u32, payload: &[u8]) -> bool {
        if self.terminated.is_some() {
            return false;
        }
        let result = self.out.try_send(msg_type, payload);
        self.settle(result)
    }

    pub fn send_message<M: ApiMessage>(&mut self, msg: &M) -> bool {
        if self.terminated.is_some() {
            return false;
        }
        let result = self.out.send_message(msg);
        self.settle(result)
    }

    /// Send a reply; a shortfall drops it with a warning.
    fn respond<M: ApiMessage>(&mut self, msg: &M) {
        if self.terminated.is_some() {
            return;
        }
        match self.out.send_message(msg) {
            Ok(()) => {}
            Err(SendError::Transport(fault)) => self.terminate(fault.into()),
            Err(e) => warn!(
                "API[{}]: dropped response type {}: {:?}",
                self.client_info,
                M::TYPE,
                e
            ),
        }
    }

    /// Map a send result to success, terminating on transport faults.
    /// Shortfalls are not logged here.
    fn settle(&mut self, result: Result<(), SendError>) -> bool {
        match result {
            Ok(()) => true,
            Err(SendError::Transport(fault)) => {
                self.terminate(fault.into());
                false
            }
            Err(SendError::Shortfall { .. } | SendError::Encode) => false,
        }
    }

    // ── Domain pushes ────────────────────────────────────────

    /// Push an entity state to a subscribed client.
    pub fn push_state(&mut self, update: &StateUpdate) -> bool {
        if !self.state_subscription {
            return false;
        }
        self.try_send(update.message.msg_type, &update.message.payload)
    }

    /// Push a log line if it passes the client's threshold. A line that
    /// does not fit is replaced by a `send_failed` marker without text.
    pub fn push_log(&mut self, level: LogLevel, text: &str) -> bool {
        if self.terminated.is_some() || !self.log_level.admits(level) {
            return false;
        }
        let line = SubscribeLogsResponse {
            level,
            message: text,
            send_failed: false,
        };
        match self.out.send_message(&line) {
            Ok(()) => true,
            Err(SendError::Transport(fault)) => {
                self.terminate(fault.into());
                false
            }
            Err(_) => {
                let marker = SubscribeLogsResponse {
                    level,
                    message: "",
                    send_failed: true,
                };
                let result = self.out.send_message(&marker);
                self.settle(result);
                false
            }
        }
    }

    /// Ask the client to call a Home Assistant service.
    pub fn push_service_call(&mut self, call: &HomeassistantServiceResponse) -> bool {
        if !self.service_call_subscription {
            return false;
        }
        self.send_message(call)
    }

    /// Start streaming an image. Refused while another is in flight or
    /// before the client subscribed to states; a refused source is dropped
    /// unreleased.
    pub fn push_camera_image(&mut self, key: u32, source: Box<dyn ImageSource>) -> bool {
        if self.terminated.is_some() || !self.state_subscription || self.camera.is_some() {
            return false;
        }
        self.camera = Some(CameraStream::new(key, source));
        true
    }

    // ── Teardown ─────────────────────────────────────────────

    /// Orderly close from the device side.
    pub fn request_close(&mut self) {
        if self.terminated.is_some() {
            return;
        }
        self.send_message(&DisconnectRequest);
        self.terminate(DisconnectReason::LocalRequest);
    }

    /// The device lost its network link.
    pub fn on_network_down(&mut self) {
        self.terminate(TransportFault::NetworkDown.into());
    }

    fn terminate(&mut self, reason: DisconnectReason) {
        if self.terminated.is_some() {
            return;
        }
        match reason {
            r if r.is_liveness() => {
                warn!("API[{}]: no response to keepalive, closing", self.client_info);
            }
            DisconnectReason::Fatal(e) => warn!("API[{}]: closing: {}", self.client_info, e),
            _ => info!("API[{}]: {}", self.client_info, reason),
        }
        self.terminated = Some(reason);
        self.list_cursor.finish();
        self.state_cursor.finish();
        if let Some(cam) = self.camera.take() {
            cam.abandon();
        }
        self.rx.clear();
        self.out.transport_mut().close();
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_some()
    }

    pub fn termination_reason(&self) -> Option<DisconnectReason> {
        self.terminated
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn client_info(&self) -> &str {
        &self.client_info
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn is_subscribed_to_states(&self) -> bool {
        self.state_subscription
    }

    pub fn is_streaming_image(&self) -> bool {
        self.camera.is_some()
    }

    pub fn is_listing(&self) -> bool {
        self.list_cursor.is_active()
    }

    pub fn pending_inbound(&self) -> usize {
        self.rx.pending()
    }

    pub fn stats(&self) -> ConnectionStats {
        let SendStats {
            frames_sent,
            shortfalls,
            ..
        } = self.out.stats();
        ConnectionStats {
            frames_received: self.frames_received,
            bytes_received: self.bytes_received,
            frames_sent,
            send_shortfalls: shortfalls,
        }
    }

    pub fn transport(&self) -> &T {
        self.out.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.out.transport_mut()
    }
}

fn decode<'p, M: Deserialize<'p>>(frame: &Frame<'p>) -> Result<M, ProtocolViolation> {
    decode_message(frame.payload).map_err(|_| ProtocolViolation::BadPayload(frame.msg_type))
}
