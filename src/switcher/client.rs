//! Switcher RPC client
//!
//! One persistent WebSocket connection per client. The handshake runs inline
//! in [`SwitcherClient::connect`]; once identified, two tasks own the socket:
//!
//! - the reader processes inbound messages one at a time, resolving pending
//!   requests and applying events to the session;
//! - the writer drains an mpsc queue of outbound frames.
//!
//! Request ids are registered in the pending map before the frame is queued,
//! so a response can never arrive for an unknown id.

use arc_swap::ArcSwap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::auth::compute_auth_token;
use super::protocol::{self, event, request, Identify, RequestResponse, ServerMessage};
use super::session::{ConnectionState, SwitcherSession};
use crate::config::SwitcherConfig;
use crate::error::{AppError, Result};
use crate::events::{EventBus, SystemEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound queue depth
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// An outstanding request awaiting its response
struct PendingRequest {
    request_type: String,
    created_at: Instant,
    completion: oneshot::Sender<Result<Value>>,
}

/// Live connection handles
struct Connection {
    id: u64,
    outbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
}

struct ClientInner {
    config: SwitcherConfig,
    events: Arc<EventBus>,
    session: ArcSwap<SwitcherSession>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    connection: Mutex<Option<Connection>>,
    next_connection_id: AtomicU64,
    /// Serializes connect/disconnect
    lifecycle: tokio::sync::Mutex<()>,
}

/// Client for an OBS-WebSocket v5 compatible switcher
#[derive(Clone)]
pub struct SwitcherClient {
    inner: Arc<ClientInner>,
}

impl SwitcherClient {
    pub fn new(config: SwitcherConfig, events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                events,
                session: ArcSwap::from_pointee(SwitcherSession::default()),
                pending: Mutex::new(HashMap::new()),
                connection: Mutex::new(None),
                next_connection_id: AtomicU64::new(1),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// "host:port" of the switcher
    pub fn endpoint(&self) -> String {
        self.inner.config.endpoint()
    }

    /// Latest session snapshot
    pub fn session(&self) -> Arc<SwitcherSession> {
        self.inner.session.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.session.load().is_ready()
    }

    /// Number of requests awaiting a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Connect, authenticate and load the initial switcher state
    ///
    /// Returns once the session is `ready` with scene list, current scene and
    /// output status loaded. Handshake and initial load together are bounded
    /// by `connect_timeout_ms`; a scene list that cannot be loaded fails the
    /// connect.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.lifecycle.lock().await;

        if self.is_ready() {
            return Ok(());
        }
        self.inner.teardown(None);

        let config = &self.inner.config;
        if config.host.trim().is_empty() {
            return Err(AppError::Config("Switcher host not set".to_string()));
        }

        info!("Connecting to switcher at {}", config.url());
        self.inner.set_state(ConnectionState::Connecting);

        // Handshake and initial state load share one deadline
        let deadline = Instant::now() + Duration::from_millis(config.connect_timeout_ms);
        let not_ready = || {
            self.inner.handshake_error(format!(
                "not ready within {} ms",
                config.connect_timeout_ms
            ))
        };

        let ws = match tokio::time::timeout_at(deadline, self.inner.handshake()).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
            Err(_) => {
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(not_ready());
            }
        };

        let connection_id = self.inner.attach(ws);
        match tokio::time::timeout_at(deadline, self.inner.load_initial_state()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.inner.teardown(Some(connection_id));
                return Err(self.inner.handshake_error(format!("scene list unavailable: {}", e)));
            }
            Err(_) => {
                self.inner.teardown(Some(connection_id));
                return Err(not_ready());
            }
        }

        // The connection may have dropped while loading
        let attached = self
            .inner
            .connection
            .lock()
            .as_ref()
            .is_some_and(|c| c.id == connection_id);
        if !attached {
            return Err(self.inner.handshake_error("connection closed during setup".to_string()));
        }

        self.inner.set_state(ConnectionState::Ready);
        let session = self.session();
        info!(
            "Switcher ready: {} scenes, current {:?}, recording={}, streaming={}",
            session.scene_list.len(),
            session.current_scene,
            session.recording_active,
            session.streaming_active
        );
        Ok(())
    }

    /// Close the connection and reject every outstanding request
    pub async fn disconnect(&self) {
        let _guard = self.inner.lifecycle.lock().await;
        if self.inner.teardown(None) {
            info!("Disconnected from switcher at {}", self.endpoint());
        }
    }

    /// Send a raw request and wait for its response data
    pub async fn call(&self, request_type: &str, data: Value) -> Result<Value> {
        self.ensure_ready()?;
        self.inner.request(request_type, data).await
    }

    /// Switch the program scene. Returns `false` if it is already current.
    pub async fn switch_scene(&self, scene: &str) -> Result<bool> {
        self.ensure_ready()?;
        if self.session().is_current(scene) {
            debug!("Scene '{}' already current", scene);
            return Ok(false);
        }

        self.inner
            .request(
                request::SET_CURRENT_PROGRAM_SCENE,
                json!({ "sceneName": scene }),
            )
            .await?;
        self.inner
            .update_session(|s| s.current_scene = Some(scene.to_string()));
        info!("Switched to scene '{}'", scene);
        Ok(true)
    }

    /// Switch by 1-based scene number, counted from the oldest scene
    pub async fn switch_scene_by_number(&self, number: usize) -> Result<bool> {
        self.ensure_ready()?;
        let scene = self.session().scene_by_number(number)?.to_string();
        self.switch_scene(&scene).await
    }

    pub async fn start_recording(&self) -> Result<bool> {
        self.set_output(Output::Record, true).await
    }

    pub async fn stop_recording(&self) -> Result<bool> {
        self.set_output(Output::Record, false).await
    }

    pub async fn start_streaming(&self) -> Result<bool> {
        self.set_output(Output::Stream, true).await
    }

    pub async fn stop_streaming(&self) -> Result<bool> {
        self.set_output(Output::Stream, false).await
    }

    async fn set_output(&self, output: Output, active: bool) -> Result<bool> {
        self.ensure_ready()?;
        let session = self.session();
        let current = match output {
            Output::Record => session.recording_active,
            Output::Stream => session.streaming_active,
        };
        if current == active {
            debug!("{} already {}", output.name(), if active { "active" } else { "inactive" });
            return Ok(false);
        }

        let request_type = match (output, active) {
            (Output::Record, true) => request::START_RECORD,
            (Output::Record, false) => request::STOP_RECORD,
            (Output::Stream, true) => request::START_STREAM,
            (Output::Stream, false) => request::STOP_STREAM,
        };
        self.inner.request(request_type, json!({})).await?;

        self.inner.update_session(|s| match output {
            Output::Record => s.recording_active = active,
            Output::Stream => s.streaming_active = active,
        });
        info!("{} {}", output.name(), if active { "started" } else { "stopped" });
        Ok(true)
    }

    /// Mute or unmute an audio input
    pub async fn set_input_mute(&self, input: &str, muted: bool) -> Result<()> {
        self.ensure_ready()?;
        self.inner
            .request(
                request::SET_INPUT_MUTE,
                json!({ "inputName": input, "inputMuted": muted }),
            )
            .await?;
        info!("Input '{}' {}", input, if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    /// Show or hide a source within a scene
    pub async fn set_source_visible(&self, scene: &str, source: &str, visible: bool) -> Result<()> {
        self.ensure_ready()?;
        let data = self
            .inner
            .request(
                request::GET_SCENE_ITEM_ID,
                json!({ "sceneName": scene, "sourceName": source }),
            )
            .await?;
        let item_id = data
            .get("sceneItemId")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                AppError::Protocol(format!("No sceneItemId for '{}' in '{}'", source, scene))
            })?;

        self.inner
            .request(
                request::SET_SCENE_ITEM_ENABLED,
                json!({
                    "sceneName": scene,
                    "sceneItemId": item_id,
                    "sceneItemEnabled": visible,
                }),
            )
            .await?;
        info!("Source '{}' in '{}' {}", source, scene, if visible { "shown" } else { "hidden" });
        Ok(())
    }

    /// Reload the scene list and current scene
    pub async fn refresh_scenes(&self) -> Result<Vec<String>> {
        self.ensure_ready()?;
        self.inner.refresh_scenes().await
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(AppError::NotConnected)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Output {
    Record,
    Stream,
}

impl Output {
    fn name(&self) -> &'static str {
        match self {
            Output::Record => "Recording",
            Output::Stream => "Streaming",
        }
    }
}

impl ClientInner {
    fn handshake_error(&self, reason: String) -> AppError {
        AppError::Handshake {
            host: self.config.host.clone(),
            port: self.config.port,
            reason,
        }
    }

    fn update_session<F>(&self, f: F)
    where
        F: Fn(&mut SwitcherSession),
    {
        self.session.rcu(|current| {
            let mut next = SwitcherSession::clone(current);
            f(&mut next);
            next
        });
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.session.load().connection_state;
        if previous == state {
            return;
        }
        self.update_session(|s| {
            s.connection_state = state;
            if state == ConnectionState::Disconnected {
                s.current_scene = None;
            }
        });
        debug!("Switcher state {} -> {}", previous, state);
        self.events.publish(SystemEvent::SwitcherConnectionChanged {
            state: state.to_string(),
            endpoint: self.config.endpoint(),
        });
    }

    /// Connect and run Hello / Identify / Identified
    async fn handshake(&self) -> Result<WsStream> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.config.url())
            .await
            .map_err(|e| self.handshake_error(e.to_string()))?;

        let hello = loop {
            match self.next_handshake_message(&mut ws).await? {
                ServerMessage::Hello(hello) => break hello,
                other => trace!("Ignoring {:?} before Hello", other),
            }
        };
        debug!(
            "Hello from switcher (version {:?}, rpc {})",
            hello.obs_web_socket_version, hello.rpc_version
        );

        self.set_state(ConnectionState::Authenticating);

        let authentication = hello.authentication.map(|auth| {
            let password = self.config.password.as_deref().unwrap_or_default();
            if password.is_empty() {
                warn!("Switcher requires authentication but no password is configured");
            }
            compute_auth_token(password, &auth.salt, &auth.challenge)
        });
        let identify = protocol::encode_identify(&Identify {
            rpc_version: protocol::RPC_VERSION,
            authentication,
        })?;
        ws.send(Message::Text(identify.into()))
            .await
            .map_err(|e| self.handshake_error(e.to_string()))?;

        loop {
            match self.next_handshake_message(&mut ws).await? {
                ServerMessage::Identified(identified) => {
                    debug!("Identified, rpc {}", identified.negotiated_rpc_version);
                    return Ok(ws);
                }
                other => trace!("Ignoring {:?} before Identified", other),
            }
        }
    }

    async fn next_handshake_message(&self, ws: &mut WsStream) -> Result<ServerMessage> {
        loop {
            let message = match ws.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(self.handshake_error(e.to_string())),
                None => return Err(self.handshake_error("connection closed".to_string())),
            };

            match message {
                Message::Text(text) => {
                    return protocol::decode(&text)
                        .map_err(|e| self.handshake_error(format!("invalid message: {}", e)))
                }
                Message::Close(frame) => {
                    let reason = match frame {
                        Some(frame)
                            if u16::from(frame.code) == protocol::CLOSE_AUTHENTICATION_FAILED =>
                        {
                            "authentication rejected".to_string()
                        }
                        Some(frame) => format!(
                            "closed by server ({}): {}",
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => "closed by server".to_string(),
                    };
                    return Err(self.handshake_error(reason));
                }
                _ => continue,
            }
        }
    }

    /// Hand the identified socket to the reader and writer tasks
    fn attach(self: &Arc<Self>, ws: WsStream) -> u64 {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let (sink, stream) = ws.split();

        *self.connection.lock() = Some(Connection {
            id,
            outbound,
            cancel: cancel.clone(),
        });

        tokio::spawn(write_loop(sink, outbound_rx, cancel.clone()));
        tokio::spawn(read_loop(self.clone(), id, stream, cancel));
        id
    }

    /// Drop the connection (only if it is `id`, when given)
    ///
    /// Returns whether a connection was torn down.
    fn teardown(&self, id: Option<u64>) -> bool {
        let connection = {
            let mut guard = self.connection.lock();
            match (guard.as_ref(), id) {
                (Some(c), Some(id)) if c.id != id => return false,
                (None, _) => None,
                _ => guard.take(),
            }
        };

        let Some(connection) = connection else {
            self.set_state(ConnectionState::Disconnected);
            return false;
        };
        connection.cancel.cancel();

        let pending: Vec<_> = self.pending.lock().drain().collect();
        if !pending.is_empty() {
            debug!("Rejecting {} pending requests", pending.len());
        }
        for (_, request) in pending {
            let _ = request.completion.send(Err(AppError::ConnectionClosed));
        }

        self.set_state(ConnectionState::Disconnected);
        true
    }

    /// Add a pending entry and return the outbound queue it will be sent on
    ///
    /// Runs under the connection lock, so `teardown` either sees the entry
    /// when it drains the pending map or the request sees no connection.
    fn register(
        &self,
        request_id: &str,
        request_type: &str,
    ) -> Result<(mpsc::Sender<Message>, oneshot::Receiver<Result<Value>>)> {
        let connection = self.connection.lock();
        let outbound = connection
            .as_ref()
            .map(|c| c.outbound.clone())
            .ok_or(AppError::NotConnected)?;

        let (completion, done) = oneshot::channel();
        self.pending.lock().insert(
            request_id.to_string(),
            PendingRequest {
                request_type: request_type.to_string(),
                created_at: Instant::now(),
                completion,
            },
        );
        Ok((outbound, done))
    }

    /// Register, send and await one request
    async fn request(&self, request_type: &str, data: Value) -> Result<Value> {
        let request_id = Uuid::new_v4().to_string();
        let text = protocol::encode_request(&protocol::Request {
            request_type: request_type.to_string(),
            request_id: request_id.clone(),
            request_data: data,
        })?;

        let (outbound, mut done) = self.register(&request_id, request_type)?;

        trace!("-> {} ({})", request_type, request_id);
        if outbound.send(Message::Text(text.into())).await.is_err() {
            self.pending.lock().remove(&request_id);
            return Err(AppError::ConnectionClosed);
        }

        let timeout_ms = self.config.request_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::ConnectionClosed),
            Err(_) => {
                if self.pending.lock().remove(&request_id).is_some() {
                    warn!("{} timed out after {} ms", request_type, timeout_ms);
                    Err(AppError::RequestTimeout {
                        request_type: request_type.to_string(),
                        timeout_ms,
                    })
                } else {
                    // Resolved between the deadline and the removal
                    done.await.unwrap_or(Err(AppError::ConnectionClosed))
                }
            }
        }
    }

    async fn refresh_scenes(&self) -> Result<Vec<String>> {
        let data = self.request(request::GET_SCENE_LIST, json!({})).await?;
        let scenes = protocol::scene_names(&data);
        let current = data
            .get("currentProgramSceneName")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.update_session(|s| {
            s.scene_list = scenes.clone();
            if current.is_some() {
                s.current_scene = current.clone();
            }
        });
        self.events.publish(SystemEvent::SwitcherSceneListChanged {
            scenes: scenes.clone(),
        });
        Ok(scenes)
    }

    /// Scene list is required; output status failures are tolerated
    async fn load_initial_state(&self) -> Result<()> {
        self.refresh_scenes().await?;

        match self.request(request::GET_RECORD_STATUS, json!({})).await {
            Ok(data) => {
                let active = output_active(&data);
                self.update_session(|s| s.recording_active = active);
            }
            Err(e) => warn!("Failed to load record status: {}", e),
        }

        // Not every switcher exposes a stream output
        match self.request(request::GET_STREAM_STATUS, json!({})).await {
            Ok(data) => {
                let active = output_active(&data);
                self.update_session(|s| s.streaming_active = active);
            }
            Err(e) => debug!("Stream status unavailable: {}", e),
        }

        Ok(())
    }

    fn handle_response(&self, response: RequestResponse) {
        let Some(pending) = self.pending.lock().remove(&response.request_id) else {
            debug!(
                "Response for unknown request {} ({})",
                response.request_id, response.request_type
            );
            return;
        };

        trace!(
            "<- {} ({}) in {:?}",
            pending.request_type,
            response.request_id,
            pending.created_at.elapsed()
        );

        let result = if response.request_status.result {
            Ok(response.response_data.unwrap_or(Value::Null))
        } else {
            Err(AppError::RequestFailed {
                request_type: pending.request_type,
                comment: response
                    .request_status
                    .comment
                    .unwrap_or_else(|| "Request failed".to_string()),
            })
        };
        let _ = pending.completion.send(result);
    }

    fn handle_event(self: &Arc<Self>, event: protocol::Event) {
        let data = &event.event_data;
        match event.event_type.as_str() {
            event::CURRENT_PROGRAM_SCENE_CHANGED => {
                if let Some(scene) = data.get("sceneName").and_then(Value::as_str) {
                    self.update_session(|s| s.current_scene = Some(scene.to_string()));
                    self.events.publish(SystemEvent::SwitcherSceneChanged {
                        scene: scene.to_string(),
                    });
                }
            }
            event::RECORD_STATE_CHANGED => {
                let active = output_active(data);
                self.update_session(|s| s.recording_active = active);
                self.events
                    .publish(SystemEvent::SwitcherRecordStateChanged { active });
            }
            event::STREAM_STATE_CHANGED => {
                let active = output_active(data);
                self.update_session(|s| s.streaming_active = active);
                self.events
                    .publish(SystemEvent::SwitcherStreamStateChanged { active });
            }
            event::SCENE_LIST_CHANGED => {
                let scenes = protocol::scene_names(data);
                self.update_session(|s| s.scene_list = scenes.clone());
                self.events
                    .publish(SystemEvent::SwitcherSceneListChanged { scenes });
            }
            event::SCENE_CREATED | event::SCENE_REMOVED | event::SCENE_NAME_CHANGED => {
                // Reload off the reader task: the reader must stay free to
                // deliver the response.
                let inner = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = inner.refresh_scenes().await {
                        debug!("Scene list reload failed: {}", e);
                    }
                });
            }
            other => trace!("Unhandled switcher event {}", other),
        }
    }
}

fn output_active(data: &Value) -> bool {
    data.get("outputActive")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            message = outbound.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = sink.send(message).await {
                    debug!("Switcher write failed: {}", e);
                    cancel.cancel();
                    break;
                }
            }
        }
    }
}

async fn read_loop(
    inner: Arc<ClientInner>,
    connection_id: u64,
    mut stream: SplitStream<WsStream>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => match protocol::decode(&text) {
                Ok(ServerMessage::RequestResponse(response)) => inner.handle_response(response),
                Ok(ServerMessage::Event(event)) => inner.handle_event(event),
                Ok(other) => trace!("Ignoring {:?}", other),
                Err(e) => warn!("Invalid switcher message: {}", e),
            },
            Some(Ok(Message::Close(frame))) => {
                info!("Switcher closed the connection: {:?}", frame);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Switcher connection error: {}", e);
                break;
            }
            None => break,
        }
    }

    if inner.teardown(Some(connection_id)) {
        warn!("Lost connection to switcher at {}", inner.config.endpoint());
    }
}
