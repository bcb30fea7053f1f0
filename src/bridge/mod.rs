//! The bridge session: one object owning every piece of mutable protocol state.

mod dispatch;
mod handshake;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::callbacks::{CallbackCorrelator, Continuation, PendingResponse, Reply, ResponseStream};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::handlers::{Handler, HandlerRegistry};
use crate::message::{Envelope, MessageCodec, MessageId};
use crate::origin::{AllowListCache, AllowListSource, OriginValidator};
use crate::peer::{PeerRegistry, PeerRole};
use crate::queue::{Disposition, OutboundQueues};
use crate::runtime::{Requirement, RuntimeDescriptor};
use crate::transport::{HostEnvironment, Transport, TransportMode, WILDCARD_ORIGIN};

pub use dispatch::InboundMessage;
pub use handshake::HANDSHAKE_FUNC;

/// Sent upstream when the back button is not handled locally.
pub const NAVIGATE_BACK_FUNC: &str = "navigateBack";
/// Sent upstream once the app is ready to be unloaded.
pub const READY_TO_UNLOAD_FUNC: &str = "readyToUnload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Initializing,
    AwaitingHandshake,
    Ready,
    /// The handshake response was unusable. Teardown returns to `Uninitialized`.
    Failed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State created at initialization and discarded wholesale at teardown.
#[derive(Debug)]
struct Session {
    state: BridgeState,
    codec: MessageCodec,
    peers: PeerRegistry,
    queues: OutboundQueues,
    callbacks: CallbackCorrelator,
    handlers: HandlerRegistry,
    descriptor: Option<RuntimeDescriptor>,
    failure: Option<String>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: BridgeState::Uninitialized,
            codec: MessageCodec::new(),
            peers: PeerRegistry::new(),
            queues: OutboundQueues::new(),
            callbacks: CallbackCorrelator::new(),
            handlers: HandlerRegistry::new(),
            descriptor: None,
            failure: None,
        }
    }
}

/// A messaging bridge between this frame and its host.
///
/// Single-threaded: every method takes `&mut self` and runs to completion.
/// Responses are delivered through futures ([`Reply`], [`PendingResponse`],
/// [`ResponseStream`]) that complete when the embedder feeds the matching
/// inbound message to [`Bridge::handle_message`] or
/// [`Bridge::handle_native_message`].
pub struct Bridge {
    config: BridgeConfig,
    env: HostEnvironment,
    validator: OriginValidator,
    transport: Option<Box<dyn Transport>>,
    session: Session,
    state_tx: watch::Sender<BridgeState>,
}

impl Bridge {
    /// Bridge reading the process-wide allow-list.
    pub fn new(env: HostEnvironment, config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::with_allow_list(env, config, AllowListCache::shared())
    }

    pub fn with_allow_list(
        env: HostEnvironment,
        config: BridgeConfig,
        allow_list: Arc<AllowListCache>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let validator = OriginValidator::new(allow_list, config.additional_valid_origins.clone());
        let (state_tx, _) = watch::channel(BridgeState::Uninitialized);
        Ok(Self {
            config,
            env,
            validator,
            transport: None,
            session: Session::new(),
            state_tx,
        })
    }

    pub fn validator(&self) -> &OriginValidator {
        &self.validator
    }

    pub fn state(&self) -> BridgeState {
        self.session.state
    }

    /// Watch state changes, e.g. to await `Ready`.
    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: BridgeState) {
        if self.session.state != state {
            debug!(from = %self.session.state, to = %state, "bridge state");
        }
        self.session.state = state;
        self.state_tx.send_replace(state);
    }

    /// Mode picked at initialization.
    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.transport.as_ref().map(|t| t.mode())
    }

    pub fn is_frameless(&self) -> bool {
        self.transport_mode() == Some(TransportMode::Frameless)
    }

    /// Negotiated descriptor, once `Ready`.
    pub fn descriptor(&self) -> Option<&RuntimeDescriptor> {
        self.session.descriptor.as_ref()
    }

    pub fn peer_origin(&self, role: PeerRole) -> Option<&str> {
        self.session.peers.origin(role)
    }

    pub fn has_peer(&self, role: PeerRole) -> bool {
        self.session.peers.get(role).is_some()
    }

    /// Envelopes waiting for `role`'s origin.
    pub fn pending_outbound(&self, role: PeerRole) -> usize {
        self.session.queues.len(role)
    }

    /// Requests still waiting for a response.
    pub fn pending_callbacks(&self) -> usize {
        self.session.callbacks.pending_count()
    }

    /// Replace the extra origins accepted on top of the allow-list.
    pub fn set_additional_origins<I, S>(&mut self, origins: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = self.config.clone().with_additional_origins(origins)?;
        self.validator
            .set_additional_origins(config.additional_valid_origins.clone());
        self.config = config;
        Ok(())
    }

    /// Best-effort replacement of the bundled allow-list. Does nothing when the
    /// remote list is disabled in config or was already attempted.
    pub async fn prefetch_allow_list<S: AllowListSource>(&self, source: &S) -> bool {
        if !self.config.remote_allow_list.enabled {
            debug!("remote allow-list disabled");
            return false;
        }
        self.validator
            .allow_list()
            .prefetch(source, self.config.remote_allow_list.timeout())
            .await
    }

    /// Prefetch from the URL in config.
    #[cfg(feature = "remote-allowlist")]
    pub async fn prefetch_remote_allow_list(&self) -> bool {
        match crate::origin::HttpAllowListSource::from_config(&self.config.remote_allow_list) {
            Ok(source) => self.prefetch_allow_list(&source).await,
            Err(e) => {
                warn!(error = %e, "cannot build allow-list source");
                false
            }
        }
    }

    // -------- Handlers --------

    /// Register a handler for a pushed event (or a request from a child).
    /// Replaces any earlier handler for the same name.
    pub fn register_handler<F>(&mut self, name: &str, handler: F) -> Result<(), BridgeError>
    where
        F: FnMut(&[Value]) -> Option<Value> + 'static,
    {
        self.session.handlers.register(name, Box::new(handler))
    }

    /// `None` removes the registration.
    pub fn set_handler(&mut self, name: &str, handler: Option<Handler>) -> Result<(), BridgeError> {
        self.session.handlers.set(name, handler)
    }

    pub fn unregister_handler(&mut self, name: &str) -> bool {
        self.session.handlers.unregister(name)
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.session.handlers.is_registered(name)
    }

    // -------- Outbound --------

    /// Checks that the handshake completed and `requirement` holds.
    pub fn ensure_ready(&self, requirement: &Requirement) -> Result<&RuntimeDescriptor, BridgeError> {
        match self.session.state {
            BridgeState::Ready => {}
            BridgeState::Failed => {
                return Err(BridgeError::InitializationFailed(
                    self.session
                        .failure
                        .clone()
                        .unwrap_or_else(|| "handshake failed".into()),
                ))
            }
            _ => return Err(BridgeError::NotInitialized),
        }
        let descriptor = self
            .session
            .descriptor
            .as_ref()
            .ok_or(BridgeError::NotInitialized)?;
        descriptor.check(requirement)?;
        Ok(descriptor)
    }

    /// Pre-flight checks, then an error-first request.
    pub fn call_capability(
        &mut self,
        requirement: &Requirement,
        func: &str,
        args: Vec<Value>,
    ) -> Result<Reply, BridgeError> {
        self.ensure_ready(requirement)?;
        self.send_request(func, args)
    }

    /// Send a request upstream; the reply interprets `args[0]` as the error slot.
    pub fn send_request(&mut self, func: &str, args: Vec<Value>) -> Result<Reply, BridgeError> {
        self.send_raw(func, args).map(Reply::new)
    }

    /// Send a request upstream and get every response arg back untouched.
    pub fn send_raw(&mut self, func: &str, args: Vec<Value>) -> Result<PendingResponse, BridgeError> {
        let id = self.session.codec.peek_next_id();
        let (tx, pending) = PendingResponse::channel(id);
        self.send_upstream(func, args, Continuation::Oneshot(tx))?;
        Ok(pending)
    }

    /// Send a request whose response may arrive in several partial chunks.
    pub fn send_streaming_request(
        &mut self,
        func: &str,
        args: Vec<Value>,
    ) -> Result<ResponseStream, BridgeError> {
        let id = self.session.codec.peek_next_id();
        let (tx, stream) = ResponseStream::channel(id);
        self.send_upstream(func, args, Continuation::Stream(tx))?;
        Ok(stream)
    }

    /// Callback style: `callback` runs with the response args.
    pub fn send_with_callback<F>(&mut self, func: &str, args: Vec<Value>, callback: F) -> Result<MessageId, BridgeError>
    where
        F: FnOnce(Vec<Value>) + 'static,
    {
        self.send_upstream(func, args, Continuation::Callback(Box::new(callback)))
    }

    /// Push a named event down to the child. `Dropped` when there is no child.
    pub fn send_event_to_child(&mut self, func: &str, args: Vec<Value>) -> Result<Disposition, BridgeError> {
        let transport = self.transport.as_mut().ok_or(BridgeError::NotInitialized)?;
        let envelope = Envelope::Event(MessageCodec::encode_event(func, args));
        self.session.queues.enqueue_or_send(
            &self.session.peers,
            transport.as_mut(),
            PeerRole::Child,
            envelope,
        )
    }

    /// Tell the host the app finished its unload work.
    pub fn ready_to_unload(&mut self) -> Result<MessageId, BridgeError> {
        self.send_with_callback(READY_TO_UNLOAD_FUNC, Vec::new(), |_| {})
    }

    fn send_upstream(
        &mut self,
        func: &str,
        args: Vec<Value>,
        continuation: Continuation,
    ) -> Result<MessageId, BridgeError> {
        let transport = self.transport.as_mut().ok_or(BridgeError::NotInitialized)?;
        let request = self.session.codec.encode_request(func, args);
        let id = request.id;
        self.session.callbacks.register(id, continuation);
        let envelope = Envelope::Request(request);

        let sent = match transport.mode() {
            TransportMode::Frameless => transport.send(None, &envelope, WILDCARD_ORIGIN),
            TransportMode::Framed => self
                .session
                .queues
                .enqueue_or_send(&self.session.peers, transport.as_mut(), PeerRole::Parent, envelope)
                .map(|_| ()),
        };
        if let Err(e) = sent {
            self.session.callbacks.forget(id);
            return Err(e);
        }
        Ok(id)
    }

    fn send_response_to_child(&mut self, id: MessageId, args: Vec<Value>, is_partial_response: bool) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let envelope = Envelope::Response(MessageCodec::encode_response(id, args, is_partial_response));
        if let Err(e) = self.session.queues.enqueue_or_send(
            &self.session.peers,
            transport.as_mut(),
            PeerRole::Child,
            envelope,
        ) {
            warn!(%id, error = %e, "cannot answer child");
        }
    }

    fn flush_queues(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        for role in [PeerRole::Parent, PeerRole::Child] {
            self.session
                .queues
                .flush(&self.session.peers, transport.as_mut(), role);
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.session.state)
            .field("mode", &self.transport_mode())
            .field("env", &self.env)
            .field("peers", &self.session.peers)
            .field("pending_callbacks", &self.session.callbacks.pending_count())
            .finish()
    }
}
