//! Single entry point for inbound traffic.

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{Bridge, NAVIGATE_BACK_FUNC};
use crate::callbacks::{Continuation, Resolution};
use crate::handlers::{BuiltinEvent, Invocation};
use crate::message::{self, Inbound, MessageRequest};
use crate::peer::PeerRole;
use crate::transport::{TransportMode, WindowHandle};

/// A cross-window message event as the embedder received it.
pub struct InboundMessage {
    /// `event.source`. Messages without a source cannot be attributed and are dropped.
    pub source: Option<WindowHandle>,
    /// `event.origin`.
    pub origin: String,
    /// `event.data`.
    pub data: Value,
}

impl InboundMessage {
    pub fn new(source: WindowHandle, origin: impl Into<String>, data: Value) -> Self {
        Self {
            source: Some(source),
            origin: origin.into(),
            data,
        }
    }
}

impl Bridge {
    fn listening(&self, mode: TransportMode) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.mode() == mode && t.is_installed())
    }

    fn origin_acceptable(&self, origin: &str) -> bool {
        if self.env.current_origin.as_deref() == Some(origin) {
            return true;
        }
        self.validator.is_allowed_str(origin)
    }

    /// Feed one cross-window message event. Anything malformed, self-sent, from
    /// a rejected origin, or from an unknown window is dropped silently.
    pub fn handle_message(&mut self, message: InboundMessage) {
        if !self.listening(TransportMode::Framed) {
            trace!("no message listener installed; ignoring");
            return;
        }
        if !message.data.is_object() {
            trace!("dropping non-object message");
            return;
        }
        let Some(source) = message.source else {
            trace!("dropping message without source");
            return;
        };
        if source.id() == self.env.current.id() {
            trace!("dropping message from own window");
            return;
        }
        if !self.origin_acceptable(&message.origin) {
            debug!(origin = %message.origin, "dropping message from rejected origin");
            return;
        }

        let role = self
            .session
            .peers
            .on_message_received(&source, &message.origin);
        self.flush_queues();

        let Some(inbound) = message::decode(&message.data) else {
            trace!("dropping malformed envelope");
            return;
        };
        match role {
            Some(PeerRole::Parent) => self.route_from_parent(inbound),
            Some(PeerRole::Child) => self.route_from_child(inbound),
            None => debug!(source = %source.id(), "message from neither parent nor child"),
        }
    }

    /// Feed one message from the native shell (frameless mode). The native
    /// channel is the parent; no origin applies.
    pub fn handle_native_message(&mut self, json: &str) {
        if !self.listening(TransportMode::Frameless) {
            trace!("no native callback installed; ignoring");
            return;
        }
        match message::decode_str(json) {
            Some(inbound) => self.route_from_parent(inbound),
            None => trace!("dropping malformed native message"),
        }
    }

    fn route_from_parent(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Response(response) => {
                let resolution = self.session.callbacks.resolve(response);
                self.apply_resolution(resolution);
            }
            // Parent-originated requests are treated as events; nothing is sent back.
            Inbound::Request(MessageRequest { func, args, .. }) => self.dispatch_event(&func, args),
            Inbound::Event(event) => self.dispatch_event(&event.func, event.args),
        }
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Delivered => {}
            Resolution::Unmatched => trace!("response matched no pending request"),
            Resolution::Relay {
                child_request_id,
                args,
                is_partial_response,
            } => {
                if self.session.peers.get(PeerRole::Child).is_some() {
                    self.send_response_to_child(child_request_id, args, is_partial_response);
                } else {
                    debug!(id = %child_request_id, "child gone; dropping relayed response");
                }
            }
            Resolution::Handshake(args) => self.complete_handshake(args),
        }
    }

    fn dispatch_event(&mut self, func: &str, args: Vec<Value>) {
        let invocation = self.session.handlers.invoke(func, &args);

        match BuiltinEvent::from_name(func) {
            Some(BuiltinEvent::BackButtonPress) if !invocation.handled() => {
                debug!("back button not handled locally; navigating back");
                if let Err(e) = self.send_upstream(
                    NAVIGATE_BACK_FUNC,
                    Vec::new(),
                    Continuation::Callback(Box::new(|args| {
                        if let Err(e) = crate::callbacks::interpret_response(args) {
                            warn!(error = %e, "navigateBack failed");
                        }
                    })),
                ) {
                    warn!(error = %e, "cannot send navigateBack");
                }
            }
            Some(BuiltinEvent::BeforeUnload) if !invocation.handled() => {
                if let Err(e) = self.ready_to_unload() {
                    warn!(error = %e, "cannot send readyToUnload");
                }
            }
            Some(BuiltinEvent::ThemeChange) => {
                if self.session.peers.get(PeerRole::Child).is_some() {
                    if let Err(e) = self.send_event_to_child(func, args) {
                        warn!(error = %e, "cannot relay themeChange to child");
                    }
                }
            }
            _ => {
                if invocation == Invocation::NotRegistered {
                    debug!(func, "no handler for event");
                }
            }
        }
    }

    fn route_from_child(&mut self, inbound: Inbound) {
        let Inbound::Request(request) = inbound else {
            trace!("dropping non-request message from child");
            return;
        };
        let MessageRequest { id, func, args } = request;

        if let Invocation::Returned(Some(result)) = self.session.handlers.invoke(&func, &args) {
            let args = match result {
                Value::Array(items) => items,
                other => vec![other],
            };
            self.send_response_to_child(id, args, false);
            return;
        }

        trace!(%id, func = %func, "proxying child request to parent");
        if let Err(e) = self.send_upstream(&func, args, Continuation::RelayToChild(id)) {
            warn!(error = %e, "cannot proxy child request");
        }
    }
}
