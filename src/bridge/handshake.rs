//! Startup and teardown.
//!
//! `Uninitialized -> Initializing -> AwaitingHandshake -> Ready` (or `Failed`),
//! and back to `Uninitialized` on [`Bridge::uninitialize`].

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{Bridge, BridgeState, Session};
use crate::callbacks::Continuation;
use crate::error::BridgeError;
use crate::message::Envelope;
use crate::runtime::RuntimeDescriptor;
use crate::transport::{TransportMode, WILDCARD_ORIGIN};

/// Name of the handshake request.
pub const HANDSHAKE_FUNC: &str = "initialize";

impl Bridge {
    /// Start the bridge. Safe to call more than once: any call after the first
    /// (until [`Bridge::uninitialize`]) does nothing.
    pub fn initialize(&mut self) -> Result<(), BridgeError> {
        if self.session.state != BridgeState::Uninitialized {
            debug!(state = %self.session.state, "initialize called again; ignoring");
            return Ok(());
        }
        self.set_state(BridgeState::Initializing);

        let mut transport = self.env.build_transport();
        transport.install();
        let mode = transport.mode();
        let parent = self.env.addressable_parent();
        if let Some(parent) = &parent {
            self.session.peers.set_parent_window(parent.clone());
        }
        info!(?mode, "bridge initializing");

        let request = self
            .session
            .codec
            .encode_request(HANDSHAKE_FUNC, vec![json!(self.config.protocol_version)]);
        let id = request.id;
        self.session.callbacks.register(id, Continuation::Handshake);
        let envelope = Envelope::Request(request);

        // The parent's origin cannot be known yet; the handshake carries only
        // metadata, so it is the one message sent to "*".
        let target = match mode {
            TransportMode::Framed => parent.as_ref(),
            TransportMode::Frameless => None,
        };
        let sent = transport.send(target, &envelope, WILDCARD_ORIGIN);
        self.transport = Some(transport);

        if let Err(e) = sent {
            warn!(error = %e, "handshake send failed");
            self.session.callbacks.forget(id);
            self.session.failure = Some(e.to_string());
            self.set_state(BridgeState::Failed);
            return Err(e);
        }

        self.set_state(BridgeState::AwaitingHandshake);
        Ok(())
    }

    /// Same as [`Bridge::initialize`], with extra valid origins applied first.
    pub fn initialize_with_origins<I, S>(&mut self, origins: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.session.state == BridgeState::Uninitialized {
            self.set_additional_origins(origins)?;
        }
        self.initialize()
    }

    pub(super) fn complete_handshake(&mut self, args: Vec<Value>) {
        if self.session.state != BridgeState::AwaitingHandshake {
            debug!(state = %self.session.state, "unexpected handshake response; ignoring");
            return;
        }
        match RuntimeDescriptor::from_handshake(&args) {
            Ok(descriptor) => {
                info!(
                    frame_context = ?descriptor.frame_context,
                    host_client_type = ?descriptor.host_client_type,
                    version = %descriptor.client_supported_sdk_version,
                    api_version = descriptor.runtime.api_version,
                    "handshake complete"
                );
                self.session.descriptor = Some(descriptor);
                self.set_state(BridgeState::Ready);
            }
            Err(e) => {
                warn!(error = %e, "handshake response unusable");
                self.session.failure = Some(e.to_string());
                self.set_state(BridgeState::Failed);
            }
        }
    }

    /// Tear everything down: listener, peers, queues, pending callbacks,
    /// handlers, and the id counter. Pending futures resolve to
    /// [`BridgeError::Disconnected`]. The bridge can be initialized again.
    pub fn uninitialize(&mut self) {
        if self.session.state == BridgeState::Uninitialized {
            return;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.uninstall();
        }
        self.session = Session::new();
        self.set_state(BridgeState::Uninitialized);
        info!("bridge uninitialized");
    }
}
