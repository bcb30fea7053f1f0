use tracing::{debug, trace};

use super::{Transport, TransportMode, WindowHandle};
use crate::error::BridgeError;
use crate::message::Envelope;

/// Cross-window messaging. Outbound envelopes go through `Window::post_message`;
/// inbound events reach the bridge through `Bridge::handle_message`.
#[derive(Debug, Default)]
pub struct PostMessageTransport {
    installed: bool,
}

impl PostMessageTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for PostMessageTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Framed
    }

    fn install(&mut self) {
        debug!("message listener installed");
        self.installed = true;
    }

    fn uninstall(&mut self) {
        debug!("message listener removed");
        self.installed = false;
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn send(
        &mut self,
        target: Option<&WindowHandle>,
        envelope: &Envelope,
        target_origin: &str,
    ) -> Result<(), BridgeError> {
        let Some(target) = target else {
            return Err(BridgeError::InvalidArguments(
                "post message transport needs a target window".into(),
            ));
        };
        trace!(target = %target.id(), target_origin, func = ?envelope.func(), "post message");
        target.post_message(&envelope.to_value(), target_origin);
        Ok(())
    }
}
