//! The two ways envelopes leave this process.
//!
//! - [`PostMessageTransport`]: cross-window `postMessage` to a parent or child window.
//! - [`NativeBridgeTransport`]: JSON strings handed to a native shell (frameless mode).
//!
//! The bridge picks one at initialization and never looks at the concrete type again.

pub mod native;
pub mod post_message;

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::BridgeError;
use crate::message::Envelope;

pub use native::{
    NativeBridge, NativeBridgeTransport, NativeFrameReader, StdioNativeBridge, MAX_FROM_HOST,
    MAX_TO_HOST,
};
pub use post_message::PostMessageTransport;

/// Target origin used only for the very first handshake send.
pub const WILDCARD_ORIGIN: &str = "*";

/// Stable identity of a window. Two handles are the same peer iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A window (or frame) we can post to.
pub trait Window {
    fn id(&self) -> WindowId;

    fn is_closed(&self) -> bool;

    /// Deliver `message` if the window's current origin matches `target_origin`
    /// (or unconditionally for `"*"`).
    fn post_message(&self, message: &Value, target_origin: &str);
}

pub type WindowHandle = Rc<dyn Window>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Framed,
    Frameless,
}

pub trait Transport {
    fn mode(&self) -> TransportMode;

    /// Install the inbound listener.
    fn install(&mut self);

    /// Remove the inbound listener. Messages arriving afterwards are ignored.
    fn uninstall(&mut self);

    fn is_installed(&self) -> bool;

    /// Put one envelope on the wire. Framed transports need a target window;
    /// the native bridge ignores both `target` and `target_origin`.
    fn send(
        &mut self,
        target: Option<&WindowHandle>,
        envelope: &Envelope,
        target_origin: &str,
    ) -> Result<(), BridgeError>;
}

/// What the embedding page looks like from the inside.
pub struct HostEnvironment {
    /// Our own window. Messages whose source is this window are discarded.
    pub current: WindowHandle,
    /// Our own origin, accepted without allow-list checks.
    pub current_origin: Option<String>,
    /// `window.parent` when it differs from `current`.
    pub parent: Option<WindowHandle>,
    /// `window.opener`, used when there is no parent.
    pub opener: Option<WindowHandle>,
    /// Native interface of a frameless shell.
    pub native: Option<Rc<dyn NativeBridge>>,
}

impl HostEnvironment {
    pub fn new(current: WindowHandle) -> Self {
        Self {
            current,
            current_origin: None,
            parent: None,
            opener: None,
            native: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.current_origin = Some(origin.into());
        self
    }

    pub fn with_parent(mut self, parent: WindowHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_opener(mut self, opener: WindowHandle) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn with_native(mut self, native: Rc<dyn NativeBridge>) -> Self {
        self.native = Some(native);
        self
    }

    /// Parent if it is a different window, else opener.
    pub fn addressable_parent(&self) -> Option<WindowHandle> {
        let own = self.current.id();
        self.parent
            .iter()
            .chain(self.opener.iter())
            .find(|w| w.id() != own)
            .cloned()
    }

    pub fn detect_mode(&self) -> TransportMode {
        if self.addressable_parent().is_some() {
            TransportMode::Framed
        } else {
            TransportMode::Frameless
        }
    }

    pub(crate) fn build_transport(&self) -> Box<dyn Transport> {
        match self.detect_mode() {
            TransportMode::Framed => Box::new(PostMessageTransport::new()),
            TransportMode::Frameless => Box::new(NativeBridgeTransport::new(self.native.clone())),
        }
    }
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("current", &self.current.id())
            .field("current_origin", &self.current_origin)
            .field("parent", &self.parent.as_ref().map(|w| w.id()))
            .field("opener", &self.opener.as_ref().map(|w| w.id()))
            .field("native", &self.native.is_some())
            .finish()
    }
}
