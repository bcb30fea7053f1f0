//! Frameless mode: there is no parent window, so envelopes are JSON-stringified
//! and handed to a native interface provided by the shell.
//!
//! Shells that talk over pipes can use [`StdioNativeBridge`], which frames each
//! JSON string as a 4-byte native-endian length prefix followed by that many
//! bytes of UTF-8. [`NativeFrameReader`] reads the same framing back.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use tracing::{trace, warn};

use super::{Transport, TransportMode, WindowHandle};
use crate::error::BridgeError;
use crate::message::Envelope;

/// Largest JSON payload written to the shell in one frame.
pub const MAX_TO_HOST: usize = 1 << 20;
/// Hard cap on a frame read from the shell.
pub const MAX_FROM_HOST: usize = 64 << 20;

const HEADER_LEN: usize = 4;

/// The native side of a frameless shell.
pub trait NativeBridge {
    fn frameless_post_message(&self, json: &str) -> io::Result<()>;
}

/// Writes each envelope as one frame to any `Write` (stdout for a
/// pipe-hosted shell).
///
/// Never log to the same stream: it carries protocol frames only.
pub struct StdioNativeBridge<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> StdioNativeBridge<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }
}

impl<W: Write> NativeBridge for StdioNativeBridge<W> {
    fn frameless_post_message(&self, json: &str) -> io::Result<()> {
        let len = u32::try_from(json.len())
            .ok()
            .filter(|&n| n as usize <= MAX_TO_HOST)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("outgoing message of {} bytes exceeds {MAX_TO_HOST}", json.len()),
                )
            })?;
        let mut out = self.out.borrow_mut();
        out.write_all(&len.to_ne_bytes())?;
        out.write_all(json.as_bytes())?;
        out.flush()
    }
}

/// Reads the shell's frames, each one JSON string for
/// `Bridge::handle_native_message`.
///
/// Also an iterator that ends at a clean end of stream between frames.
pub struct NativeFrameReader<R: Read> {
    inner: R,
    max_size: usize,
}

impl<R: Read> NativeFrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_size: MAX_FROM_HOST,
        }
    }

    /// Lower the per-frame limit. It never goes above [`MAX_FROM_HOST`].
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.min(MAX_FROM_HOST);
        self
    }

    /// `Ok(None)` when the stream ends before a new header starts.
    /// A truncated header or body is `UnexpectedEof`.
    pub fn read_frame(&mut self) -> io::Result<Option<String>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a frame header",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        let len = u32::from_ne_bytes(header) as usize;
        if len > self.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("incoming frame of {len} bytes exceeds {}", self.max_size),
            ));
        }
        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        trace!(len, "native frame read");
        String::from_utf8(body)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: Read> Iterator for NativeFrameReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

/// Transport for frameless hosts. Without a native interface, sends are dropped.
pub struct NativeBridgeTransport {
    native: Option<Rc<dyn NativeBridge>>,
    installed: bool,
}

impl NativeBridgeTransport {
    pub fn new(native: Option<Rc<dyn NativeBridge>>) -> Self {
        Self {
            native,
            installed: false,
        }
    }
}

impl Transport for NativeBridgeTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Frameless
    }

    fn install(&mut self) {
        trace!("native message callback installed");
        self.installed = true;
    }

    fn uninstall(&mut self) {
        trace!("native message callback removed");
        self.installed = false;
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn send(
        &mut self,
        _target: Option<&WindowHandle>,
        envelope: &Envelope,
        _target_origin: &str,
    ) -> Result<(), BridgeError> {
        let Some(native) = &self.native else {
            warn!(func = ?envelope.func(), "frameless host has no native interface; dropping message");
            return Ok(());
        };
        let json = envelope.to_json()?;
        trace!(len = json.len(), "frameless post message");
        native.frameless_post_message(&json)?;
        Ok(())
    }
}
