//! Outbound envelopes waiting for the parent's origin.
//!
//! Only the parent needs a queue. The parent slot is seeded at initialization
//! (or emptied when its window closes) before any origin is known, while the
//! child slot is only ever filled by an inbound message, which carries the
//! child's origin. Child-bound envelopes therefore go out at once or are
//! dropped when there is no child.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::error::BridgeError;
use crate::message::Envelope;
use crate::peer::{PeerRegistry, PeerRole};
use crate::transport::Transport;

/// What happened to an envelope handed to [`OutboundQueues::enqueue_or_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Sent,
    /// Waiting for the parent's origin (or for a parent to appear).
    Queued,
    /// No child to deliver to.
    Dropped,
}

#[derive(Debug, Default)]
pub struct OutboundQueues {
    parent: VecDeque<Envelope>,
}

impl OutboundQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, role: PeerRole) -> usize {
        match role {
            PeerRole::Parent => self.parent.len(),
            PeerRole::Child => 0,
        }
    }

    /// Send right away when the peer's origin is known (using it as the target
    /// origin). Parent-bound envelopes otherwise queue behind whatever is
    /// already waiting, even while the parent slot is empty; the next parent
    /// to message us receives them.
    ///
    /// `Err` means the transport refused this envelope. Failures while
    /// flushing older envelopes are logged and skipped.
    pub fn enqueue_or_send(
        &mut self,
        peers: &PeerRegistry,
        transport: &mut dyn Transport,
        role: PeerRole,
        envelope: Envelope,
    ) -> Result<Disposition, BridgeError> {
        let Some(peer) = peers.get(role) else {
            return Ok(match role {
                PeerRole::Parent => {
                    trace!(func = ?envelope.func(), "no parent yet; queueing");
                    self.parent.push_back(envelope);
                    Disposition::Queued
                }
                PeerRole::Child => {
                    debug!(func = ?envelope.func(), "no child; dropping message");
                    Disposition::Dropped
                }
            });
        };
        let Some(origin) = peer.origin() else {
            if role == PeerRole::Child {
                debug!(func = ?envelope.func(), "child origin unknown; dropping message");
                return Ok(Disposition::Dropped);
            }
            trace!(func = ?envelope.func(), "parent origin unknown; queueing");
            self.parent.push_back(envelope);
            return Ok(Disposition::Queued);
        };

        self.flush(peers, transport, role);
        transport.send(Some(peer.window()), &envelope, origin)?;
        Ok(Disposition::Sent)
    }

    /// Send everything queued for `role`, oldest first, if its origin is known.
    /// Returns how many envelopes went out.
    pub fn flush(&mut self, peers: &PeerRegistry, transport: &mut dyn Transport, role: PeerRole) -> usize {
        if role == PeerRole::Child || self.parent.is_empty() {
            return 0;
        }
        let Some(peer) = peers.get(role) else {
            return 0;
        };
        let Some(origin) = peer.origin() else {
            return 0;
        };
        debug!(count = self.parent.len(), "flushing queued messages");
        let mut sent = 0;
        for envelope in self.parent.drain(..) {
            match transport.send(Some(peer.window()), &envelope, origin) {
                Ok(()) => sent += 1,
                Err(e) => warn!(error = %e, func = ?envelope.func(), "send failed while flushing"),
            }
        }
        sent
    }
}
