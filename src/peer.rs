//! Parent and child slots, filled in from message provenance.
//!
//! The first window to message us is our parent; a second, different sender is
//! a child we spawned. A slot whose window has closed is free again.

use std::fmt;

use tracing::debug;

use crate::transport::{WindowHandle, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    Parent,
    Child,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PeerRole::Parent => "parent",
            PeerRole::Child => "child",
        })
    }
}

#[derive(Clone)]
pub struct Peer {
    window: WindowHandle,
    origin: Option<String>,
}

impl Peer {
    pub fn window(&self) -> &WindowHandle {
        &self.window
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("window", &self.window.id())
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct PeerRegistry {
    parent: Option<Peer>,
    child: Option<Peer>,
}

fn slot_accepts(slot: &Option<Peer>, source: WindowId) -> bool {
    match slot {
        None => true,
        Some(peer) => peer.window.is_closed() || peer.id() == source,
    }
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the parent slot at initialization; its origin stays unknown until it
    /// messages us.
    pub fn set_parent_window(&mut self, window: WindowHandle) {
        self.parent = Some(Peer {
            window,
            origin: None,
        });
    }

    /// Record a message from `source`. Returns the role the sender holds
    /// afterwards, or `None` if neither slot took it.
    pub fn on_message_received(&mut self, source: &WindowHandle, origin: &str) -> Option<PeerRole> {
        let id = source.id();
        let role = if slot_accepts(&self.parent, id) {
            self.parent = Some(Peer {
                window: source.clone(),
                origin: Some(origin.to_string()),
            });
            Some(PeerRole::Parent)
        } else if slot_accepts(&self.child, id) {
            self.child = Some(Peer {
                window: source.clone(),
                origin: Some(origin.to_string()),
            });
            Some(PeerRole::Child)
        } else {
            None
        };

        self.evict_closed();
        role.filter(|r| self.get(*r).is_some_and(|p| p.id() == id))
    }

    /// Clear any slot whose window reports closed.
    pub fn evict_closed(&mut self) {
        for (role, slot) in [
            (PeerRole::Parent, &mut self.parent),
            (PeerRole::Child, &mut self.child),
        ] {
            if slot.as_ref().is_some_and(|p| p.window.is_closed()) {
                debug!(%role, "peer window closed; clearing");
                *slot = None;
            }
        }
    }

    pub fn get(&self, role: PeerRole) -> Option<&Peer> {
        match role {
            PeerRole::Parent => self.parent.as_ref(),
            PeerRole::Child => self.child.as_ref(),
        }
    }

    pub fn origin(&self, role: PeerRole) -> Option<&str> {
        self.get(role).and_then(Peer::origin)
    }
}
