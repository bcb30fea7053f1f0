//! # frame_bridge
//!
//! A messaging bridge for apps hosted **inside a frame** (or a frameless native web view)
//! that need to call capabilities owned by the **host** and receive events pushed back from it.
//!
//! - Request/response over a fire-and-forget message channel, correlated by id
//! - Push events from the host, dispatched to named handlers
//! - Origin validation against an allow-list (bundled, optionally refreshed once from a remote document)
//! - Queuing until a peer's origin is known, then strict FIFO delivery
//! - A handshake that negotiates what the host supports and gates every capability call
//! - Transparent proxying of a child frame's requests to our parent
//!
//! ---
//!
//! ## The wire protocol
//!
//! Every message is a JSON object:
//!
//! - request: `{ "id": 7, "func": "getContext", "args": [] }`
//! - response: `{ "id": 7, "args": [null, {"theme": "dark"}] }`
//! - event: `{ "func": "themeChange", "args": ["dark"] }`
//!
//! `id` without `func` is a response to one of our requests. `args[0]` of a response is the
//! error slot: falsy on success, `{ "errorCode": n, "message": "..." }` on failure.
//!
//! ### Most important gotchas (read this first)
//!
//! - **The first message to the parent goes to `"*"`.** That is the handshake, and it carries
//!   only our protocol version. Everything after it waits until the parent has messaged us and
//!   its origin is known; then it is sent to exactly that origin.
//! - **Nothing times out.** A request whose response never comes simply never completes. Race
//!   the returned future against a timer if you need a deadline.
//! - **Dropped messages are silent.** Bad origins, malformed envelopes, messages from our own
//!   window, and responses to unknown ids are logged at `debug`/`trace` and otherwise ignored.
//! - **Frameless stdout is protocol only.** When the shell talks over pipes with
//!   [`transport::StdioNativeBridge`], logs must go to stderr or a file.
//!
//! ---
//!
//! ## Crate layout
//!
//! - [`bridge`]: the [`Bridge`] session (handshake state machine, dispatcher, outbound API).
//! - [`message`]: envelopes and id assignment.
//! - [`origin`]: origin matching and the allow-list cache.
//! - [`peer`], [`queue`], [`callbacks`], [`handlers`]: the pieces the bridge is built from.
//! - [`runtime`]: the negotiated descriptor, frame contexts, capability checks.
//! - [`transport`]: `postMessage` and native-bridge transports, window abstraction.
//! - [`config`]: [`BridgeConfig`], loadable from TOML.
//!
//! ---
//!
//! ## Quick start
//!
//! The embedder supplies the windows (anything implementing [`transport::Window`]) and feeds
//! inbound message events to [`Bridge::handle_message`].
//!
//! ```no_run
//! use std::rc::Rc;
//! use frame_bridge::{Bridge, BridgeConfig, BridgeState, HostEnvironment, InboundMessage, Requirement};
//! use frame_bridge::transport::{Window, WindowId};
//! use serde_json::{json, Value};
//!
//! struct MyWindow(u64);
//! impl Window for MyWindow {
//!     fn id(&self) -> WindowId { WindowId(self.0) }
//!     fn is_closed(&self) -> bool { false }
//!     fn post_message(&self, _message: &Value, _target_origin: &str) { /* hand to the platform */ }
//! }
//!
//! # async fn run() -> Result<(), frame_bridge::BridgeError> {
//! let me: Rc<dyn Window> = Rc::new(MyWindow(1));
//! let parent: Rc<dyn Window> = Rc::new(MyWindow(2));
//! let env = HostEnvironment::new(me).with_parent(parent.clone());
//!
//! let mut bridge = Bridge::new(env, BridgeConfig::default())?;
//! bridge.register_handler("themeChange", |args| {
//!     eprintln!("theme is now {:?}", args.first());
//!     None
//! })?;
//! bridge.initialize()?;
//!
//! // ... later, for every message event the platform delivers:
//! bridge.handle_message(InboundMessage::new(
//!     parent.clone(),
//!     "https://teams.microsoft.com",
//!     json!({ "id": 0, "args": ["content", "web", { "apiVersion": 2, "supports": { "calendar": {} } }] }),
//! ));
//! assert_eq!(bridge.state(), BridgeState::Ready);
//!
//! let reply = bridge.call_capability(
//!     &Requirement::new().capability("calendar"),
//!     "calendar.openCalendarItem",
//!     vec![json!({ "itemId": "abc" })],
//! )?;
//! // `reply` completes when the host answers (via another handle_message call).
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```
//!
//! ### Waiting for the handshake
//!
//! [`Bridge::subscribe_state`] hands out a `tokio::sync::watch` receiver; wait on it for
//! [`BridgeState::Ready`] before making capability calls.
//!
//! ---
//!
//! ## Frameless hosts
//!
//! When the environment has no addressable parent (or opener), the bridge runs frameless:
//! envelopes are JSON-stringified and passed to a [`transport::NativeBridge`], and the shell
//! delivers inbound JSON through [`Bridge::handle_native_message`].
//!
//! ```rust
//! use frame_bridge::transport::{NativeBridge, NativeFrameReader, StdioNativeBridge};
//! use std::io::Cursor;
//!
//! let mut wire = Vec::new();
//! StdioNativeBridge::new(&mut wire)
//!     .frameless_post_message(r#"{"id":0,"args":[]}"#)
//!     .unwrap();
//!
//! let mut frames = NativeFrameReader::new(Cursor::new(wire));
//! assert_eq!(frames.read_frame().unwrap().as_deref(), Some(r#"{"id":0,"args":[]}"#));
//! assert!(frames.read_frame().unwrap().is_none());
//! ```
//!
//! ---
//!
//! ## Origin validation
//!
//! Only `https` origins are accepted. The host part is matched against literal hosts and
//! `*.suffix` patterns, where the wildcard stands for exactly one label:
//!
//! ```rust
//! use frame_bridge::origin::matches_host_pattern;
//!
//! assert!(matches_host_pattern("*.teams.microsoft.com", "sub.teams.microsoft.com"));
//! assert!(!matches_host_pattern("*.teams.microsoft.com", "a.b.teams.microsoft.com"));
//! assert!(!matches_host_pattern("*.teams.microsoft.com", "teams.microsoft.com.evil.com"));
//! ```
//!
//! Extra origins come from [`BridgeConfig::additional_valid_origins`] or
//! [`Bridge::initialize_with_origins`]. The bundled list can be replaced once per process by the
//! published document (`{"validOrigins": [...]}`); see [`origin::AllowListCache::prefetch`].
//!
//! ---
//!
//! ## Troubleshooting
//!
//! ### 1) Requests never complete
//! Check:
//! - The parent has sent us at least one message (until then requests are queued; see
//!   [`Bridge::pending_outbound`]).
//! - The parent's origin is on the allow-list or in the extra origins.
//!
//! ### 2) `NotInitialized` from every capability call
//! The handshake response has not arrived yet. Wait for [`BridgeState::Ready`].
//!
//! ### 3) `NotSupported`
//! The host's runtime config does not list the capability, or its SDK version is below the
//! requirement's minimum. Inspect [`Bridge::descriptor`].

pub mod bridge;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod handlers;
pub mod message;
pub mod origin;
pub mod peer;
pub mod queue;
pub mod runtime;
pub mod transport;

// -------- Bridge re-exports --------

#[doc(inline)]
pub use bridge::{Bridge, BridgeState, InboundMessage};
#[doc(inline)]
pub use callbacks::{PendingResponse, Reply, ResponseStream};
#[doc(inline)]
pub use config::BridgeConfig;
#[doc(inline)]
pub use error::{BridgeError, ErrorCode, SdkError};
#[doc(inline)]
pub use runtime::{Capability, FrameContext, HostClientType, Requirement, RuntimeDescriptor};
#[doc(inline)]
pub use transport::HostEnvironment;

// Also handy at the root.
#[doc(inline)]
pub use peer::PeerRole;
