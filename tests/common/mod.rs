#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Arc;

use frame_bridge::origin::AllowListCache;
use frame_bridge::transport::{NativeBridge, Window, WindowHandle, WindowId};
use frame_bridge::{Bridge, BridgeConfig, BridgeState, HostEnvironment, InboundMessage};
use serde_json::{json, Value};

pub const HOST_ORIGIN: &str = "https://teams.microsoft.com";
pub const CHILD_ORIGIN: &str = "https://outlook.office.com";

/// A window that records everything posted to it.
pub struct FakeWindow {
    id: u64,
    closed: Cell<bool>,
    posted: RefCell<Vec<(Value, String)>>,
}

impl FakeWindow {
    pub fn new(id: u64) -> Rc<Self> {
        Rc::new(Self {
            id,
            closed: Cell::new(false),
            posted: RefCell::new(Vec::new()),
        })
    }

    pub fn close(&self) {
        self.closed.set(true);
    }

    pub fn posted(&self) -> Vec<(Value, String)> {
        self.posted.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.posted.borrow().len()
    }

    pub fn last(&self) -> Option<(Value, String)> {
        self.posted.borrow().last().cloned()
    }

    pub fn handle(self: &Rc<Self>) -> WindowHandle {
        self.clone()
    }
}

impl Window for FakeWindow {
    fn id(&self) -> WindowId {
        WindowId(self.id)
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn post_message(&self, message: &Value, target_origin: &str) {
        self.posted
            .borrow_mut()
            .push((message.clone(), target_origin.to_string()));
    }
}

/// Native interface that keeps every JSON string it was handed.
#[derive(Default)]
pub struct RecordingNative {
    pub sent: RefCell<Vec<String>>,
}

impl RecordingNative {
    pub fn sent_values(&self) -> Vec<Value> {
        self.sent
            .borrow()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

impl NativeBridge for RecordingNative {
    fn frameless_post_message(&self, json: &str) -> io::Result<()> {
        self.sent.borrow_mut().push(json.to_string());
        Ok(())
    }
}

/// `Write` into a buffer the test can still read after handing it to the bridge.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Framed {
    pub bridge: Bridge,
    pub me: Rc<FakeWindow>,
    pub parent: Rc<FakeWindow>,
}

/// Bridge in a frame with a parent, using a private bundled allow-list.
pub fn framed_with(config: BridgeConfig) -> Framed {
    init_tracing();
    let me = FakeWindow::new(1);
    let parent = FakeWindow::new(2);
    let env = HostEnvironment::new(me.handle()).with_parent(parent.handle());
    let bridge =
        Bridge::with_allow_list(env, config, Arc::new(AllowListCache::bundled())).unwrap();
    Framed { bridge, me, parent }
}

pub fn framed() -> Framed {
    framed_with(BridgeConfig::default())
}

pub fn msg(from: &Rc<FakeWindow>, origin: &str, data: Value) -> InboundMessage {
    InboundMessage::new(from.handle(), origin, data)
}

pub fn default_runtime() -> Value {
    json!({
        "apiVersion": 2,
        "supports": {
            "calendar": {},
            "pages": { "backStack": {}, "tabs": {} }
        }
    })
}

/// `[frameContext, hostClientType, runtimeConfig, clientSupportedSdkVersion]`.
pub fn handshake_response(id: u64, runtime: Value) -> Value {
    json!({ "id": id, "args": ["content", "web", runtime, "2.0.5"] })
}

/// Initialized, handshake answered by the parent from `HOST_ORIGIN`.
pub fn ready() -> Framed {
    let mut f = framed();
    f.bridge.initialize().unwrap();
    f.bridge
        .handle_message(msg(&f.parent, HOST_ORIGIN, handshake_response(0, default_runtime())));
    assert_eq!(f.bridge.state(), BridgeState::Ready);
    f
}
