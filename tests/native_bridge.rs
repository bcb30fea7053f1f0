mod common;

use std::io::{self, Cursor};
use std::rc::Rc;
use std::sync::Arc;

use common::{default_runtime, handshake_response, msg, FakeWindow, RecordingNative, SharedBuf, HOST_ORIGIN};
use frame_bridge::origin::AllowListCache;
use frame_bridge::transport::{
    NativeBridge, NativeFrameReader, StdioNativeBridge, MAX_FROM_HOST, MAX_TO_HOST,
};
use frame_bridge::{Bridge, BridgeConfig, BridgeError, BridgeState, HostEnvironment};
use serde_json::{json, Value};

fn frameless(native: Option<Rc<dyn NativeBridge>>) -> (Bridge, Rc<FakeWindow>) {
    common::init_tracing();
    let me = FakeWindow::new(1);
    let mut env = HostEnvironment::new(me.handle());
    if let Some(native) = native {
        env = env.with_native(native);
    }
    let bridge =
        Bridge::with_allow_list(env, BridgeConfig::default(), Arc::new(AllowListCache::bundled())).unwrap();
    (bridge, me)
}

fn framed_bytes(messages: &[&str]) -> Vec<u8> {
    let buf = SharedBuf::default();
    let native = StdioNativeBridge::new(buf.clone());
    for m in messages {
        native.frameless_post_message(m).unwrap();
    }
    let bytes = buf.0.borrow().clone();
    bytes
}

#[test]
fn frame_round_trip() {
    let json = r#"{"id":3,"func":"getContext","args":[]}"#;
    let bytes = framed_bytes(&[json]);
    assert_eq!(bytes.len(), 4 + json.len());
    assert_eq!(&bytes[..4], &(json.len() as u32).to_ne_bytes());

    let mut reader = NativeFrameReader::new(Cursor::new(bytes));
    assert_eq!(reader.read_frame().unwrap().as_deref(), Some(json));
    assert!(reader.read_frame().unwrap().is_none());
}

#[test]
fn consecutive_frames_decode_in_order() {
    let bytes = framed_bytes(&["\"a\"", "\"bb\"", "{}"]);
    let frames: Vec<String> = NativeFrameReader::new(Cursor::new(bytes))
        .collect::<io::Result<_>>()
        .unwrap();
    assert_eq!(frames, vec!["\"a\"", "\"bb\"", "{}"]);
}

#[test]
fn truncated_frames_are_unexpected_eof() {
    let mut bytes = framed_bytes(&["{\"id\":1}"]);
    bytes.truncate(bytes.len() - 2);
    let err = NativeFrameReader::new(Cursor::new(bytes)).read_frame().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

    let err = NativeFrameReader::new(Cursor::new(vec![7u8, 0]))
        .read_frame()
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn outgoing_frames_are_capped() {
    let buf = SharedBuf::default();
    let native = StdioNativeBridge::new(buf.clone());

    let big = "x".repeat(MAX_TO_HOST + 1);
    let err = native.frameless_post_message(&big).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert!(buf.0.borrow().is_empty(), "nothing written for a refused frame");

    let exact = "x".repeat(MAX_TO_HOST);
    native.frameless_post_message(&exact).unwrap();
    assert_eq!(buf.0.borrow().len(), 4 + MAX_TO_HOST);
}

#[test]
fn incoming_frames_respect_max_size() {
    let bytes = framed_bytes(&["0123456789"]);
    let err = NativeFrameReader::new(Cursor::new(bytes))
        .with_max_size(4)
        .read_frame()
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    // A declared length above the hard cap is refused before reading the body.
    let mut header = ((MAX_FROM_HOST + 1) as u32).to_ne_bytes().to_vec();
    header.extend_from_slice(b"{}");
    let err = NativeFrameReader::new(Cursor::new(header))
        .with_max_size(usize::MAX)
        .read_frame()
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn incoming_frames_must_be_utf8() {
    let mut bytes = 2u32.to_ne_bytes().to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe]);
    let err = NativeFrameReader::new(Cursor::new(bytes)).read_frame().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn frameless_session_talks_through_native_interface() {
    let native = Rc::new(RecordingNative::default());
    let (mut bridge, me) = frameless(Some(native.clone() as Rc<dyn NativeBridge>));

    bridge.initialize().unwrap();
    assert!(bridge.is_frameless());
    assert_eq!(bridge.state(), BridgeState::AwaitingHandshake);
    assert_eq!(
        native.sent_values(),
        vec![json!({"id": 0, "func": "initialize", "args": ["2.0.1"]})]
    );

    bridge.handle_native_message(&handshake_response(0, default_runtime()).to_string());
    assert_eq!(bridge.state(), BridgeState::Ready);

    // No origin to wait for: requests go out immediately.
    let reply = bridge.send_request("getContext", vec![]).unwrap();
    assert_eq!(bridge.pending_outbound(frame_bridge::PeerRole::Parent), 0);
    assert_eq!(
        native.sent_values().last().unwrap(),
        &json!({"id": 1, "func": "getContext", "args": []})
    );

    bridge.handle_native_message(r#"{"id":1,"args":[null,{"locale":"en-us"}]}"#);
    assert_eq!(reply.await.unwrap(), json!({"locale": "en-us"}));
    assert_eq!(me.count(), 0);
}

#[test]
fn frameless_bridge_ignores_window_messages() {
    let native = Rc::new(RecordingNative::default());
    let (mut bridge, _me) = frameless(Some(native.clone() as Rc<dyn NativeBridge>));
    bridge.initialize().unwrap();

    let stranger = FakeWindow::new(5);
    bridge.handle_message(msg(&stranger, HOST_ORIGIN, handshake_response(0, default_runtime())));
    assert_eq!(bridge.state(), BridgeState::AwaitingHandshake);

    bridge.handle_native_message("not json");
    bridge.handle_native_message("[1,2,3]");
    assert_eq!(bridge.state(), BridgeState::AwaitingHandshake);
}

#[test]
fn native_events_reach_handlers() {
    let native = Rc::new(RecordingNative::default());
    let (mut bridge, _me) = frameless(Some(native.clone() as Rc<dyn NativeBridge>));
    let seen = Rc::new(std::cell::RefCell::new(Vec::<Value>::new()));
    let sink = seen.clone();
    bridge
        .register_handler("themeChange", move |args| {
            sink.borrow_mut().extend(args.iter().cloned());
            None
        })
        .unwrap();
    bridge.initialize().unwrap();
    bridge.handle_native_message(r#"{"func":"themeChange","args":["dark"]}"#);
    assert_eq!(*seen.borrow(), vec![json!("dark")]);
}

#[test]
fn framed_bridge_ignores_native_messages() {
    let mut f = common::framed();
    f.bridge.initialize().unwrap();
    f.bridge
        .handle_native_message(&handshake_response(0, default_runtime()).to_string());
    assert_eq!(f.bridge.state(), BridgeState::AwaitingHandshake);
}

#[test]
fn missing_native_interface_drops_sends() {
    let (mut bridge, _me) = frameless(None);
    bridge.initialize().unwrap();
    assert!(bridge.is_frameless());
    assert_eq!(bridge.state(), BridgeState::AwaitingHandshake);
}

struct BrokenPipe;

impl NativeBridge for BrokenPipe {
    fn frameless_post_message(&self, _json: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "shell went away"))
    }
}

#[test]
fn native_write_failure_fails_initialization() {
    let (mut bridge, _me) = frameless(Some(Rc::new(BrokenPipe) as Rc<dyn NativeBridge>));
    assert!(matches!(bridge.initialize(), Err(BridgeError::Io(_))));
    assert_eq!(bridge.state(), BridgeState::Failed);
    assert_eq!(bridge.pending_callbacks(), 0);
}

#[test]
fn stdio_bridge_writes_length_prefixed_frames() {
    let buf = SharedBuf::default();
    let native: Rc<dyn NativeBridge> = Rc::new(StdioNativeBridge::new(buf.clone()));
    let (mut bridge, _me) = frameless(Some(native));
    bridge.initialize().unwrap();

    let bytes = buf.0.borrow().clone();
    let mut frames = NativeFrameReader::new(Cursor::new(bytes));
    let raw = frames.read_frame().unwrap().unwrap();
    let handshake: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(handshake["func"], "initialize");
    assert_eq!(handshake["id"], 0);
    assert!(frames.read_frame().unwrap().is_none());
}
