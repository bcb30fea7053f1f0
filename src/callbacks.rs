//! Request/response correlation.
//!
//! Every outbound request gets an id and a continuation stored under it. When a
//! response with that id arrives the continuation is removed and run, so it fires
//! at most once. Partial responses keep streaming continuations alive until the
//! final chunk.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::error::{BridgeError, SdkError};
use crate::message::{MessageId, MessageResponse};

/// What to do with the args of a correlated response.
pub(crate) enum Continuation {
    Oneshot(oneshot::Sender<Vec<Value>>),
    Stream(mpsc::UnboundedSender<Vec<Value>>),
    Callback(Box<dyn FnOnce(Vec<Value>)>),
    /// A request proxied upstream on behalf of the child; answer the child's id.
    RelayToChild(MessageId),
    /// Our own initialization request.
    Handshake,
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Oneshot(_) => f.write_str("Oneshot"),
            Continuation::Stream(_) => f.write_str("Stream"),
            Continuation::Callback(_) => f.write_str("Callback"),
            Continuation::RelayToChild(id) => write!(f, "RelayToChild({id})"),
            Continuation::Handshake => f.write_str("Handshake"),
        }
    }
}

/// Outcome of [`CallbackCorrelator::resolve`] that the dispatcher must act on.
#[derive(Debug, PartialEq)]
pub(crate) enum Resolution {
    /// Delivered to application code.
    Delivered,
    Relay {
        child_request_id: MessageId,
        args: Vec<Value>,
        is_partial_response: bool,
    },
    Handshake(Vec<Value>),
    /// Nothing waiting on this id.
    Unmatched,
}

#[derive(Debug, Default)]
pub struct CallbackCorrelator {
    pending: HashMap<MessageId, Continuation>,
}

impl CallbackCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn register(&mut self, id: MessageId, continuation: Continuation) {
        trace!(%id, ?continuation, "awaiting response");
        self.pending.insert(id, continuation);
    }

    pub(crate) fn forget(&mut self, id: MessageId) {
        self.pending.remove(&id);
    }

    pub(crate) fn resolve(&mut self, response: MessageResponse) -> Resolution {
        let MessageResponse {
            id,
            args,
            is_partial_response,
        } = response;

        let Some(continuation) = self.pending.remove(&id) else {
            trace!(%id, "no continuation for response");
            return Resolution::Unmatched;
        };

        match continuation {
            Continuation::Oneshot(tx) => {
                // Receiver may have been dropped; nothing else to do then.
                let _ = tx.send(args);
                Resolution::Delivered
            }
            Continuation::Callback(f) => {
                f(args);
                Resolution::Delivered
            }
            Continuation::Stream(tx) => {
                let open = tx.send(args).is_ok();
                if is_partial_response && open {
                    self.pending.insert(id, Continuation::Stream(tx));
                }
                Resolution::Delivered
            }
            Continuation::RelayToChild(child_request_id) => {
                if is_partial_response {
                    self.pending.insert(id, Continuation::RelayToChild(child_request_id));
                }
                Resolution::Relay {
                    child_request_id,
                    args,
                    is_partial_response,
                }
            }
            Continuation::Handshake => Resolution::Handshake(args),
        }
    }
}

/// Raw response args for one request.
#[derive(Debug)]
pub struct PendingResponse {
    id: MessageId,
    rx: oneshot::Receiver<Vec<Value>>,
}

impl PendingResponse {
    pub(crate) fn channel(id: MessageId) -> (oneshot::Sender<Vec<Value>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { id, rx })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Vec<Value>, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| BridgeError::Disconnected))
    }
}

/// Split response args into the error slot and the result payload.
///
/// `args[0]` is the error indicator; one remaining value is returned as is,
/// several are returned as an array, none as `null`.
pub fn interpret_response(mut args: Vec<Value>) -> Result<Value, BridgeError> {
    if args.is_empty() {
        return Ok(Value::Null);
    }
    let slot = args.remove(0);
    if let Some(err) = SdkError::from_slot(&slot) {
        return Err(BridgeError::Host(err));
    }
    Ok(match args.len() {
        0 => Value::Null,
        1 => args.remove(0),
        _ => Value::Array(args),
    })
}

/// Error-first response to one request: resolves to the result or the host error.
#[derive(Debug)]
pub struct Reply {
    inner: PendingResponse,
}

impl Reply {
    pub(crate) fn new(inner: PendingResponse) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> MessageId {
        self.inner.id
    }
}

impl Future for Reply {
    type Output = Result<Value, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|r| r.and_then(interpret_response))
    }
}

/// Every chunk of a streamed response, ending after the final (non-partial) one.
#[derive(Debug)]
pub struct ResponseStream {
    id: MessageId,
    rx: mpsc::UnboundedReceiver<Vec<Value>>,
}

impl ResponseStream {
    pub(crate) fn channel(id: MessageId) -> (mpsc::UnboundedSender<Vec<Value>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { id, rx })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Next chunk, or `None` once the final response was delivered (or the
    /// bridge was torn down).
    pub async fn next(&mut self) -> Option<Vec<Value>> {
        self.rx.recv().await
    }
}
