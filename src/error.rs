use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runtime::FrameContext;

/// Everything the bridge can report to application code.
///
/// Pre-flight failures (`NotInitialized`, `WrongFrameContext`, `NotSupported`,
/// `InvalidArguments`) are returned synchronously before any envelope is sent.
/// `Host` arrives later through the response future. Transport anomalies are
/// never reported; the dispatcher drops them.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("the bridge is not initialized; call initialize() and wait for the handshake to complete")]
    NotInitialized,

    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("this call is only allowed in the following contexts: {allowed:?}; current context: {current:?}")]
    WrongFrameContext {
        allowed: Vec<FrameContext>,
        current: Option<FrameContext>,
    },

    #[error("not supported on this platform: {0}")]
    NotSupported(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("host reported an error: {0}")]
    Host(SdkError),

    /// The continuation was dropped (bridge torn down) before a response arrived.
    #[error("the bridge was torn down before a response arrived")]
    Disconnected,

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "remote-allowlist")]
    #[error("remote allow-list fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Well-known error codes a host puts in the `errorCode` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ErrorCode {
    NotSupportedOnPlatform = 100,
    InternalError = 500,
    NotSupportedInCurrentContext = 501,
    PermissionDenied = 1000,
    NetworkError = 2000,
    NoHwSupport = 3000,
    InvalidArguments = 4000,
    UnauthorizedUserOperation = 5000,
    InsufficientResources = 6000,
    Throttle = 7000,
    UserAbort = 8000,
    OperationTimedOut = 8001,
    OldPlatform = 9000,
    FileNotFound = 404,
    SizeExceeded = 10000,
}

impl ErrorCode {
    pub fn from_code(code: i64) -> Option<Self> {
        use ErrorCode::*;
        Some(match code {
            100 => NotSupportedOnPlatform,
            500 => InternalError,
            501 => NotSupportedInCurrentContext,
            1000 => PermissionDenied,
            2000 => NetworkError,
            3000 => NoHwSupport,
            4000 => InvalidArguments,
            5000 => UnauthorizedUserOperation,
            6000 => InsufficientResources,
            7000 => Throttle,
            8000 => UserAbort,
            8001 => OperationTimedOut,
            9000 => OldPlatform,
            404 => FileNotFound,
            10000 => SizeExceeded,
            _ => return None,
        })
    }
}

/// Error payload a host places in `args[0]` of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkError {
    pub error_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SdkError {
    pub fn code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.error_code)
    }

    /// Interpret the error slot of a response.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) mean success. Anything else is an
    /// error; shapes that are not `{errorCode, message}` are wrapped as an internal
    /// error carrying the raw value as text.
    pub fn from_slot(slot: &Value) -> Option<Self> {
        if !crate::handlers::is_truthy(slot) {
            return None;
        }
        match serde_json::from_value::<SdkError>(slot.clone()) {
            Ok(err) => Some(err),
            Err(_) => Some(SdkError {
                error_code: ErrorCode::InternalError as i64,
                message: Some(match slot {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            }),
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "code {}: {}", self.error_code, m),
            None => write!(f, "code {}", self.error_code),
        }
    }
}

impl std::error::Error for SdkError {}
