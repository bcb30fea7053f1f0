//! Named handlers for events pushed by the host (and requests from a child).

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::BridgeError;

/// A registered handler. `Some(value)` means "handled here, with this result";
/// `None` lets the default behavior run.
pub type Handler = Box<dyn FnMut(&[Value]) -> Option<Value>>;

/// JavaScript-style truthiness, used for handler results and error slots.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Events the bridge has default behavior for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEvent {
    /// Falls back to `navigateBack` unless a handler returns something truthy.
    BackButtonPress,
    /// Falls back to `readyToUnload` unless a handler returns something truthy.
    BeforeUnload,
    /// Relayed to the child after the local handler ran.
    ThemeChange,
}

impl BuiltinEvent {
    pub const ALL: [BuiltinEvent; 3] = [
        BuiltinEvent::BackButtonPress,
        BuiltinEvent::BeforeUnload,
        BuiltinEvent::ThemeChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinEvent::BackButtonPress => "backButtonPress",
            BuiltinEvent::BeforeUnload => "beforeUnload",
            BuiltinEvent::ThemeChange => "themeChange",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

impl fmt::Display for BuiltinEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of [`HandlerRegistry::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    NotRegistered,
    Returned(Option<Value>),
}

impl Invocation {
    /// Handler ran and produced a truthy value.
    pub fn handled(&self) -> bool {
        matches!(self, Invocation::Returned(Some(v)) if is_truthy(v))
    }
}

fn validate_event_name(name: &str) -> Result<(), BridgeError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(BridgeError::InvalidArguments(format!(
            "invalid event name {name:?}"
        )));
    }
    Ok(())
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`, replacing any earlier one.
    pub fn register(&mut self, name: &str, handler: Handler) -> Result<(), BridgeError> {
        validate_event_name(name)?;
        if self.handlers.insert(name.to_string(), handler).is_some() {
            debug!(event = name, "handler replaced");
        }
        Ok(())
    }

    /// `None` removes the registration.
    pub fn set(&mut self, name: &str, handler: Option<Handler>) -> Result<(), BridgeError> {
        match handler {
            Some(h) => self.register(name, h),
            None => {
                self.unregister(name);
                Ok(())
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Invocation {
        match self.handlers.get_mut(name) {
            Some(handler) => {
                trace!(event = name, "invoking handler");
                Invocation::Returned(handler(args))
            }
            None => Invocation::NotRegistered,
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
