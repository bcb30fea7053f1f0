//! What the host told us during the handshake, and the checks built on it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Host SDK version assumed when the handshake response does not carry one.
pub const DEFAULT_CLIENT_SDK_VERSION: &str = "2.0.1";

/// Runtime api version of the descriptor generated for hosts that predate runtime configs.
pub const BACK_COMPAT_API_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameContext {
    Settings,
    Content,
    Authentication,
    Remove,
    Task,
    SidePanel,
    Stage,
    MeetingStage,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostClientType {
    Desktop,
    Web,
    Android,
    Ios,
    Ipados,
    Macos,
    Rigel,
    SurfaceHub,
    TeamsRoomsWindows,
    TeamsRoomsAndroid,
    TeamsPhones,
    TeamsDisplays,
    #[serde(other)]
    Unknown,
}

/// Dotted path into the runtime's `supports` tree, e.g. `pages.backStack`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability(String);

impl Capability {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The host's runtime config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    pub api_version: u32,
    #[serde(default)]
    pub is_legacy_teams: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_versions_info: Option<Value>,
    #[serde(default)]
    pub supports: Map<String, Value>,
}

impl Runtime {
    pub fn supports(&self, capability: &Capability) -> bool {
        let mut node = &self.supports;
        let mut segments = capability.segments().peekable();
        if segments.peek().is_none() {
            return false;
        }
        while let Some(segment) = segments.next() {
            match node.get(segment) {
                Some(Value::Object(child)) => node = child,
                Some(v) if segments.peek().is_none() => return crate::handlers::is_truthy(v),
                _ => return false,
            }
        }
        true
    }
}

/// Compare dotted numeric versions (`"2.0.1"`). Missing parts count as zero.
/// `None` when either side is not a version.
pub fn compare_sdk_versions(a: &str, b: &str) -> Option<Ordering> {
    fn parts(v: &str) -> Option<Vec<u64>> {
        if v.is_empty() {
            return None;
        }
        v.split('.').map(|p| p.parse::<u64>().ok()).collect()
    }
    let (a, b) = (parts(a)?, parts(b)?);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

fn base_legacy_supports() -> Map<String, Value> {
    let value = json!({
        "appInstallDialog": {},
        "appEntity": {},
        "call": {},
        "chat": {},
        "conversations": {},
        "dialog": {
            "card": { "bot": {} },
            "url": { "bot": {}, "parentCommunication": {} },
            "update": {}
        },
        "interactive": {},
        "logs": {},
        "meetingRoom": {},
        "menus": {},
        "monetization": {},
        "notifications": {},
        "pages": {
            "appButton": {},
            "backStack": {},
            "config": {},
            "currentApp": {},
            "fullTrust": {},
            "tabs": {}
        },
        "remoteCamera": {},
        "stageView": {},
        "teams": { "fullTrust": {} },
        "teamsCore": {},
        "video": { "sharedFrame": {} }
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

struct VersionedCapability {
    since: &'static str,
    path: &'static [&'static str],
    clients: &'static [HostClientType],
}

const ALL_LEGACY_CLIENTS: &[HostClientType] = &[
    HostClientType::Desktop,
    HostClientType::Web,
    HostClientType::Android,
    HostClientType::Ios,
    HostClientType::Ipados,
    HostClientType::Rigel,
    HostClientType::SurfaceHub,
    HostClientType::TeamsRoomsWindows,
    HostClientType::TeamsRoomsAndroid,
    HostClientType::TeamsPhones,
    HostClientType::TeamsDisplays,
];

const MOBILE_CLIENTS: &[HostClientType] = &[
    HostClientType::Android,
    HostClientType::Ios,
    HostClientType::Ipados,
];

/// Capabilities older hosts gained at a given SDK version.
const VERSIONED_CAPABILITIES: &[VersionedCapability] = &[
    VersionedCapability {
        since: "1.9.0",
        path: &["location"],
        clients: ALL_LEGACY_CLIENTS,
    },
    VersionedCapability {
        since: "2.0.0",
        path: &["people"],
        clients: ALL_LEGACY_CLIENTS,
    },
    VersionedCapability {
        since: "2.0.0",
        path: &["sharing"],
        clients: &[HostClientType::Desktop, HostClientType::Web],
    },
    VersionedCapability {
        since: "2.0.1",
        path: &["teams", "fullTrust", "joinedTeams"],
        clients: ALL_LEGACY_CLIENTS,
    },
    VersionedCapability {
        since: "2.0.5",
        path: &["webStorage"],
        clients: MOBILE_CLIENTS,
    },
];

fn insert_path(map: &mut Map<String, Value>, path: &[&str]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let entry = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(child) = entry {
        insert_path(child, rest);
    }
}

/// Runtime for hosts that only report an SDK version.
pub fn generate_back_compat_runtime(
    client_sdk_version: &str,
    host_client_type: Option<HostClientType>,
) -> Runtime {
    let mut supports = base_legacy_supports();
    for entry in VERSIONED_CAPABILITIES {
        let version_ok = matches!(
            compare_sdk_versions(client_sdk_version, entry.since),
            Some(Ordering::Greater | Ordering::Equal)
        );
        let client_ok = host_client_type.map_or(true, |c| entry.clients.contains(&c));
        if version_ok && client_ok {
            insert_path(&mut supports, entry.path);
        }
    }
    Runtime {
        api_version: BACK_COMPAT_API_VERSION,
        is_legacy_teams: true,
        host_versions_info: None,
        supports,
    }
}

/// Negotiated once per session; gates every capability call.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeDescriptor {
    pub frame_context: Option<FrameContext>,
    pub host_client_type: Option<HostClientType>,
    pub client_supported_sdk_version: String,
    pub runtime: Runtime,
}

fn enum_slot<T: for<'de> Deserialize<'de>>(slot: Option<&Value>) -> Option<T> {
    match slot {
        Some(v @ Value::String(_)) => serde_json::from_value(v.clone()).ok(),
        _ => None,
    }
}

fn runtime_from_object(value: Value) -> Result<Runtime, BridgeError> {
    if value.get("apiVersion").map_or(true, Value::is_null) {
        return Err(BridgeError::InitializationFailed(
            "received a runtime config without apiVersion".into(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| BridgeError::InitializationFailed(format!("unusable runtime config: {e}")))
}

impl RuntimeDescriptor {
    /// Build a descriptor from the handshake response args:
    /// `[frameContext, hostClientType, runtimeConfig, clientSupportedSdkVersion]`.
    pub fn from_handshake(args: &[Value]) -> Result<Self, BridgeError> {
        let frame_context = enum_slot::<FrameContext>(args.first());
        let host_client_type = enum_slot::<HostClientType>(args.get(1));
        let mut version = args
            .get(3)
            .and_then(Value::as_str)
            .filter(|v| compare_sdk_versions(v, DEFAULT_CLIENT_SDK_VERSION).is_some())
            .unwrap_or(DEFAULT_CLIENT_SDK_VERSION)
            .to_string();

        let runtime = match args.get(2) {
            Some(obj @ Value::Object(_)) => runtime_from_object(obj.clone())?,
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed @ Value::Object(_)) => runtime_from_object(parsed)?,
                Ok(_) => {
                    return Err(BridgeError::InitializationFailed(format!(
                        "runtime config {raw:?} is neither an object nor a version"
                    )))
                }
                Err(_) => {
                    // An older host sends its SDK version here instead of a config.
                    if compare_sdk_versions(raw, DEFAULT_CLIENT_SDK_VERSION).is_some() {
                        version = raw.clone();
                    } else {
                        warn!(value = %raw, "ignoring unrecognised runtime config");
                    }
                    debug!(%version, "generating back-compat runtime");
                    generate_back_compat_runtime(&version, host_client_type)
                }
            },
            None | Some(Value::Null) => generate_back_compat_runtime(&version, host_client_type),
            Some(other) => {
                return Err(BridgeError::InitializationFailed(format!(
                    "unexpected runtime config {other}"
                )))
            }
        };

        Ok(Self {
            frame_context,
            host_client_type,
            client_supported_sdk_version: version,
            runtime,
        })
    }

    pub fn supports(&self, capability: &Capability) -> bool {
        self.runtime.supports(capability)
    }

    pub fn is_version_at_least(&self, required: &str) -> bool {
        matches!(
            compare_sdk_versions(&self.client_supported_sdk_version, required),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// Frame context, then minimum version, then capability.
    pub fn check(&self, requirement: &Requirement) -> Result<(), BridgeError> {
        if !requirement.frame_contexts.is_empty()
            && !self
                .frame_context
                .is_some_and(|c| requirement.frame_contexts.contains(&c))
        {
            return Err(BridgeError::WrongFrameContext {
                allowed: requirement.frame_contexts.clone(),
                current: self.frame_context,
            });
        }
        if let Some(min) = &requirement.min_version {
            if !self.is_version_at_least(min) {
                return Err(BridgeError::NotSupported(format!(
                    "host version {} is below required {min}",
                    self.client_supported_sdk_version
                )));
            }
        }
        if let Some(cap) = &requirement.capability {
            if !self.supports(cap) {
                return Err(BridgeError::NotSupported(format!(
                    "capability {cap} is not supported by the host"
                )));
            }
        }
        Ok(())
    }
}

/// Preconditions for a capability call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement {
    pub frame_contexts: Vec<FrameContext>,
    pub capability: Option<Capability>,
    pub min_version: Option<String>,
}

impl Requirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_contexts(mut self, contexts: impl IntoIterator<Item = FrameContext>) -> Self {
        self.frame_contexts = contexts.into_iter().collect();
        self
    }

    pub fn capability(mut self, capability: impl Into<Capability>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }
}
