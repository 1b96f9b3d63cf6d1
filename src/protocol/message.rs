//! Typed views over decoded key/value messages.

use serde::Serialize;
use std::fmt;

use crate::protocol::codec::{self, KvMap};

/// First frame a device sends: who it is and which plugin it controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub source: String,
    pub plugin: String,
}

impl Registration {
    /// Extract the registration fields; `None` when either is missing or empty.
    pub fn from_map(map: &KvMap) -> Option<Self> {
        let source = map.get("source").filter(|s| !s.is_empty())?;
        let plugin = map.get("plugin")?;
        Some(Self {
            source: source.clone(),
            plugin: plugin.clone(),
        })
    }

    pub fn encode(&self) -> String {
        codec::encode([("source", self.source.as_str()), ("plugin", self.plugin.as_str())])
    }
}

/// Index into a connection's reported values.
///
/// Kept as a pair rather than a concatenated string so that, e.g.,
/// (`control`, `1`) and (`control1`, ``) never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CompositeKey {
    pub kind: String,
    pub key: String,
}

impl CompositeKey {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// A parameter value pushed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub key: CompositeKey,
    pub value: String,
}

impl Report {
    /// Reports carry `type`, `key` and `value`; anything else is only logged.
    pub fn from_map(map: &KvMap) -> Option<Self> {
        let kind = map.get("type")?;
        let key = map.get("key")?;
        let value = map.get("value")?;
        Some(Self {
            key: CompositeKey::new(kind.clone(), key.clone()),
            value: value.clone(),
        })
    }

    pub fn encode(&self) -> String {
        codec::encode([
            ("type", self.key.kind.as_str()),
            ("key", self.key.key.as_str()),
            ("value", self.value.as_str()),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Get,
    Set,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Get => "get",
            CommandKind::Set => "set",
        }
    }
}

/// A server→device instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `cmd|get||type|..||key|..`
    Get { key: CompositeKey },
    /// `cmd|set||type|..||key|..||value|..`
    Set { key: CompositeKey, value: String },
    /// Legacy untagged `type|..||key|..||value|..`, sent as given.
    Raw {
        kind: String,
        key: String,
        value: String,
    },
}

impl Command {
    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            Command::Get { .. } => Some(CommandKind::Get),
            Command::Set { .. } => Some(CommandKind::Set),
            Command::Raw { .. } => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Command::Get { key } => codec::encode([
                ("cmd", CommandKind::Get.as_str()),
                ("type", key.kind.as_str()),
                ("key", key.key.as_str()),
            ]),
            Command::Set { key, value } => codec::encode([
                ("cmd", CommandKind::Set.as_str()),
                ("type", key.kind.as_str()),
                ("key", key.key.as_str()),
                ("value", value.as_str()),
            ]),
            Command::Raw { kind, key, value } => codec::encode([
                ("type", kind.as_str()),
                ("key", key.as_str()),
                ("value", value.as_str()),
            ]),
        }
    }

    /// Parse a command as a device sees it.
    pub fn from_map(map: &KvMap) -> Option<Self> {
        let kind = map.get("type")?.clone();
        let key = map.get("key")?.clone();
        match map.get("cmd").map(String::as_str) {
            Some("get") => Some(Command::Get {
                key: CompositeKey::new(kind, key),
            }),
            Some("set") => Some(Command::Set {
                key: CompositeKey::new(kind, key),
                value: map.get("value")?.clone(),
            }),
            Some(_) => None,
            None => Some(Command::Raw {
                kind,
                key,
                value: map.get("value").cloned().unwrap_or_default(),
            }),
        }
    }
}
