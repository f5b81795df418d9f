//! Socket Data Structures
//!
//! Sockets are the named connection points of a schema variant. Each socket is
//! backed by a provider (input sockets by an input provider, output sockets by
//! an output provider) so values flowing through it can be stored as
//! attribute values keyed by the provider.
//!
//! Annotations are free-text tokens consumed by the auto-wiring engine, which
//! suggests connections between an output socket and input sockets that share a
//! token. They are kept as a set: attaching a token twice is a no-op.

use crate::models::{InputProviderId, OutputProviderId, PropId, SchemaVariantId, SocketId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SocketKind {
    Input,
    Output,
}

impl SocketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketKind::Input => "input",
            SocketKind::Output => "output",
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(SocketKind::Input),
            "output" => Ok(SocketKind::Output),
            other => Err(format!("unknown socket kind: {}", other)),
        }
    }
}

/// How many connections a socket accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SocketArity {
    One,
    #[default]
    Many,
}

impl SocketArity {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketArity::One => "one",
            SocketArity::Many => "many",
        }
    }
}

impl FromStr for SocketArity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(SocketArity::One),
            "many" => Ok(SocketArity::Many),
            other => Err(format!("unknown socket arity: {}", other)),
        }
    }
}

/// Provider backing a socket; its kind always matches the socket kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum SocketProvider {
    Input(InputProviderId),
    Output(OutputProviderId),
}

impl SocketProvider {
    /// Fresh provider matching the socket kind
    pub fn generate(kind: SocketKind) -> Self {
        match kind {
            SocketKind::Input => SocketProvider::Input(InputProviderId::generate()),
            SocketKind::Output => SocketProvider::Output(OutputProviderId::generate()),
        }
    }

    pub fn kind(&self) -> SocketKind {
        match self {
            SocketProvider::Input(_) => SocketKind::Input,
            SocketProvider::Output(_) => SocketKind::Output,
        }
    }
}

/// A materialized socket row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub id: SocketId,
    pub schema_variant_id: SchemaVariantId,
    pub name: String,
    pub kind: SocketKind,
    pub arity: SocketArity,
    /// Prop the socket was derived from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prop_id: Option<PropId>,
    pub provider: SocketProvider,
    #[serde(default)]
    pub annotations: BTreeSet<String>,
}

impl Socket {
    pub fn has_annotation(&self, token: &str) -> bool {
        self.annotations.contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_matches_kind() {
        assert_eq!(
            SocketProvider::generate(SocketKind::Input).kind(),
            SocketKind::Input
        );
        assert_eq!(
            SocketProvider::generate(SocketKind::Output).kind(),
            SocketKind::Output
        );
    }

    #[test]
    fn test_arity_defaults_to_many() {
        assert_eq!(SocketArity::default(), SocketArity::Many);
        assert_eq!("one".parse::<SocketArity>().unwrap(), SocketArity::One);
    }
}
