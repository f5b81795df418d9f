//! Prop Data Structures
//!
//! A prop is one typed field of a resource schema. Props form a strict tree
//! through parent edges; only container kinds (object, array, map) may have
//! children, and arrays and maps have exactly one entry child.
//!
//! # Example Tree
//!
//! ```text
//! root (object)
//! ├── domain (object)
//! │   ├── GatewayId (string)
//! │   └── Tags (array)
//! │       └── Tag (object)
//! ├── secrets (object)
//! ├── resource (object)
//! └── extra (object)
//!     └── PropUsageMap (string)
//! ```

use crate::models::PropId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value a prop holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropKind {
    Object,
    Array,
    Map,
    String,
    Integer,
    Boolean,
}

impl PropKind {
    /// Whether props of this kind may have children
    pub fn is_container(&self) -> bool {
        matches!(self, PropKind::Object | PropKind::Array | PropKind::Map)
    }

    /// Arrays and maps hold exactly one entry definition
    pub fn has_single_entry(&self) -> bool {
        matches!(self, PropKind::Array | PropKind::Map)
    }

    /// Value seeded as the schema-level default when none is declared
    pub fn empty_value(&self) -> serde_json::Value {
        match self {
            PropKind::Object | PropKind::Map => serde_json::json!({}),
            PropKind::Array => serde_json::json!([]),
            PropKind::String | PropKind::Integer | PropKind::Boolean => serde_json::Value::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropKind::Object => "object",
            PropKind::Array => "array",
            PropKind::Map => "map",
            PropKind::String => "string",
            PropKind::Integer => "integer",
            PropKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" => Ok(PropKind::Object),
            "array" => Ok(PropKind::Array),
            "map" => Ok(PropKind::Map),
            "string" => Ok(PropKind::String),
            "integer" => Ok(PropKind::Integer),
            "boolean" => Ok(PropKind::Boolean),
            other => Err(format!("unknown prop kind: {}", other)),
        }
    }
}

/// Editor widget attached to a prop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Widget {
    Text,
    TextArea,
    Checkbox,
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Header,
    Array,
    Map,
    /// Secret input; `secret_kind` names the kind of secret it accepts
    #[serde(rename_all = "camelCase")]
    Secret { secret_kind: String },
}

impl Widget {
    /// Widget used when a definition does not name one
    pub fn default_for(kind: PropKind) -> Self {
        match kind {
            PropKind::Object => Widget::Header,
            PropKind::Array => Widget::Array,
            PropKind::Map => Widget::Map,
            PropKind::Boolean => Widget::Checkbox,
            PropKind::String | PropKind::Integer => Widget::Text,
        }
    }

    pub fn secret_kind(&self) -> Option<&str> {
        match self {
            Widget::Secret { secret_kind } => Some(secret_kind),
            _ => None,
        }
    }
}

/// A materialized prop row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub id: PropId,
    pub name: String,
    pub kind: PropKind,
    pub widget: Widget,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    /// Stored logical path, e.g. `["root", "domain", "GatewayId"]`
    pub path: Vec<String>,
}

impl Prop {
    /// Stored path joined with `/`
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }
}

/// A prop with its (non-hidden) descendants, as returned by tree queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropTreeNode {
    pub prop: Prop,
    pub children: Vec<PropTreeNode>,
}

impl PropTreeNode {
    /// Depth-first iterator over every prop in the tree, root included
    pub fn iter(&self) -> impl Iterator<Item = &Prop> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(&node.prop)
        })
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<&PropTreeNode> {
        self.children.iter().find(|c| c.prop.name == name)
    }

    /// Descendant reached by walking child names from this node
    pub fn descend<S: AsRef<str>>(&self, path: &[S]) -> Option<&PropTreeNode> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    /// Number of props in the tree, root included
    pub fn prop_count(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, kind: PropKind) -> Prop {
        Prop {
            id: PropId::generate(),
            name: name.to_string(),
            kind,
            widget: Widget::default_for(kind),
            hidden: false,
            doc_link: None,
            path: vec!["root".to_string(), name.to_string()],
        }
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            PropKind::Object,
            PropKind::Array,
            PropKind::Map,
            PropKind::String,
            PropKind::Integer,
            PropKind::Boolean,
        ] {
            assert_eq!(kind.as_str().parse::<PropKind>().unwrap(), kind);
        }
        assert!("float".parse::<PropKind>().is_err());
    }

    #[test]
    fn test_secret_widget_serialization() {
        let widget = Widget::Secret {
            secret_kind: "Secret String".to_string(),
        };
        let json = serde_json::to_value(&widget).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "secret", "secretKind": "Secret String"})
        );
        assert_eq!(widget.secret_kind(), Some("Secret String"));
    }

    #[test]
    fn test_tree_iteration_and_descend() {
        let tree = PropTreeNode {
            prop: prop("domain", PropKind::Object),
            children: vec![
                PropTreeNode {
                    prop: prop("Tags", PropKind::Array),
                    children: vec![PropTreeNode {
                        prop: prop("Tag", PropKind::String),
                        children: vec![],
                    }],
                },
                PropTreeNode {
                    prop: prop("Name", PropKind::String),
                    children: vec![],
                },
            ],
        };

        let names: Vec<&str> = tree.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["domain", "Tags", "Tag", "Name"]);
        assert_eq!(tree.prop_count(), 4);
        assert_eq!(tree.descend(&["Tags", "Tag"]).unwrap().prop.name, "Tag");
        assert!(tree.descend(&["Tags", "Missing"]).is_none());
    }
}
