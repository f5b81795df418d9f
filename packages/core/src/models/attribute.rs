//! Attribute Contexts and Values
//!
//! An [`AttributeContext`] says *what* is being valued (a prop, or the provider
//! behind a socket) and *for whom* (a component, or nobody for the schema-level
//! default). Stored rows use the flat 4-tuple
//! `(prop_id?, input_provider_id?, output_provider_id?, component_id?)`; in Rust
//! the structural half is a [`StructuralCoordinate`] so "exactly one structural
//! field is set" holds by construction.
//!
//! # Resolution order
//!
//! Several values may exist for the same coordinate. The winner for a
//! `(coordinate, component)` read is picked by [`resolution_order`]:
//!
//! 1. component-scoped before schema default
//! 2. change-set rows before head rows
//! 3. most recently written first (`updated_at`, then physical row order)

use crate::models::{
    AttributeValueId, ComponentId, InputProviderId, OutputProviderId, PropId, SocketProvider,
    Visibility,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttributeContextError {
    #[error("attribute context has no structural field set")]
    MissingCoordinate,

    #[error("attribute context sets more than one structural field")]
    MultipleCoordinates,
}

/// The structural node a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum StructuralCoordinate {
    Prop(PropId),
    InputProvider(InputProviderId),
    OutputProvider(OutputProviderId),
}

impl fmt::Display for StructuralCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralCoordinate::Prop(id) => write!(f, "prop:{}", id),
            StructuralCoordinate::InputProvider(id) => write!(f, "input_provider:{}", id),
            StructuralCoordinate::OutputProvider(id) => write!(f, "output_provider:{}", id),
        }
    }
}

impl StructuralCoordinate {
    /// Entity kind behind the coordinate, for error reporting
    pub fn kind_name(&self) -> &'static str {
        match self {
            StructuralCoordinate::Prop(_) => "prop",
            StructuralCoordinate::InputProvider(_) => "input provider",
            StructuralCoordinate::OutputProvider(_) => "output provider",
        }
    }

    /// The coordinate's id as a string
    pub fn id_string(&self) -> String {
        match self {
            StructuralCoordinate::Prop(id) => id.to_string(),
            StructuralCoordinate::InputProvider(id) => id.to_string(),
            StructuralCoordinate::OutputProvider(id) => id.to_string(),
        }
    }
}

impl From<SocketProvider> for StructuralCoordinate {
    fn from(provider: SocketProvider) -> Self {
        match provider {
            SocketProvider::Input(id) => StructuralCoordinate::InputProvider(id),
            SocketProvider::Output(id) => StructuralCoordinate::OutputProvider(id),
        }
    }
}

impl From<PropId> for StructuralCoordinate {
    fn from(id: PropId) -> Self {
        StructuralCoordinate::Prop(id)
    }
}

impl From<InputProviderId> for StructuralCoordinate {
    fn from(id: InputProviderId) -> Self {
        StructuralCoordinate::InputProvider(id)
    }
}

impl From<OutputProviderId> for StructuralCoordinate {
    fn from(id: OutputProviderId) -> Self {
        StructuralCoordinate::OutputProvider(id)
    }
}

/// How specific a context is; higher wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeSpecificity {
    SchemaDefault,
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeContext {
    pub coordinate: StructuralCoordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<ComponentId>,
}

impl AttributeContext {
    /// Schema-level default context for a coordinate
    pub fn default_for(coordinate: impl Into<StructuralCoordinate>) -> Self {
        Self {
            coordinate: coordinate.into(),
            component_id: None,
        }
    }

    /// Component-scoped context for a coordinate
    pub fn for_component(
        coordinate: impl Into<StructuralCoordinate>,
        component_id: ComponentId,
    ) -> Self {
        Self {
            coordinate: coordinate.into(),
            component_id: Some(component_id),
        }
    }

    /// Rebuild a context from its stored 4-tuple form
    pub fn from_parts(
        prop_id: Option<PropId>,
        input_provider_id: Option<InputProviderId>,
        output_provider_id: Option<OutputProviderId>,
        component_id: Option<ComponentId>,
    ) -> Result<Self, AttributeContextError> {
        let coordinate = match (prop_id, input_provider_id, output_provider_id) {
            (Some(id), None, None) => StructuralCoordinate::Prop(id),
            (None, Some(id), None) => StructuralCoordinate::InputProvider(id),
            (None, None, Some(id)) => StructuralCoordinate::OutputProvider(id),
            (None, None, None) => return Err(AttributeContextError::MissingCoordinate),
            _ => return Err(AttributeContextError::MultipleCoordinates),
        };
        Ok(Self {
            coordinate,
            component_id,
        })
    }

    pub fn prop_id(&self) -> Option<PropId> {
        match self.coordinate {
            StructuralCoordinate::Prop(id) => Some(id),
            _ => None,
        }
    }

    pub fn input_provider_id(&self) -> Option<InputProviderId> {
        match self.coordinate {
            StructuralCoordinate::InputProvider(id) => Some(id),
            _ => None,
        }
    }

    pub fn output_provider_id(&self) -> Option<OutputProviderId> {
        match self.coordinate {
            StructuralCoordinate::OutputProvider(id) => Some(id),
            _ => None,
        }
    }

    pub fn specificity(&self) -> AttributeSpecificity {
        match self.component_id {
            Some(_) => AttributeSpecificity::Component,
            None => AttributeSpecificity::SchemaDefault,
        }
    }

    /// Strictly more specific than `other`
    pub fn is_more_specific_than(&self, other: &AttributeContext) -> bool {
        self.specificity() > other.specificity()
    }
}

/// A stored value for one context under one visibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub id: AttributeValueId,
    pub context: AttributeContext,
    pub value: serde_json::Value,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Physical row number; orders writes that share a timestamp
    pub physical_id: i64,
}

impl AttributeValue {
    pub fn is_component_scoped(&self) -> bool {
        self.context.component_id.is_some()
    }
}

/// Ordering used to pick the winning value; the winner sorts first
pub fn resolution_order(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    b.context
        .specificity()
        .cmp(&a.context.specificity())
        .then_with(|| a.visibility.is_head().cmp(&b.visibility.is_head()))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| b.physical_id.cmp(&a.physical_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeSetId;
    use chrono::Duration;

    fn value(
        context: AttributeContext,
        visibility: Visibility,
        updated_at: DateTime<Utc>,
        physical_id: i64,
    ) -> AttributeValue {
        AttributeValue {
            id: AttributeValueId::generate(),
            context,
            value: serde_json::json!(physical_id),
            visibility,
            created_at: updated_at,
            updated_at,
            physical_id,
        }
    }

    #[test]
    fn test_from_parts_requires_exactly_one_coordinate() {
        let prop = PropId::generate();
        let provider = InputProviderId::generate();

        assert_eq!(
            AttributeContext::from_parts(None, None, None, None),
            Err(AttributeContextError::MissingCoordinate)
        );
        assert_eq!(
            AttributeContext::from_parts(Some(prop), Some(provider), None, None),
            Err(AttributeContextError::MultipleCoordinates)
        );

        let context = AttributeContext::from_parts(None, Some(provider), None, None).unwrap();
        assert_eq!(context.input_provider_id(), Some(provider));
        assert_eq!(context.prop_id(), None);
    }

    #[test]
    fn test_component_context_is_more_specific() {
        let prop = PropId::generate();
        let default = AttributeContext::default_for(prop);
        let component = AttributeContext::for_component(prop, ComponentId::generate());

        assert!(component.is_more_specific_than(&default));
        assert!(!default.is_more_specific_than(&component));
        assert!(!default.is_more_specific_than(&default));
    }

    #[test]
    fn test_resolution_order() {
        let prop = PropId::generate();
        let component_id = ComponentId::generate();
        let branch = Visibility::new_change_set(ChangeSetId::generate());
        let now = Utc::now();

        let head_default = value(
            AttributeContext::default_for(prop),
            Visibility::new_head(),
            now + Duration::seconds(10),
            1,
        );
        let branch_default = value(AttributeContext::default_for(prop), branch, now, 2);
        let head_component = value(
            AttributeContext::for_component(prop, component_id),
            Visibility::new_head(),
            now,
            3,
        );
        let older_branch_component = value(
            AttributeContext::for_component(prop, component_id),
            branch,
            now,
            4,
        );
        let newer_branch_component = value(
            AttributeContext::for_component(prop, component_id),
            branch,
            now + Duration::seconds(1),
            5,
        );

        let mut candidates = vec![
            head_default.clone(),
            branch_default.clone(),
            head_component.clone(),
            older_branch_component.clone(),
            newer_branch_component.clone(),
        ];
        candidates.sort_by(resolution_order);

        let order: Vec<i64> = candidates.iter().map(|c| c.physical_id).collect();
        assert_eq!(order, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_same_timestamp_falls_back_to_row_order() {
        let prop = PropId::generate();
        let now = Utc::now();
        let first = value(AttributeContext::default_for(prop), Visibility::new_head(), now, 7);
        let second = value(AttributeContext::default_for(prop), Visibility::new_head(), now, 8);

        assert_eq!(resolution_order(&second, &first), Ordering::Less);
    }
}
