//! Typed Identifiers
//!
//! Every logical entity in the graph is addressed by a UUID wrapped in its own
//! newtype, so a `PropId` can never be passed where a `ComponentId` is expected.
//! The logical id is shared by every physical row version of the entity (head
//! row plus one row per change set that edited it).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! logical_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

logical_id!(
    /// Workspace identifier; the tenancy boundary for every row
    WorkspaceId
);
logical_id!(ChangeSetId);
logical_id!(PropId);
logical_id!(SocketId);
logical_id!(SchemaVariantId);
logical_id!(ComponentId);
logical_id!(
    /// Provider backing an input socket
    InputProviderId
);
logical_id!(
    /// Provider backing an output socket
    OutputProviderId
);
logical_id!(AttributeValueId);

impl ChangeSetId {
    /// Sentinel change set id for head (the nil UUID)
    pub const HEAD: ChangeSetId = ChangeSetId(Uuid::nil());

    pub fn is_head(&self) -> bool {
        *self == Self::HEAD
    }
}
