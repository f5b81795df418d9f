//! Provider Override Routines
//!
//! Concrete override routines, one module per provider service. Each module
//! exposes `register_overrides` which adds its routines to a registry.
//!
//! ## Available Overrides
//!
//! - `ec2` - sockets with auto-wiring annotations for routes and gateway
//!   attachments
//! - `secrets_manager` - secret promotion of the secret string
//! - `rds` - secret promotion of the master user password
//!
//! ## Example Usage
//!
//! ```no_run
//! # use propgraph_core::services::overrides;
//! # use propgraph_core::services::override_registry::apply_overrides;
//! let registry = overrides::default_registry();
//! let outcome = apply_overrides(&registry, Vec::new());
//! assert!(outcome.schemas.is_empty());
//! ```

pub mod ec2;
pub mod rds;
pub mod secrets_manager;

use crate::services::override_registry::OverrideRegistry;

/// Registry with every built-in override routine
pub fn default_registry() -> OverrideRegistry {
    let mut registry = OverrideRegistry::new();
    ec2::register_overrides(&mut registry);
    secrets_manager::register_overrides(&mut registry);
    rds::register_overrides(&mut registry);
    registry
}
