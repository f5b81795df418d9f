//! PropGraph Core
//!
//! Versioned attribute graph store for infrastructure component schemas, plus
//! the transformation pipeline that enriches ingested schemas before they are
//! materialized.
//!
//! # Architecture
//!
//! - **Versioned rows**: every graph row carries a tenancy and a visibility;
//!   reads see head rows overlaid by the rows of one change set
//! - **Copy-on-write**: writing a head row from a change set copies it into the
//!   change set first, so head stays untouched until merge
//! - **Specificity resolution**: a component-scoped attribute value shadows the
//!   schema-level default for the same prop or provider
//! - **libsql/Turso**: embedded SQLite-compatible database
//!
//! # Modules
//!
//! - [`models`] - Data structures (Prop, Socket, AttributeValue, IngestedSchema, etc.)
//! - [`services`] - PropGraphService, AttributeService and the override pipeline
//! - [`db`] - Store layer with libsql integration
//! - [`config`] - Store configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::StoreConfig;
pub use models::*;
pub use services::*;
