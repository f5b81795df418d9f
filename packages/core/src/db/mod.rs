//! Database Layer
//!
//! This module handles all persistence for the versioned graph using libsql
//! (embedded SQLite):
//!
//! - Database initialization and connection management (`DatabaseService`)
//! - Standard versioned tables and the visibility rule (`standard_model`)
//! - The `GraphStore` trait services depend on, and its libsql
//!   implementation `TursoStore`
//!
//! # Architecture
//!
//! Every row carries its tenancy and visibility columns. Reads are always
//! issued through the visibility expressions in `standard_model`, so a query
//! cannot forget the workspace predicate or see another change set's edits.

mod database;
mod error;
pub mod graph_store;
pub mod standard_model;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use graph_store::{AttributeValueWrite, ContextMatch, GraphStore, PropClosureRow};
pub use turso_store::TursoStore;
