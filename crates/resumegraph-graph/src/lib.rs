//! resumegraph-graph: Graph store access for the resume graph.
//!
//! This crate is the single mutation point for the graph. Writes go through
//! [`GraphWriter`] inside scoped write transactions; reads go through the
//! query helpers on [`GraphSession`], which only ever open read transactions.
//!
//! Two [`GraphStore`] backends ship: [`GraphClient`] (Neo4j over Bolt) and
//! [`MemoryGraph`] (in-process, same merge semantics).

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod session;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryGraph;
pub use mutations::GraphWriter;
pub use session::{GraphSession, ScopedTransaction};
pub use store::{AccessMode, GraphStore, Statement, StatementKind, StatementOutput, StoreTxn};
