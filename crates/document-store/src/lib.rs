//! Document store collaborator for the view cache engine.
//!
//! Provides:
//! - [`DocumentStore`] trait with `query` / `get` / `set` / `delete` / `list_documents`
//! - [`Predicate`] conditions and the evaluator shared by every backend
//! - [`InMemoryDocumentStore`] for tests and single-process deployments
//! - [`PostgresDocumentStore`] backed by a JSONB table

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod predicate;
pub mod query;
pub mod store;

pub use common::DocumentRef;
pub use document::Document;
pub use error::{PredicateError, Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use predicate::{Operator, Predicate, compare_values, matches, values_equal};
pub use query::{Direction, DocumentQuery, Order};
pub use store::{DocumentStore, DocumentStoreExt, SetOptions};
