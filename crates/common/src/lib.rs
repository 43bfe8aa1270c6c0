//! Shared types used across the document store and the view engine.

pub mod types;

pub use types::{DocumentRef, ParseRefError, REF_KEY};
