//! An in-memory pricing backend.
//!
//! Serves the branch crash REST surface against a [`BranchStore`] so the
//! console and the HTTP adapter can run without the real pricing service.

pub mod routes;
pub mod store;

pub use routes::router;
pub use store::{BranchStore, StoreError};
