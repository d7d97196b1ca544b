//! Dataset catalog for the filing cabinet.
//!
//! Maps every ticket to a [`DatasetRecord`] holding its free-form metadata
//! and its two independent status axes, and answers exact-match predicate
//! queries over the published records.
//!
//! # Key Types
//!
//! - [`Catalog`] -- Lock-guarded record map with registration ordering
//! - [`DatasetRecord`] -- One catalog entry
//!
//! # Design Rules
//!
//! 1. Queries see only `registered` records, in registration order.
//! 2. A key no record carries is a miss, not an error.
//! 3. Readers share a read lock; every mutation takes the write lock for the
//!    map update only.
//! 4. A registered ticket can never be registered again.

pub mod catalog;
pub mod error;
pub mod record;

pub use catalog::Catalog;
pub use error::{CatalogError, CatalogResult};
pub use record::DatasetRecord;
