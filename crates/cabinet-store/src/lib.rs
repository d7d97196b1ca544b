//! Payload normalization and ticket-keyed object storage for the cabinet.
//!
//! Every dataset that enters a cabinet is converted into one canonical,
//! column-major [`Table`] before it is stored. Callers may hand in row
//! records, columnar batches, or plain scalar arrays ([`Payload`]); readers
//! always get the same shape back.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store behind an `RwLock`
//!
//! # Design Rules
//!
//! 1. Stored tables are immutable; readers share them through `Arc`.
//! 2. A ticket is issued and its payload inserted under one write lock, so a
//!    freshly issued ticket is never already live.
//! 3. Deletion is idempotent.
//! 4. Normalization failures are reported, never papered over.

pub mod error;
pub mod issuer;
pub mod memory;
pub mod payload;
pub mod table;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use issuer::TicketIssuer;
pub use memory::InMemoryObjectStore;
pub use payload::{ColumnInput, Payload};
pub use table::{Column, DataType, Table};
pub use traits::ObjectStore;
