//! Foundation types for the filing cabinet.
//!
//! This crate provides the identity, value, and classification types shared
//! by every other cabinet crate. Nothing here performs I/O or holds state.
//!
//! # Key Types
//!
//! - [`Ticket`] -- Opaque, unique retrieval handle for one stored dataset
//! - [`CabinetId`] -- Stable cabinet identity (name-derived or random)
//! - [`Scalar`] -- A single typed cell or metadata value
//! - [`Metadata`] / [`Predicate`] -- Key to scalar maps for records and queries
//! - [`RecordStatus`] / [`Persistence`] -- The two independent record axes
//! - [`ErrorKind`] -- Tagged error classification shared across the boundary

pub mod error;
pub mod identity;
pub mod kind;
pub mod metadata;
pub mod scalar;
pub mod status;
pub mod ticket;

pub use error::TypeError;
pub use identity::CabinetId;
pub use kind::ErrorKind;
pub use metadata::{Metadata, Predicate};
pub use scalar::Scalar;
pub use status::{Persistence, RecordStatus, StatusChange};
pub use ticket::Ticket;
