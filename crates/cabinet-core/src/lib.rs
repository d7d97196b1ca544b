//! The filing cabinet aggregate.
//!
//! A [`Cabinet`] owns one catalog, one object store and one loader registry,
//! and moves between `closed` and `open` against a backing directory. This
//! is the main entry point for embedding a cabinet in an application; the
//! server crate wraps it for remote callers.
//!
//! # Backing Location
//!
//! ```text
//! <location>/
//!   cabinet.toml                  id, name, format_version
//!   records/<ticket>/record.json  the catalog record plus payload checksum
//!   records/<ticket>/payload.bin  [FCAB][len][crc32][zstd(bincode(table))]
//! ```
//!
//! Only persistent records are ever written. `open` rediscovers them by
//! walking `records/`; no separate index exists.

pub mod cabinet;
pub mod config;
pub mod error;
pub mod layout;

pub use cabinet::{Cabinet, CabinetStatus, CloseReport, Listing, LoadOutcome, OpenReport};
pub use config::CabinetConfig;
pub use error::{CabinetError, CabinetResult};
pub use layout::{Layout, Manifest};

// Re-export key types
pub use cabinet_catalog::DatasetRecord;
pub use cabinet_loader::{LoaderId, NamedDatasetDefinition};
pub use cabinet_store::{Payload, Table};
pub use cabinet_types::{
    CabinetId, ErrorKind, Metadata, Persistence, Predicate, RecordStatus, StatusChange, Ticket,
};
