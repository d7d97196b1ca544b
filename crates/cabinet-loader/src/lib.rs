//! Loader registry for the filing cabinet.
//!
//! A named dataset is a *definition* (which loader, with which arguments)
//! rather than data. The registry turns a definition into a table on demand
//! and never runs anything outside its allow-list of [`Loader`]s.
//!
//! # Key Types
//!
//! - [`LoaderRegistry`] -- Allow-list, installed definitions, hook cache, single-flight
//! - [`Loader`] -- Async trait implemented by every loader
//! - [`LoaderId`] -- Allow-list key
//! - [`NamedDatasetDefinition`] -- `{name, loader, arguments}`
//! - [`LoaderHook`] -- A resolved definition bound to its loader
//!
//! # Built-in Loaders
//!
//! `inline`, `sequence`, `csv_file`, `json_rows_file`, `http_csv`.
//!
//! # Design Rules
//!
//! 1. Loader references resolve only through the allow-list; extension
//!    loaders are added by Rust code via [`LoaderRegistry::register_loader`].
//! 2. Concurrent materializations of one name share a single invocation.
//! 3. Every invocation runs under the registry's timeout.
//! 4. A failed materialization changes nothing.

pub mod builtin;
pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

pub use definition::{LoaderArgs, LoaderId, NamedDatasetDefinition};
pub use error::{LoadFailure, LoaderError, LoaderResult};
pub use loader::Loader;
pub use registry::{LoaderHook, LoaderRegistry, DEFAULT_LOADER_TIMEOUT};
