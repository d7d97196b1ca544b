//! HTTP service layer for the filing cabinet.
//!
//! [`LocalService`] implements the transport-neutral
//! [`CabinetApi`](cabinet_protocol::CabinetApi) over one in-process
//! [`Cabinet`](cabinet_core::Cabinet); the axum router exposes that trait
//! object over JSON, so a different transport can be composed with the same
//! service without touching cabinet logic.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod service;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{ServerError, ServerResult};
pub use handler::{status_for, ApiError, AppState};
pub use router::build_router;
pub use server::CabinetServer;
pub use service::{error_body, LocalService};
