//! Wire protocol for the filing cabinet.
//!
//! Defines the request/response bodies exchanged over HTTP, the structured
//! error body every failure is reported with, the [`CabinetApi`] capability
//! trait both ends implement, and the framing used to stream a table as row
//! batches.
//!
//! # Stream Framing
//!
//! ```text
//! [u32 BE len][u8 tag][bincode frame]   repeated
//! Header (tag 1) -> Batch (tag 2) x N -> End (tag 3)
//! ```

pub mod api;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;

pub use api::CabinetApi;
pub use codec::{StreamCodec, StreamFrame};
pub use endpoint::{endpoints, ticket_path, ticket_stream_path, HealthResponse, STREAM_CONTENT_TYPE};
pub use error::{ErrorBody, ProtocolError, ProtocolResult};
pub use message::{
    CloseResponse, InfoResponse, ListResponse, LoadRequest, LoadResponse, LoaderInfo,
    OpenResponse, PutRequest, PutResponse, QueryRequest, QueryResponse, RecordView,
    RegisterRequest, StatusResponse, StatusWhereRequest, StatusWhereResponse, WireColumn,
    WireTable, MAX_FRAME_SIZE, PROTOCOL_VERSION,
};
