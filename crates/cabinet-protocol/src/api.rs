use std::sync::Arc;

use async_trait::async_trait;
use cabinet_store::Table;
use cabinet_types::Ticket;

use crate::error::ProtocolResult;
use crate::message::{
    CloseResponse, InfoResponse, ListResponse, LoadRequest, LoadResponse, OpenResponse,
    PutRequest, PutResponse, QueryRequest, QueryResponse, RecordView, RegisterRequest,
    StatusResponse, StatusWhereRequest, StatusWhereResponse,
};

/// The operations a cabinet service offers, independent of transport.
///
/// Dataset definitions are not installed through this trait: they come from
/// operator configuration or the Rust API only.
///
/// The server implements this over a local cabinet; the CLI implements it
/// over HTTP. Errors from the far side arrive as
/// [`ProtocolError::Service`](crate::ProtocolError::Service) with their kind
/// intact.
#[async_trait]
pub trait CabinetApi: Send + Sync {
    async fn info(&self) -> ProtocolResult<InfoResponse>;

    async fn status(&self) -> ProtocolResult<StatusResponse>;

    async fn put(&self, request: PutRequest) -> ProtocolResult<PutResponse>;

    async fn register(&self, request: RegisterRequest) -> ProtocolResult<RecordView>;

    async fn get(&self, ticket: Ticket) -> ProtocolResult<Arc<Table>>;

    async fn query(&self, request: QueryRequest) -> ProtocolResult<QueryResponse>;

    /// Installed definitions and registered tickets. Never triggers a load.
    async fn list(&self) -> ProtocolResult<ListResponse>;

    async fn open(&self) -> ProtocolResult<OpenResponse>;

    async fn close(&self) -> ProtocolResult<CloseResponse>;

    async fn load(&self, request: LoadRequest) -> ProtocolResult<LoadResponse>;

    async fn set_status_where(
        &self,
        request: StatusWhereRequest,
    ) -> ProtocolResult<StatusWhereResponse>;
}
