use std::sync::Arc;

use async_trait::async_trait;
use cabinet_core::{Cabinet, CabinetError, Table, Ticket};
use cabinet_protocol::{
    CabinetApi, CloseResponse, ErrorBody, InfoResponse, ListResponse, LoadRequest,
    LoadResponse, LoaderInfo, OpenResponse, ProtocolError, ProtocolResult, PutRequest,
    PutResponse, QueryRequest, QueryResponse, RecordView, RegisterRequest, StatusResponse,
    StatusWhereRequest, StatusWhereResponse, PROTOCOL_VERSION,
};
use tracing::debug;

/// [`CabinetApi`] over a cabinet in this process.
///
/// Holds nothing but the cabinet; every call maps onto one cabinet
/// operation and component errors keep their kind and subject.
#[derive(Clone, Debug)]
pub struct LocalService {
    cabinet: Arc<Cabinet>,
}

impl LocalService {
    pub fn new(cabinet: Arc<Cabinet>) -> Self {
        Self { cabinet }
    }

    pub fn cabinet(&self) -> &Arc<Cabinet> {
        &self.cabinet
    }
}

/// Wire form of a cabinet error.
pub fn error_body(e: &CabinetError) -> ErrorBody {
    let body = ErrorBody::new(e.kind(), e.to_string());
    match e.subject() {
        Some(subject) => body.with_subject(subject),
        None => body,
    }
}

fn service_error(e: CabinetError) -> ProtocolError {
    debug!(kind = %e.kind(), error = %e, "operation failed");
    ProtocolError::Service(error_body(&e))
}

#[async_trait]
impl CabinetApi for LocalService {
    async fn info(&self) -> ProtocolResult<InfoResponse> {
        let loaders = self
            .cabinet
            .loaders()
            .loader_ids()
            .map_err(|e| service_error(e.into()))?
            .into_iter()
            .map(|(id, description)| LoaderInfo {
                id: id.to_string(),
                description,
            })
            .collect();
        Ok(InfoResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            cabinet: self.cabinet.id(),
            loaders,
        })
    }

    async fn status(&self) -> ProtocolResult<StatusResponse> {
        let status = self.cabinet.status().await.map_err(service_error)?;
        Ok(StatusResponse {
            id: status.id,
            name: status.name,
            location: status.location.display().to_string(),
            open: status.open,
            records: status.records,
            registered: status.registered,
            persistent: status.persistent,
            definitions: status.definitions,
        })
    }

    async fn put(&self, request: PutRequest) -> ProtocolResult<PutResponse> {
        let ticket = self
            .cabinet
            .put(&request.payload, request.persistence)
            .await
            .map_err(service_error)?;
        Ok(PutResponse { ticket })
    }

    async fn register(&self, request: RegisterRequest) -> ProtocolResult<RecordView> {
        let metadata = request.metadata()?;
        let record = self
            .cabinet
            .register(request.ticket, metadata)
            .await
            .map_err(service_error)?;
        Ok(RecordView::from(&record))
    }

    async fn get(&self, ticket: Ticket) -> ProtocolResult<Arc<Table>> {
        self.cabinet.get(&ticket).await.map_err(service_error)
    }

    async fn query(&self, request: QueryRequest) -> ProtocolResult<QueryResponse> {
        let predicate = request.predicate()?;
        let tickets = self
            .cabinet
            .query(&predicate, request.require_match)
            .await
            .map_err(service_error)?;
        Ok(QueryResponse { tickets })
    }

    async fn list(&self) -> ProtocolResult<ListResponse> {
        let listing = self.cabinet.list().await.map_err(service_error)?;
        Ok(ListResponse {
            datasets: listing.datasets,
            tickets: listing.tickets,
        })
    }

    async fn open(&self) -> ProtocolResult<OpenResponse> {
        let report = self.cabinet.open().await.map_err(service_error)?;
        Ok(OpenResponse {
            restored: report.restored,
            skipped: report.skipped,
        })
    }

    async fn close(&self) -> ProtocolResult<CloseResponse> {
        let report = self.cabinet.close().await.map_err(service_error)?;
        Ok(CloseResponse {
            written: report.written,
            removed: report.removed,
            evicted: report.evicted,
        })
    }

    async fn load(&self, request: LoadRequest) -> ProtocolResult<LoadResponse> {
        let outcome = self
            .cabinet
            .load(&request.name, request.persistence)
            .await
            .map_err(service_error)?;
        Ok(LoadResponse {
            ticket: outcome.ticket,
            reused: outcome.reused,
        })
    }

    async fn set_status_where(
        &self,
        request: StatusWhereRequest,
    ) -> ProtocolResult<StatusWhereResponse> {
        let predicate = request.predicate()?;
        let tickets = self
            .cabinet
            .set_status_where(&predicate, request.change)
            .await
            .map_err(service_error)?;
        Ok(StatusWhereResponse { tickets })
    }
}
