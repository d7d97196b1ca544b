//! HTTP client for a cabinet server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cabinet_protocol::{
    endpoints, ticket_path, ticket_stream_path, CabinetApi, CloseResponse, ErrorBody,
    InfoResponse, ListResponse, LoadRequest, LoadResponse, OpenResponse, ProtocolError,
    ProtocolResult, PutRequest, PutResponse, QueryRequest, QueryResponse, RecordView,
    RegisterRequest, StatusResponse, StatusWhereRequest, StatusWhereResponse, StreamCodec,
    WireTable,
};
use cabinet_store::Table;
use cabinet_types::Ticket;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Speaks the cabinet HTTP protocol. Server-side failures come back as
/// [`ProtocolError::Service`] carrying the server's error body.
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a table through the framed row-batch endpoint.
    pub async fn get_stream(&self, ticket: Ticket) -> ProtocolResult<Table> {
        let response = self.send(self.client.get(self.url(&ticket_stream_path(&ticket)))).await?;
        let bytes = response.bytes().await.map_err(transport)?;
        debug!(ticket = %ticket, bytes = bytes.len(), "received table stream");
        StreamCodec::decode_table(&bytes)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> ProtocolResult<T> {
        let response = self.send(self.client.get(self.url(path))).await?;
        decode(response).await
    }

    async fn submit<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProtocolResult<T> {
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        decode(response).await
    }

    async fn trigger<T: DeserializeOwned>(&self, path: &str) -> ProtocolResult<T> {
        let response = self.send(self.client.post(self.url(path))).await?;
        decode(response).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ProtocolResult<Response> {
        let response = request.send().await.map_err(transport)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ProtocolError::Service(body),
            Err(_) => ProtocolError::Transport(format!("{status}: {text}")),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ProtocolResult<T> {
    response
        .json()
        .await
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))
}

fn transport(e: reqwest::Error) -> ProtocolError {
    ProtocolError::Transport(e.to_string())
}

#[async_trait]
impl CabinetApi for HttpClient {
    async fn info(&self) -> ProtocolResult<InfoResponse> {
        self.fetch(endpoints::INFO).await
    }

    async fn status(&self) -> ProtocolResult<StatusResponse> {
        self.fetch(endpoints::STATUS).await
    }

    async fn put(&self, request: PutRequest) -> ProtocolResult<PutResponse> {
        self.submit(endpoints::PUT, &request).await
    }

    async fn register(&self, request: RegisterRequest) -> ProtocolResult<RecordView> {
        self.submit(endpoints::REGISTER, &request).await
    }

    async fn get(&self, ticket: Ticket) -> ProtocolResult<Arc<Table>> {
        let wire: WireTable = self.fetch(&ticket_path(&ticket)).await?;
        Ok(Arc::new(Table::try_from(wire)?))
    }

    async fn query(&self, request: QueryRequest) -> ProtocolResult<QueryResponse> {
        self.submit(endpoints::QUERY, &request).await
    }

    async fn list(&self) -> ProtocolResult<ListResponse> {
        self.fetch(endpoints::LIST).await
    }

    async fn open(&self) -> ProtocolResult<OpenResponse> {
        self.trigger(endpoints::OPEN).await
    }

    async fn close(&self) -> ProtocolResult<CloseResponse> {
        self.trigger(endpoints::CLOSE).await
    }

    async fn load(&self, request: LoadRequest) -> ProtocolResult<LoadResponse> {
        self.submit(endpoints::LOAD, &request).await
    }

    async fn set_status_where(
        &self,
        request: StatusWhereRequest,
    ) -> ProtocolResult<StatusWhereResponse> {
        self.submit(endpoints::STATUS_WHERE, &request).await
    }
}
