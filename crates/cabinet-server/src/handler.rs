//! HTTP handlers. Each one parses its input, calls the [`CabinetApi`], and
//! renders the result; failures become an [`ErrorBody`] with a status code
//! derived from the error kind.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cabinet_core::{ErrorKind, Ticket};
use cabinet_protocol::{
    CabinetApi, CloseResponse, ErrorBody, HealthResponse, InfoResponse, ListResponse,
    LoadRequest, LoadResponse, OpenResponse, ProtocolError, PutRequest, PutResponse,
    QueryRequest, QueryResponse, RecordView, RegisterRequest, StatusResponse,
    StatusWhereRequest, StatusWhereResponse, StreamCodec, WireTable, STREAM_CONTENT_TYPE,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn CabinetApi>,
    pub stream_batch_rows: usize,
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound | ErrorKind::QueryTooNarrow => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateTicket | ErrorKind::AlreadyOpen | ErrorKind::NotOpen => {
            StatusCode::CONFLICT
        }
        ErrorKind::UnsupportedPayloadKind => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UnknownLoader | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::LoaderTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::LoaderInvocationError => StatusCode::BAD_GATEWAY,
        ErrorKind::DestroyNotConfirmed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An error on its way out as a response.
#[derive(Debug)]
pub struct ApiError(pub ErrorBody);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(self.0.kind), Json(self.0)).into_response()
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        Self(e.to_body())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ErrorBody::new(ErrorKind::InvalidRequest, rejection.body_text()))
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_ticket(text: &str) -> Result<Ticket, ApiError> {
    Ticket::parse(text).map_err(|e| {
        ApiError(ErrorBody::new(ErrorKind::InvalidRequest, e.to_string()).with_subject(text))
    })
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn info_handler(State(state): State<AppState>) -> ApiResult<InfoResponse> {
    Ok(Json(state.api.info().await?))
}

pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    Ok(Json(state.api.status().await?))
}

pub async fn put_handler(
    State(state): State<AppState>,
    body: Result<Json<PutRequest>, JsonRejection>,
) -> ApiResult<PutResponse> {
    let Json(request) = body?;
    Ok(Json(state.api.put(request).await?))
}

pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<RecordView> {
    let Json(request) = body?;
    Ok(Json(state.api.register(request).await?))
}

pub async fn get_handler(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
) -> ApiResult<WireTable> {
    let ticket = parse_ticket(&ticket)?;
    let table = state.api.get(ticket).await?;
    Ok(Json(WireTable::from(table.as_ref())))
}

/// The table as framed row batches.
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
) -> Result<Response, ApiError> {
    let ticket = parse_ticket(&ticket)?;
    let table = state.api.get(ticket).await?;
    let bytes = StreamCodec::encode_table(&table, state.stream_batch_rows)?;
    Ok(([(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)], bytes).into_response())
}

pub async fn query_handler(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<QueryResponse> {
    let Json(request) = body?;
    Ok(Json(state.api.query(request).await?))
}

pub async fn list_handler(State(state): State<AppState>) -> ApiResult<ListResponse> {
    Ok(Json(state.api.list().await?))
}

pub async fn open_handler(State(state): State<AppState>) -> ApiResult<OpenResponse> {
    Ok(Json(state.api.open().await?))
}

pub async fn close_handler(State(state): State<AppState>) -> ApiResult<CloseResponse> {
    Ok(Json(state.api.close().await?))
}

pub async fn load_handler(
    State(state): State<AppState>,
    body: Result<Json<LoadRequest>, JsonRejection>,
) -> ApiResult<LoadResponse> {
    let Json(request) = body?;
    Ok(Json(state.api.load(request).await?))
}

pub async fn status_where_handler(
    State(state): State<AppState>,
    body: Result<Json<StatusWhereRequest>, JsonRejection>,
) -> ApiResult<StatusWhereResponse> {
    let Json(request) = body?;
    Ok(Json(state.api.set_status_where(request).await?))
}

/// Response for requests cut off by the timeout layer.
pub async fn handle_timeout_error(err: tower::BoxError) -> (StatusCode, Json<ErrorBody>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new(ErrorKind::Internal, "request timed out")),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(ErrorKind::Internal, err.to_string())),
        )
    }
}
