use cabinet_types::Ticket;

/// HTTP endpoint paths.
pub mod endpoints {
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
    pub const STATUS: &str = "/v1/status";
    pub const PUT: &str = "/v1/put";
    pub const REGISTER: &str = "/v1/register";
    pub const TICKET: &str = "/v1/tickets/:ticket";
    pub const TICKET_STREAM: &str = "/v1/tickets/:ticket/stream";
    pub const QUERY: &str = "/v1/query";
    pub const LIST: &str = "/v1/list";
    pub const OPEN: &str = "/v1/open";
    pub const CLOSE: &str = "/v1/close";
    pub const LOAD: &str = "/v1/load";
    pub const STATUS_WHERE: &str = "/v1/status-where";
}

/// Concrete path of one ticket's JSON table.
pub fn ticket_path(ticket: &Ticket) -> String {
    format!("/v1/tickets/{ticket}")
}

/// Concrete path of one ticket's framed row-batch stream.
pub fn ticket_stream_path(ticket: &Ticket) -> String {
    format!("/v1/tickets/{ticket}/stream")
}

/// Content type of framed row-batch streams.
pub const STREAM_CONTENT_TYPE: &str = "application/x-cabinet-stream";

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}
