//! JSON request and response bodies.
//!
//! Metadata and predicates travel as plain JSON objects (`{"a": 1}`); the
//! accessor methods here convert them into typed values and reject
//! malformed ones as `InvalidRequest`.

use cabinet_catalog::DatasetRecord;
use cabinet_loader::NamedDatasetDefinition;
use cabinet_store::{Column, DataType, Payload, Table};
use cabinet_types::{
    CabinetId, Metadata, Persistence, Predicate, RecordStatus, Scalar, StatusChange, Ticket,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<Persistence>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub ticket: Ticket,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RegisterRequest {
    pub fn new(ticket: Ticket, metadata: &Metadata) -> Self {
        Self {
            ticket,
            metadata: metadata.to_json(),
        }
    }

    pub fn metadata(&self) -> ProtocolResult<Metadata> {
        Ok(Metadata::from_json(&self.metadata)?)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub predicate: Map<String, Value>,
    /// Fail with `QueryTooNarrow` instead of returning nothing.
    #[serde(default)]
    pub require_match: bool,
}

impl QueryRequest {
    pub fn new(predicate: &Predicate) -> Self {
        Self {
            predicate: predicate.to_json(),
            require_match: false,
        }
    }

    pub fn require_match(mut self) -> Self {
        self.require_match = true;
        self
    }

    pub fn predicate(&self) -> ProtocolResult<Predicate> {
        Ok(Predicate::from_json(&self.predicate)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<Persistence>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusWhereRequest {
    pub predicate: Map<String, Value>,
    pub change: StatusChange,
}

impl StatusWhereRequest {
    pub fn new(predicate: &Predicate, change: StatusChange) -> Self {
        Self {
            predicate: predicate.to_json(),
            change,
        }
    }

    /// The predicate, which must name at least one key.
    pub fn predicate(&self) -> ProtocolResult<Predicate> {
        let predicate = Predicate::from_json(&self.predicate)?;
        if predicate.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "status update requires a non-empty predicate".into(),
            ));
        }
        Ok(predicate)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub ticket: Ticket,
}

/// A catalog record with JSON metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    pub ticket: Ticket,
    pub metadata: Map<String, Value>,
    pub status: RecordStatus,
    pub persistence: Persistence,
    pub seq: u64,
}

impl From<&DatasetRecord> for RecordView {
    fn from(record: &DatasetRecord) -> Self {
        Self {
            ticket: record.ticket,
            metadata: record.metadata.to_json(),
            status: record.status,
            persistence: record.persistence,
            seq: record.seq,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub tickets: Vec<Ticket>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub datasets: Vec<NamedDatasetDefinition>,
    pub tickets: Vec<Ticket>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    pub restored: usize,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    pub written: usize,
    pub removed: usize,
    pub evicted: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub ticket: Ticket,
    pub reused: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWhereResponse {
    pub tickets: Vec<Ticket>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: CabinetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    pub open: bool,
    pub records: usize,
    pub registered: usize,
    pub persistent: usize,
    pub definitions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderInfo {
    pub id: String,
    pub description: String,
}

/// Server identity plus the loader allow-list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub version: String,
    pub protocol_version: u32,
    pub cabinet: CabinetId,
    pub loaders: Vec<LoaderInfo>,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireColumn {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<Value>,
}

/// JSON form of a [`Table`]: columns with plain JSON cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireTable {
    pub num_rows: usize,
    pub columns: Vec<WireColumn>,
}

impl From<&Table> for WireTable {
    fn from(table: &Table) -> Self {
        Self {
            num_rows: table.num_rows(),
            columns: table
                .columns()
                .iter()
                .map(|c| WireColumn {
                    name: c.name().to_string(),
                    dtype: c.dtype(),
                    values: c.values().iter().map(Scalar::to_json).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<WireTable> for Table {
    type Error = ProtocolError;

    fn try_from(wire: WireTable) -> Result<Self, Self::Error> {
        let columns = wire
            .columns
            .into_iter()
            .map(|c| {
                let values = c
                    .values
                    .iter()
                    .map(|v| Scalar::from_json(&c.name, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Column::with_dtype(c.name, c.dtype, values)
                    .map_err(|e| ProtocolError::Deserialization(e.to_string()))
            })
            .collect::<ProtocolResult<Vec<_>>>()?;
        Table::new(columns).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_types::ErrorKind;
    use serde_json::json;

    #[test]
    fn query_request_defaults() {
        let req: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(req.predicate().unwrap().is_empty());
        assert!(!req.require_match);
    }

    #[test]
    fn query_request_rejects_nested_values() {
        let req: QueryRequest =
            serde_json::from_value(json!({"predicate": {"a": [1, 2]}})).unwrap();
        assert_eq!(req.predicate().unwrap_err().kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn status_where_requires_a_key() {
        let req = StatusWhereRequest::new(
            &Predicate::all(),
            StatusChange::Persistence(Persistence::Ephemeral),
        );
        assert_eq!(req.predicate().unwrap_err().kind(), ErrorKind::InvalidRequest);

        let req = StatusWhereRequest::new(
            &Predicate::all().with("a", 1i64),
            StatusChange::Persistence(Persistence::Ephemeral),
        );
        assert_eq!(req.predicate().unwrap().len(), 1);
    }

    #[test]
    fn register_request_wire_shape() {
        let ticket = Ticket::new();
        let req = RegisterRequest::new(ticket, &Metadata::new().with("name", "titanic"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["metadata"], json!({"name": "titanic"}));
        assert_eq!(value["ticket"], json!(ticket.to_string()));
    }

    #[test]
    fn wire_table_preserves_types_and_nulls() {
        let table = Payload::Rows {
            records: vec![
                json!({"a": 1, "b": "x"}).as_object().unwrap().clone(),
                json!({"a": 2.5}).as_object().unwrap().clone(),
            ],
        }
        .normalize()
        .unwrap();

        let wire = WireTable::from(&table);
        assert_eq!(wire.num_rows, 2);
        assert_eq!(wire.columns[0].dtype, DataType::Float);
        assert_eq!(wire.columns[1].values, vec![json!("x"), Value::Null]);

        let json = serde_json::to_string(&wire).unwrap();
        let back: WireTable = serde_json::from_str(&json).unwrap();
        assert_eq!(Table::try_from(back).unwrap(), table);
    }
}
