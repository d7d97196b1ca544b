//! Delimited-text parsing shared by the CSV loaders.

use cabinet_store::{ColumnInput, Payload};
use serde_json::{Number, Value};

use crate::error::LoadFailure;

/// Parse delimited text with a header row into a columnar payload.
///
/// Each column is typed as a whole: int if every non-empty cell parses as
/// one, then float, then bool, otherwise text. Empty cells are null.
pub(crate) fn csv_payload(bytes: &[u8], delimiter: u8) -> Result<Payload, LoadFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadFailure::Data(format!("header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| LoadFailure::Data(e.to_string()))?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.trim().to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| ColumnInput {
            name,
            values: infer_column(&raw),
        })
        .collect();
    Ok(Payload::Columns { columns })
}

fn infer_column(raw: &[String]) -> Vec<Value> {
    parse_column(raw, as_int)
        .or_else(|| parse_column(raw, as_float))
        .or_else(|| parse_column(raw, as_bool))
        .unwrap_or_else(|| {
            raw.iter()
                .map(|s| match s.as_str() {
                    "" => Value::Null,
                    s => Value::String(s.to_string()),
                })
                .collect()
        })
}

fn parse_column(raw: &[String], parse: fn(&str) -> Option<Value>) -> Option<Vec<Value>> {
    raw.iter()
        .map(|s| if s.is_empty() { Some(Value::Null) } else { parse(s) })
        .collect()
}

fn as_int(s: &str) -> Option<Value> {
    s.parse::<i64>().ok().map(Value::from)
}

fn as_float(s: &str) -> Option<Value> {
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn as_bool(s: &str) -> Option<Value> {
    if s.eq_ignore_ascii_case("true") {
        Some(Value::Bool(true))
    } else if s.eq_ignore_ascii_case("false") {
        Some(Value::Bool(false))
    } else {
        None
    }
}
