use async_trait::async_trait;
use cabinet_store::Payload;
use serde_json::Value;

use crate::definition::{optional_i64, optional_str, LoaderArgs};
use crate::error::LoadFailure;
use crate::loader::Loader;

/// Upper bound on generated rows.
pub const MAX_SEQUENCE_LEN: i128 = 10_000_000;

/// An integer range `start..stop` by `step` in a single column.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceLoader;

#[async_trait]
impl Loader for SequenceLoader {
    fn description(&self) -> &str {
        "integer range (args: stop, start = 0, step = 1, column = \"values\")"
    }

    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure> {
        let start = i128::from(optional_i64(args, "start")?.unwrap_or(0));
        let stop = optional_i64(args, "stop")?
            .map(i128::from)
            .ok_or_else(|| LoadFailure::arguments("missing \"stop\""))?;
        let step = i128::from(optional_i64(args, "step")?.unwrap_or(1));
        if step == 0 {
            return Err(LoadFailure::arguments("\"step\" must not be zero"));
        }

        let span = stop - start;
        let len = if span.signum() != step.signum() {
            0
        } else {
            (span.abs() + step.abs() - 1) / step.abs()
        };
        if len > MAX_SEQUENCE_LEN {
            return Err(LoadFailure::arguments(format!(
                "sequence of {len} values exceeds the limit of {MAX_SEQUENCE_LEN}"
            )));
        }

        let values = (0..len)
            .map(|i| Value::from((start + i * step) as i64))
            .collect();
        Ok(Payload::Array {
            name: optional_str(args, "column")?.map(str::to_string),
            values,
        })
    }
}
