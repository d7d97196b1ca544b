use async_trait::async_trait;
use cabinet_store::Payload;
use serde_json::{Map, Value};

use crate::definition::{required_str, LoaderArgs};
use crate::error::LoadFailure;
use crate::loader::Loader;

/// A local JSON file holding an array of row objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRowsFileLoader;

#[async_trait]
impl Loader for JsonRowsFileLoader {
    fn description(&self) -> &str {
        "local JSON array of row objects (args: path)"
    }

    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure> {
        let path = required_str(args, "path")?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LoadFailure::source_error(format!("{path}: {e}")))?;
        let records: Vec<Map<String, Value>> = serde_json::from_slice(&bytes)
            .map_err(|e| LoadFailure::Data(format!("{path}: {e}")))?;
        Ok(Payload::Rows { records })
    }
}
