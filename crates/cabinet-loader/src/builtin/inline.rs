use async_trait::async_trait;
use cabinet_store::Payload;

use crate::definition::LoaderArgs;
use crate::error::LoadFailure;
use crate::loader::Loader;

/// Returns the payload stored under the `payload` argument.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineLoader;

#[async_trait]
impl Loader for InlineLoader {
    fn description(&self) -> &str {
        "payload given inline in the definition (args: payload)"
    }

    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure> {
        let payload = args
            .get("payload")
            .ok_or_else(|| LoadFailure::arguments("missing \"payload\""))?;
        serde_json::from_value(payload.clone())
            .map_err(|e| LoadFailure::arguments(format!("\"payload\": {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returns_the_bound_payload() {
        let mut args = LoaderArgs::new();
        args.insert("payload".into(), json!({"kind": "array", "values": [1, 2]}));
        let payload = InlineLoader.load(&args).await.unwrap();
        assert_eq!(payload.kind_name(), "array");
    }

    #[tokio::test]
    async fn malformed_payload_is_an_argument_error() {
        let mut args = LoaderArgs::new();
        args.insert("payload".into(), json!({"kind": "tensor"}));
        assert!(matches!(
            InlineLoader.load(&args).await,
            Err(LoadFailure::InvalidArguments(_))
        ));
    }
}
