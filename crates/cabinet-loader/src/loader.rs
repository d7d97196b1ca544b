use async_trait::async_trait;
use cabinet_store::Payload;

use crate::definition::LoaderArgs;
use crate::error::LoadFailure;

/// A loader produces a payload from its bound arguments.
///
/// Implementations must be safe to invoke concurrently for different
/// definitions; the registry guarantees at most one in-flight invocation per
/// dataset name.
#[async_trait]
pub trait Loader: Send + Sync {
    /// One-line description shown when listing loaders.
    fn description(&self) -> &str;

    /// Produce the dataset.
    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure>;
}
