use std::time::Duration;

use async_trait::async_trait;
use cabinet_store::Payload;
use tracing::{debug, warn};

use super::text::csv_payload;
use crate::definition::{optional_delimiter, optional_i64, required_str, LoaderArgs};
use crate::error::LoadFailure;
use crate::loader::Loader;

/// Download attempts made when the definition does not say.
pub const DEFAULT_ATTEMPTS: i64 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A remote CSV file fetched over HTTP.
///
/// The `retries` argument is the total number of download attempts. Only
/// the fetch is retried; a file that downloads but fails to parse is
/// reported at once.
#[derive(Clone, Debug)]
pub struct HttpCsvLoader {
    client: reqwest::Client,
    backoff: Duration,
}

impl HttpCsvLoader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            backoff: Duration::from_millis(250),
        }
    }

    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(body.to_vec())
    }
}

impl Default for HttpCsvLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Loader for HttpCsvLoader {
    fn description(&self) -> &str {
        "remote CSV over HTTP (args: url, retries = 3, delimiter = \",\")"
    }

    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure> {
        let url = required_str(args, "url")?;
        let delimiter = optional_delimiter(args)?;
        let attempts = optional_i64(args, "retries")?.unwrap_or(DEFAULT_ATTEMPTS);
        if attempts < 1 {
            return Err(LoadFailure::arguments("\"retries\" must be at least 1"));
        }

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.fetch(url).await {
                Ok(bytes) => {
                    debug!(url, attempt, bytes = bytes.len(), "downloaded csv");
                    return csv_payload(&bytes, delimiter);
                }
                Err(e) => {
                    warn!(url, attempt, attempts, error = %e, "download failed");
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.backoff * attempt as u32).await;
            }
        }
        Err(LoadFailure::Source(format!(
            "{url}: {attempts} attempts exceeded, last error: {last_error}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamedDatasetDefinition;

    #[tokio::test]
    async fn unreachable_host_gives_up_after_attempts() {
        let loader = HttpCsvLoader::new().with_backoff(Duration::from_millis(1));
        let def = NamedDatasetDefinition::new("t", "http_csv")
            .with_arg("url", "http://127.0.0.1:9/titanic.csv")
            .with_arg("retries", 2);
        let err = loader.load(&def.arguments).await.unwrap_err();
        assert!(matches!(&err, LoadFailure::Source(msg) if msg.contains("2 attempts")));
    }

    #[tokio::test]
    async fn zero_attempts_is_rejected() {
        let def = NamedDatasetDefinition::new("t", "http_csv")
            .with_arg("url", "http://127.0.0.1:9/x.csv")
            .with_arg("retries", 0);
        assert!(matches!(
            HttpCsvLoader::new().load(&def.arguments).await,
            Err(LoadFailure::InvalidArguments(_))
        ));
    }
}
