use async_trait::async_trait;
use cabinet_store::Payload;

use super::text::csv_payload;
use crate::definition::{optional_delimiter, required_str, LoaderArgs};
use crate::error::LoadFailure;
use crate::loader::Loader;

/// A local delimited-text file with a header row.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvFileLoader;

#[async_trait]
impl Loader for CsvFileLoader {
    fn description(&self) -> &str {
        "local CSV file with a header row (args: path, delimiter = \",\")"
    }

    async fn load(&self, args: &LoaderArgs) -> Result<Payload, LoadFailure> {
        let path = required_str(args, "path")?;
        let delimiter = optional_delimiter(args)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LoadFailure::source_error(format!("{path}: {e}")))?;
        tokio::task::spawn_blocking(move || csv_payload(&bytes, delimiter))
            .await
            .map_err(LoadFailure::source_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamedDatasetDefinition;

    #[tokio::test]
    async fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,x\n2,y\n").unwrap();

        let def = NamedDatasetDefinition::new("d", "csv_file")
            .with_arg("path", path.to_string_lossy().into_owned());
        let table = CsvFileLoader.load(&def.arguments).await.unwrap().normalize().unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let def = NamedDatasetDefinition::new("d", "csv_file")
            .with_arg("path", "/definitely/not/here.csv");
        assert!(matches!(
            CsvFileLoader.load(&def.arguments).await,
            Err(LoadFailure::Source(_))
        ));
    }
}
