//! Built-in loaders. Every one of them is on the default allow-list.

pub mod csv_file;
pub mod http_csv;
pub mod inline;
pub mod json_rows_file;
pub mod sequence;
mod text;

use std::sync::Arc;

pub use csv_file::CsvFileLoader;
pub use http_csv::HttpCsvLoader;
pub use inline::InlineLoader;
pub use json_rows_file::JsonRowsFileLoader;
pub use sequence::SequenceLoader;

use crate::definition::LoaderId;
use crate::loader::Loader;

/// The default allow-list.
pub fn builtin_loaders() -> Vec<(LoaderId, Arc<dyn Loader>)> {
    vec![
        (LoaderId::new(LoaderId::INLINE), Arc::new(InlineLoader)),
        (LoaderId::new(LoaderId::SEQUENCE), Arc::new(SequenceLoader)),
        (LoaderId::new(LoaderId::CSV_FILE), Arc::new(CsvFileLoader)),
        (LoaderId::new(LoaderId::JSON_ROWS_FILE), Arc::new(JsonRowsFileLoader)),
        (LoaderId::new(LoaderId::HTTP_CSV), Arc::new(HttpCsvLoader::new())),
    ]
}
