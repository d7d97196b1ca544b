use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LoadFailure;

/// Arguments bound to a named dataset. Arbitrary JSON so that a definition
/// can carry a whole inline payload; each loader validates its own keys.
pub type LoaderArgs = Map<String, Value>;

/// Key into the loader allow-list.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderId(String);

impl LoaderId {
    pub const INLINE: &'static str = "inline";
    pub const SEQUENCE: &'static str = "sequence";
    pub const CSV_FILE: &'static str = "csv_file";
    pub const JSON_ROWS_FILE: &'static str = "json_rows_file";
    pub const HTTP_CSV: &'static str = "http_csv";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoaderId({})", self.0)
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LoaderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// How to produce a named dataset: which loader, with which arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedDatasetDefinition {
    pub name: String,
    pub loader: LoaderId,
    #[serde(default)]
    pub arguments: LoaderArgs,
}

impl NamedDatasetDefinition {
    pub fn new(name: impl Into<String>, loader: impl Into<LoaderId>) -> Self {
        Self {
            name: name.into(),
            loader: loader.into(),
            arguments: LoaderArgs::new(),
        }
    }

    /// Builder-style argument binding.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Argument accessors shared by the built-in loaders
// ---------------------------------------------------------------------------

pub(crate) fn required_str<'a>(args: &'a LoaderArgs, key: &str) -> Result<&'a str, LoadFailure> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(LoadFailure::arguments(format!(
            "{key:?} must be a string, got {other}"
        ))),
        None => Err(LoadFailure::arguments(format!("missing {key:?}"))),
    }
}

pub(crate) fn optional_str<'a>(
    args: &'a LoaderArgs,
    key: &str,
) -> Result<Option<&'a str>, LoadFailure> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_str(args, key).map(Some),
    }
}

pub(crate) fn optional_i64(args: &LoaderArgs, key: &str) -> Result<Option<i64>, LoadFailure> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| LoadFailure::arguments(format!("{key:?} must be an integer, got {v}"))),
    }
}

pub(crate) fn optional_delimiter(args: &LoaderArgs) -> Result<u8, LoadFailure> {
    match optional_str(args, "delimiter")? {
        None => Ok(b','),
        Some(d) if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
        Some(d) => Err(LoadFailure::arguments(format!(
            "\"delimiter\" must be one ASCII character, got {d:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_from_toml() {
        let def: NamedDatasetDefinition = toml::from_str(
            r#"
            name = "titanic"
            loader = "http_csv"
            arguments = { url = "http://example.invalid/titanic.csv", retries = 5 }
            "#,
        )
        .unwrap();
        assert_eq!(def.loader.as_str(), LoaderId::HTTP_CSV);
        assert_eq!(def.arguments["retries"], json!(5));
    }

    #[test]
    fn arguments_default_to_empty() {
        let def: NamedDatasetDefinition =
            serde_json::from_value(json!({"name": "n", "loader": "sequence"})).unwrap();
        assert!(def.arguments.is_empty());
    }

    #[test]
    fn accessor_errors_name_the_key() {
        let args = NamedDatasetDefinition::new("n", "csv_file")
            .with_arg("path", 3)
            .arguments;
        let err = required_str(&args, "path").unwrap_err();
        assert!(err.to_string().contains("\"path\""));
        assert!(required_str(&args, "missing").is_err());
        assert_eq!(optional_i64(&args, "absent").unwrap(), None);
    }

    #[test]
    fn delimiter_must_be_one_char() {
        let ok = NamedDatasetDefinition::new("n", "csv_file").with_arg("delimiter", ";");
        assert_eq!(optional_delimiter(&ok.arguments).unwrap(), b';');
        let bad = NamedDatasetDefinition::new("n", "csv_file").with_arg("delimiter", ";;");
        assert!(optional_delimiter(&bad.arguments).is_err());
        assert_eq!(optional_delimiter(&LoaderArgs::new()).unwrap(), b',');
    }
}
