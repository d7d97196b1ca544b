//! Schemaless key/value maps attached to dataset records, and the
//! exact-match predicates evaluated against them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::scalar::Scalar;

/// Metadata of one dataset record. Any key set is legal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Scalar>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Convert a JSON object whose values are all scalars.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, TypeError> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), Scalar::from_json(k, v)?)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Self)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
    }

    /// Parse `key=value` assignments (see [`Scalar::parse_text`]).
    pub fn parse_assignments<S: AsRef<str>>(items: &[S]) -> Result<Self, TypeError> {
        let mut map = BTreeMap::new();
        for item in items {
            let item = item.as_ref();
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| TypeError::InvalidAssignment(item.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(TypeError::InvalidAssignment(item.to_string()));
            }
            map.insert(key.to_string(), Scalar::parse_text(value.trim()));
        }
        Ok(Self(map))
    }
}

impl From<BTreeMap<String, Scalar>> for Metadata {
    fn from(map: BTreeMap<String, Scalar>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Scalar)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A conjunction of exact-match tests, `key == value` for every entry.
///
/// The empty predicate matches every record. A key that a record does not
/// carry is simply a non-match: with no fixed schema there is no way to tell
/// "unknown key" from "different value".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(BTreeMap<String, Scalar>);

impl Predicate {
    /// The predicate that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }

    /// Evaluate against one record's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| actual.matches(expected))
        })
    }

    pub fn from_json(map: &Map<String, Value>) -> Result<Self, TypeError> {
        Metadata::from_json(map).map(|m| Self(m.0))
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
    }

    pub fn parse_assignments<S: AsRef<str>>(items: &[S]) -> Result<Self, TypeError> {
        Metadata::parse_assignments(items).map(|m| Self(m.0))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Scalar::Text(s) => write!(f, "{key}={s:?}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        write!(f, "}}")
    }
}

impl From<BTreeMap<String, Scalar>> for Predicate {
    fn from(map: BTreeMap<String, Scalar>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Scalar)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
