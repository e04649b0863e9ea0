//! Column selection across a collection and its relations.
//!
//! A projection is an ordered list of unique paths. A path is either a column
//! name (`"title"`) or a relation followed by a path inside the related
//! collection (`"author:name"`, `"author:country:code"`).

use crate::error::{DataError, Result};
use crate::types::{Record, Value, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Projection {
    paths: Vec<String>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path, ignoring it when already present
    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.paths.iter().position(|p| p == path)
    }

    /// Paths that target a column of the collection itself
    pub fn columns(&self) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|path| !path.contains(PATH_SEPARATOR))
            .map(String::as_str)
            .collect()
    }

    /// Sub-projection requested on each relation, keyed by relation name
    pub fn relations(&self) -> BTreeMap<String, Projection> {
        let mut relations: BTreeMap<String, Projection> = BTreeMap::new();

        for path in &self.paths {
            if let Some((relation, rest)) = path.split_once(PATH_SEPARATOR) {
                relations
                    .entry(relation.to_string())
                    .or_default()
                    .push(rest);
            }
        }

        relations
    }

    /// Set union; paths of `self` come first, then new paths of `other` in order
    pub fn union(&self, other: &Projection) -> Projection {
        let mut result = self.clone();
        for path in other.iter() {
            result.push(path.as_str());
        }
        result
    }

    /// Prefix every path with `prefix:`
    pub fn nest(&self, prefix: Option<&str>) -> Projection {
        match prefix {
            Some(prefix) if !prefix.is_empty() => self
                .paths
                .iter()
                .map(|path| format!("{prefix}{PATH_SEPARATOR}{path}"))
                .collect(),
            _ => self.clone(),
        }
    }

    /// Strip the relation prefix shared by every path
    pub fn unnest(&self) -> Result<Projection> {
        let Some(first) = self.paths.first() else {
            return Ok(Projection::new());
        };

        let prefix = match first.split_once(PATH_SEPARATOR) {
            Some((prefix, _)) => prefix,
            None => {
                return Err(DataError::invalid_projection(format!(
                    "Cannot unnest projection [{self}]: '{first}' is not a relation path"
                )))
            }
        };

        self.paths
            .iter()
            .map(|path| match path.split_once(PATH_SEPARATOR) {
                Some((p, rest)) if p == prefix => Ok(rest.to_string()),
                _ => Err(DataError::invalid_projection(format!(
                    "Cannot unnest projection [{self}]: paths do not share the '{prefix}' prefix"
                ))),
            })
            .collect()
    }

    /// Rewrite each path into a sub-projection and concatenate the results
    pub fn replace<F>(&self, mut handler: F) -> Result<Projection>
    where
        F: FnMut(&str) -> Result<Projection>,
    {
        let mut result = Projection::new();
        for path in &self.paths {
            result = result.union(&handler(path)?);
        }
        Ok(result)
    }

    /// Reshape records so that they contain exactly the projected fields.
    ///
    /// Missing columns are set to null, relations that are not objects
    /// become null.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().map(|record| self.reproject(record)).collect()
    }

    fn reproject(&self, record: &Record) -> Record {
        let mut result = Record::new();

        for column in self.columns() {
            let value = record.get(column).cloned().unwrap_or(Value::Null);
            result.insert(column.to_string(), value);
        }

        for (relation, sub_projection) in self.relations() {
            let value = match record.get(&relation) {
                Some(Value::Object(nested)) => Value::Object(sub_projection.reproject(nested)),
                _ => Value::Null,
            };
            result.insert(relation, value);
        }

        result
    }
}

impl<S: Into<String>> FromIterator<S> for Projection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut projection = Projection::new();
        for path in iter {
            projection.push(path);
        }
        projection
    }
}

impl From<Vec<String>> for Projection {
    fn from(paths: Vec<String>) -> Self {
        paths.into_iter().collect()
    }
}

impl From<Projection> for Vec<String> {
    fn from(projection: Projection) -> Self {
        projection.paths
    }
}

impl<'a> IntoIterator for &'a Projection {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.paths.join(", "))
    }
}
