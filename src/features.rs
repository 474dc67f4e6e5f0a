//! Ordered list of feature names the model was trained on.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array1;
use serde_pickle::DeOptions;
use tracing::warn;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureList {
    names: Vec<String>,
}

impl FeatureList {
    /// Duplicate names are kept as written but logged; lookups by name
    /// resolve to the first occurrence.
    pub fn new(names: Vec<String>, origin: &Path) -> Self {
        let mut seen = HashSet::with_capacity(names.len());
        let duplicates: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| !seen.insert(*n))
            .collect();
        if !duplicates.is_empty() {
            warn!(
                path = %origin.display(),
                ?duplicates,
                "feature list repeats names"
            );
        }
        Self { names }
    }

    /// Reads a pickled `list[str]`, or a JSON array of strings when the file
    /// extension is `.json`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::from_io(path, e))?;
        let reader = BufReader::new(file);

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let names: Vec<String> = if is_json {
            serde_json::from_reader(reader).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_pickle::from_reader(reader, DeOptions::new()).map_err(|source| {
                LoadError::Pickle {
                    path: path.to_path_buf(),
                    source,
                }
            })?
        };

        Ok(Self::new(names, path))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Lays out named values in training column order. Names absent from
    /// `values` become NaN, which the model treats as missing; names not in
    /// the list are ignored.
    pub fn align(&self, values: &HashMap<String, f32>) -> Array1<f32> {
        self.names
            .iter()
            .map(|n| values.get(n).copied().unwrap_or(f32::NAN))
            .collect()
    }
}
