//! Tab-separated WHO mapping files.
//!
//! Every table is two columns picked out of a file:
//!
//! | table            | selector (col 0) | key col | value col |
//! |------------------|------------------|---------|-----------|
//! | term table       | none             | 2       | 4         |
//! | category mapping | `category`       | 2       | 7         |
//!
//! The first line is a header. Blank lines are skipped and values are
//! trimmed. Nothing else is validated.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use icd_config::CATEGORY_SELECTOR;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: no column {column}", path.display())]
    MissingColumn {
        path: PathBuf,
        line: usize,
        column: usize,
    },
}

/// Which columns of a file make up a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub selector: Option<&'static str>,
    pub key_column: usize,
    pub value_column: usize,
}

impl TableSpec {
    pub const TERMS: TableSpec = TableSpec {
        selector: None,
        key_column: 2,
        value_column: 4,
    };

    pub const CATEGORY_MAP: TableSpec = TableSpec {
        selector: Some(CATEGORY_SELECTOR),
        key_column: 2,
        value_column: 7,
    };
}

/// `(key, value)` pairs of `reader` in file order. `path` only names the
/// source in errors.
pub fn read_pairs<R: BufRead>(reader: R, path: &Path, spec: TableSpec) -> Result<Vec<(String, String)>, TableError> {
    let mut pairs = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if let Some(selector) = spec.selector {
            if columns[0].trim() != selector {
                continue;
            }
        }

        let column = |n: usize| {
            columns.get(n).map(|c| c.trim().to_string()).ok_or_else(|| TableError::MissingColumn {
                path: path.to_path_buf(),
                line: idx + 1,
                column: n,
            })
        };
        pairs.push((column(spec.key_column)?, column(spec.value_column)?));
    }

    Ok(pairs)
}

fn read_file(path: &Path, spec: TableSpec) -> Result<Vec<(String, String)>, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pairs = read_pairs(BufReader::new(file), path, spec)?;
    debug!(path = %path.display(), rows = pairs.len(), "loaded table");
    Ok(pairs)
}

/// Code to display term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermTable {
    terms: HashMap<String, String>,
}

impl TermTable {
    pub fn load(path: &Path) -> Result<Self, TableError> {
        Ok(read_file(path, TableSpec::TERMS)?.into_iter().collect())
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.terms.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromIterator<(String, String)> for TermTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

/// Source code to one or more destination codes.
///
/// A single-category table keeps the last row seen for a key; a multi-category
/// table keeps every destination in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: HashMap<String, Vec<String>>,
}

impl MappingTable {
    pub fn single(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs.into_iter().map(|(k, v)| (k, vec![v])).collect();
        Self { entries }
    }

    pub fn multiple(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in pairs {
            entries.entry(k).or_default().push(v);
        }
        Self { entries }
    }

    pub fn load_single(path: &Path) -> Result<Self, TableError> {
        Ok(Self::single(read_file(path, TableSpec::CATEGORY_MAP)?))
    }

    pub fn load_multiple(path: &Path) -> Result<Self, TableError> {
        Ok(Self::multiple(read_file(path, TableSpec::CATEGORY_MAP)?))
    }

    pub fn destinations(&self, code: &str) -> Option<&[String]> {
        self.entries.get(code).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
