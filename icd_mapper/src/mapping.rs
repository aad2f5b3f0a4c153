use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use icd_config::{ICD11_TERMS_FILE, MAP_MULTIPLE_CATEGORIES_FILE, MAP_ONE_CATEGORY_FILE};

use crate::table::{MappingTable, TableError, TermTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// One ICD-11 category per ICD-10 code.
    Single,
    /// Every ICD-11 category the ICD-10 code maps to.
    Multiple,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("{0} is not a recognized ICD-10 code")]
    UnrecognizedCode(String),

    #[error("mapping data is inconsistent: {destination} (mapped from {source_code}) has no ICD-11 term")]
    DataIntegrity {
        source_code: String,
        destination: String,
    },

    #[error("no {0:?} mapping table is loaded")]
    NotLoaded(MapMode),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything one mapping command reads.
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    pub icd10_terms: TermTable,
    pub icd11_terms: TermTable,
    single: Option<MappingTable>,
    multiple: Option<MappingTable>,
}

impl MappingTables {
    pub fn new(icd10_terms: TermTable, icd11_terms: TermTable) -> Self {
        Self {
            icd10_terms,
            icd11_terms,
            single: None,
            multiple: None,
        }
    }

    pub fn with_mapping(mut self, mode: MapMode, table: MappingTable) -> Self {
        match mode {
            MapMode::Single => self.single = Some(table),
            MapMode::Multiple => self.multiple = Some(table),
        }
        self
    }

    /// Load both term tables and the mapping table of `mode` from `data_dir`.
    pub fn load(data_dir: &Path, mode: MapMode) -> Result<Self, TableError> {
        let icd10_terms = TermTable::load(&data_dir.join(MAP_ONE_CATEGORY_FILE))?;
        let icd11_terms = TermTable::load(&data_dir.join(ICD11_TERMS_FILE))?;
        let mapping = match mode {
            MapMode::Single => MappingTable::load_single(&data_dir.join(MAP_ONE_CATEGORY_FILE))?,
            MapMode::Multiple => MappingTable::load_multiple(&data_dir.join(MAP_MULTIPLE_CATEGORIES_FILE))?,
        };
        Ok(Self::new(icd10_terms, icd11_terms).with_mapping(mode, mapping))
    }

    pub fn mapping(&self, mode: MapMode) -> Option<&MappingTable> {
        match mode {
            MapMode::Single => self.single.as_ref(),
            MapMode::Multiple => self.multiple.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub code: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOutcome {
    Mapped {
        code: String,
        term: String,
        /// The key that matched; shorter than `code` after a fallback.
        matched: String,
        /// Term of `matched`; prefixes such as `F0` often have none.
        matched_term: Option<String>,
        destinations: Vec<Destination>,
    },
    NoMapping {
        code: String,
        term: String,
    },
}

impl MapOutcome {
    pub fn code(&self) -> &str {
        match self {
            MapOutcome::Mapped { code, .. } | MapOutcome::NoMapping { code, .. } => code,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MapOutcome::Mapped { code, matched, .. } if code != matched)
    }

    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            MapOutcome::NoMapping { code, term } => {
                writeln!(out, "ICD-10 {}: {}", code, term)?;
                writeln!(out, "no mapping found for {}", code)
            }
            MapOutcome::Mapped {
                code,
                term,
                matched,
                matched_term,
                destinations,
            } => {
                writeln!(out, "ICD-10 {}: {}", code, term)?;
                if code != matched {
                    writeln!(
                        out,
                        "no exact mapping for {}, using {}: {}",
                        code,
                        matched,
                        matched_term.as_deref().unwrap_or("(no term)")
                    )?;
                }
                for dest in destinations {
                    writeln!(out, "ICD-11 {}: {}", dest.code, dest.term)?;
                }
                Ok(())
            }
        }
    }
}

/// Map one ICD-10 code, falling back to ever shorter prefixes of it.
pub fn map_code(code: &str, mode: MapMode, tables: &MappingTables) -> Result<MapOutcome, MapError> {
    let term = tables
        .icd10_terms
        .get(code)
        .ok_or_else(|| MapError::UnrecognizedCode(code.to_string()))?
        .to_string();
    let mapping = tables.mapping(mode).ok_or(MapError::NotLoaded(mode))?;

    let mut key = code;
    let found = loop {
        if key.is_empty() {
            break None;
        }
        if let Some(destinations) = mapping.destinations(key) {
            break Some(destinations);
        }
        key = truncate_last(key);
    };

    let Some(found) = found else {
        debug!(code, "no mapping at any prefix");
        return Ok(MapOutcome::NoMapping {
            code: code.to_string(),
            term,
        });
    };
    if key != code {
        debug!(code, matched = key, "mapped through a shorter prefix");
    }

    let destinations = found
        .iter()
        .map(|dest| -> Result<Destination, MapError> {
            let term = tables.icd11_terms.get(dest).ok_or_else(|| MapError::DataIntegrity {
                source_code: key.to_string(),
                destination: dest.clone(),
            })?;
            Ok(Destination {
                code: dest.clone(),
                term: term.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MapOutcome::Mapped {
        code: code.to_string(),
        term,
        matched: key.to_string(),
        matched_term: tables.icd10_terms.get(key).map(str::to_string),
        destinations,
    })
}

fn truncate_last(code: &str) -> &str {
    match code.char_indices().next_back() {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}

/// Counts of one [`map_file`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapFileSummary {
    pub mapped: usize,
    pub unmapped: usize,
    pub unrecognized: usize,
}

/// Map every non-blank line of `input` in single mode.
///
/// Writes `code<TAB>matched<TAB>icd11 code<TAB>icd11 term`, one row per
/// destination. Unmapped codes get `-` as their key; unrecognized codes an
/// empty key.
pub fn map_file<W: Write + ?Sized>(
    input: &Path,
    out: &mut W,
    tables: &MappingTables,
) -> Result<MapFileSummary, MapError> {
    let io_err = |source| TableError::Io {
        path: input.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(input).map_err(io_err)?);
    let mut summary = MapFileSummary::default();

    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        let code = line.trim();
        if code.is_empty() {
            continue;
        }

        match map_code(code, MapMode::Single, tables) {
            Ok(MapOutcome::Mapped {
                matched, destinations, ..
            }) => {
                summary.mapped += 1;
                for dest in destinations {
                    writeln!(out, "{}\t{}\t{}\t{}", code, matched, dest.code, dest.term)?;
                }
            }
            Ok(MapOutcome::NoMapping { .. }) => {
                summary.unmapped += 1;
                writeln!(out, "{}\t-\t\t", code)?;
            }
            Err(MapError::UnrecognizedCode(_)) => {
                summary.unrecognized += 1;
                writeln!(out, "{}\t\t\t", code)?;
            }
            Err(err) => return Err(err),
        }
    }

    debug!(
        input = %input.display(),
        mapped = summary.mapped,
        unmapped = summary.unmapped,
        unrecognized = summary.unrecognized,
        "mapped file"
    );
    Ok(summary)
}
