//! ICD-10 to ICD-11 cross-mapping.
//!
//! ICD-10 codes refine by suffix (`F00.0` under `F00` under `F0`), so a code
//! without a mapping entry of its own is mapped through its nearest prefix
//! that has one. See [`map_code`].

mod mapping;
pub mod table;

pub use mapping::{
    Destination, MapError, MapFileSummary, MapMode, MapOutcome, MappingTables, map_code, map_file,
};
pub use table::{MappingTable, TableError, TableSpec, TermTable};
