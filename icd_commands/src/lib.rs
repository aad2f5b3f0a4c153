//! The handlers behind every `icd11` command.
//!
//! Each handler has the [`icd_core::Handler`] shape and works on a
//! [`Session`]; arguments arrive already bound and checked.

pub mod json;
mod local;
mod remote;
mod session;

#[cfg(test)]
mod testing;

pub use local::{STDOUT_PATH, default_config_file, map, mapfile, mapm, writeconfig};
pub use remote::{autocode, call, id, lookup, release, search};
pub use session::Session;
