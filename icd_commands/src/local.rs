//! Commands that work without the API.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use icd_api::Transport;
use icd_config::{CONFIG_EXTENSION, Config, PROGRAM, default_config_path};
use icd_core::Args;
use icd_mapper::{MapMode, MappingTables, map_code, map_file};

use crate::session::Session;

/// Output path meaning standard output.
pub const STDOUT_PATH: &str = "-";

fn load_tables<T: Transport>(session: &mut Session<T>, mode: MapMode) -> Result<MappingTables> {
    let dir = session.data_dir()?;
    MappingTables::load(&dir, mode).with_context(|| format!("loading mapping tables from {}", dir.display()))
}

fn map_with<T: Transport>(session: &mut Session<T>, args: &Args, mode: MapMode) -> Result<()> {
    let code = args.text(0)?;
    let tables = load_tables(session, mode)?;
    let outcome = map_code(code, mode, &tables)?;
    outcome.write_to(session.out())?;
    Ok(())
}

/// map <code>: the ICD-11 category of an ICD-10 code.
pub fn map<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    map_with(session, args, MapMode::Single)
}

/// mapm <code>: every ICD-11 category of an ICD-10 code.
pub fn mapm<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    map_with(session, args, MapMode::Multiple)
}

/// mapfile <input> [output]: map one ICD-10 code per line.
pub fn mapfile<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let input = args.path(0)?;
    let output = args.path(1)?;
    let tables = load_tables(session, MapMode::Single)?;

    if output == Path::new(STDOUT_PATH) {
        map_file(input, session.out(), &tables)?;
        return Ok(());
    }

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let summary = map_file(input, &mut writer, &tables)?;
    writer.flush().with_context(|| format!("writing {}", output.display()))?;

    info!(output = %output.display(), "wrote mapping");
    writeln!(
        session.out(),
        "{}: {} mapped, {} without mapping, {} unrecognized",
        output.display(),
        summary.mapped,
        summary.unmapped,
        summary.unrecognized
    )?;
    Ok(())
}

/// Where `writeconfig` writes when no path is given.
pub fn default_config_file() -> String {
    match default_config_path() {
        Ok(path) => path.display().to_string(),
        Err(_) => format!("{}.{}", PROGRAM, CONFIG_EXTENSION),
    }
}

/// writeconfig <client_id> <client_secret> [path]: store API credentials.
pub fn writeconfig<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let config = Config::new(args.text(0)?, args.text(1)?);
    let path = args.path(2)?;
    config.save(path)?;
    writeln!(session.out(), "wrote {}", path.display())?;
    Ok(())
}
