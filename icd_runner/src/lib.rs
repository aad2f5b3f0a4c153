//! The `icd11` command table and the run-one-command loop around it.

use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, error};

use icd_api::{HttpTransport, Transport};
use icd_commands::{self as uc, Session};
use icd_config::{ConfigError, FATAL_EXIT_CODE, PROGRAM, remediation};
use icd_core::{Command, DispatchError, Registry, SpecError};

/// Prints the command list; handled before dispatch.
pub const HELP_COMMAND: &str = "help";

/// Every builtin command. A numeric first token goes to `id`, a URI or
/// `/path` first token to `call`.
pub fn builtin_registry<T: Transport>() -> Result<Registry<Session<T>>, SpecError> {
    let mut registry = Registry::new(PROGRAM)
        .with_numeric_fallback("id")
        .with_uri_fallback("call");

    let commands = [
        Command::new("autocode", "text:s", uc::autocode::<T>)?
            .about("best matching ICD-11 code for free text"),
        Command::new("id", "ids:s*", uc::id::<T>)?.about("title and definition of foundation entities"),
        Command::new("lookup", "code:s", uc::lookup::<T>)?.about("the MMS entity behind an ICD-11 code"),
        Command::new("search", "text:s", uc::search::<T>)?.about("ICD-11 codes whose titles match free text"),
        Command::new("release", "", uc::release::<T>)?.about("release in use and the published releases"),
        Command::new("call", "uri:s", uc::call::<T>)?.about("raw API request, printed as JSON"),
        Command::new("map", "code:s", uc::map::<T>)?.about("ICD-11 category of an ICD-10 code"),
        Command::new("mapm", "code:s", uc::mapm::<T>)?.about("every ICD-11 category of an ICD-10 code"),
        Command::new("mapfile", "input:f output:o=-", uc::mapfile::<T>)?
            .about("map one ICD-10 code per line of a file ('-' writes to stdout)"),
        Command::new("writeconfig", "client_id:s client_secret:s path:o", uc::writeconfig::<T>)?
            .default_with("path", uc::default_config_file)?
            .about("store API credentials in a configuration file"),
    ];
    for command in commands {
        registry.register(command)?;
    }
    Ok(registry)
}

/// The command list printed for `help` and for a bare invocation.
pub fn write_help<C, W: Write + ?Sized>(registry: &Registry<C>, out: &mut W) -> io::Result<()> {
    let program = registry.program();
    let mut rows: Vec<(String, &str)> = registry
        .commands()
        .map(|cmd| (cmd.synopsis(), cmd.summary()))
        .collect();
    rows.push((HELP_COMMAND.to_string(), "this list"));
    rows.push(("<entity id>".to_string(), "same as: id <entity id>"));
    rows.push(("<uri or /path>".to_string(), "same as: call <uri>"));

    let width = rows.iter().map(|(synopsis, _)| synopsis.len()).max().unwrap_or(0);

    writeln!(out, "usage: {} [-v...] [--config <file>] <command> [args...]", program)?;
    writeln!(out)?;
    writeln!(out, "commands:")?;
    for (synopsis, summary) in &rows {
        writeln!(out, "  {:<width$}  {}", synopsis, summary, width = width)?;
    }
    Ok(())
}

/// Diagnostic for a failed command: the error, then the usage line or the
/// configuration instructions when they apply.
pub fn report<W: Write + ?Sized>(err: &DispatchError, config_path: &Path, out: &mut W) -> io::Result<()> {
    match err {
        DispatchError::Command(inner) => {
            writeln!(out, "error: {:#}", inner)?;
            if inner.chain().any(|cause| cause.is::<ConfigError>()) {
                writeln!(out)?;
                writeln!(out, "{}", remediation(config_path))?;
            }
        }
        other => writeln!(out, "error: {}", other)?,
    }
    if let Some(usage) = err.usage() {
        writeln!(out, "{}", usage)?;
    }
    Ok(())
}

/// Command table plus the session its handlers share.
pub struct Runner<T = HttpTransport> {
    registry: Registry<Session<T>>,
    session: Session<T>,
}

impl<T: Transport> Runner<T> {
    pub fn new(session: Session<T>) -> Result<Self, SpecError> {
        Ok(Self {
            registry: builtin_registry()?,
            session,
        })
    }

    pub fn registry(&self) -> &Registry<Session<T>> {
        &self.registry
    }

    /// Run `command`; no command, or `help`, prints the command list.
    pub fn execute(&mut self, command: Option<&str>, args: &[String]) -> Result<(), DispatchError> {
        match command {
            None | Some(HELP_COMMAND) => {
                write_help(&self.registry, self.session.out()).map_err(|e| DispatchError::Command(e.into()))
            }
            Some(name) => self.registry.dispatch(&mut self.session, name, args),
        }
    }

    /// [`Runner::execute`], reporting failure; returns the exit status.
    pub fn run(&mut self, command: Option<&str>, args: &[String]) -> i32 {
        let err = match self.execute(command, args) {
            Ok(()) => {
                debug!(command = command.unwrap_or(HELP_COMMAND), "done");
                return 0;
            }
            Err(err) => err,
        };

        error!(error = %err, "command failed");
        let config_path = self.session.config_path().to_path_buf();
        if let Err(io_err) = report(&err, &config_path, self.session.out()) {
            error!(error = %io_err, "cannot print the error report");
        }
        FATAL_EXIT_CODE
    }
}
