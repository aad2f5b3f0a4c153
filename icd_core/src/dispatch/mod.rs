//! # Dispatcher
//!
//! Resolves a command name to a registered [`Command`], binds the raw
//! argument tokens to its declared parameters and invokes the handler.
//!
//! * A purely numeric name is taken as the first argument of the numeric
//!   fallback command; a name starting with `http://`, `https://` or `/` as
//!   the first argument of the URI fallback command.
//! * Arguments are consumed left to right. A non-list parameter takes the next
//!   token or, when none is left, its default. A trailing list parameter takes
//!   every remaining token.
//! * Existing-file arguments are checked the moment they are consumed, so a
//!   missing file is reported before the handler runs.
//! * Leftover tokens are an error.
//!
//! `DispatchError` reports: `Empty`, `UnknownCommand`, `InsufficientArguments`,
//! `TooManyArguments`, `FileNotFound`, `Usage` and `Command` (the handler's
//! own failure). Registration problems are a [`SpecError`] from
//! [`Registry::register`], never a dispatch error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::command::args::{Args, Value};
use crate::command::descriptor::SpecError;
use crate::command::{Command, Param, ParamKind};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No command name at all.
    #[error("no command given")]
    Empty,

    /// No command with the given name exists in the table.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Ran out of arguments for a parameter without a default.
    #[error("missing argument <{param}> for '{command}'")]
    InsufficientArguments {
        command: String,
        param: String,
        usage: String,
    },

    /// Arguments left over once every parameter is bound.
    #[error("too many arguments for '{command}' (first unexpected: '{first_extra}')")]
    TooManyArguments {
        command: String,
        first_extra: String,
        usage: String,
    },

    /// An existing-file argument names nothing on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        command: String,
        param: String,
        path: PathBuf,
        usage: String,
    },

    /// An argument that cannot fill its parameter.
    #[error("{message}")]
    Usage {
        command: String,
        message: String,
        usage: String,
    },

    /// The handler ran and failed.
    #[error(transparent)]
    Command(anyhow::Error),
}

impl DispatchError {
    /// The usage line of the command, for errors caused by its arguments.
    pub fn usage(&self) -> Option<&str> {
        match self {
            DispatchError::InsufficientArguments { usage, .. }
            | DispatchError::TooManyArguments { usage, .. }
            | DispatchError::FileNotFound { usage, .. }
            | DispatchError::Usage { usage, .. } => Some(usage),
            _ => None,
        }
    }
}

/// True for a non-empty run of ASCII digits.
pub fn is_numeric(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// True for something that reads as a URI or an API path.
pub fn is_uri_like(name: &str) -> bool {
    name.starts_with("http://") || name.starts_with("https://") || name.starts_with('/')
}

/// The command table.
pub struct Registry<C> {
    program: &'static str,

    /// Sorted by name, so listings come out in a stable order.
    commands: BTreeMap<&'static str, Command<C>>,

    numeric_fallback: Option<&'static str>,
    uri_fallback: Option<&'static str>,
}

impl<C> Registry<C> {
    /// An empty table. `program` is the name shown in usage lines.
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            commands: BTreeMap::new(),
            numeric_fallback: None,
            uri_fallback: None,
        }
    }

    /// Command that receives a purely numeric first token.
    pub fn with_numeric_fallback(mut self, name: &'static str) -> Self {
        self.numeric_fallback = Some(name);
        self
    }

    /// Command that receives a URI or `/path` first token.
    pub fn with_uri_fallback(mut self, name: &'static str) -> Self {
        self.uri_fallback = Some(name);
        self
    }

    pub fn register(&mut self, command: Command<C>) -> Result<(), SpecError> {
        let name = command.name();
        if self.commands.contains_key(name) {
            return Err(SpecError::DuplicateCommand(name.to_string()));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    pub fn get(&self, name: &str) -> Option<&Command<C>> {
        self.commands.get(name)
    }

    /// Every command, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command<C>> {
        self.commands.values()
    }

    /// Find the command for `name`, applying the numeric and URI fallbacks.
    ///
    /// Returns the command and the argument tokens it should bind.
    pub fn resolve(&self, name: &str, args: &[String]) -> Result<(&Command<C>, Vec<String>), DispatchError> {
        if name.is_empty() {
            return Err(DispatchError::Empty);
        }

        let fallback = if is_numeric(name) {
            self.numeric_fallback
        } else if is_uri_like(name) {
            self.uri_fallback
        } else {
            None
        };

        if let Some(target) = fallback {
            let command = self
                .get(target)
                .ok_or_else(|| DispatchError::UnknownCommand(target.to_string()))?;
            let mut tokens = Vec::with_capacity(args.len() + 1);
            tokens.push(name.to_string());
            tokens.extend(args.iter().cloned());
            return Ok((command, tokens));
        }

        let command = self
            .get(name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;
        Ok((command, args.to_vec()))
    }

    /// Bind `tokens` to the parameters of `command`.
    pub fn bind(&self, command: &Command<C>, tokens: Vec<String>) -> Result<Args, DispatchError> {
        let mut remaining = tokens.into_iter();
        let mut values = Vec::with_capacity(command.params().len());

        for param in command.params() {
            if param.listed {
                let items = remaining
                    .by_ref()
                    .map(|raw| self.convert(command, param, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                values.push(Value::List(items));
                continue;
            }

            let raw = match remaining.next() {
                Some(raw) => raw,
                None => match &param.default {
                    Some(default) => default.produce(),
                    None => {
                        return Err(DispatchError::InsufficientArguments {
                            command: command.name().to_string(),
                            param: param.name.clone(),
                            usage: command.usage(self.program),
                        });
                    }
                },
            };
            values.push(self.convert(command, param, raw)?);
        }

        if let Some(extra) = remaining.next() {
            return Err(DispatchError::TooManyArguments {
                command: command.name().to_string(),
                first_extra: extra,
                usage: command.usage(self.program),
            });
        }

        Ok(Args::new(values))
    }

    fn convert(&self, command: &Command<C>, param: &Param, raw: String) -> Result<Value, DispatchError> {
        match param.kind {
            ParamKind::Text => Ok(Value::Text(raw)),
            ParamKind::ExistingFile | ParamKind::OutputFile if raw.is_empty() => Err(DispatchError::Usage {
                command: command.name().to_string(),
                message: format!("empty path for <{}>", param.name),
                usage: command.usage(self.program),
            }),
            ParamKind::ExistingFile => {
                let path = PathBuf::from(raw);
                if !path.exists() {
                    return Err(DispatchError::FileNotFound {
                        command: command.name().to_string(),
                        param: param.name.clone(),
                        path,
                        usage: command.usage(self.program),
                    });
                }
                Ok(Value::File(path))
            }
            ParamKind::OutputFile => Ok(Value::Output(PathBuf::from(raw))),
        }
    }

    /// Resolve, bind and invoke.
    pub fn dispatch(&self, ctx: &mut C, name: &str, args: &[String]) -> Result<(), DispatchError> {
        let (command, tokens) = self.resolve(name, args)?;
        debug!(command = command.name(), args = tokens.len(), "dispatching");
        let bound = self.bind(command, tokens)?;
        command.invoke(ctx, &bound).map_err(DispatchError::Command)
    }
}
