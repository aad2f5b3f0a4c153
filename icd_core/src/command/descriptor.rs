//! # Parameter descriptors
//!
//! A command declares its parameters with a compact descriptor string. The
//! string is parsed once, when the command is registered; dispatch only ever
//! sees the resulting [`Param`] list.
//!
//! ## Descriptor Table
//!
//! +------+----------------+----------------------------------+
//! | Kind | Parameter      | Bound value                      |
//! +------+----------------+----------------------------------+
//! | s    | plain string   | `Value::Text`                    |
//! | f    | existing file  | `Value::File` (checked on bind)  |
//! | o    | output file    | `Value::Output`                  |
//! +------+----------------+----------------------------------+
//!
//! Each parameter is written `name:K`, optionally followed by `*` (a list of
//! `K`, allowed on the last parameter only) or by `=default` (the value used
//! when no argument is left for the slot).
//!
//! Examples:
//! - "code:s"               => one string
//! - "ids:s*"               => zero or more strings
//! - "input:f output:o=-"   => an existing file, then an output path defaulting to `-`
//! - ""                     => no arguments

use thiserror::Error;

use super::{DefaultValue, Param, ParamKind};

/// Errors in a command declaration. These are programming errors in the
/// command table, never caused by user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// The kind after `:` is not one of the descriptor characters.
    #[error("parameter '{param}' of '{command}' has unknown kind '{kind}'")]
    UnknownKind {
        command: String,
        param: String,
        kind: String,
    },

    /// A list parameter is followed by another parameter.
    #[error("list parameter '{param}' of '{command}' must be the last parameter")]
    ListedNotLast { command: String, param: String },

    /// A token that does not follow `name:K[*|=default]`.
    #[error("malformed parameter '{token}' in the descriptor of '{command}'")]
    Malformed { command: String, token: String },

    /// Two parameters share a name.
    #[error("parameter '{param}' of '{command}' is declared twice")]
    DuplicateParam { command: String, param: String },

    /// A default was attached to a parameter the command does not declare.
    #[error("'{command}' has no parameter named '{param}'")]
    UnknownParam { command: String, param: String },

    /// Two commands share a name.
    #[error("command '{0}' is registered twice")]
    DuplicateCommand(String),
}

/// Parse the descriptor of `command` into its ordered parameter list.
pub fn parse_descriptor(command: &str, descriptor: &str) -> Result<Vec<Param>, SpecError> {
    let malformed = |token: &str| SpecError::Malformed {
        command: command.to_string(),
        token: token.to_string(),
    };

    let mut params: Vec<Param> = Vec::new();
    for token in descriptor.split_whitespace() {
        let (name, rest) = token.split_once(':').ok_or_else(|| malformed(token))?;
        if name.is_empty() {
            return Err(malformed(token));
        }

        let (kind_part, default) = match rest.split_once('=') {
            Some((kind, default)) => (kind, Some(default)),
            None => (rest, None),
        };
        let (kind_str, listed) = match kind_part.strip_suffix('*') {
            Some(kind) => (kind, true),
            None => (kind_part, false),
        };

        let kind = ParamKind::from_descriptor(kind_str).ok_or_else(|| SpecError::UnknownKind {
            command: command.to_string(),
            param: name.to_string(),
            kind: kind_str.to_string(),
        })?;

        // a list always defaults to the empty list
        if listed && default.is_some() {
            return Err(malformed(token));
        }

        if let Some(prev) = params.last() {
            if prev.listed {
                return Err(SpecError::ListedNotLast {
                    command: command.to_string(),
                    param: prev.name.clone(),
                });
            }
        }

        if params.iter().any(|p| p.name == name) {
            return Err(SpecError::DuplicateParam {
                command: command.to_string(),
                param: name.to_string(),
            });
        }

        params.push(Param {
            name: name.to_string(),
            kind,
            listed,
            default: default.map(|d| DefaultValue::Value(d.to_string())),
        });
    }

    Ok(params)
}
