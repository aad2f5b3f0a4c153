//! Command and parameter descriptors.
//!
//! A [`Command`] couples a name with its declared parameters and a plain
//! handler function. The parameter list is the command's whole CLI grammar:
//! the dispatcher consumes raw arguments against it, so no command keeps a
//! separate argument-parsing table.

pub mod args;
pub mod descriptor;

use std::fmt;

use args::Args;
use descriptor::{SpecError, parse_descriptor};

/// The semantic type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any string.
    Text,

    /// A path that must exist when the argument is consumed.
    ExistingFile,

    /// A path that will be written; it need not exist.
    OutputFile,
}

impl ParamKind {
    /// Descriptor character to kind (see the table in [`descriptor`]).
    pub fn from_descriptor(s: &str) -> Option<Self> {
        match s {
            "s" => Some(ParamKind::Text),
            "f" => Some(ParamKind::ExistingFile),
            "o" => Some(ParamKind::OutputFile),
            _ => None,
        }
    }

    pub fn descriptor(self) -> char {
        match self {
            ParamKind::Text => 's',
            ParamKind::ExistingFile => 'f',
            ParamKind::OutputFile => 'o',
        }
    }
}

/// Value bound to a parameter when no argument is left for it.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// Fixed value written in the descriptor.
    Value(String),

    /// Computed on demand, only when the slot is empty.
    With(fn() -> String),
}

impl DefaultValue {
    pub fn produce(&self) -> String {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::With(f) => f(),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,

    /// Consumes every remaining argument. Only ever set on the last parameter.
    pub listed: bool,

    pub default: Option<DefaultValue>,
}

impl Param {
    /// How the parameter reads in a usage line.
    fn usage_fragment(&self) -> String {
        match (&self.default, self.listed) {
            (_, true) => format!("[<{}>...]", self.name),
            (Some(DefaultValue::Value(v)), _) => format!("[{}={}]", self.name, v),
            (Some(DefaultValue::With(_)), _) => format!("[{}]", self.name),
            (None, false) => format!("<{}>", self.name),
        }
    }
}

/// Handler signature shared by every command of a registry.
///
/// `C` is the session context the handlers operate on.
pub type Handler<C> = fn(&mut C, &Args) -> anyhow::Result<()>;

/// A registered command.
pub struct Command<C> {
    name: &'static str,
    params: Vec<Param>,
    about: &'static str,
    handler: Handler<C>,
}

impl<C> Command<C> {
    /// Declare a command from its descriptor string.
    pub fn new(name: &'static str, descriptor: &str, handler: Handler<C>) -> Result<Self, SpecError> {
        Ok(Self {
            name,
            params: parse_descriptor(name, descriptor)?,
            about: "",
            handler,
        })
    }

    /// One-line summary shown in help output.
    pub fn about(mut self, about: &'static str) -> Self {
        self.about = about;
        self
    }

    /// Attach a computed default to a declared, non-list parameter.
    pub fn default_with(mut self, param: &str, produce: fn() -> String) -> Result<Self, SpecError> {
        let name = self.name;
        let slot = self
            .params
            .iter_mut()
            .find(|p| p.name == param)
            .ok_or_else(|| SpecError::UnknownParam {
                command: name.to_string(),
                param: param.to_string(),
            })?;
        if slot.listed {
            return Err(SpecError::Malformed {
                command: name.to_string(),
                token: param.to_string(),
            });
        }
        slot.default = Some(DefaultValue::With(produce));
        Ok(self)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn summary(&self) -> &'static str {
        self.about
    }

    /// `<name> <params...>`
    pub fn synopsis(&self) -> String {
        let mut line = self.name.to_string();
        for param in &self.params {
            line.push(' ');
            line.push_str(&param.usage_fragment());
        }
        line
    }

    /// `usage: <program> <name> <params...>`
    pub fn usage(&self, program: &str) -> String {
        format!("usage: {} {}", program, self.synopsis())
    }

    pub(crate) fn invoke(&self, ctx: &mut C, args: &Args) -> anyhow::Result<()> {
        (self.handler)(ctx, args)
    }
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("about", &self.about)
            .finish()
    }
}
