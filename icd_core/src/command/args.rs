use std::path::{Path, PathBuf};

use thiserror::Error;

/// One bound argument, shaped by the kind of the parameter it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain string.
    Text(String),

    /// Path that existed when the argument was bound.
    File(PathBuf),

    /// Path to write to; may not exist yet.
    Output(PathBuf),

    /// Every remaining argument, for a trailing list parameter.
    List(Vec<Value>),
}

impl Value {
    /// The argument as it was typed. `None` for lists and non UTF-8 paths.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::File(p) | Value::Output(p) => p.to_str(),
            Value::List(_) => None,
        }
    }
}

/// A handler asked for an argument its own declaration does not provide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("argument {0} is not bound")]
    Missing(usize),

    #[error("argument {index} is not {expected}")]
    Shape { index: usize, expected: &'static str },
}

/// Positional arguments handed to a command handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn at(&self, index: usize) -> Result<&Value, ArgError> {
        self.values.get(index).ok_or(ArgError::Missing(index))
    }

    /// A plain string argument.
    pub fn text(&self, index: usize) -> Result<&str, ArgError> {
        match self.at(index)? {
            Value::Text(s) => Ok(s),
            _ => Err(ArgError::Shape { index, expected: "a string" }),
        }
    }

    /// An existing-file or output-file argument.
    pub fn path(&self, index: usize) -> Result<&Path, ArgError> {
        match self.at(index)? {
            Value::File(p) | Value::Output(p) => Ok(p),
            _ => Err(ArgError::Shape { index, expected: "a path" }),
        }
    }

    /// A trailing list argument.
    pub fn list(&self, index: usize) -> Result<&[Value], ArgError> {
        match self.at(index)? {
            Value::List(items) => Ok(items),
            _ => Err(ArgError::Shape { index, expected: "a list" }),
        }
    }

    /// A trailing list argument, as the strings that were typed.
    pub fn texts(&self, index: usize) -> Result<Vec<&str>, ArgError> {
        self.list(index)?
            .iter()
            .map(|v| v.as_str().ok_or(ArgError::Shape { index, expected: "a list of strings" }))
            .collect()
    }
}
