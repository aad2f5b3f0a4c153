//! Command table and argument-binding dispatcher.
//!
//! Commands are declared as ordinary functions plus a descriptor string for
//! their parameters; see [`command::descriptor`] for the descriptor table and
//! [`dispatch`] for how raw arguments are bound.

pub mod command;
pub mod dispatch;

pub use command::args::{ArgError, Args, Value};
pub use command::descriptor::SpecError;
pub use command::{Command, DefaultValue, Handler, Param, ParamKind};
pub use dispatch::{DispatchError, Registry};
