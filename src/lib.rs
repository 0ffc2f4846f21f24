use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

mod ast;
mod compiler;
mod context;
mod dispatch;
mod interp;
mod parser;
mod part;
mod properties;
mod system;
mod value;

#[cfg(test)]
mod tests;

pub use ast::{
    Argument, ArithmeticOp, HandlerDefinition, HandlerKind, InterpreterNode, Message, MessageKind,
    PartRefNode, Qualifier, Relation, RepeatControl, SenderRef, Statement,
};
pub use compiler::CompileOutcome;
pub use context::ExecutionContext;
pub use dispatch::Delivery;
pub use part::{PartId, PartKind};
pub use properties::{Property, PropertyChange, PropertyVariant, Styler, Subscriber};
pub use system::{ErrorReport, System, TraceEntry};
pub use value::Value;

pub(crate) use compiler::{CompileFault, CompileStage};
pub(crate) use context::Frame;
pub(crate) use interp::{Exec, ExecFault, ScriptFault, script_fault};
pub(crate) use part::{Part, Parts};
pub(crate) use properties::PropertyTable;
pub(crate) use value::{normalize_name, text_eq};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnknownPart(PartId),
    PropertyNotFound { part: PartId, name: String },
    RootImmutable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPart(id) => write!(f, "unknown part: {id}"),
            Self::PropertyNotFound { part, name } => {
                write!(f, "part {part} has no property named \"{name}\"")
            }
            Self::RootImmutable => write!(f, "the world root cannot be created or removed"),
        }
    }
}

impl StdError for Error {}
