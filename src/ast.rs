use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Function,
    Error,
    Compile,
}

/// Non-owning reference to a part a message has passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderRef {
    pub kind: PartKind,
    pub id: PartId,
}

/// A message travelling the delegation chain. Immutable once built;
/// arguments may still be unevaluated interpreter nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub name: String,
    pub args: Vec<Argument>,
    pub senders: Vec<SenderRef>,
}

impl Message {
    pub fn command(name: &str, args: Vec<Value>) -> Self {
        Self {
            kind: MessageKind::Command,
            name: name.to_string(),
            args: args.into_iter().map(Argument::Value).collect(),
            senders: Vec::new(),
        }
    }

    pub fn function(name: &str, args: Vec<Value>) -> Self {
        Self {
            kind: MessageKind::Function,
            name: name.to_string(),
            args: args.into_iter().map(Argument::Value).collect(),
            senders: Vec::new(),
        }
    }

    pub(crate) fn error(name: &str, detail: &str) -> Self {
        Self {
            kind: MessageKind::Error,
            name: name.to_string(),
            args: vec![Argument::Value(Value::text(detail))],
            senders: Vec::new(),
        }
    }
}

/// A handler argument or expression operand: either an already
/// evaluated value or a node the interpreter evaluates late, against
/// the live execution context of the invoking part.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    Node(InterpreterNode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterNode {
    Variable { name: String },
    Parameter { name: String, index: usize },
    PartRef(PartRefNode),
    Arithmetic { op: ArithmeticOp, operands: Vec<Argument> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    /// `&` joins text directly; `+` is never overloaded for text.
    Concat,
    /// `&&` joins text with a single space.
    ConcatSpace,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// Reference to a part in the object graph, resolved at evaluation
/// time against the invoking part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRefNode {
    pub object_type: Option<PartKind>,
    pub relation: Option<Relation>,
    pub qualifier: Option<Qualifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    This,
    Current,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    Name(String),
    Id(usize),
    /// One-based position among the context part's subparts.
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Command,
    Function,
}

/// Product of compilation: one handler block, keyed uniquely by
/// normalized name per target. Reinstalling under the same name
/// replaces the prior definition.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDefinition {
    pub kind: HandlerKind,
    pub name: String,
    pub parameters: Vec<String>,
    pub statements: Vec<Statement>,
}

impl HandlerDefinition {
    pub(crate) fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Send a command message to the executing part (and up its
    /// delegation chain). `put`, `set`, `answer` and `go to` compile
    /// to this form with their built-in command names.
    Message { name: String, args: Vec<Argument> },
    IfThen {
        condition: Argument,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    Repeat {
        control: RepeatControl,
        body: Vec<Statement>,
    },
    ExitRepeat,
    NextRepeat,
    /// `exit <name>`: end the handler early; the message still counts
    /// as handled.
    ExitHandler { handler: String },
    /// `pass <name>`: end the handler early, then forward the message
    /// up the delegation chain.
    PassHandler { handler: String },
    Return { value: Argument },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatControl {
    ForTimes { count: Argument },
    Until { condition: Argument },
    While { condition: Argument },
    WithRange {
        variable: String,
        start: Argument,
        finish: Argument,
    },
}
