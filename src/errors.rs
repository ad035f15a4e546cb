//! Hand-rolled error hierarchy. No `thiserror`/`anyhow`: every variant is a
//! plain struct/enum with a `Display` impl written by hand, matching the rest
//! of this workspace's error style.

use crate::address::AddressOverflow;
use crate::lexer::LexError;
use crate::position::Position;
use crate::types::Type;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: String,
        pos: Position,
    },
    PrintRequiresArgument(Position),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                pos,
            } => write!(f, "{pos}: expected {expected}, found {found}"),
            ParseError::PrintRequiresArgument(pos) => {
                write!(f, "{pos}: 'print' requires at least one argument")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    DuplicateSymbol {
        name: String,
        scope: String,
        first: Position,
        second: Position,
    },
    FunctionRedefinition {
        name: String,
        existing: Position,
        redeclared_at: Position,
    },
    ProgramRedefinition {
        existing: String,
        existing_pos: Position,
        redeclared_at: Position,
    },
    UndeclaredIdentifier {
        name: String,
        pos: Position,
    },
    UndeclaredFunction {
        name: String,
        pos: Position,
    },
    TypeMismatch {
        operator: String,
        left: Type,
        right: Type,
        pos: Position,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        pos: Position,
    },
    ArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: Type,
        found: Type,
        pos: Position,
    },
    ReturnTypeMismatch {
        name: String,
        expected: Type,
        found: Type,
        pos: Position,
    },
    MissingReturn {
        name: String,
        pos: Position,
    },
    AddressOverflow(AddressOverflow),
    StackUnderflow(Option<Position>),
    UnbalancedParenthesis(Position),
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::DuplicateSymbol {
                name,
                scope,
                first,
                second,
            } => write!(
                f,
                "{second}: '{name}' already declared in {scope} scope at {first}"
            ),
            SemanticError::FunctionRedefinition {
                name,
                existing,
                redeclared_at,
            } => write!(
                f,
                "{redeclared_at}: function '{name}' already defined at {existing}"
            ),
            SemanticError::ProgramRedefinition {
                existing,
                existing_pos,
                redeclared_at,
            } => write!(
                f,
                "{redeclared_at}: program already named '{existing}' at {existing_pos}"
            ),
            SemanticError::UndeclaredIdentifier { name, pos } => {
                write!(f, "{pos}: undeclared identifier '{name}'")
            }
            SemanticError::UndeclaredFunction { name, pos } => {
                write!(f, "{pos}: undeclared function '{name}'")
            }
            SemanticError::TypeMismatch {
                operator,
                left,
                right,
                pos,
            } => write!(
                f,
                "{pos}: type mismatch: cannot apply '{operator}' to {left} and {right}"
            ),
            SemanticError::ArityMismatch {
                name,
                expected,
                found,
                pos,
            } => write!(
                f,
                "{pos}: '{name}' expects {expected} argument(s), found {found}"
            ),
            SemanticError::ArgumentTypeMismatch {
                name,
                index,
                expected,
                found,
                pos,
            } => write!(
                f,
                "{pos}: argument {index} of '{name}' expects {expected}, found {found}"
            ),
            SemanticError::ReturnTypeMismatch {
                name,
                expected,
                found,
                pos,
            } => write!(
                f,
                "{pos}: '{name}' declared to return {expected}, found {found}"
            ),
            SemanticError::MissingReturn { name, pos } => {
                write!(f, "{pos}: function '{name}' does not return on all paths")
            }
            SemanticError::AddressOverflow(e) => write!(f, "{e}"),
            SemanticError::StackUnderflow(Some(pos)) => {
                write!(f, "{pos}: internal error: expression stack underflow")
            }
            SemanticError::StackUnderflow(None) => {
                write!(f, "internal error: expression stack underflow")
            }
            SemanticError::UnbalancedParenthesis(pos) => {
                write!(f, "{pos}: unbalanced parenthesis in expression")
            }
        }
    }
}

impl std::error::Error for SemanticError {}

impl From<AddressOverflow> for SemanticError {
    fn from(e: AddressOverflow) -> Self {
        SemanticError::AddressOverflow(e)
    }
}

#[derive(Debug)]
pub enum SerializeError {
    Io(std::io::Error),
    StringTooLong(String),
    TooManyEntries(String),
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializeError::Io(e) => write!(f, "i/o error writing .patitoc: {e}"),
            SerializeError::StringTooLong(s) => {
                write!(f, "string exceeds u16 length prefix: '{s}'")
            }
            SerializeError::TooManyEntries(what) => {
                write!(f, "too many {what} entries for u32 count field")
            }
        }
    }
}

impl std::error::Error for SerializeError {}

impl From<std::io::Error> for SerializeError {
    fn from(e: std::io::Error) -> Self {
        SerializeError::Io(e)
    }
}

/// The single error type returned by the public compilation API, unifying
/// every stage's error so callers match on one type.
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Semantic(SemanticError),
    Serialize(SerializeError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{e}"),
            CompileError::Parse(e) => write!(f, "{e}"),
            CompileError::Semantic(e) => write!(f, "{e}"),
            CompileError::Serialize(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<SemanticError> for CompileError {
    fn from(e: SemanticError) -> Self {
        CompileError::Semantic(e)
    }
}

impl From<SerializeError> for CompileError {
    fn from(e: SerializeError) -> Self {
        CompileError::Serialize(e)
    }
}

impl From<AddressOverflow> for CompileError {
    fn from(e: AddressOverflow) -> Self {
        CompileError::Semantic(SemanticError::AddressOverflow(e))
    }
}
