use std::{io, path::PathBuf};

use thiserror::Error;

/// The result of a compilation step.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort the translation of a compilation unit.
///
/// Translation is fail-fast: the first error ends the unit and any
/// instructions emitted so far are discarded.
#[derive(Debug, Error)]
pub enum Error {
    /// The source text could not be split into tokens.
    #[error("line {line}: {message}")]
    Lex { line: usize, message: String },

    /// The current token does not fit the production being parsed.
    #[error("line {line}: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: String,
        line: usize,
    },

    /// A name was declared twice in the same scope.
    #[error("`{name}` is already defined in this scope")]
    DuplicateSymbol { name: String },

    /// A name was used without being declared in any active scope.
    #[error("undeclared variable `{name}`")]
    UnresolvedSymbol { name: String },

    /// A return statement disagrees with the declared return type.
    #[error("in `{subroutine}`: {message}")]
    TypeMismatch { subroutine: String, message: String },

    /// An expression span passed the grammar but matched no shape.
    #[error("expression `{span}` is not recognized")]
    UnclassifiableExpression { span: String },

    /// Expressions nest deeper than the translator is willing to recurse.
    #[error(
        "line {line}: expression nested more than {} levels deep",
        crate::parser::MAX_NESTING
    )]
    NestingTooDeep { line: usize },

    /// A value does not fit in a VM constant or segment index.
    #[error("{what} is out of range")]
    OutOfRange { what: String },

    /// The driver was pointed at a file that is not Jack source.
    #[error("{} is not a .{} source file", path.display(), crate::driver::SOURCE_EXTENSION)]
    NotSource { path: PathBuf },

    /// Reading a source file or writing its output failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn lex(line: usize, message: impl Into<String>) -> Self {
        Error::Lex {
            line,
            message: message.into(),
        }
    }
}
