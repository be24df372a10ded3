// SPDX-License-Identifier: Apache-2.0

//! Errors that can arise while elaborating a component hierarchy into a
//! quantified CNF problem. All of these abort the elaboration pass; there is
//! no partial recovery.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A name was declared twice at the same scope level.
    NameConflict(String),
    /// An identifier could not be resolved in the current context.
    UnresolvedName(String),
    /// An instantiation supplied the wrong number of generics or ports.
    ArityMismatch {
        component: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An operator was used in a position where it has no encoding; carries
    /// the textual rendering of the offending expression.
    UnsupportedOperator(String),
    /// Structurally invalid input from the front end (e.g. a negative bus
    /// width).
    MalformedInput(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NameConflict(name) => write!(f, "'{}' is already defined", name),
            Error::UnresolvedName(name) => write!(f, "'{}' is not defined", name),
            Error::ArityMismatch {
                component,
                what,
                expected,
                actual,
            } => write!(
                f,
                "component '{}' expects {} {}, got {}",
                component, expected, what, actual
            ),
            Error::UnsupportedOperator(expr) => {
                write!(f, "unsupported operator in expression: {}", expr)
            }
            Error::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
