//! All errors that can be _generated_ by the compiler.
//!
//! Only the parser can reject a program; every later stage is total
//! over what the parser lets through. File and flag trouble is the
//! CLI's business, not this crate's.

use thiserror::Error;

/// Any error that occurs as a result of compiling the source code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CompilationError {
    /// A `]` showed up with no `[` still open before it.
    #[error("too many ']' brackets. Check that each '[' has a matching ']'")]
    UnmatchedClose,

    /// The input ended with at least one `[` still open.
    #[error("too many '[' brackets. Check that each '[' has a matching ']'")]
    UnmatchedOpen,
}
