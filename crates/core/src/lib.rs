//! Brainbake internals.
//!
//! The pipeline is deliberately linear. Source text is [lex]ed down to
//! the eight significant bytes, [parse]d into the intermediate [`Inst`]
//! form with loop brackets mutually indexed, and run through
//! [`optimize`]; the result goes to whichever back end was asked for:
//!
//!  - [`interp`] runs it directly,
//!  - [`transpile`] prints it as a C program,
//!  - [`asm`] prints it as NASM, MASM or AT&T assembly text,
//!  - [`codegen`] + [`pe`] bake it into a standalone Windows x86-64
//!    executable, imports, headers and all, with no assembler or linker
//!    anywhere near the process.
//!
//! The back ends only agree on the shape of the optimizer's output;
//! none of them knows the others exist.
//!
//! [lex]: lexer::lex
//! [parse]: parsing::parse
//! [`optimize`]: optimize::optimize

pub mod asm;
pub mod codegen;
pub mod errors;
pub mod interp;
pub mod ir;
pub mod lexer;
pub mod optimize;
pub mod parsing;
pub mod pe;
pub mod transpile;

pub use crate::errors::CompilationError;
pub use crate::ir::{Inst, Program, TAPE_LEN};

/// The whole front end in one call: lex, parse, optimize.
pub fn compile(source: &[u8]) -> Result<Program, CompilationError> {
    let tokens = lexer::lex(source);
    let program = parsing::parse(&tokens)?;
    Ok(optimize::optimize(program))
}
