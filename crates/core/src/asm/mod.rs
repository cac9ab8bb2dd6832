//! Assembly back ends.
//!
//! Three text dialects (NASM, MASM, AT&T) print the same instruction
//! shape in their own syntax, and [`x86_64`] assembles that shape into
//! raw machine bytes for the PE writer. The shared shape:
//!
//! - `rbx` holds the cell cursor, loaded with the tape address up front
//! - `r12`/`r13` hold the stdout/stdin handles from `GetStdHandle`
//! - cell tests are `cmp byte [rbx], 0` with `je`/`jne` between paired,
//!   uniquely numbered labels
//! - `WriteFile`/`ReadFile` get their fifth argument through the
//!   `[rsp+32]` slot of the 48 bytes reserved in the prolog, which also
//!   keeps `rsp` 16-aligned at every call
//! - the program leaves through `ExitProcess(0)`

mod att;
mod masm;
mod nasm;

pub(crate) mod x86_64;

use std::str::FromStr;

use thiserror::Error;

use crate::ir::Inst;

/// Which assembler's syntax to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmFlavor {
    Nasm,
    Masm,
    Att,
}

impl AsmFlavor {
    /// Default file extension for this dialect's output.
    pub fn extension(self) -> &'static str {
        match self {
            AsmFlavor::Nasm | AsmFlavor::Masm => "asm",
            AsmFlavor::Att => "s",
        }
    }
}

/// A `--format=` value nobody recognizes.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown assembly format '{0}' (expected nasm, masm, att or gas)")]
pub struct UnknownFormat(String);

impl FromStr for AsmFlavor {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nasm" => Ok(AsmFlavor::Nasm),
            "masm" => Ok(AsmFlavor::Masm),
            "att" | "gas" => Ok(AsmFlavor::Att),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Prints the whole program in the chosen dialect.
pub fn emit(program: &[Inst], flavor: AsmFlavor) -> String {
    match flavor {
        AsmFlavor::Nasm => nasm::generate(program),
        AsmFlavor::Masm => masm::generate(program),
        AsmFlavor::Att => att::generate(program),
    }
}

/// Hands out unique loop-label numbers and pairs them with a stack.
///
/// Every dialect uses this, so a dialect's correctness never leans on
/// the parser's balance guarantee.
struct LabelStack {
    stack: Vec<usize>,
    next: usize,
}

impl LabelStack {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            next: 0,
        }
    }

    fn open(&mut self) -> usize {
        let label = self.next;
        self.next += 1;
        self.stack.push(label);
        label
    }

    fn close(&mut self) -> usize {
        self.stack
            .pop()
            .expect("unbalanced brackets survived parsing")
    }
}
