//! The intermediate representation every back end consumes.

use std::fmt;

/// How many cells the tape has. Fixed by the language, not configurable.
pub const TAPE_LEN: usize = 30_000;

/// One instruction of the intermediate program.
///
/// Loop brackets carry the index of their partner, pointing *at* the
/// matched instruction rather than past it. Both the interpreter and
/// the machine-code generator rely on that convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    /// Move the cell cursor by a signed amount.
    MovePtr(i32),
    /// Add a signed amount to the current cell, wrapping mod 256.
    AddVal(i32),
    /// Write the current cell to stdout.
    Output,
    /// Read one byte from stdin into the current cell.
    Input,
    /// If the cell is zero, jump past the matched [`Inst::LoopEnd`].
    LoopBegin(usize),
    /// If the cell is non-zero, jump back to the matched [`Inst::LoopBegin`].
    LoopEnd(usize),
    /// Store zero into the current cell (a folded `[-]` or `[+]`).
    SetZero,
}

/// An ordered instruction sequence with mutually-indexed brackets.
pub type Program = Vec<Inst>;

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Inst::*;
        match self {
            MovePtr(amount) => write!(f, "bp <- bp + #{}", amount),
            AddVal(amount) => write!(f, "[bp] <- [bp] + #{}", amount),
            Output => write!(f, "putchar [bp]"),
            Input => write!(f, "getchar [bp]"),
            LoopBegin(target) => write!(f, "beq {}", target),
            LoopEnd(target) => write!(f, "bne {}", target),
            SetZero => write!(f, "zro"),
        }
    }
}

/// Renders a program in a pseudo-assembly format. Handy when staring at
/// optimizer output.
pub fn disassemble(program: &[Inst]) -> String {
    let mut out = String::new();
    for (i, inst) in program.iter().enumerate() {
        out.push_str(&format!("{:4}: {}\n", i, inst));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_the_disassembly_vocabulary() {
        assert_eq!(Inst::AddVal(-3).to_string(), "[bp] <- [bp] + #-3");
        assert_eq!(Inst::LoopBegin(7).to_string(), "beq 7");
        assert_eq!(Inst::SetZero.to_string(), "zro");
    }

    #[test]
    fn disassemble_numbers_every_line() {
        let program = vec![Inst::AddVal(1), Inst::Output];
        let text = disassemble(&program);
        assert_eq!(text, "   0: [bp] <- [bp] + #1\n   1: putchar [bp]\n");
    }
}
