//! Parses source text (really, just a bunch of bytes) into the
//! intermediate program.

use crate::errors::CompilationError;
use crate::ir::{Inst, Program};

/// Parses a token stream into a program.
///
/// Besides translating the six simple characters one-for-one, this is
/// where loop brackets find each other: `[` remembers its position on a
/// stack, and the matching `]` writes both jump indices the moment it
/// pops. Bytes that are not significant are skipped, so feeding raw
/// (unlexed) source through here works too.
pub fn parse(tokens: &[u8]) -> Result<Program, CompilationError> {
    use Inst::*;

    let mut program: Program = Vec::new();
    let mut brackets = BracketStack::new();

    for &byte in tokens {
        let inst = match byte {
            b'>' => MovePtr(1),
            b'<' => MovePtr(-1),
            b'+' => AddVal(1),
            b'-' => AddVal(-1),
            b'.' => Output,
            b',' => Input,
            b'[' => {
                brackets.open(program.len());
                // target filled in when the matching ']' shows up
                LoopBegin(0)
            }
            b']' => match brackets.close() {
                Some(open) => {
                    program[open] = LoopBegin(program.len());
                    LoopEnd(open)
                }
                None => return Err(CompilationError::UnmatchedClose),
            },
            _ => continue,
        };
        program.push(inst);
    }

    if brackets.is_empty() {
        Ok(program)
    } else {
        Err(CompilationError::UnmatchedOpen)
    }
}

// Private data structures

/// Tracks the program position of every `[` still waiting for its `]`.
struct BracketStack {
    stack: Vec<usize>,
}

impl BracketStack {
    fn new() -> Self {
        Self { stack: Vec::new() }
    }

    fn open(&mut self, position: usize) {
        self.stack.push(position);
    }

    fn close(&mut self) -> Option<usize> {
        self.stack.pop()
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
