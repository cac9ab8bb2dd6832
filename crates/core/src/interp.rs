//! A straightforward interpreter over the intermediate program.

use std::io::{self, Read, Write};

use crate::ir::{Inst, TAPE_LEN};

/// What `Input` stores at end of stream: the byte a signed `getchar`
/// result would leave in a cell.
const EOF_BYTE: u8 = 0xFF;

/// Runs a program against the given byte streams.
///
/// Loop targets point *at* the matched bracket, and every dispatch step
/// ends with a program-counter increment; the increment is what carries
/// execution past the bracket after a jump. Both halves of a pair rely
/// on this, so keep the discipline two-sided.
///
/// Moving the cursor outside the tape is undefined behavior of the
/// source program; here it surfaces as an index panic rather than a
/// diagnosed error.
pub fn run<R: Read, W: Write>(program: &[Inst], mut input: R, mut output: W) -> io::Result<()> {
    let mut tape = vec![0u8; TAPE_LEN];
    let mut cell: usize = 0;
    let mut pc = 0;

    while pc < program.len() {
        match program[pc] {
            Inst::MovePtr(amount) => {
                cell = (cell as i64 + amount as i64) as usize;
            }
            Inst::AddVal(amount) => {
                tape[cell] = tape[cell].wrapping_add(amount as u8);
            }
            Inst::Output => output.write_all(&tape[cell..cell + 1])?,
            Inst::Input => tape[cell] = read_byte(&mut input)?,
            Inst::LoopBegin(end) => {
                if tape[cell] == 0 {
                    pc = end;
                }
            }
            Inst::LoopEnd(begin) => {
                if tape[cell] != 0 {
                    pc = begin;
                }
            }
            Inst::SetZero => tape[cell] = 0,
        }
        pc += 1;
    }

    output.flush()
}

/// Runs a program on the process's own stdin and stdout.
pub fn run_on_stdio(program: &[Inst]) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(program, stdin.lock(), stdout.lock())
}

fn read_byte<R: Read>(input: &mut R) -> io::Result<u8> {
    let mut byte = [0u8];
    match input.read(&mut byte)? {
        0 => Ok(EOF_BYTE),
        _ => Ok(byte[0]),
    }
}
