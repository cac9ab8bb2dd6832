//! Translates the intermediate program into a self-contained C file.
//!
//! The mapping is 1:1 and the output is plain ISO C99: a zeroed tape
//! array, a cursor pointer, and `while (*ptr)` for the loops. Brace
//! indentation tracks loop depth so the result is readable, not just
//! compilable.

use crate::ir::{Inst, TAPE_LEN};

/// Renders the program as a complete C translation unit.
pub fn to_c(program: &[Inst]) -> String {
    let mut out = String::new();
    let mut depth = 1;

    out.push_str("#include <stdio.h>\n");
    out.push_str("#include <string.h>\n\n");
    out.push_str("int main(void) {\n");
    out.push_str(&format!("    unsigned char tape[{}];\n", TAPE_LEN));
    out.push_str("    memset(tape, 0, sizeof(tape));\n");
    out.push_str("    unsigned char *ptr = tape;\n\n");

    for &inst in program {
        match inst {
            Inst::MovePtr(amount) => {
                indent(&mut out, depth);
                if amount > 0 {
                    out.push_str(&format!("ptr += {};\n", amount));
                } else {
                    out.push_str(&format!("ptr -= {};\n", -amount));
                }
            }
            Inst::AddVal(amount) => {
                indent(&mut out, depth);
                if amount > 0 {
                    out.push_str(&format!("*ptr += {};\n", amount));
                } else {
                    out.push_str(&format!("*ptr -= {};\n", -amount));
                }
            }
            Inst::Output => {
                indent(&mut out, depth);
                out.push_str("putchar(*ptr);\n");
            }
            Inst::Input => {
                indent(&mut out, depth);
                out.push_str("*ptr = (unsigned char)getchar();\n");
            }
            Inst::LoopBegin(_) => {
                indent(&mut out, depth);
                out.push_str("while (*ptr) {\n");
                depth += 1;
            }
            Inst::LoopEnd(_) => {
                depth -= 1;
                indent(&mut out, depth);
                out.push_str("}\n");
            }
            Inst::SetZero => {
                indent(&mut out, depth);
                out.push_str("*ptr = 0;\n");
            }
        }
    }

    out.push_str("\n    return 0;\n}\n");
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}
