//! MASM text back end.
//!
//! Same instruction shape as the NASM dialect; the differences are all
//! surface syntax: `byte ptr` operand sizes, bare labels, `proc`/`endp`
//! bookkeeping and data declared with `dup`.

use super::LabelStack;
use crate::ir::Inst;

pub(super) fn generate(program: &[Inst]) -> String {
    let mut o = String::new();
    let mut labels = LabelStack::new();

    o.push_str(
        "\
; brainbake output - MASM x86-64 for Windows
extrn GetStdHandle : proc
extrn WriteFile : proc
extrn ReadFile : proc
extrn ExitProcess : proc

.data
tape    db 30000 dup(0)
written dq 0
readcnt dq 0

.code
main proc
    push rbx
    sub rsp, 48
    lea rbx, tape

    mov ecx, -11
    call GetStdHandle
    mov r12, rax
    mov ecx, -10
    call GetStdHandle
    mov r13, rax

",
    );

    for &inst in program {
        match inst {
            Inst::MovePtr(amount) => {
                if amount > 0 {
                    o.push_str(&format!("    add rbx, {}\n", amount));
                } else {
                    o.push_str(&format!("    sub rbx, {}\n", -amount));
                }
            }
            Inst::AddVal(amount) => {
                if amount > 0 {
                    o.push_str(&format!("    add byte ptr [rbx], {}\n", amount));
                } else {
                    o.push_str(&format!("    sub byte ptr [rbx], {}\n", -amount));
                }
            }
            Inst::SetZero => o.push_str("    mov byte ptr [rbx], 0\n"),
            Inst::Output => {
                o.push_str(
                    "\
    ; Output
    mov rcx, r12
    mov rdx, rbx
    mov r8, 1
    lea r9, written
    mov qword ptr [rsp+32], 0
    call WriteFile
",
                );
            }
            Inst::Input => {
                o.push_str(
                    "\
    ; Input
    mov rcx, r13
    mov rdx, rbx
    mov r8, 1
    lea r9, readcnt
    mov qword ptr [rsp+32], 0
    call ReadFile
",
                );
            }
            Inst::LoopBegin(_) => {
                let id = labels.open();
                o.push_str(&format!("loop_start_{}:\n", id));
                o.push_str("    cmp byte ptr [rbx], 0\n");
                o.push_str(&format!("    je loop_end_{}\n", id));
            }
            Inst::LoopEnd(_) => {
                let id = labels.close();
                o.push_str("    cmp byte ptr [rbx], 0\n");
                o.push_str(&format!("    jne loop_start_{}\n", id));
                o.push_str(&format!("loop_end_{}:\n", id));
            }
        }
    }

    o.push_str("\n    xor ecx, ecx\n    call ExitProcess\nmain endp\nend\n");
    o
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::optimize;
    use crate::parsing::parse;

    #[test]
    fn wraps_the_code_in_proc_and_end() {
        let text = generate(&[]);
        assert!(text.contains(".code\nmain proc\n"));
        assert!(text.ends_with("main endp\nend\n"));
    }

    #[test]
    fn memory_operands_carry_byte_ptr() {
        let text = generate(&optimize(parse(b"+[-]").unwrap()));
        assert!(text.contains("    add byte ptr [rbx], 1\n"));
        assert!(text.contains("    mov byte ptr [rbx], 0\n"));
    }

    #[test]
    fn sibling_loops_do_not_share_labels() {
        // a depth counter would reuse label 0 here; the stack must not
        let text = generate(&optimize(parse(b"+[-.][.]").unwrap()));
        assert!(text.contains("loop_start_0:"));
        assert!(text.contains("jne loop_start_1\nloop_end_1:"));
    }
}
