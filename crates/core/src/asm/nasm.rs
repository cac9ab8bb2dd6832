//! NASM (Intel syntax) text back end.

use super::LabelStack;
use crate::ir::Inst;

pub(super) fn generate(program: &[Inst]) -> String {
    let mut o = String::new();
    let mut labels = LabelStack::new();

    o.push_str(
        "\
; brainbake output - NASM x86-64 for Windows
default rel
bits 64

extern GetStdHandle
extern WriteFile
extern ReadFile
extern ExitProcess

section .bss
tape:    resb 30000
written: resq 1
readcnt: resq 1

section .text
global main
main:
    push rbx
    sub rsp, 48
    lea rbx, [tape]

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
                    o.push_str(&format!("    add byte [rbx], {}\n", amount));
                } else {
                    o.push_str(&format!("    sub byte [rbx], {}\n", -amount));
                }
            }
            Inst::SetZero => o.push_str("    mov byte [rbx], 0\n"),
            Inst::Output => {
                o.push_str(
                    "\
    ; Output
    mov rcx, r12
    mov rdx, rbx
    mov r8, 1
    lea r9, [written]
    mov qword [rsp+32], 0
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
    lea r9, [readcnt]
    mov qword [rsp+32], 0
    call ReadFile
",
                );
            }
            Inst::LoopBegin(_) => {
                let id = labels.open();
                o.push_str(&format!(".loop_start_{}:\n", id));
                o.push_str("    cmp byte [rbx], 0\n");
                o.push_str(&format!("    je .loop_end_{}\n", id));
            }
            Inst::LoopEnd(_) => {
                let id = labels.close();
                o.push_str("    cmp byte [rbx], 0\n");
                o.push_str(&format!("    jne .loop_start_{}\n", id));
                o.push_str(&format!(".loop_end_{}:\n", id));
            }
        }
    }

    o.push_str("\n    xor ecx, ecx\n    call ExitProcess\n");
    o
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::optimize;
    use crate::parsing::parse;

    #[test]
    fn prolog_sets_up_handles_and_the_cursor() {
        let text = generate(&[]);
        assert!(text.contains("default rel"));
        assert!(text.contains("lea rbx, [tape]"));
        assert!(text.contains("mov ecx, -11\n    call GetStdHandle\n    mov r12, rax"));
        assert!(text.contains("mov ecx, -10\n    call GetStdHandle\n    mov r13, rax"));
        assert!(text.ends_with("    xor ecx, ecx\n    call ExitProcess\n"));
    }

    #[test]
    fn loops_compare_the_cell_and_jump() {
        let text = generate(&optimize(parse(b"+[-.]").unwrap()));
        assert!(text.contains(
            ".loop_start_0:\n    cmp byte [rbx], 0\n    je .loop_end_0\n"
        ));
        assert!(text.contains(
            "    cmp byte [rbx], 0\n    jne .loop_start_0\n.loop_end_0:\n"
        ));
    }

    #[test]
    fn calls_keep_the_fifth_argument_in_the_reserved_frame() {
        let text = generate(&optimize(parse(b".,").unwrap()));
        assert_eq!(text.matches("mov qword [rsp+32], 0").count(), 2);
        assert!(!text.contains("push 0"));
        assert!(text.contains("lea r9, [written]"));
        assert!(text.contains("lea r9, [readcnt]"));
    }

    #[test]
    fn merged_amounts_come_out_as_immediates() {
        let text = generate(&optimize(parse(b"+++>>--<").unwrap()));
        assert!(text.contains("    add byte [rbx], 3\n"));
        assert!(text.contains("    add rbx, 2\n"));
        assert!(text.contains("    sub byte [rbx], 2\n"));
        assert!(text.contains("    sub rbx, 1\n"));
    }
}
