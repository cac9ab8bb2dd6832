//! AT&T/GAS text back end.

use super::LabelStack;
use crate::ir::Inst;

pub(super) fn generate(program: &[Inst]) -> String {
    let mut o = String::new();
    let mut labels = LabelStack::new();

    o.push_str(
        "\
# brainbake output - AT&T syntax x86-64 for Windows
.global main

.extern GetStdHandle
.extern WriteFile
.extern ReadFile
.extern ExitProcess

.bss
tape:    .space 30000
written: .space 8
readcnt: .space 8

.text
main:
    pushq %rbx
    subq $48, %rsp
    leaq tape(%rip), %rbx

    movl $-11, %ecx
    call GetStdHandle
    movq %rax, %r12
    movl $-10, %ecx
    call GetStdHandle
    movq %rax, %r13

",
    );

    for &inst in program {
        match inst {
            Inst::MovePtr(amount) => {
                if amount > 0 {
                    o.push_str(&format!("    addq ${}, %rbx\n", amount));
                } else {
                    o.push_str(&format!("    subq ${}, %rbx\n", -amount));
                }
            }
            Inst::AddVal(amount) => {
                if amount > 0 {
                    o.push_str(&format!("    addb ${}, (%rbx)\n", amount));
                } else {
                    o.push_str(&format!("    subb ${}, (%rbx)\n", -amount));
                }
            }
            Inst::SetZero => o.push_str("    movb $0, (%rbx)\n"),
            Inst::Output => {
                o.push_str(
                    "\
    # Output
    movq %r12, %rcx
    movq %rbx, %rdx
    movq $1, %r8
    leaq written(%rip), %r9
    movq $0, 32(%rsp)
    call WriteFile
",
                );
            }
            Inst::Input => {
                o.push_str(
                    "\
    # Input
    movq %r13, %rcx
    movq %rbx, %rdx
    movq $1, %r8
    leaq readcnt(%rip), %r9
    movq $0, 32(%rsp)
    call ReadFile
",
                );
            }
            Inst::LoopBegin(_) => {
                let id = labels.open();
                o.push_str(&format!(".loop_start_{}:\n", id));
                o.push_str("    cmpb $0, (%rbx)\n");
                o.push_str(&format!("    je .loop_end_{}\n", id));
            }
            Inst::LoopEnd(_) => {
                let id = labels.close();
                o.push_str("    cmpb $0, (%rbx)\n");
                o.push_str(&format!("    jne .loop_start_{}\n", id));
                o.push_str(&format!(".loop_end_{}:\n", id));
            }
        }
    }

    o.push_str("\n    xorl %ecx, %ecx\n    call ExitProcess\n");
    o
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::optimize;
    use crate::parsing::parse;

    #[test]
    fn operands_read_source_first() {
        let text = generate(&optimize(parse(b"++>.").unwrap()));
        assert!(text.contains("    addb $2, (%rbx)\n"));
        assert!(text.contains("    addq $1, %rbx\n"));
        assert!(text.contains("    movq %r12, %rcx\n"));
    }

    #[test]
    fn data_lives_in_bss_with_rip_relative_loads() {
        let text = generate(&optimize(parse(b",").unwrap()));
        assert!(text.contains("tape:    .space 30000"));
        assert!(text.contains("leaq tape(%rip), %rbx"));
        assert!(text.contains("leaq readcnt(%rip), %r9"));
    }

    #[test]
    fn loops_use_cmpb_against_the_cell() {
        let text = generate(&optimize(parse(b"+[-.]").unwrap()));
        assert!(text.contains(".loop_start_0:\n    cmpb $0, (%rbx)\n    je .loop_end_0\n"));
        assert!(text.contains("    cmpb $0, (%rbx)\n    jne .loop_start_0\n.loop_end_0:\n"));
    }
}
