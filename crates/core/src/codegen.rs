//! Lowers the intermediate program to x86-64 machine code.

use crate::asm::x86_64::{PatchSlot, X86Assembly};
use crate::ir::{Inst, TAPE_LEN};

// REGISTERS:
//
// rbx (callee saved) - cell cursor into the tape
// r12 (callee saved) - stdout handle (for the whole program)
// r13 (callee saved) - stdin handle (for the whole program)
//
// All three are callee saved in the Win64 convention, so they survive
// every kernel32 call without save/restore at the call sites.
// see: https://learn.microsoft.com/en-us/cpp/build/x64-calling-convention

/// IAT slot offsets, in the order the PE writer lays the table out.
pub const IAT_GET_STD_HANDLE: u32 = 0;
pub const IAT_WRITE_FILE: u32 = 8;
pub const IAT_READ_FILE: u32 = 16;
pub const IAT_EXIT_PROCESS: u32 = 24;

/// `.data` section offsets.
pub const DATA_TAPE: u32 = 0;
pub const DATA_WRITTEN: u32 = TAPE_LEN as u32;
pub const DATA_READCNT: u32 = TAPE_LEN as u32 + 8;

const STD_OUTPUT_HANDLE: u32 = -11i32 as u32;
const STD_INPUT_HANDLE: u32 = -10i32 as u32;

/// Generates the complete `.text` contents for a program, given where
/// the code, the IAT and the data section will land in the image.
///
/// Every instruction form is fixed-width regardless of the RVA values,
/// so a run with estimated RVAs yields the exact final size; the PE
/// writer leans on that for its measurement pass.
pub fn generate(program: &[Inst], text_rva: u32, iat_rva: u32, data_rva: u32) -> Vec<u8> {
    let mut asm = X86Assembly::new(text_rva);

    // Prolog. Three pushes (24 bytes) plus the return address (8) plus
    // sub rsp, 48 leaves rsp 16-aligned at every later call site, with
    // 32 bytes of shadow space and the fifth-argument slot at [rsp+32].
    asm.push_rbx();
    asm.push_r12();
    asm.push_r13();
    asm.sub_rsp(48);

    asm.lea_rbx(data_rva + DATA_TAPE);

    asm.mov_ecx(STD_OUTPUT_HANDLE);
    asm.call_import(iat_rva + IAT_GET_STD_HANDLE);
    asm.mov_r12_rax();
    asm.mov_ecx(STD_INPUT_HANDLE);
    asm.call_import(iat_rva + IAT_GET_STD_HANDLE);
    asm.mov_r13_rax();

    let mut inst_offsets: Vec<usize> = Vec::with_capacity(program.len());
    // jz displacements waiting for the offset after their matched LoopEnd
    let mut forward: Vec<(PatchSlot, usize)> = Vec::new();

    for &inst in program {
        inst_offsets.push(asm.offset());
        match inst {
            Inst::MovePtr(1) => asm.inc_rbx(),
            Inst::MovePtr(-1) => asm.dec_rbx(),
            Inst::MovePtr(amount) if amount > 0 => asm.add_rbx(amount as u32),
            Inst::MovePtr(amount) => asm.sub_rbx(amount.unsigned_abs()),
            Inst::AddVal(1) => asm.inc_byte(),
            Inst::AddVal(-1) => asm.dec_byte(),
            Inst::AddVal(amount) if amount > 0 => asm.add_byte(amount as u8),
            Inst::AddVal(amount) => asm.sub_byte(amount.unsigned_abs() as u8),
            Inst::SetZero => asm.clear_byte(),
            Inst::Output => {
                // WriteFile(r12, rbx, 1, &written, 0)
                asm.mov_rcx_r12();
                asm.mov_rdx_rbx();
                asm.mov_r8d(1);
                asm.lea_r9(data_rva + DATA_WRITTEN);
                asm.store_zero_fifth_arg();
                asm.call_import(iat_rva + IAT_WRITE_FILE);
            }
            Inst::Input => {
                // ReadFile(r13, rbx, 1, &readcnt, 0)
                asm.mov_rcx_r13();
                asm.mov_rdx_rbx();
                asm.mov_r8d(1);
                asm.lea_r9(data_rva + DATA_READCNT);
                asm.store_zero_fifth_arg();
                asm.call_import(iat_rva + IAT_READ_FILE);
            }
            Inst::LoopBegin(end) => {
                asm.cmp_byte_zero();
                forward.push((asm.jz_unresolved(), end));
            }
            Inst::LoopEnd(begin) => {
                // jump back to the matched LoopBegin's cmp, so the test
                // runs again and execution re-enters the body
                asm.cmp_byte_zero();
                asm.jnz_to(inst_offsets[begin]);
            }
        }
    }

    // Epilog: ExitProcess(0). A jz whose LoopEnd closes the program
    // lands here, not past it.
    let epilog = asm.offset();
    asm.xor_ecx_ecx();
    asm.call_import(iat_rva + IAT_EXIT_PROCESS);

    for (slot, end_index) in forward {
        let target = match inst_offsets.get(end_index + 1) {
            Some(&after_loop_end) => after_loop_end,
            None => epilog,
        };
        asm.patch_jump(slot, target);
    }

    asm.into_code()
}
