//! Byte-level assembler for the x86-64 fragment the compiler emits.
//!
//! One method per instruction form, opcode bytes spelled out at the
//! call. Data references and import calls all go through RIP-relative
//! 32-bit displacements:
//!
//! ```text
//! disp = target_rva - (text_rva + offset_of_byte_after_the_disp)
//! ```
//!
//! Backward loop jumps are resolved on the spot (the target offset is
//! already known); forward ones hand back a [`PatchSlot`] that the
//! caller resolves once the target has been emitted. Every form here is
//! fixed-width no matter what the displacement works out to, which is
//! what lets the PE writer take a size-only measurement run with
//! made-up RVAs.

use pe_image::CodeBuf;

/// Offset of an unresolved rel32 displacement in the code buffer.
#[derive(Debug, Clone, Copy)]
pub struct PatchSlot(usize);

/// Generates x86-64 machine code destined for a fixed `.text` RVA.
pub struct X86Assembly {
    code: CodeBuf,
    text_rva: u32,
}

impl X86Assembly {
    pub fn new(text_rva: u32) -> Self {
        X86Assembly {
            code: CodeBuf::new(),
            text_rva,
        }
    }

    /// Byte offset where the next instruction will land.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code.into_vec()
    }

    // Prolog / epilog ////////////////////////////////////////////////////

    /// push rbx
    pub fn push_rbx(&mut self) {
        self.code.u8(0x53);
    }

    /// push r12
    pub fn push_r12(&mut self) {
        self.code.bytes(&[0x41, 0x54]);
    }

    /// push r13
    pub fn push_r13(&mut self) {
        self.code.bytes(&[0x41, 0x55]);
    }

    /// sub rsp, imm8
    pub fn sub_rsp(&mut self, imm: u8) {
        self.code.bytes(&[0x48, 0x83, 0xEC, imm]);
    }

    /// xor ecx, ecx
    pub fn xor_ecx_ecx(&mut self) {
        self.code.bytes(&[0x33, 0xC9]);
    }

    // Cursor arithmetic //////////////////////////////////////////////////

    /// inc rbx
    pub fn inc_rbx(&mut self) {
        self.code.bytes(&[0x48, 0xFF, 0xC3]);
    }

    /// dec rbx
    pub fn dec_rbx(&mut self) {
        self.code.bytes(&[0x48, 0xFF, 0xCB]);
    }

    /// add rbx, imm32
    pub fn add_rbx(&mut self, imm: u32) {
        self.code.bytes(&[0x48, 0x81, 0xC3]);
        self.code.u32(imm);
    }

    /// sub rbx, imm32
    pub fn sub_rbx(&mut self, imm: u32) {
        self.code.bytes(&[0x48, 0x81, 0xEB]);
        self.code.u32(imm);
    }

    // Cell arithmetic ////////////////////////////////////////////////////

    /// inc byte [rbx]
    pub fn inc_byte(&mut self) {
        self.code.bytes(&[0xFE, 0x03]);
    }

    /// dec byte [rbx]
    pub fn dec_byte(&mut self) {
        self.code.bytes(&[0xFE, 0x0B]);
    }

    /// add byte [rbx], imm8
    pub fn add_byte(&mut self, imm: u8) {
        self.code.bytes(&[0x80, 0x03, imm]);
    }

    /// sub byte [rbx], imm8
    pub fn sub_byte(&mut self, imm: u8) {
        self.code.bytes(&[0x80, 0x2B, imm]);
    }

    /// mov byte [rbx], 0
    pub fn clear_byte(&mut self) {
        self.code.bytes(&[0xC6, 0x03, 0x00]);
    }

    /// cmp byte [rbx], 0
    pub fn cmp_byte_zero(&mut self) {
        self.code.bytes(&[0x80, 0x3B, 0x00]);
    }

    // Register moves /////////////////////////////////////////////////////

    /// mov ecx, imm32
    pub fn mov_ecx(&mut self, imm: u32) {
        self.code.u8(0xB9);
        self.code.u32(imm);
    }

    /// mov r8d, imm32
    pub fn mov_r8d(&mut self, imm: u32) {
        self.code.bytes(&[0x41, 0xB8]);
        self.code.u32(imm);
    }

    /// mov r12, rax
    pub fn mov_r12_rax(&mut self) {
        self.code.bytes(&[0x49, 0x89, 0xC4]);
    }

    /// mov r13, rax
    pub fn mov_r13_rax(&mut self) {
        self.code.bytes(&[0x49, 0x89, 0xC5]);
    }

    /// mov rcx, r12
    pub fn mov_rcx_r12(&mut self) {
        self.code.bytes(&[0x4C, 0x89, 0xE1]);
    }

    /// mov rcx, r13
    pub fn mov_rcx_r13(&mut self) {
        self.code.bytes(&[0x4C, 0x89, 0xE9]);
    }

    /// mov rdx, rbx
    pub fn mov_rdx_rbx(&mut self) {
        self.code.bytes(&[0x48, 0x89, 0xDA]);
    }

    /// mov qword [rsp+32], 0 -- the fifth-argument slot of the Win64 frame
    pub fn store_zero_fifth_arg(&mut self) {
        self.code.bytes(&[0x48, 0xC7, 0x44, 0x24, 0x20]);
        self.code.u32(0);
    }

    // RIP-relative forms /////////////////////////////////////////////////

    /// lea rbx, [rip + disp] reaching `target_rva`
    pub fn lea_rbx(&mut self, target_rva: u32) {
        self.code.bytes(&[0x48, 0x8D, 0x1D]);
        self.rip_rel(target_rva);
    }

    /// lea r9, [rip + disp] reaching `target_rva`
    pub fn lea_r9(&mut self, target_rva: u32) {
        self.code.bytes(&[0x4C, 0x8D, 0x0D]);
        self.rip_rel(target_rva);
    }

    /// call qword [rip + disp] through the IAT slot at `slot_rva`
    pub fn call_import(&mut self, slot_rva: u32) {
        self.code.bytes(&[0xFF, 0x15]);
        self.rip_rel(slot_rva);
    }

    // Loop jumps /////////////////////////////////////////////////////////

    /// jz rel32 with the displacement left open.
    pub fn jz_unresolved(&mut self) -> PatchSlot {
        self.code.bytes(&[0x0F, 0x84]);
        let slot = PatchSlot(self.code.len());
        self.code.u32(0);
        slot
    }

    /// jnz rel32 straight back to an already-emitted code offset.
    pub fn jnz_to(&mut self, target: usize) {
        self.code.bytes(&[0x0F, 0x85]);
        let rel = target as i64 - (self.code.len() as i64 + 4);
        self.code.u32(rel as u32);
    }

    /// Point an open jz displacement at a now-known code offset.
    pub fn patch_jump(&mut self, slot: PatchSlot, target: usize) {
        let PatchSlot(offset) = slot;
        let rel = target as i64 - (offset as i64 + 4);
        self.code.patch32(offset, rel as u32);
    }

    /// Emit the 4-byte displacement that reaches `target_rva` from the
    /// instruction following it.
    fn rip_rel(&mut self, target_rva: u32) {
        let next_ip_rva = self.text_rva + self.code.len() as u32 + 4;
        self.code.u32(target_rva.wrapping_sub(next_ip_rva));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_forms_encode_as_documented() {
        let mut asm = X86Assembly::new(0x1000);
        asm.inc_rbx();
        asm.dec_byte();
        asm.clear_byte();
        asm.xor_ecx_ecx();
        assert_eq!(
            asm.into_code(),
            [0x48, 0xFF, 0xC3, 0xFE, 0x0B, 0xC6, 0x03, 0x00, 0x33, 0xC9]
        );
    }

    #[test]
    fn rip_displacement_counts_from_the_next_instruction() {
        let mut asm = X86Assembly::new(0x1000);
        // lea rbx: 3 opcode bytes, then the disp; next instruction is at
        // RVA 0x1007, so reaching RVA 0x3000 takes 0x3000 - 0x1007
        asm.lea_rbx(0x3000);
        let code = asm.into_code();
        let disp = u32::from_le_bytes(code[3..7].try_into().unwrap());
        assert_eq!(disp, 0x3000 - 0x1007);
    }

    #[test]
    fn rip_displacement_may_go_backward() {
        let mut asm = X86Assembly::new(0x2000);
        asm.call_import(0x1080);
        let code = asm.into_code();
        let disp = i32::from_le_bytes(code[2..6].try_into().unwrap());
        assert_eq!(disp, 0x1080 - 0x2006);
    }

    #[test]
    fn forward_jump_patches_to_the_given_offset() {
        let mut asm = X86Assembly::new(0x1000);
        asm.cmp_byte_zero();
        let slot = asm.jz_unresolved();
        asm.inc_byte();
        let target = asm.offset();
        asm.patch_jump(slot, target);
        let code = asm.into_code();
        // cmp(3) + jz opcode(2), disp occupies bytes 5..9, body is 2 bytes
        let disp = i32::from_le_bytes(code[5..9].try_into().unwrap());
        assert_eq!(disp, 2);
    }

    #[test]
    fn backward_jump_lands_on_the_loop_head() {
        let mut asm = X86Assembly::new(0x1000);
        let head = asm.offset();
        asm.cmp_byte_zero();
        asm.dec_byte();
        asm.jnz_to(head);
        let code = asm.into_code();
        // jnz disp sits at offset 7; next instruction would be at 11
        let disp = i32::from_le_bytes(code[7..11].try_into().unwrap());
        assert_eq!(disp, head as i32 - 11);
    }
}
