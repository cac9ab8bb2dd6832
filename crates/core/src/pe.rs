//! Lays out and writes the PE32+ image.
//!
//! There is a chicken-and-egg between the code and the layout: the
//! RIP-relative code bakes in section RVAs, but where `.idata` and
//! `.data` land depends on how big the code turned out. Since every
//! rel32 form the generator emits is fixed-width, a measurement run
//! with estimated RVAs gives the exact code size; the real RVAs follow
//! from it and the code is generated once more with the truth.
//!
//! The image that comes out depends on nothing but `kernel32.dll`:
//! three sections, an import table built by hand, and headers synthesized
//! field by field.

use std::io::{self, Write};

use pe_image::headers::{
    DataDirectory, DosHeader, FileHeader, ImportDirectoryEntry, OptionalHeader64, SectionHeader,
    DIR_IAT, DIR_IMPORT, DLL_DYNAMIC_BASE, DLL_HIGH_ENTROPY_VA, DLL_NX_COMPAT,
    DLL_TERMINAL_SERVER_AWARE, DOS_HEADER_SIZE, FILE_EXECUTABLE_IMAGE, FILE_LARGE_ADDRESS_AWARE,
    MACHINE_AMD64, NT_HEADERS64_SIZE, NUM_DATA_DIRECTORIES, OPTIONAL_HEADER64_SIZE, PE_SIGNATURE,
    SCN_CNT_CODE, SCN_CNT_INITIALIZED_DATA, SCN_MEM_EXECUTE, SCN_MEM_READ, SCN_MEM_WRITE,
    SECTION_HEADER_SIZE, SUBSYSTEM_CONSOLE, section_name,
};
use pe_image::{align_up, CodeBuf};

use crate::codegen;
use crate::ir::{Inst, TAPE_LEN};

const FILE_ALIGN: u32 = 0x200;
const SECT_ALIGN: u32 = 0x1000;
const IMAGE_BASE: u64 = 0x0000_0001_4000_0000;
const NUM_SECTIONS: u16 = 3;

const IMPORTS: [&str; 4] = ["GetStdHandle", "WriteFile", "ReadFile", "ExitProcess"];
const DLL_NAME: &str = "kernel32.dll";

// .idata intra-section offsets: two 20-byte directory entries, then the
// ILT and IAT (four functions + null terminator, 8 bytes each), then
// the hint/name entries.
const ILT_OFFSET: u32 = 40;
const IAT_OFFSET: u32 = 80;
const HINTS_OFFSET: u32 = 120;

/// Import directory size (kernel32 entry + null terminator) and IAT
/// size, as reported in the data directory.
const IMPORT_DIR_SIZE: u32 = 40;
const IAT_SIZE: u32 = 40;

/// tape + written + readcnt
const DATA_SIZE: u32 = TAPE_LEN as u32 + 16;

/// Compiles the program and writes a complete executable image.
pub fn write_pe<W: Write>(program: &[Inst], out: &mut W) -> io::Result<()> {
    out.write_all(&build_image(program))
}

/// Builds the complete image in memory.
pub fn build_image(program: &[Inst]) -> Vec<u8> {
    let text_rva = SECT_ALIGN;

    // Measurement pass. The displacement values are wrong on purpose;
    // only the length of the scratch buffer is read.
    let code_size = {
        let est_idata_rva = text_rva + SECT_ALIGN * 4;
        let est_data_rva = est_idata_rva + SECT_ALIGN;
        let scratch = codegen::generate(
            program,
            text_rva,
            est_idata_rva + IAT_OFFSET,
            est_data_rva,
        );
        scratch.len() as u32
    };

    // Real layout.
    let imports = ImportSection::build();
    let idata_size = imports.len() as u32;

    let idata_rva = text_rva + align_up(code_size, SECT_ALIGN);
    let data_rva = idata_rva + align_up(idata_size, SECT_ALIGN);
    let iat_rva = idata_rva + IAT_OFFSET;

    let code = codegen::generate(program, text_rva, iat_rva, data_rva);
    debug_assert_eq!(code.len() as u32, code_size);

    let idata = imports.resolve(idata_rva);

    // File layout.
    let headers_raw = DOS_HEADER_SIZE + NT_HEADERS64_SIZE + NUM_SECTIONS as u32 * SECTION_HEADER_SIZE;
    let headers_size = align_up(headers_raw, FILE_ALIGN);
    let text_raw = align_up(code_size, FILE_ALIGN);
    let idata_raw = align_up(idata_size, FILE_ALIGN);
    let data_raw = align_up(DATA_SIZE, FILE_ALIGN);
    let image_size = data_rva + align_up(DATA_SIZE, SECT_ALIGN);

    let mut image = CodeBuf::new();

    DosHeader {
        e_lfanew: DOS_HEADER_SIZE,
    }
    .emit(&mut image);

    image.u32(PE_SIGNATURE);
    FileHeader {
        machine: MACHINE_AMD64,
        number_of_sections: NUM_SECTIONS,
        size_of_optional_header: OPTIONAL_HEADER64_SIZE as u16,
        characteristics: FILE_EXECUTABLE_IMAGE | FILE_LARGE_ADDRESS_AWARE,
    }
    .emit(&mut image);

    let mut data_directories = [DataDirectory::default(); NUM_DATA_DIRECTORIES];
    data_directories[DIR_IMPORT] = DataDirectory {
        virtual_address: idata_rva,
        size: IMPORT_DIR_SIZE,
    };
    data_directories[DIR_IAT] = DataDirectory {
        virtual_address: iat_rva,
        size: IAT_SIZE,
    };

    OptionalHeader64 {
        size_of_code: text_raw,
        size_of_initialized_data: idata_raw + data_raw,
        address_of_entry_point: text_rva,
        base_of_code: text_rva,
        image_base: IMAGE_BASE,
        section_alignment: SECT_ALIGN,
        file_alignment: FILE_ALIGN,
        size_of_image: image_size,
        size_of_headers: headers_size,
        subsystem: SUBSYSTEM_CONSOLE,
        dll_characteristics: DLL_DYNAMIC_BASE
            | DLL_HIGH_ENTROPY_VA
            | DLL_NX_COMPAT
            | DLL_TERMINAL_SERVER_AWARE,
        data_directories,
    }
    .emit(&mut image);

    SectionHeader {
        name: section_name(".text"),
        virtual_size: code_size,
        virtual_address: text_rva,
        size_of_raw_data: text_raw,
        pointer_to_raw_data: headers_size,
        characteristics: SCN_CNT_CODE | SCN_MEM_EXECUTE | SCN_MEM_READ,
    }
    .emit(&mut image);

    SectionHeader {
        name: section_name(".idata"),
        virtual_size: idata_size,
        virtual_address: idata_rva,
        size_of_raw_data: idata_raw,
        pointer_to_raw_data: headers_size + text_raw,
        characteristics: SCN_CNT_INITIALIZED_DATA | SCN_MEM_READ | SCN_MEM_WRITE,
    }
    .emit(&mut image);

    SectionHeader {
        name: section_name(".data"),
        virtual_size: DATA_SIZE,
        virtual_address: data_rva,
        size_of_raw_data: data_raw,
        pointer_to_raw_data: headers_size + text_raw + idata_raw,
        characteristics: SCN_CNT_INITIALIZED_DATA | SCN_MEM_READ | SCN_MEM_WRITE,
    }
    .emit(&mut image);

    // Section contents, each padded out to its raw size. The .data
    // section is all zeros on disk; the loader zero-fills it anyway.
    image.pad_to(headers_size as usize);
    image.bytes(&code);
    image.pad_to((headers_size + text_raw) as usize);
    image.bytes(&idata);
    image.pad_to((headers_size + text_raw + idata_raw) as usize);
    image.pad_to((headers_size + text_raw + idata_raw + data_raw) as usize);

    image.into_vec()
}

/// The `.idata` blob under construction. Everything position-independent
/// is laid out first; the RVA fields wait for [`ImportSection::resolve`].
struct ImportSection {
    bytes: Vec<u8>,
    hint_offsets: [u32; 4],
    dll_name_offset: u32,
}

impl ImportSection {
    fn build() -> Self {
        // Directory entries, ILT and IAT are fixed-offset; leave them
        // zeroed for now (the zeros double as the null terminators).
        let mut bytes = vec![0u8; HINTS_OFFSET as usize];

        let mut hint_offsets = [0u32; 4];
        for (i, name) in IMPORTS.iter().enumerate() {
            hint_offsets[i] = bytes.len() as u32;
            bytes.extend_from_slice(&0u16.to_le_bytes()); // ordinal hint
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0);
            if bytes.len() % 2 == 1 {
                bytes.push(0); // keep the next entry word-aligned
            }
        }

        let dll_name_offset = bytes.len() as u32;
        bytes.extend_from_slice(DLL_NAME.as_bytes());
        bytes.push(0);
        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }

        ImportSection {
            bytes,
            hint_offsets,
            dll_name_offset,
        }
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Fills in every RVA field now that the section's position is known.
    fn resolve(mut self, idata_rva: u32) -> Vec<u8> {
        for (i, &hint) in self.hint_offsets.iter().enumerate() {
            let entry = (idata_rva + hint) as u64;
            let ilt = (ILT_OFFSET as usize) + i * 8;
            let iat = (IAT_OFFSET as usize) + i * 8;
            self.bytes[ilt..ilt + 8].copy_from_slice(&entry.to_le_bytes());
            self.bytes[iat..iat + 8].copy_from_slice(&entry.to_le_bytes());
        }

        let mut directory = CodeBuf::new();
        ImportDirectoryEntry {
            import_lookup_table: idata_rva + ILT_OFFSET,
            name: idata_rva + self.dll_name_offset,
            import_address_table: idata_rva + IAT_OFFSET,
        }
        .emit(&mut directory);
        self.bytes[..20].copy_from_slice(directory.as_slice());
        // the second, all-zero directory entry at 20..40 terminates the list

        self.bytes
    }
}
