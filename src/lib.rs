//! CLI plumbing for the compiler binary, plus the helpers the sibling
//! binaries share.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use structopt::StructOpt;

use brainbake_core::asm::{self, AsmFlavor};
use brainbake_core::{compile, pe};

/// Compiles a program to a standalone Windows x86-64 executable, or to
/// assembly text with `--asm`.
#[derive(Debug, StructOpt)]
#[structopt(name = "bfc")]
pub struct Opt {
    /// Source program
    #[structopt(parse(from_os_str))]
    pub input: PathBuf,

    /// Emit assembly text instead of an executable
    #[structopt(long)]
    pub asm: bool,

    /// Assembly dialect: nasm, masm, att (gas works too)
    #[structopt(long, default_value = "nasm")]
    pub format: AsmFlavor,

    /// Output path; defaults to the input with a fitting extension
    #[structopt(short = "o", parse(from_os_str))]
    pub output: Option<PathBuf>,
}

pub fn run(opt: Opt) -> anyhow::Result<()> {
    let source = read_source(&opt.input)?;
    let program = compile(&source)?;

    if opt.asm {
        let path = opt
            .output
            .unwrap_or_else(|| opt.input.with_extension(opt.format.extension()));
        let text = asm::emit(&program, opt.format);
        fs::write(&path, text).with_context(|| format!("cannot write '{}'", path.display()))?;
        println!("Assembly written to: {}", path.display());
    } else {
        let path = opt.output.unwrap_or_else(|| opt.input.with_extension("exe"));
        let mut out =
            File::create(&path).with_context(|| format!("cannot create '{}'", path.display()))?;
        pe::write_pe(&program, &mut out)
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        println!("Executable written to: {}", path.display());
    }

    Ok(())
}

/// Reads a source file, naming the path when that fails.
pub fn read_source(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("cannot open '{}'", path.display()))
}
