//! The transpiler binary: writes the program back out as C.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use structopt::StructOpt;

use brainbake_core::{compile, transpile};

/// Translates a program into a self-contained C file.
#[derive(Debug, StructOpt)]
#[structopt(name = "bf2c")]
struct Opt {
    /// Source program
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Output path; defaults to the input with a `.c` extension
    #[structopt(short = "o", parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let source = brainbake::read_source(&opt.input)?;
    let program = compile(&source)?;

    let path = opt.output.unwrap_or_else(|| opt.input.with_extension("c"));
    fs::write(&path, transpile::to_c(&program))
        .with_context(|| format!("cannot write '{}'", path.display()))?;
    println!("Transpiled to: {}", path.display());

    Ok(())
}
