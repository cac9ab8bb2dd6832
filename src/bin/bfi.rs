//! The interpreter binary: runs a program directly, no artifacts.

use std::path::PathBuf;

use structopt::StructOpt;

use brainbake_core::{compile, interp};

/// Runs a program on this process's stdin and stdout.
#[derive(Debug, StructOpt)]
#[structopt(name = "bfi")]
struct Opt {
    /// Source program
    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let source = brainbake::read_source(&opt.input)?;
    let program = compile(&source)?;
    interp::run_on_stdio(&program)?;
    Ok(())
}
