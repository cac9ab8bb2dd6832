use structopt::StructOpt;

use brainbake::{run, Opt};

fn main() -> anyhow::Result<()> {
    run(Opt::from_args())
}
