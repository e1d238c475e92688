mod build_ebpf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
pub struct XtaskOptions {
    #[clap(subcommand)]
    command: Subcommand,
}

#[derive(Parser)]
enum Subcommand {
    /// Builds the kernel programs of kdispatch-ebpf.
    BuildEbpf(build_ebpf::Options),
}

fn main() -> Result<()> {
    let XtaskOptions { command } = Parser::parse();

    match command {
        Subcommand::BuildEbpf(opts) => build_ebpf::build_ebpf(opts),
    }
}
