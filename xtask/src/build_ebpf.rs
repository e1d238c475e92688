use std::{path::PathBuf, process::Command};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};

/// eBPF target triple, by byte order.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum Architecture {
    #[value(name = "bpfel-unknown-none")]
    BpfEl,
    #[value(name = "bpfeb-unknown-none")]
    BpfEb,
}

impl Architecture {
    fn triple(self) -> &'static str {
        match self {
            Architecture::BpfEl => "bpfel-unknown-none",
            Architecture::BpfEb => "bpfeb-unknown-none",
        }
    }
}

#[derive(Parser)]
pub struct Options {
    /// Target triple of the eBPF object.
    #[clap(long, value_enum, default_value = "bpfel-unknown-none")]
    pub target: Architecture,
    /// Build with optimizations.
    #[clap(long)]
    pub release: bool,
}

/// Builds `kdispatch-ebpf`. The object lands in
/// `target/<target>/<profile>/kdispatch`.
pub fn build_ebpf(opts: Options) -> Result<()> {
    let Options { target, release } = opts;
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("kdispatch-ebpf");
    let target = format!("--target={}", target.triple());
    let mut cmd = Command::new("cargo");
    cmd.current_dir(&dir)
        .args(["+nightly", "build", target.as_str(), "-Z", "build-std=core"]);
    if release {
        cmd.arg("--release");
    }
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {cmd:?}"))?;
    if !status.success() {
        bail!("{cmd:?} failed: {status}");
    }
    Ok(())
}
