//! Command line front end for the dbgsim debug adapter.
//!
//! Brings the full stack up against the behavioral testbench device and
//! optionally runs the self-test modes: hart status, GPR/FPR/CSR access and
//! randomized block memory transfers. A real RTL model is attached the same
//! way, by handing its [`dbgsim::JtagDevice`] implementation to the
//! simulation layer.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use dbgsim::sim::testbench::{TestbenchDevice, TestbenchHandle, UNMAPPED_WORD};
use dbgsim::target::{ResumeAction, ResumeOutcome, WaitResult, REG_CSR0, REG_FT0, REG_PC};
use dbgsim::{Dmi, JtagDtm, Riscv32Target, Sim, Tap, Target};

#[derive(Parser)]
#[command(
    name = "dbgsim",
    version,
    about = "Debug adapter for a simulated RISC-V core"
)]
struct Cli {
    /// Core clock speed in MHz
    #[arg(long, default_value_t = 100.0, value_name = "SPEED")]
    mhz: f64,

    /// Simulation duration in nanoseconds, zero means unbounded
    #[arg(long, default_value_t = 0, value_name = "TIME")]
    duration_ns: u64,

    /// Random number seed for the self tests
    #[arg(long, default_value_t = 1, value_name = "N")]
    seed: u64,

    /// Largest memory block size the memory test transfers
    #[arg(long, default_value_t = 64, value_name = "N")]
    max_block: usize,

    /// Waveform trace file; ".vcd" is appended when missing
    #[arg(long, value_name = "FILE")]
    vcd: Option<String>,

    /// Run a test of hart status and run control
    #[arg(long)]
    test_status: bool,

    /// Run a test of the GPRs
    #[arg(long)]
    test_gprs: bool,

    /// Run a test of the FPRs and FPU CSRs
    #[arg(long)]
    test_fprs: bool,

    /// Run a test of the CSRs
    #[arg(long)]
    test_csrs: bool,

    /// Run a test of memory
    #[arg(long)]
    test_mem: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if !(cli.mhz > 0.0 && cli.mhz <= 500.0) {
        bail!("clock speed must be between 0 and 500 MHz");
    }
    let clk_period_ns = (1000.0 / cli.mhz) as u64;

    let vcd_path = cli.vcd.clone().map(|mut name| {
        if !name.to_ascii_lowercase().ends_with(".vcd") {
            name.push_str(".vcd");
        }
        PathBuf::from(name)
    });

    let device = TestbenchDevice::new();
    let testbench = device.handle();

    let sim = Sim::new(
        Box::new(device),
        clk_period_ns,
        cli.duration_ns,
        vcd_path.as_deref(),
    )
    .context("setting up the simulation")?;
    let dmi = Dmi::new(JtagDtm::new(Tap::new(sim)));
    let mut target = Riscv32Target::new(dmi).context("attaching to the core")?;

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let max_block = cli.max_block.max(1);

    let mut failures = 0;
    let mut ran_any = false;
    let mut run = |name: &str, result: Result<()>, failures: &mut u32| {
        ran_any = true;
        match result {
            Ok(()) => tracing::info!("{name} test passed"),
            Err(err) => {
                tracing::error!("{name} test failed: {err:#}");
                *failures += 1;
            }
        }
    };

    if cli.test_status {
        run(
            "status",
            test_status(&mut target, &testbench),
            &mut failures,
        );
    }
    if cli.test_gprs {
        run("GPR", test_gprs(&mut target, &mut rng), &mut failures);
    }
    if cli.test_fprs {
        run("FPR", test_fprs(&mut target, &mut rng), &mut failures);
    }
    if cli.test_csrs {
        run("CSR", test_csrs(&mut target, &mut rng), &mut failures);
    }
    if cli.test_mem {
        run(
            "memory",
            test_mem(&mut target, &mut rng, max_block),
            &mut failures,
        );
    }

    if !ran_any {
        tracing::info!(
            "attached to the core at {} MHz; no self test requested",
            cli.mhz
        );
    }
    if failures > 0 {
        bail!("{failures} self test(s) failed");
    }
    Ok(())
}

/// Halt the hart, check the status registers, then step once and run to
/// the synthetic breakpoint.
fn test_status(target: &mut Riscv32Target, testbench: &TestbenchHandle) -> Result<()> {
    if !target.halt() {
        bail!("hart did not halt");
    }
    if !testbench.halted() {
        bail!("debug module disagrees about the halt state");
    }

    // One single step.
    if !target.prepare(&[ResumeAction::Step]) {
        bail!("prepare(step) rejected");
    }
    if !target.resume() {
        bail!("resume(step) failed");
    }
    let mut results = Vec::new();
    if target.wait(&mut results) != WaitResult::EventOccurred {
        bail!("wait(step) reported an error");
    }
    if results != [ResumeOutcome::Interrupted] {
        bail!("step finished with {results:?}");
    }

    // Continue until the core hits its breakpoint.
    if !target.prepare(&[ResumeAction::Continue]) {
        bail!("prepare(continue) rejected");
    }
    if !target.resume() {
        bail!("resume(continue) failed");
    }
    if target.wait(&mut results) != WaitResult::EventOccurred {
        bail!("wait(continue) reported an error");
    }
    if results != [ResumeOutcome::Interrupted] {
        bail!("continue finished with {results:?}");
    }

    tracing::info!(
        "hart halted; {} cycles, {} instructions, {:.6} s simulated",
        target.cycle_count(),
        target.instr_count(),
        target.time_stamp(),
    );
    Ok(())
}

/// Write and read back every general purpose register.
fn test_gprs(target: &mut Riscv32Target, rng: &mut StdRng) -> Result<()> {
    for reg in 1..32 {
        let pattern: u32 = rng.gen();
        check_register_roundtrip(target, reg, pattern, pattern)?;
    }
    // x0 swallows writes.
    check_register_roundtrip(target, 0, rng.gen(), 0)?;

    // The PC is register 32, backed by dpc.
    let pattern = rng.gen::<u32>() & !3;
    check_register_roundtrip(target, REG_PC, pattern, pattern)?;
    Ok(())
}

/// Write and read back every floating point register and the FPU CSRs.
fn test_fprs(target: &mut Riscv32Target, rng: &mut StdRng) -> Result<()> {
    for reg in REG_FT0..REG_FT0 + 32 {
        let pattern: u32 = rng.gen();
        check_register_roundtrip(target, reg, pattern, pattern)?;
    }

    // fflags (5 bits) and frm (3 bits) through the CSR number space.
    let fflags = rng.gen::<u32>() & 0x1f;
    check_register_roundtrip(target, REG_CSR0 + 0x001, fflags, fflags)?;
    let frm = rng.gen::<u32>() & 0x7;
    check_register_roundtrip(target, REG_CSR0 + 0x002, frm, frm)?;
    Ok(())
}

/// Write and read back a handful of machine CSRs, and read the read-only
/// identification CSRs.
fn test_csrs(target: &mut Riscv32Target, rng: &mut StdRng) -> Result<()> {
    for csr in [0x340u16, 0x341, 0x342, 0x343, 0x7b2, 0x7b3] {
        let pattern: u32 = rng.gen();
        check_register_roundtrip(target, REG_CSR0 + csr as usize, pattern, pattern)?;
    }

    for csr in [0xf11u16, 0xf12, 0xf13, 0xf14] {
        let mut value = 0;
        if target.read_register(REG_CSR0 + csr as usize, &mut value) == 0 {
            bail!("read of read-only CSR {csr:#05x} failed");
        }
    }

    // A write to a read-only CSR must report zero bytes written.
    if target.write_register(REG_CSR0 + 0xf14, 1) != 0 {
        bail!("write to mhartid unexpectedly succeeded");
    }
    Ok(())
}

/// Random block transfers at every alignment, plus the unmapped-read
/// marker word.
fn test_mem(target: &mut Riscv32Target, rng: &mut StdRng, max_block: usize) -> Result<()> {
    let mut base = 0x0000_1000u32;

    for size in 1..=max_block {
        for misalign in 0..4u32 {
            let address = base + misalign;
            let mut data = vec![0u8; size];
            rng.fill(&mut data[..]);

            if target.write(address, &data) != size {
                bail!("write of {size} bytes at {address:#010x} failed");
            }
            let mut readback = vec![0u8; size];
            if target.read(address, &mut readback) != size {
                bail!("read of {size} bytes at {address:#010x} failed");
            }
            if readback != data {
                bail!("mismatch for {size} bytes at {address:#010x}");
            }

            base += ((size as u32 + 7) & !3) + 8;
        }
    }

    // Unmapped addresses acknowledge reads with the marker pattern.
    let mut marker = [0u8; 4];
    if target.read(0x7fff_0000, &mut marker) != 4 {
        bail!("unmapped read failed outright");
    }
    if u32::from_le_bytes(marker) != UNMAPPED_WORD {
        bail!("unmapped read returned {:#010x}", u32::from_le_bytes(marker));
    }
    Ok(())
}

fn check_register_roundtrip(
    target: &mut Riscv32Target,
    regnum: usize,
    write: u32,
    expect: u32,
) -> Result<()> {
    if target.write_register(regnum, write) != target.register_size() {
        bail!("write of register {regnum} failed");
    }
    let mut read = 0;
    if target.read_register(regnum, &mut read) != target.register_size() {
        bail!("read of register {regnum} failed");
    }
    if read != expect {
        bail!("register {regnum}: wrote {write:#010x}, read {read:#010x}");
    }
    Ok(())
}
