//! The debugger-facing target facade.
//!
//! [`Target`] is the contract the debug server drives; [`Riscv32Target`]
//! implements it for the simulated RV32 core by translating every call into
//! DMI operations. Run control is a three-state machine: `prepare` stores
//! the requested action, `resume` arms `dcsr` and requests the resume, and
//! `wait` polls `haltsum0` until the hart is back in debug mode.

pub mod desc;

use crate::dmi::csr;
use crate::dmi::regs::{Dcsr, Dmstatus, Haltsum0};
use crate::dmi::Dmi;
use crate::error::Result;

/// GDB register number of `x0`.
pub const REG_ZERO: usize = 0;
/// GDB register number of the program counter (backed by the `dpc` CSR).
pub const REG_PC: usize = 32;
/// GDB register number of `ft0`, the first floating point register.
pub const REG_FT0: usize = 33;
/// GDB register number of CSR 0; CSR `n` is at `REG_CSR0 + n`.
pub const REG_CSR0: usize = 65;
/// GDB register number of the last possible CSR.
pub const REG_CSR_LAST: usize = REG_CSR0 + 0xfff;

/// Width of every exposed register, in bytes.
const REGISTER_SIZE: usize = 4;

/// How many `haltsum0` polls a wait may take before the run is abandoned.
const WAIT_POLL_LIMIT: u32 = 100_000;

/// What a core should do when the target is next resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeAction {
    /// No action. Valid in `prepare` only as an explicit "do nothing".
    #[default]
    None,
    /// Execute a single instruction and halt again.
    Step,
    /// Run until something halts the core.
    Continue,
}

/// Per-core result of a resume, reported by [`Target::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    None,
    Success,
    Failure,
    Interrupted,
}

/// Overall result of [`Target::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    EventOccurred,
    Error,
}

/// Flavor of [`Target::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Warm,
    Cold,
}

/// Kind of matchpoint the server may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    BreakSw,
    BreakHw,
    WatchWrite,
    WatchRead,
    WatchAccess,
}

/// Where a syscall value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLoc {
    Register(u32),
}

/// The syscall argument convention of the target.
#[derive(Debug, Clone)]
pub struct SyscallLayout {
    pub id: ArgLoc,
    pub args: Vec<ArgLoc>,
    pub ret: ArgLoc,
}

/// The generic debugger target contract.
///
/// None of these methods fail by panicking or by returning a Rust error:
/// failures surface as `false`, zero bytes transferred, or
/// [`WaitResult::Error`], which is what the debug server expects.
pub trait Target {
    /// Number of directly numbered registers (GPRs, PC, FPRs).
    fn register_count(&self) -> usize;
    /// Width of each register in bytes.
    fn register_size(&self) -> usize;

    fn cpu_count(&self) -> usize;
    fn current_cpu(&self) -> usize;
    fn set_current_cpu(&mut self, cpu: usize);

    /// Read register `regnum` into `value`, returning the bytes read
    /// (zero for an invalid register or a failed access).
    fn read_register(&mut self, regnum: usize, value: &mut u32) -> usize;
    /// Write register `regnum`, returning the bytes written.
    fn write_register(&mut self, regnum: usize, value: u32) -> usize;

    /// Read memory, returning the bytes read.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize;
    /// Write memory, returning the bytes written.
    fn write(&mut self, address: u32, buf: &[u8]) -> usize;

    /// Record what each core should do on the next [`Target::resume`].
    fn prepare(&mut self, actions: &[ResumeAction]) -> bool;
    /// Resume according to the prepared actions.
    fn resume(&mut self) -> bool;
    /// Block until a core stops, filling one outcome per core.
    fn wait(&mut self, results: &mut Vec<ResumeOutcome>) -> WaitResult;
    /// Force all cores to halt.
    fn halt(&mut self) -> bool;

    fn reset(&mut self, kind: ResetKind) -> ResumeOutcome;
    fn terminate(&mut self) -> ResumeOutcome;

    /// Seconds of simulated time consumed so far.
    fn time_stamp(&mut self) -> f64;
    fn cycle_count(&self) -> u64;
    fn instr_count(&self) -> u64;

    fn supports_target_xml(&self) -> bool;
    /// The GDB target description. Built once and cached.
    fn target_xml(&mut self, annex: &str) -> Option<&str>;

    fn insert_matchpoint(&mut self, address: u32, kind: MatchType) -> bool;
    fn remove_matchpoint(&mut self, address: u32, kind: MatchType) -> bool;

    /// Pass a monitor command through to the target.
    fn command(&mut self, cmd: &str, output: &mut dyn std::io::Write) -> bool;

    fn syscall_arg_locs(&self) -> Option<SyscallLayout>;
}

/// [`Target`] implementation for the simulated RV32 core.
#[derive(Debug)]
pub struct Riscv32Target {
    /// Torn down by [`Target::reset`]; every later operation reports
    /// failure through its normal return value.
    dmi: Option<Dmi>,
    run_action: ResumeAction,
    xml: Option<String>,
    sim_start_ns: u64,
    cpu_time: f64,
    cycle_count: u64,
    instr_count: u64,
}

impl Riscv32Target {
    /// Attach to the core: reset the transport, select hart 0 and halt it.
    pub fn new(mut dmi: Dmi) -> Result<Self> {
        dmi.dtm_reset()?;
        dmi.select_hart(0)?;
        dmi.halt_hart(0)?;

        let status: Dmstatus = dmi.read_reg()?;
        tracing::debug!("attached, dmstatus {:#010x}", u32::from(status));

        let sim_start_ns = dmi.sim_time_ns();
        Ok(Riscv32Target {
            dmi: Some(dmi),
            run_action: ResumeAction::None,
            xml: None,
            sim_start_ns,
            cpu_time: 0.0,
            cycle_count: 0,
            instr_count: 0,
        })
    }

    /// Refresh the cycle and instruction counters from the hart's
    /// counter CSRs. Best effort: a failed read keeps the old values.
    fn refresh_counters(&mut self) {
        let Some(dmi) = self.dmi.as_mut() else {
            return;
        };
        if let Ok(cycles) = dmi.read_csr(csr::MCYCLE) {
            self.cycle_count = cycles as u64;
        }
        if let Ok(instrs) = dmi.read_csr(csr::MINSTRET) {
            self.instr_count = instrs as u64;
        }
    }
}

/// Arm `dcsr` for the prepared action and request the resume.
fn resume_with(dmi: &mut Dmi, action: ResumeAction) -> Result<()> {
    let mut dcsr = Dcsr(dmi.read_csr(csr::DCSR)?);
    match action {
        ResumeAction::Step => dcsr.set_step(true),
        ResumeAction::Continue => dcsr.set_ebreaks_all(true),
        ResumeAction::None => unreachable!("rejected by resume()"),
    }
    dmi.write_csr(csr::DCSR, dcsr.0)?;
    dmi.resume_hart()
}

/// Poll `haltsum0` until hart 0 reports halted.
fn wait_halted(dmi: &mut Dmi) -> Result<()> {
    for _ in 0..WAIT_POLL_LIMIT {
        let haltsum: Haltsum0 = dmi.read_reg()?;
        if haltsum.0 & 1 != 0 {
            return Ok(());
        }
    }
    Err(crate::error::Error::DmiHung(WAIT_POLL_LIMIT))
}

/// Wait out a single step, then clear `dcsr.step`.
fn wait_step(dmi: &mut Dmi) -> Result<ResumeOutcome> {
    wait_halted(dmi)?;

    let mut dcsr = Dcsr(dmi.read_csr(csr::DCSR)?);
    dcsr.set_step(false);
    dmi.write_csr(csr::DCSR, dcsr.0)?;

    Ok(ResumeOutcome::Interrupted)
}

/// Wait for a free-running hart to halt, then judge why and clear the
/// `ebreak` bits.
fn wait_continue(dmi: &mut Dmi) -> Result<ResumeOutcome> {
    wait_halted(dmi)?;

    let mut dcsr = Dcsr(dmi.read_csr(csr::DCSR)?);
    let outcome = if dcsr.cause() == Dcsr::CAUSE_EBREAK {
        ResumeOutcome::Interrupted
    } else {
        tracing::warn!("hart halted with unexpected cause {}", dcsr.cause());
        ResumeOutcome::Failure
    };

    dcsr.set_ebreaks_all(false);
    dmi.write_csr(csr::DCSR, dcsr.0)?;

    Ok(outcome)
}

impl Target for Riscv32Target {
    fn register_count(&self) -> usize {
        // GPRs, PC and FPRs; CSRs sit above this in their own number space.
        REG_CSR0
    }

    fn register_size(&self) -> usize {
        REGISTER_SIZE
    }

    fn cpu_count(&self) -> usize {
        1
    }

    fn current_cpu(&self) -> usize {
        0
    }

    fn set_current_cpu(&mut self, cpu: usize) {
        debug_assert_eq!(cpu, 0, "only one core is present");
    }

    fn read_register(&mut self, regnum: usize, value: &mut u32) -> usize {
        let Some(dmi) = self.dmi.as_mut() else {
            return 0;
        };

        let result = match regnum {
            REG_ZERO..=31 => dmi.read_gpr(regnum),
            REG_PC => dmi.read_csr(csr::DPC),
            REG_FT0..=64 => dmi.read_fpr(regnum - REG_FT0),
            REG_CSR0..=REG_CSR_LAST => dmi.read_csr((regnum - REG_CSR0) as u16),
            _ => return 0,
        };

        match result {
            Ok(read) => {
                *value = read;
                REGISTER_SIZE
            }
            Err(err) => {
                tracing::debug!("read of register {regnum} failed: {err}");
                0
            }
        }
    }

    fn write_register(&mut self, regnum: usize, value: u32) -> usize {
        let Some(dmi) = self.dmi.as_mut() else {
            return 0;
        };

        let result = match regnum {
            REG_ZERO..=31 => dmi.write_gpr(regnum, value),
            REG_PC => dmi.write_csr(csr::DPC, value),
            REG_FT0..=64 => dmi.write_fpr(regnum - REG_FT0, value),
            REG_CSR0..=REG_CSR_LAST => dmi.write_csr((regnum - REG_CSR0) as u16, value),
            _ => return 0,
        };

        match result {
            Ok(()) => REGISTER_SIZE,
            Err(err) => {
                tracing::debug!("write of register {regnum} failed: {err}");
                0
            }
        }
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        let Some(dmi) = self.dmi.as_mut() else {
            return 0;
        };
        match dmi.read_mem(address, buf) {
            Ok(()) => buf.len(),
            Err(err) => {
                tracing::warn!("memory read at {address:#010x} failed: {err}");
                0
            }
        }
    }

    fn write(&mut self, address: u32, buf: &[u8]) -> usize {
        let Some(dmi) = self.dmi.as_mut() else {
            return 0;
        };
        match dmi.write_mem(address, buf) {
            Ok(()) => buf.len(),
            Err(err) => {
                tracing::warn!("memory write at {address:#010x} failed: {err}");
                0
            }
        }
    }

    fn prepare(&mut self, actions: &[ResumeAction]) -> bool {
        if actions.len() != 1 {
            return false;
        }
        self.run_action = actions[0];
        self.run_action != ResumeAction::None
    }

    fn resume(&mut self) -> bool {
        if self.run_action == ResumeAction::None {
            tracing::error!("resume without a prepared action");
            return false;
        }
        let action = self.run_action;
        let Some(dmi) = self.dmi.as_mut() else {
            return false;
        };

        match resume_with(dmi, action) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("resume failed: {err}");
                false
            }
        }
    }

    fn wait(&mut self, results: &mut Vec<ResumeOutcome>) -> WaitResult {
        results.clear();
        results.resize(self.cpu_count(), ResumeOutcome::None);

        let action = self.run_action;
        let Some(dmi) = self.dmi.as_mut() else {
            return WaitResult::Error;
        };

        let outcome = match action {
            ResumeAction::Step => wait_step(dmi),
            ResumeAction::Continue => wait_continue(dmi),
            ResumeAction::None => {
                tracing::error!("wait without a prepared action");
                return WaitResult::Error;
            }
        };

        match outcome {
            Ok(outcome) => {
                results[0] = outcome;
                self.refresh_counters();
                WaitResult::EventOccurred
            }
            Err(err) => {
                tracing::error!("wait failed: {err}");
                WaitResult::Error
            }
        }
    }

    fn halt(&mut self) -> bool {
        let Some(dmi) = self.dmi.as_mut() else {
            return false;
        };

        let halted = || -> Result<bool> {
            dmi.halt_hart(0)?;
            let status: Dmstatus = dmi.read_reg()?;
            Ok(status.halted())
        }();

        match halted {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!("hart did not report halted after a halt request");
                false
            }
            Err(err) => {
                tracing::error!("halt failed: {err}");
                false
            }
        }
    }

    fn reset(&mut self, kind: ResetKind) -> ResumeOutcome {
        tracing::info!("target reset ({kind:?}): tearing down the debug interface");
        self.dmi = None;
        ResumeOutcome::Success
    }

    fn terminate(&mut self) -> ResumeOutcome {
        ResumeOutcome::None
    }

    fn time_stamp(&mut self) -> f64 {
        if let Some(dmi) = self.dmi.as_ref() {
            self.cpu_time = (dmi.sim_time_ns() - self.sim_start_ns) as f64 * 1e-9;
        }
        self.cpu_time
    }

    fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    fn instr_count(&self) -> u64 {
        self.instr_count
    }

    fn supports_target_xml(&self) -> bool {
        true
    }

    fn target_xml(&mut self, _annex: &str) -> Option<&str> {
        if self.xml.is_none() {
            self.xml = Some(desc::build_target_xml());
        }
        self.xml.as_deref()
    }

    fn insert_matchpoint(&mut self, _address: u32, _kind: MatchType) -> bool {
        // No hardware matchpoints; the server layers software breakpoints
        // over plain memory writes.
        false
    }

    fn remove_matchpoint(&mut self, _address: u32, _kind: MatchType) -> bool {
        false
    }

    fn command(&mut self, _cmd: &str, _output: &mut dyn std::io::Write) -> bool {
        false
    }

    fn syscall_arg_locs(&self) -> Option<SyscallLayout> {
        Some(SyscallLayout {
            id: ArgLoc::Register(1),
            args: vec![
                ArgLoc::Register(2),
                ArgLoc::Register(3),
                ArgLoc::Register(4),
            ],
            ret: ArgLoc::Register(5),
        })
    }
}
