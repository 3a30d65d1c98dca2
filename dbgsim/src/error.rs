//! Error type shared by every layer of the adapter.

use thiserror::Error;

use crate::dmi::regs::{CmdErr, SbError};

/// Errors which can occur while driving the simulated debug interface.
#[derive(Debug, Error)]
pub enum Error {
    /// The simulation finished, or ran past its configured time budget.
    /// Every operation attempted afterwards reports this.
    #[error("simulation has ended")]
    SimulationEnded,

    /// A JTAG register shift was requested which the TAP driver cannot
    /// express in a single word. This is a programming error in the caller.
    #[error("cannot shift a {0} bit JTAG register (supported range is 2..=64)")]
    BadShiftLength(usize),

    /// The DTM reported a version of the debug transport spec we do not speak.
    #[error("unsupported debug transport module version {0}")]
    UnsupportedDtmVersion(u8),

    /// A DMI transfer or busy poll did not complete within the retry budget.
    #[error("debug module interface stuck busy after {0} attempts")]
    DmiHung(u32),

    /// An abstract command completed with a nonzero `cmderr`.
    #[error("abstract command failed: {0}")]
    AbstractCommand(CmdErr),

    /// A system bus access completed with a nonzero `sberror`.
    #[error("system bus access failed: {0}")]
    SystemBus(SbError),

    /// Failure writing the waveform trace file.
    #[error("waveform trace I/O failed")]
    Trace(#[from] std::io::Error),
}

/// Shorthand result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
