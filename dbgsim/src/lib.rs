//! Host-side debug adapter for a simulated RISC-V core.
//!
//! This crate drives a single-hart RV32 core running inside a cycle-accurate
//! simulation model, implementing the RISC-V External Debug Support
//! specification v0.13.2. The stack is a strict chain of exclusively owned
//! layers:
//!
//! ```text
//! Riscv32Target -> Dmi -> JtagDtm -> Tap -> Sim -> dyn JtagDevice
//! ```
//!
//! * [`sim::Sim`] clocks an opaque [`sim::JtagDevice`] by half periods,
//!   drives reset and the reference/JTAG clocks, and exposes the JTAG pins.
//! * [`tap::Tap`] walks the IEEE 1149.1 state machine and shifts IR/DR
//!   payloads, driving TMS/TDI on rising TAP edges and sampling TDO on
//!   falling edges.
//! * [`dtm::JtagDtm`] frames Debug Module Interface requests as DR shifts of
//!   the DMIACCESS register and handles the busy/retry protocol.
//! * [`dmi::Dmi`] is a typed model of the debug module register file with
//!   hart control, abstract-command register access and system-bus memory
//!   access on top.
//! * [`target::Riscv32Target`] adapts all of that to the generic debugger
//!   target contract, including the GDB target description.
//!
//! The simulation device is reached only through the [`sim::JtagDevice`]
//! trait; [`sim::testbench::TestbenchDevice`] provides a pin-accurate
//! software model of the debug logic for tests and self-test runs.

pub mod dmi;
pub mod dtm;
mod error;
pub mod sim;
pub mod tap;
pub mod target;

pub use dmi::Dmi;
pub use dtm::JtagDtm;
pub use error::{Error, Result};
pub use sim::{JtagDevice, Sim};
pub use tap::Tap;
pub use target::{Riscv32Target, Target};
