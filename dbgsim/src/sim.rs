//! Adapter between the protocol layers and the clocked simulation device.
//!
//! The device itself is opaque: anything with the JTAG pin set of the
//! [`JtagDevice`] contract can sit below the adapter, whether a linked-in
//! hardware model or the behavioral [`testbench::TestbenchDevice`]. [`Sim`]
//! owns the clocking: it advances the device by half core-clock periods,
//! derives the JTAG clock and the power-on reset window from the tick
//! counter, and tells the TAP driver when it is sitting on a JTAG clock
//! edge.

pub mod testbench;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use vcd::{IdCode, SimulationCommand, TimescaleUnit, Value};

use crate::error::{Error, Result};

/// The pin-level contract of the simulated device.
///
/// Mirrors the port list of the underlying RTL model: a reference clock, an
/// active-low reset, and the five JTAG signals. `eval` settles the model
/// after any combination of pin changes; `finished` reports that the model
/// terminated itself.
pub trait JtagDevice {
    /// Settle the model against the current pin values.
    fn eval(&mut self);

    /// Has the model requested the end of the simulation?
    fn finished(&self) -> bool;

    /// Drive the reference clock input.
    fn set_ref_clk(&mut self, level: bool);
    /// Drive the active-low reset input.
    fn set_rstn(&mut self, level: bool);
    /// Drive the JTAG clock input.
    fn set_tck(&mut self, level: bool);
    /// Drive the active-low JTAG reset input.
    fn set_trst(&mut self, level: bool);
    /// Drive the JTAG mode select input.
    fn set_tms(&mut self, level: bool);
    /// Drive the JTAG data input.
    fn set_tdi(&mut self, level: bool);

    /// Sample the JTAG data output.
    fn tdo(&self) -> bool;
}

/// Number of JTAG clock periods the power-on reset is held for.
const RESET_TAP_PERIODS: u64 = 5;

/// Clock and reset management for a [`JtagDevice`].
///
/// One tick is one nanosecond. The JTAG clock runs at half the core clock
/// rate, and reset is asserted for the first five JTAG clock periods.
pub struct Sim {
    device: Box<dyn JtagDevice>,

    /// Ticks simulated so far. Monotonic.
    tick: u64,
    /// Half period of the core clock in ticks.
    clk_half_period: u64,
    /// Half period of the JTAG clock in ticks.
    tck_half_period: u64,
    /// Length of the power-on reset window in ticks.
    reset_ticks: u64,
    /// Simulation budget in ticks. Zero means unbounded.
    sim_time_ticks: u64,

    /// True only on the tick that crossed a rising JTAG clock edge.
    tck_posedge: bool,
    /// True only on the tick that crossed a falling JTAG clock edge.
    tck_negedge: bool,

    // Last driven pin levels, kept for the waveform trace.
    ref_clk: bool,
    rstn: bool,
    tck: bool,
    tms: bool,
    tdi: bool,

    trace: Option<Trace>,
}

impl Sim {
    /// Wrap `device` with clocking for a core clock of `clk_period_ns`.
    ///
    /// `sim_time_ns` bounds the simulation; zero runs forever. When
    /// `vcd_path` is given, every pin change is recorded to a VCD waveform
    /// trace at that path.
    pub fn new(
        device: Box<dyn JtagDevice>,
        clk_period_ns: u64,
        sim_time_ns: u64,
        vcd_path: Option<&Path>,
    ) -> Result<Self> {
        let clk_half_period = (clk_period_ns / 2).max(1);
        let tck_half_period = clk_half_period * 2;
        let reset_ticks = tck_half_period * 2 * RESET_TAP_PERIODS;

        let trace = vcd_path.map(Trace::create).transpose()?;

        let mut sim = Sim {
            device,
            tick: 0,
            clk_half_period,
            tck_half_period,
            reset_ticks,
            sim_time_ticks: sim_time_ns,
            // Both clocks start high, so tick zero is a rising edge.
            tck_posedge: true,
            tck_negedge: false,
            ref_clk: true,
            rstn: false,
            tck: true,
            tms: false,
            tdi: false,
            trace,
        };
        sim.device.set_ref_clk(sim.ref_clk);
        sim.device.set_rstn(sim.rstn);
        sim.device.set_trst(sim.rstn);
        sim.device.set_tck(sim.tck);
        Ok(sim)
    }

    /// Current simulated time in nanoseconds.
    pub fn sim_time_ns(&self) -> u64 {
        self.tick
    }

    /// Is the power-on reset window still active?
    pub fn in_reset(&self) -> bool {
        self.tick < self.reset_ticks
    }

    /// Has the device finished, or the simulation budget run out?
    pub fn all_done(&self) -> bool {
        self.device.finished()
            || (self.sim_time_ticks != 0 && self.tick >= self.sim_time_ticks)
    }

    /// Did the last half-period advance cross a rising JTAG clock edge?
    pub fn tck_posedge(&self) -> bool {
        self.tck_posedge
    }

    /// Did the last half-period advance cross a falling JTAG clock edge?
    pub fn tck_negedge(&self) -> bool {
        self.tck_negedge
    }

    /// Drive the JTAG mode select pin.
    pub fn set_tms(&mut self, level: bool) {
        self.tms = level;
        self.device.set_tms(level);
    }

    /// Drive the JTAG data input pin.
    pub fn set_tdi(&mut self, level: bool) {
        self.tdi = level;
        self.device.set_tdi(level);
    }

    /// Sample the JTAG data output pin.
    pub fn tdo(&self) -> bool {
        self.device.tdo()
    }

    /// Settle the device and record the pin state to the waveform trace.
    pub fn eval(&mut self) {
        self.device.eval();

        let pins = [
            self.ref_clk,
            self.rstn,
            self.tck,
            self.rstn, // trst tracks the power-on reset
            self.tms,
            self.tdi,
            self.device.tdo(),
        ];
        let mut failed = false;
        if let Some(trace) = self.trace.as_mut() {
            if let Err(err) = trace.record(self.tick, &pins) {
                tracing::warn!("dropping waveform trace: {err}");
                failed = true;
            }
        }
        if failed {
            self.trace = None;
        }
    }

    /// Advance the simulation by one half core-clock period.
    ///
    /// Recomputes the clock and reset pin levels from the new tick count and
    /// latches whether this advance crossed a JTAG clock edge. Exactly one
    /// of [`Sim::tck_posedge`] and [`Sim::tck_negedge`] is true afterwards
    /// if and only if the JTAG clock toggled.
    pub fn advance_half_period(&mut self) -> Result<()> {
        if self.all_done() {
            return Err(Error::SimulationEnded);
        }

        self.tick += self.clk_half_period;
        self.drive_clocks();
        Ok(())
    }

    fn drive_clocks(&mut self) {
        let old_tck = self.tck;

        self.ref_clk = (self.tick / self.clk_half_period) % 2 == 0;
        self.tck = (self.tick / self.tck_half_period) % 2 == 0;
        self.rstn = self.tick >= self.reset_ticks;

        self.tck_posedge = !old_tck && self.tck;
        self.tck_negedge = old_tck && !self.tck;

        self.device.set_ref_clk(self.ref_clk);
        self.device.set_rstn(self.rstn);
        self.device.set_trst(self.rstn);
        self.device.set_tck(self.tck);
    }
}

impl std::fmt::Debug for Sim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("tick", &self.tick)
            .field("clk_half_period", &self.clk_half_period)
            .field("in_reset", &self.in_reset())
            .field("all_done", &self.all_done())
            .finish()
    }
}

/// Number of traced pins.
const PIN_COUNT: usize = 7;

/// Trace wire names, matching the device port list.
const PIN_NAMES: [&str; PIN_COUNT] = [
    "ref_clk_i",
    "rstn_i",
    "jtag_tck_i",
    "jtag_trst_i",
    "jtag_tms_i",
    "jtag_tdi_i",
    "jtag_tdo_o",
];

fn level(bit: bool) -> Value {
    if bit {
        Value::V1
    } else {
        Value::V0
    }
}

/// VCD waveform trace of the JTAG interface pins.
///
/// Only pin changes are recorded; the file is finalized when the trace (and
/// with it the whole [`Sim`]) is dropped, on success and failure paths
/// alike.
struct Trace {
    writer: vcd::Writer<BufWriter<File>>,
    wires: Vec<IdCode>,
    last: Option<[bool; PIN_COUNT]>,
}

impl Trace {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = vcd::Writer::new(BufWriter::new(file));

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("dbgsim")?;
        let mut wires = Vec::with_capacity(PIN_COUNT);
        for name in PIN_NAMES {
            wires.push(writer.add_wire(1, name)?);
        }
        writer.upscope()?;
        writer.enddefinitions()?;

        Ok(Trace {
            writer,
            wires,
            last: None,
        })
    }

    fn record(&mut self, time: u64, pins: &[bool; PIN_COUNT]) -> std::io::Result<()> {
        match self.last {
            None => {
                // First sample: dump every pin so viewers have initial values.
                self.writer.timestamp(time)?;
                self.writer.begin(SimulationCommand::Dumpvars)?;
                for (wire, bit) in self.wires.iter().zip(pins) {
                    self.writer.change_scalar(*wire, level(*bit))?;
                }
                self.writer.end()?;
            }
            Some(last) if last != *pins => {
                self.writer.timestamp(time)?;
                for ((wire, bit), old) in self.wires.iter().zip(pins).zip(last) {
                    if *bit != old {
                        self.writer.change_scalar(*wire, level(*bit))?;
                    }
                }
            }
            Some(_) => {}
        }
        self.last = Some(*pins);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::testbench::TestbenchDevice;
    use super::*;

    fn sim() -> Sim {
        Sim::new(Box::new(TestbenchDevice::new()), 10, 0, None).unwrap()
    }

    #[test]
    fn clock_edges_are_exclusive_and_alternate() {
        let mut sim = sim();

        let mut edges = Vec::new();
        for _ in 0..64 {
            sim.eval();
            sim.advance_half_period().unwrap();
            assert!(!(sim.tck_posedge() && sim.tck_negedge()));
            if sim.tck_posedge() {
                edges.push(true);
            } else if sim.tck_negedge() {
                edges.push(false);
            }
        }

        assert!(!edges.is_empty());
        for pair in edges.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn reset_window_is_five_tap_periods() {
        let mut sim = sim();

        // Core clock 10ns => TAP period 20ns => reset ends at 100ns.
        assert!(sim.in_reset());
        while sim.in_reset() {
            sim.eval();
            sim.advance_half_period().unwrap();
        }
        assert_eq!(sim.sim_time_ns(), 100);
    }

    #[test]
    fn time_budget_ends_the_simulation() {
        let mut sim = Sim::new(Box::new(TestbenchDevice::new()), 10, 100, None).unwrap();

        loop {
            sim.eval();
            match sim.advance_half_period() {
                Ok(()) => assert!(sim.sim_time_ns() <= 100),
                Err(Error::SimulationEnded) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(sim.all_done());
        assert!(matches!(
            sim.advance_half_period(),
            Err(Error::SimulationEnded)
        ));
    }

    #[test]
    fn tick_counter_is_monotonic() {
        let mut sim = sim();

        let mut last = sim.sim_time_ns();
        for _ in 0..32 {
            sim.eval();
            sim.advance_half_period().unwrap();
            assert!(sim.sim_time_ns() > last);
            last = sim.sim_time_ns();
        }
    }
}
