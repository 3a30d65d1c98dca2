//! IEEE 1149.1 TAP state machine driver.
//!
//! TMS and TDI are latched by the device on the rising JTAG clock edge and
//! TDO is stable on the falling edge, so one TAP cycle is: advance the
//! simulation to a rising edge, drive TMS/TDI, advance to the falling edge,
//! sample TDO. The driver tracks which of the sixteen TAP states the device
//! is in and steers between states with a static TMS table.

use crate::error::{Error, Result};
use crate::sim::Sim;

/// Width of the instruction register.
pub const IR_LEN: usize = 5;

/// Longest DR payload a single shift can carry.
const MAX_SHIFT_BITS: usize = 64;

/// The sixteen states of the IEEE 1149.1 TAP controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TapState {
    TestLogicReset = 0,
    RunTestIdle,
    SelectDrScan,
    CaptureDr,
    ShiftDr,
    Exit1Dr,
    PauseDr,
    Exit2Dr,
    UpdateDr,
    SelectIrScan,
    CaptureIr,
    ShiftIr,
    Exit1Ir,
    PauseIr,
    Exit2Ir,
    UpdateIr,
}

/// Successor state for each `(state, tms)` pair.
const NEXT_STATE: [[TapState; 2]; 16] = {
    use TapState::*;
    [
        [RunTestIdle, TestLogicReset], // Test-Logic-Reset
        [RunTestIdle, SelectDrScan],   // Run-Test/Idle
        [CaptureDr, SelectIrScan],     // Select-DR-Scan
        [ShiftDr, Exit1Dr],            // Capture-DR
        [ShiftDr, Exit1Dr],            // Shift-DR
        [PauseDr, UpdateDr],           // Exit1-DR
        [PauseDr, Exit2Dr],            // Pause-DR
        [ShiftDr, UpdateDr],           // Exit2-DR
        [RunTestIdle, SelectDrScan],   // Update-DR
        [CaptureIr, TestLogicReset],   // Select-IR-Scan
        [ShiftIr, Exit1Ir],            // Capture-IR
        [ShiftIr, Exit1Ir],            // Shift-IR
        [PauseIr, UpdateIr],           // Exit1-IR
        [PauseIr, Exit2Ir],            // Pause-IR
        [ShiftIr, UpdateIr],           // Exit2-IR
        [RunTestIdle, SelectDrScan],   // Update-IR
    ]
};

/// TMS level to drive next when steering from the row state to the column
/// state. Derived from the TAP state graph: each entry takes the shortest
/// path.
#[rustfmt::skip]
const STEER_TMS: [[u8; 16]; 16] = [
    // TLR RTI SDS CDR SDR E1D PDR E2D UDR SIS CIR SIR E1I PIR E2I UIR
    [ 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 ], // Test-Logic-Reset
    [ 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Run-Test/Idle
    [ 1, 1, 1, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1 ], // Select-DR-Scan
    [ 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Capture-DR
    [ 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Shift-DR
    [ 1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1 ], // Exit1-DR
    [ 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Pause-DR
    [ 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1 ], // Exit2-DR
    [ 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Update-DR
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0 ], // Select-IR-Scan
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1 ], // Capture-IR
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1 ], // Shift-IR
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 1 ], // Exit1-IR
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1 ], // Pause-IR
    [ 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1 ], // Exit2-IR
    [ 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1 ], // Update-IR
];

impl TapState {
    /// The state reached from `self` when `tms` is clocked in.
    pub fn advance(self, tms: bool) -> TapState {
        NEXT_STATE[self as usize][tms as usize]
    }

    /// TMS level to drive on the next cycle to move toward `target`.
    fn toward(self, target: TapState) -> bool {
        STEER_TMS[self as usize][target as usize] != 0
    }
}

/// Driver for the TAP of the simulated device.
///
/// Between public operations the TAP rests in Run-Test/Idle (or a state on
/// the canonical path back to it), and the last shifted IR value is kept so
/// that back-to-back accesses to the same register skip the IR scan and
/// dwell in Run-Test/Idle instead.
#[derive(Debug)]
pub struct Tap {
    sim: Sim,
    state: TapState,
    /// Last value shifted into the instruction register.
    last_ir: u8,
    /// Cycles to spend in Run-Test/Idle when coalescing IR scans.
    rti_count: u8,
}

impl Tap {
    /// Create a TAP driver. No pins are touched until [`Tap::reset`].
    pub fn new(sim: Sim) -> Self {
        // The debug TAP resets its IR to IDCODE, so a cached value of 0
        // never coalesces away the first real IR scan.
        Tap {
            sim,
            state: TapState::RunTestIdle,
            last_ir: 0,
            rti_count: 1,
        }
    }

    /// Configure the Run-Test/Idle dwell used when the IR is unchanged.
    pub fn set_rti_count(&mut self, count: u8) {
        self.rti_count = count.max(1);
    }

    /// Current simulated time in nanoseconds.
    pub fn sim_time_ns(&self) -> u64 {
        self.sim.sim_time_ns()
    }

    /// Mutable access to the simulation below, for diagnostics.
    pub fn sim_mut(&mut self) -> &mut Sim {
        &mut self.sim
    }

    /// Take the device through its power-on reset window.
    ///
    /// TMS is held low throughout. The reset signal is optional in IEEE
    /// 1149.1 and the fallback of holding TMS high would normally also reset
    /// the TAP, but this device anticipates its next state combinationally
    /// and a high TMS would throw it into Select-DR-Scan; it also leaves
    /// reset in Run-Test/Idle rather than Test-Logic-Reset.
    pub fn reset(&mut self) -> Result<()> {
        while self.sim.in_reset() {
            if self.sim.all_done() {
                return Err(Error::SimulationEnded);
            }
            self.sim.set_tms(false);
            self.sim.eval();
            self.sim.advance_half_period()?;
        }

        self.state = TapState::RunTestIdle;
        self.last_ir = 0;
        tracing::debug!(
            "TAP reset complete at {} ns, in Run-Test/Idle",
            self.sim.sim_time_ns()
        );
        Ok(())
    }

    /// Write `value` to the `len`-bit DR selected by `ir`, returning the
    /// value simultaneously shifted out on TDO.
    pub fn access_reg(&mut self, ir: u8, value: u64, len: usize) -> Result<u64> {
        if !(2..=MAX_SHIFT_BITS).contains(&len) {
            return Err(Error::BadShiftLength(len));
        }

        if self.last_ir == ir {
            // Same instruction: skip the IR scan, but dwell in
            // Run-Test/Idle so the transport can act on the previous access.
            self.goto_state(TapState::RunTestIdle)?;
            for _ in 1..self.rti_count {
                self.clock(false, false)?;
            }
        } else {
            self.shift_ir(ir)?;
        }

        let out = self.shift_dr(value, len)?;
        self.goto_state(TapState::UpdateDr)?;
        Ok(out)
    }

    /// Write `value` to the DR selected by `ir`. The shifted-out value is
    /// discarded.
    pub fn write_reg(&mut self, ir: u8, value: u64, len: usize) -> Result<()> {
        self.access_reg(ir, value, len).map(|_| ())
    }

    /// Read the `len`-bit DR selected by `ir`, shifting in zeros.
    pub fn read_reg(&mut self, ir: u8, len: usize) -> Result<u64> {
        self.access_reg(ir, 0, len)
    }

    /// Shift a new instruction, LSB first, and latch it in Update-IR.
    fn shift_ir(&mut self, ir: u8) -> Result<()> {
        self.goto_state(TapState::ShiftIr)?;

        for bit in 0..IR_LEN - 1 {
            self.clock(false, ir & (1 << bit) != 0)?;
        }
        // The final bit is clocked on the transition out to Exit1-IR.
        self.clock(true, ir & (1 << (IR_LEN - 1)) != 0)?;

        self.goto_state(TapState::UpdateIr)?;
        self.last_ir = ir;
        Ok(())
    }

    /// Shift `len` bits of `value` through the selected DR, LSB first,
    /// collecting the bits presented on TDO.
    ///
    /// TDO lags TDI by one cycle: the bit sampled while shifting bit `i` in
    /// belongs at position `i - 1` of the outbound word, so one extra cycle
    /// after leaving Shift-DR collects the final bit.
    fn shift_dr(&mut self, value: u64, len: usize) -> Result<u64> {
        self.goto_state(TapState::ShiftDr)?;

        self.clock(false, value & 1 != 0)?;

        let mut out = 0u64;
        for bit in 1..len - 1 {
            if self.clock(false, value & (1 << bit) != 0)? {
                out |= 1 << (bit - 1);
            }
        }

        // Last bit in: exits to Exit1-DR and samples the penultimate bit.
        if self.clock(true, value & (1 << (len - 1)) != 0)? {
            out |= 1 << (len - 2);
        }

        // One more falling edge to collect the TDO bit for the last bit
        // shifted in. TMS low moves to Pause-DR, which is on the steering
        // path back to Update-DR.
        if self.clock(false, false)? {
            out |= 1 << (len - 1);
        }

        self.goto_state(TapState::UpdateDr)?;
        Ok(out)
    }

    /// Steer the TAP to `target`, driving TMS from the static table.
    /// A no-op when already there. Returns the last TDO level seen.
    fn goto_state(&mut self, target: TapState) -> Result<bool> {
        let mut tdo = self.sim.tdo();
        while self.state != target {
            let tms = self.state.toward(target);
            tdo = self.clock(tms, false)?;
        }
        Ok(tdo)
    }

    /// One TAP clock cycle: present TMS/TDI at the rising edge, sample TDO
    /// at the falling edge, and track the resulting state.
    fn clock(&mut self, tms: bool, tdi: bool) -> Result<bool> {
        while !self.sim.tck_posedge() {
            self.sim.eval();
            self.sim.advance_half_period()?;
        }

        self.sim.set_tms(tms);
        self.sim.set_tdi(tdi);

        while !self.sim.tck_negedge() {
            self.sim.eval();
            self.sim.advance_half_period()?;
        }

        let from = self.state;
        self.state = from.advance(tms);
        tracing::trace!(?from, to = ?self.state, tms, tdi, "TAP cycle");

        Ok(self.sim.tdo())
    }
}
