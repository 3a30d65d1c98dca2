//! Behavioral model of the debug logic, driven entirely through its pins.
//!
//! [`TestbenchDevice`] implements [`JtagDevice`] with a software rendition
//! of the JTAG TAP, the debug transport registers and a single-hart debug
//! module with system bus: TMS/TDI are sampled on rising TCK edges, TDO is
//! driven on falling edges, and DMI requests execute when the TAP passes
//! through Update-DR. It stands in for the RTL model in unit and
//! integration tests and in the command line self-test modes, and offers a
//! couple of fault-injection hooks for exercising the retry paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::dtm::ir;
use crate::sim::JtagDevice;
use crate::tap::{TapState, IR_LEN};

/// IDCODE reported by the model: version 1, part 0xbeef, JEP106 id 0x55.
pub const TESTBENCH_IDCODE: u32 = 0x1bee_f8ab;

/// Word returned for reads of unmapped memory. The system bus answers OK
/// even for addresses nothing is mapped at; this marker is what comes back.
pub const UNMAPPED_WORD: u32 = 0xbadc_ab1e;

/// DMI address bits advertised through DTMCS.
const ABITS: u32 = 7;

/// DTMCS read value: idle 1, abits 7, version 1.
const DTMCS_VALUE: u32 = (1 << 12) | (ABITS << 4) | 1;

/// Width of a DMIACCESS DR scan.
const DMI_DR_LEN: usize = 34 + ABITS as usize;

/// Reset value of the debug program counter.
const RESET_PC: u32 = 0x0000_0180;

mod cause {
    pub const EBREAK: u32 = 1;
    pub const TRIGGER: u32 = 2;
    pub const HALTREQ: u32 = 3;
    pub const STEP: u32 = 4;
}

const DCSR_CAUSE_MASK: u32 = 0x0000_01c0;
const DCSR_EBREAKM: u32 = 1 << 15;
const DCSR_STEP: u32 = 1 << 2;

/// The debug module and hart state shared with [`TestbenchHandle`].
struct DebugModule {
    // Hart.
    halted: bool,
    resume_ack: bool,
    /// While running, haltsum polls left until the hart halts on its own.
    run_polls_left: Option<u32>,
    run_polls: u32,
    dcsr: u32,
    dpc: u32,
    gpr: [u32; 32],
    fpr: [u32; 32],
    csr: HashMap<u16, u32>,

    // Debug module.
    dmactive: bool,
    data: [u32; 12],
    progbuf: [u32; 16],
    hawindowsel: u32,
    hawindow: u32,
    abstractauto: u32,
    cmderr: u8,

    // System bus.
    sb_readonaddr: bool,
    sb_access: u8,
    sb_autoincrement: bool,
    sb_readondata: bool,
    sb_error: u8,
    sb_address: u32,
    sb_data: u32,
    mem: HashMap<u32, u32>,

    // Transport bookkeeping and fault injection.
    dmi_response: u64,
    dmireset_count: u32,
    retry_inject: u32,
    busy_inject: u32,
    ndmreset_pulses: u32,
    ndmreset_level: bool,
}

impl DebugModule {
    fn new() -> Self {
        DebugModule {
            halted: false,
            resume_ack: false,
            run_polls_left: None,
            run_polls: 3,
            dcsr: 4 << 28, // xdebugver 4
            dpc: RESET_PC,
            gpr: [0; 32],
            fpr: [0; 32],
            csr: HashMap::new(),
            dmactive: false,
            data: [0; 12],
            progbuf: [0; 16],
            hawindowsel: 0,
            hawindow: 0,
            abstractauto: 0,
            cmderr: 0,
            sb_readonaddr: false,
            sb_access: 2,
            sb_autoincrement: false,
            sb_readondata: false,
            sb_error: 0,
            sb_address: 0,
            sb_data: 0,
            mem: HashMap::new(),
            dmi_response: 0,
            dmireset_count: 0,
            retry_inject: 0,
            busy_inject: 0,
            ndmreset_pulses: 0,
            ndmreset_level: false,
        }
    }

    fn halt(&mut self, cause: u32) {
        self.halted = true;
        self.run_polls_left = None;
        self.dcsr = (self.dcsr & !DCSR_CAUSE_MASK) | (cause << 6);
    }

    fn bump_counters(&mut self, cycles: u32, instrs: u32) {
        *self.csr.entry(0xb00).or_insert(0) += cycles; // mcycle
        *self.csr.entry(0xb02).or_insert(0) += instrs; // minstret
    }

    fn execute_dmi(&mut self, frame: u64) {
        if self.retry_inject > 0 {
            self.retry_inject -= 1;
            self.dmi_response = 3; // busy, retry
            return;
        }

        let op = frame & 0x3;
        let data = (frame >> 2) as u32;
        let address = ((frame >> 34) & ((1 << ABITS) - 1)) as u32;

        match op {
            1 => {
                let value = self.dm_read(address);
                self.dmi_response = (value as u64) << 2;
            }
            2 => {
                self.dm_write(address, data);
                self.dmi_response = 0;
            }
            _ => self.dmi_response = 0,
        }
    }

    fn dm_read(&mut self, address: u32) -> u32 {
        match address {
            0x04..=0x0f => self.data[(address - 0x04) as usize],
            0x10 => {
                // hartsel reads back as zero: a single hart is wired up.
                (self.ndmreset_level as u32) << 1 | self.dmactive as u32
            }
            0x11 => {
                // dmstatus: version 2 (0.13), authenticated, impebreak.
                let mut status = 2 | (1 << 7) | (1 << 22);
                if self.halted {
                    status |= (1 << 9) | (1 << 8);
                } else {
                    status |= (1 << 11) | (1 << 10);
                }
                if self.resume_ack {
                    status |= (1 << 17) | (1 << 16);
                }
                status
            }
            0x12 => (2 << 20) | (1 << 12) | 0x380, // hartinfo
            0x14 => self.hawindowsel,
            0x15 => self.hawindow,
            0x16 => (8 << 24) | ((self.cmderr as u32) << 8) | 2, // abstractcs
            0x18 => self.abstractauto,
            0x19..=0x1c => 0, // confstrptr, not implemented
            0x1d => 0,        // nextdm: this is the only debug module
            0x20..=0x2f => self.progbuf[(address - 0x20) as usize],
            0x30 => 0, // authdata is inert
            0x38 => {
                (1 << 29)
                    | (self.sb_readonaddr as u32) << 20
                    | (self.sb_access as u32) << 17
                    | (self.sb_autoincrement as u32) << 16
                    | (self.sb_readondata as u32) << 15
                    | (self.sb_error as u32) << 12
                    | (32 << 5)
                    | (1 << 2)
            }
            0x39 => self.sb_address,
            0x3c => {
                let value = self.sb_data;
                if self.sb_readondata {
                    self.sb_bus_read();
                }
                value
            }
            0x40 => {
                // haltsum0. Polling it is how the host waits, so a freely
                // running hart makes progress here.
                if let Some(polls) = self.run_polls_left {
                    if polls == 0 {
                        self.bump_counters(97, 23);
                        if self.dcsr & DCSR_EBREAKM != 0 {
                            self.halt(cause::EBREAK);
                        } else {
                            self.halt(cause::TRIGGER);
                        }
                    } else {
                        self.run_polls_left = Some(polls - 1);
                    }
                }
                self.halted as u32
            }
            0x13 | 0x34 | 0x35 => 0, // haltsum1..3: no harts up there
            _ => 0,
        }
    }

    fn dm_write(&mut self, address: u32, value: u32) {
        match address {
            0x04..=0x0f => self.data[(address - 0x04) as usize] = value,
            0x10 => {
                let haltreq = value & (1 << 31) != 0;
                let resumereq = value & (1 << 30) != 0;
                let ndmreset = value & (1 << 1) != 0;

                if ndmreset && !self.ndmreset_level {
                    self.ndmreset_pulses += 1;
                }
                self.ndmreset_level = ndmreset;
                self.dmactive = value & 1 != 0;
                if !self.dmactive {
                    // Taking dmactive low resets the debug module.
                    self.cmderr = 0;
                    self.sb_error = 0;
                }

                if haltreq && !self.halted {
                    self.bump_counters(12, 3);
                    self.halt(cause::HALTREQ);
                }
                if resumereq && self.halted {
                    self.resume();
                }
            }
            0x14 => self.hawindowsel = value & 0x7fff,
            0x15 => self.hawindow = value,
            0x16 => self.cmderr &= !((value >> 8) & 0x7) as u8, // W1C
            0x17 => self.execute_command(value),
            0x18 => self.abstractauto = value,
            0x20..=0x2f => self.progbuf[(address - 0x20) as usize] = value,
            0x30 => {} // authdata is inert
            0x38 => {
                self.sb_readonaddr = value & (1 << 20) != 0;
                self.sb_access = ((value >> 17) & 0x7) as u8;
                self.sb_autoincrement = value & (1 << 16) != 0;
                self.sb_readondata = value & (1 << 15) != 0;
                self.sb_error &= !((value >> 12) & 0x7) as u8; // W1C
            }
            0x39 => {
                self.sb_address = value;
                if self.sb_readonaddr {
                    self.sb_bus_read();
                }
            }
            0x3c => {
                self.sb_data = value;
                self.sb_bus_write();
            }
            _ => {}
        }
    }

    fn resume(&mut self) {
        self.resume_ack = true;
        self.halted = false;
        if self.dcsr & DCSR_STEP != 0 {
            // One instruction retires, then debug mode again.
            self.bump_counters(4, 1);
            self.dpc = self.dpc.wrapping_add(4);
            self.halt(cause::STEP);
        } else {
            self.run_polls_left = Some(self.run_polls);
        }
    }

    fn execute_command(&mut self, command: u32) {
        if self.busy_inject > 0 {
            self.busy_inject -= 1;
            self.cmderr = 1;
            return;
        }
        if self.cmderr != 0 {
            // Commands are ignored until the sticky error is cleared.
            return;
        }

        let cmdtype = command >> 24;
        let aarsize = (command >> 20) & 0x7;
        let transfer = command & (1 << 17) != 0;
        let write = command & (1 << 16) != 0;
        let regno = (command & 0xffff) as u16;

        if cmdtype != 0 {
            self.cmderr = 2; // only access-register is implemented
            return;
        }
        if !self.halted {
            self.cmderr = 4;
            return;
        }
        if aarsize != 2 {
            self.cmderr = 2; // registers are 32 bits wide
            return;
        }
        if !transfer {
            return;
        }

        if write {
            let value = self.data[0];
            if let Some(err) = self.reg_write(regno, value) {
                self.cmderr = err;
            }
        } else {
            match self.reg_read(regno) {
                Ok(value) => self.data[0] = value,
                Err(err) => self.cmderr = err,
            }
        }
    }

    fn reg_read(&mut self, regno: u16) -> Result<u32, u8> {
        match regno {
            0x1000 => Ok(0), // x0
            0x1001..=0x101f => Ok(self.gpr[(regno - 0x1000) as usize]),
            0x1020..=0x103f => Ok(self.fpr[(regno - 0x1020) as usize]),
            0x0000..=0x0fff => match regno {
                0x7b0 => Ok(self.dcsr),
                0x7b1 => Ok(self.dpc),
                addr if crate::dmi::csr::lookup(addr).is_some() => {
                    Ok(self.csr.get(&addr).copied().unwrap_or(0))
                }
                _ => Err(3), // unimplemented CSR traps
            },
            _ => Err(2),
        }
    }

    fn reg_write(&mut self, regno: u16, value: u32) -> Option<u8> {
        match regno {
            0x1000 => None, // writes to x0 vanish
            0x1001..=0x101f => {
                self.gpr[(regno - 0x1000) as usize] = value;
                None
            }
            0x1020..=0x103f => {
                self.fpr[(regno - 0x1020) as usize] = value;
                None
            }
            0x0000..=0x0fff => match regno {
                0x7b0 => {
                    // cause is read only.
                    self.dcsr = (value & !DCSR_CAUSE_MASK) | (self.dcsr & DCSR_CAUSE_MASK);
                    None
                }
                0x7b1 => {
                    self.dpc = value;
                    None
                }
                // Writes to read-only and unimplemented CSRs trap.
                addr if crate::dmi::csr::is_read_only(addr) => Some(3),
                addr => {
                    self.csr.insert(addr, value);
                    None
                }
            },
            _ => Some(2),
        }
    }

    fn sb_bus_read(&mut self) {
        if self.sb_access != 2 {
            self.sb_error = 4; // only 32-bit accesses are wired up
            return;
        }
        if self.sb_address & 3 != 0 {
            self.sb_error = 3;
            return;
        }
        // The bus acknowledges every address; unmapped words read as the
        // marker pattern.
        self.sb_data = self
            .mem
            .get(&self.sb_address)
            .copied()
            .unwrap_or(UNMAPPED_WORD);
        if self.sb_autoincrement {
            self.sb_address = self.sb_address.wrapping_add(4);
        }
    }

    fn sb_bus_write(&mut self) {
        if self.sb_access != 2 {
            self.sb_error = 4;
            return;
        }
        if self.sb_address & 3 != 0 {
            self.sb_error = 3;
            return;
        }
        self.mem.insert(self.sb_address, self.sb_data);
        if self.sb_autoincrement {
            self.sb_address = self.sb_address.wrapping_add(4);
        }
    }
}

/// Shared view of the model state, for assertions and preconditioning.
///
/// All clones refer to the same model; the simulation is single threaded,
/// so the interior mutability is never contended.
#[derive(Clone)]
pub struct TestbenchHandle(Rc<RefCell<DebugModule>>);

impl TestbenchHandle {
    /// Store a word in the modeled memory. `address` must be word aligned.
    pub fn poke_word(&self, address: u32, value: u32) {
        assert_eq!(address & 3, 0, "memory image is word addressed");
        self.0.borrow_mut().mem.insert(address, value);
    }

    /// Fetch a word from the modeled memory, if one was ever written.
    pub fn peek_word(&self, address: u32) -> Option<u32> {
        assert_eq!(address & 3, 0, "memory image is word addressed");
        self.0.borrow().mem.get(&address).copied()
    }

    /// Is the hart halted?
    pub fn halted(&self) -> bool {
        self.0.borrow().halted
    }

    /// Respond to the next `count` DMI requests with RETRY instead of
    /// executing them.
    pub fn inject_dmi_retries(&self, count: u32) {
        self.0.borrow_mut().retry_inject = count;
    }

    /// How many times `dtmcs.dmireset` has been written.
    pub fn dmireset_count(&self) -> u32 {
        self.0.borrow().dmireset_count
    }

    /// Fail the next `count` abstract commands with `cmderr` = busy.
    pub fn inject_cmderr_busy(&self, count: u32) {
        self.0.borrow_mut().busy_inject = count;
    }

    /// How many rising edges `dmcontrol.ndmreset` has seen.
    pub fn ndmreset_pulses(&self) -> u32 {
        self.0.borrow().ndmreset_pulses
    }

    /// Configure how many haltsum polls a freely running hart survives
    /// before halting on its own.
    pub fn set_run_polls(&self, polls: u32) {
        self.0.borrow_mut().run_polls = polls;
    }
}

/// The pin-level device model.
pub struct TestbenchDevice {
    // Pin inputs as last driven.
    rstn: bool,
    trst: bool,
    tck: bool,
    tms: bool,
    tdi: bool,
    prev_tck: bool,

    // TDO: the bit latched at the last falling edge, and the bit the next
    // falling edge will present.
    tdo: bool,
    pending_tdo: bool,

    state: TapState,
    ir: u8,
    ir_shift: u32,
    dr_shift: u64,

    dm: Rc<RefCell<DebugModule>>,
}

impl TestbenchDevice {
    pub fn new() -> Self {
        TestbenchDevice {
            rstn: false,
            trst: false,
            tck: false,
            tms: false,
            tdi: false,
            prev_tck: false,
            tdo: false,
            pending_tdo: false,
            state: TapState::RunTestIdle,
            ir: ir::IDCODE,
            ir_shift: 0,
            dr_shift: 0,
            dm: Rc::new(RefCell::new(DebugModule::new())),
        }
    }

    /// A handle onto the shared model state.
    pub fn handle(&self) -> TestbenchHandle {
        TestbenchHandle(Rc::clone(&self.dm))
    }

    fn dr_len(&self) -> usize {
        match self.ir {
            ir::IDCODE | ir::DTMCS => 32,
            ir::DMIACCESS => DMI_DR_LEN,
            _ => 1, // everything else decodes to bypass
        }
    }

    fn capture_dr(&self) -> u64 {
        match self.ir {
            ir::IDCODE => TESTBENCH_IDCODE as u64,
            ir::DTMCS => DTMCS_VALUE as u64,
            ir::DMIACCESS => self.dm.borrow().dmi_response,
            _ => 0,
        }
    }

    fn update_dr(&mut self) {
        match self.ir {
            ir::DTMCS => {
                if self.dr_shift & (1 << 16) != 0 {
                    let mut dm = self.dm.borrow_mut();
                    dm.dmireset_count += 1;
                }
            }
            ir::DMIACCESS => self.dm.borrow_mut().execute_dmi(self.dr_shift),
            _ => {}
        }
    }
}

impl Default for TestbenchDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl JtagDevice for TestbenchDevice {
    fn eval(&mut self) {
        if !self.rstn || !self.trst {
            // This implementation leaves reset in Run-Test/Idle, not
            // Test-Logic-Reset.
            self.state = TapState::RunTestIdle;
            self.ir = ir::IDCODE;
            self.prev_tck = self.tck;
            return;
        }

        let rising = self.tck && !self.prev_tck;
        let falling = !self.tck && self.prev_tck;
        self.prev_tck = self.tck;

        if rising {
            match self.state {
                TapState::CaptureDr => self.dr_shift = self.capture_dr(),
                TapState::ShiftDr => {
                    let len = self.dr_len();
                    self.pending_tdo = self.dr_shift & 1 != 0;
                    self.dr_shift >>= 1;
                    if self.tdi {
                        self.dr_shift |= 1 << (len - 1);
                    }
                }
                TapState::CaptureIr => self.ir_shift = 0b00001,
                TapState::ShiftIr => {
                    self.pending_tdo = self.ir_shift & 1 != 0;
                    self.ir_shift >>= 1;
                    if self.tdi {
                        self.ir_shift |= 1 << (IR_LEN - 1);
                    }
                }
                _ => {}
            }
            self.state = self.state.advance(self.tms);
        } else if falling {
            match self.state {
                TapState::UpdateDr => self.update_dr(),
                TapState::UpdateIr => self.ir = (self.ir_shift & 0x1f) as u8,
                TapState::TestLogicReset => self.ir = ir::IDCODE,
                _ => {}
            }
            self.tdo = self.pending_tdo;
        }
    }

    fn finished(&self) -> bool {
        false
    }

    fn set_ref_clk(&mut self, _level: bool) {}

    fn set_rstn(&mut self, level: bool) {
        self.rstn = level;
    }

    fn set_tck(&mut self, level: bool) {
        self.tck = level;
    }

    fn set_trst(&mut self, level: bool) {
        self.trst = level;
    }

    fn set_tms(&mut self, level: bool) {
        self.tms = level;
    }

    fn set_tdi(&mut self, level: bool) {
        self.tdi = level;
    }

    fn tdo(&self) -> bool {
        self.tdo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One full TCK cycle against the bare device: present TMS/TDI, clock
    /// high then low, return the TDO level after the falling edge.
    fn cycle(device: &mut TestbenchDevice, tms: bool, tdi: bool) -> bool {
        device.set_tms(tms);
        device.set_tdi(tdi);
        device.set_tck(true);
        device.eval();
        device.set_tck(false);
        device.eval();
        device.tdo()
    }

    fn powered_up() -> TestbenchDevice {
        let mut device = TestbenchDevice::new();
        device.set_rstn(false);
        device.set_trst(false);
        device.eval();
        device.set_rstn(true);
        device.set_trst(true);
        device.eval();
        device
    }

    #[test]
    fn idcode_shifts_out_after_reset() {
        let mut device = powered_up();

        // Reset leaves the TAP in Run-Test/Idle with IDCODE selected.
        cycle(&mut device, true, false); // Select-DR-Scan
        cycle(&mut device, false, false); // Capture-DR
        cycle(&mut device, false, false); // capture happens, enter Shift-DR

        let mut idcode = 0u32;
        for bit in 0..32 {
            if cycle(&mut device, false, false) {
                idcode |= 1 << bit;
            }
        }
        assert_eq!(idcode, TESTBENCH_IDCODE);
    }

    #[test]
    fn reset_forces_run_test_idle() {
        let mut device = powered_up();

        // Wander off into the IR path, then yank reset.
        cycle(&mut device, true, false);
        cycle(&mut device, true, false);
        cycle(&mut device, false, false);
        assert_eq!(device.state, TapState::CaptureIr);

        device.set_rstn(false);
        device.eval();
        assert_eq!(device.state, TapState::RunTestIdle);
        assert_eq!(device.ir, ir::IDCODE);
    }

    #[test]
    fn system_bus_autoincrement_walks_the_address() {
        let mut dm = DebugModule::new();
        dm.mem.insert(0x100, 0x1111_1111);
        dm.mem.insert(0x104, 0x2222_2222);

        // sbreadonaddr + sbreadondata + autoincrement, 32-bit access.
        dm.dm_write(0x38, (1 << 20) | (2 << 17) | (1 << 16) | (1 << 15));
        dm.dm_write(0x39, 0x100);
        assert_eq!(dm.sb_address, 0x104, "the triggered read incremented");

        assert_eq!(dm.dm_read(0x3c), 0x1111_1111);
        assert_eq!(dm.dm_read(0x3c), 0x2222_2222);
        assert_eq!(dm.sb_address, 0x10c);
    }

    #[test]
    fn system_bus_write_stores_at_the_current_address() {
        let mut dm = DebugModule::new();

        dm.dm_write(0x38, 2 << 17); // 32-bit, no triggers, no increment
        dm.dm_write(0x39, 0x200);
        dm.dm_write(0x3c, 0xcafe_f00d);
        assert_eq!(dm.mem.get(&0x200), Some(&0xcafe_f00d));
        assert_eq!(dm.sb_address, 0x200, "no autoincrement requested");
    }

    #[test]
    fn unsupported_bus_access_size_sets_sberror() {
        let mut dm = DebugModule::new();

        dm.dm_write(0x38, (1 << 20) | (0 << 17)); // 8-bit access
        dm.dm_write(0x39, 0x100);
        assert_eq!(dm.sb_error, 4);

        // Write one to clear.
        dm.dm_write(0x38, 7 << 12);
        assert_eq!(dm.sb_error, 0);
    }

    #[test]
    fn abstract_commands_need_a_halted_hart() {
        let mut dm = DebugModule::new();

        // Read of x5 while running.
        dm.dm_write(0x17, (2 << 20) | (1 << 17) | 0x1005);
        assert_eq!(dm.cmderr, 4);

        // Clear, halt, retry.
        dm.dm_write(0x16, 7 << 8);
        dm.dm_write(0x10, (1 << 31) | 1);
        assert!(dm.halted);
        dm.gpr[5] = 0x600d_cafe;
        dm.dm_write(0x17, (2 << 20) | (1 << 17) | 0x1005);
        assert_eq!(dm.cmderr, 0);
        assert_eq!(dm.data[0], 0x600d_cafe);
    }

    #[test]
    fn x0_reads_zero_and_swallows_writes() {
        let mut dm = DebugModule::new();
        dm.dm_write(0x10, (1 << 31) | 1);

        dm.data[0] = 0xffff_ffff;
        dm.dm_write(0x17, (2 << 20) | (1 << 17) | (1 << 16) | 0x1000);
        assert_eq!(dm.cmderr, 0);

        dm.dm_write(0x17, (2 << 20) | (1 << 17) | 0x1000);
        assert_eq!(dm.data[0], 0);
    }

    #[test]
    fn step_halts_after_one_instruction() {
        let mut dm = DebugModule::new();
        dm.dm_write(0x10, (1 << 31) | 1); // halt
        dm.dcsr |= DCSR_STEP;
        let pc = dm.dpc;

        dm.dm_write(0x10, (1 << 30) | 1); // resume
        assert!(dm.halted, "step re-enters debug mode immediately");
        assert_eq!((dm.dcsr >> 6) & 0x7, cause::STEP);
        assert_eq!(dm.dpc, pc.wrapping_add(4));
    }

    #[test]
    fn injected_retry_defers_the_request() {
        let mut dm = DebugModule::new();
        dm.retry_inject = 1;

        dm.execute_dmi((0x11 << 34) | 1); // read dmstatus
        assert_eq!(dm.dmi_response & 0x3, 3);

        dm.execute_dmi((0x11 << 34) | 1);
        assert_eq!(dm.dmi_response & 0x3, 0);
        assert_ne!(dm.dmi_response >> 2, 0);
    }
}
