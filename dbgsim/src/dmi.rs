//! The debug module register file and access engine.
//!
//! [`Dmi`] owns the transport and layers three services over it: hart
//! selection and halt control through `dmcontrol`, CSR/GPR/FPR access
//! through 32-bit access-register abstract commands, and memory access
//! through the system bus. Abstract memory access is not implemented by the
//! target hardware, so all memory traffic is decomposed into 32-bit bus
//! words with read-modify-write at misaligned boundaries.

pub mod csr;
pub mod regs;

use crate::dtm::JtagDtm;
use crate::error::{Error, Result};
use self::regs::{
    Abstractcs, BusAccess, CmdErr, Command, Data0, DmRegister, Dmcontrol, SbError, Sbaddress0,
    Sbcs, Sbdata0,
};

/// Abstract-command register number of GPR x0.
const GPR_BASE: u16 = 0x1000;

/// Abstract-command register number of FPR f0.
const FPR_BASE: u16 = 0x1020;

/// How many `sbcs` polls a single bus access may take before the device is
/// declared stuck.
const SB_POLL_LIMIT: u32 = 1024;

/// Typed access to the debug module.
#[derive(Debug)]
pub struct Dmi {
    dtm: JtagDtm,
    /// Hart reapplied whenever a `dmcontrol` value is rebuilt from its
    /// reset default, so a rebuild never silently reselects hart 0.
    selected_hart: u32,
}

impl Dmi {
    /// Take ownership of the transport.
    pub fn new(dtm: JtagDtm) -> Self {
        Dmi {
            dtm,
            selected_hart: 0,
        }
    }

    /// Reset the underlying transport (TAP reset plus DTM bring-up).
    pub fn dtm_reset(&mut self) -> Result<()> {
        self.dtm.reset()
    }

    /// Current simulated time in nanoseconds.
    pub fn sim_time_ns(&self) -> u64 {
        self.dtm.sim_time_ns()
    }

    // ── Register-level access ───────────────────────────────────────────

    /// Read a debug module register by type.
    pub fn read_reg<R: DmRegister>(&mut self) -> Result<R> {
        let value = self.dtm.dmi_read(R::ADDRESS as u64)?;
        tracing::trace!("read {} = {value:#010x}", R::NAME);
        Ok(R::from(value))
    }

    /// Write a debug module register by value.
    pub fn write_reg<R: DmRegister>(&mut self, register: R) -> Result<()> {
        let value: u32 = register.into();
        tracing::trace!("write {} = {value:#010x}", R::NAME);
        self.dtm.dmi_write(R::ADDRESS as u64, value)
    }

    /// Read entry `index` of a register array (e.g. [`regs::HALTSUM_ADDR`]).
    pub fn read_indexed(&mut self, addresses: &[u8], index: usize) -> Result<u32> {
        self.dtm.dmi_read(addresses[index] as u64)
    }

    /// Write entry `index` of a register array.
    pub fn write_indexed(&mut self, addresses: &[u8], index: usize, value: u32) -> Result<()> {
        self.dtm.dmi_write(addresses[index] as u64, value)
    }

    // ── Hart control ────────────────────────────────────────────────────

    /// A `dmcontrol` value at its reset default with the current hart
    /// selection reapplied.
    fn control_frame(&self) -> Dmcontrol {
        let mut control = Dmcontrol::at_reset();
        control.set_hartsel(self.selected_hart);
        control
    }

    /// Select a hart and activate the debug module.
    pub fn select_hart(&mut self, hart: u32) -> Result<()> {
        self.selected_hart = hart;
        let mut control = self.control_frame();
        control.set_dmactive(true);
        self.write_reg(control)
    }

    /// Select a hart and request that it halts.
    pub fn halt_hart(&mut self, hart: u32) -> Result<()> {
        self.selected_hart = hart;
        let mut control = self.control_frame();
        control.set_haltreq(true);
        control.set_dmactive(true);
        self.write_reg(control)
    }

    /// Ask the currently selected hart to resume.
    pub fn resume_hart(&mut self) -> Result<()> {
        let mut control = self.control_frame();
        control.set_haltreq(false);
        control.set_resumereq(true);
        control.set_dmactive(true);
        self.write_reg(control)
    }

    /// Probe the widest supported hart index: select all ones, read back
    /// what stuck, mask to the field.
    pub fn hartsellen(&mut self) -> Result<u32> {
        let previous = self.selected_hart;
        self.select_hart(Dmcontrol::HARTSEL_MAX)?;
        let control: Dmcontrol = self.read_reg()?;
        let widest = control.hartsel();
        self.select_hart(previous)?;
        Ok(widest)
    }

    // ── CSR / GPR / FPR access ──────────────────────────────────────────

    /// Read a CSR through an access-register abstract command.
    pub fn read_csr(&mut self, address: u16) -> Result<u32> {
        let mut command = Command::access_register();
        command.set_transfer(true);
        command.set_write(false);
        command.set_regno(address as u32);
        self.write_reg(command)?;

        self.check_abstract_command()?;
        let data: Data0 = self.read_reg()?;
        Ok(data.0)
    }

    /// Write a CSR through an access-register abstract command.
    ///
    /// Write legality is not enforced here; a write to a read-only CSR is
    /// reported by the debug module through `cmderr`.
    pub fn write_csr(&mut self, address: u16, value: u32) -> Result<()> {
        self.write_reg(Data0(value))?;

        let mut command = Command::access_register();
        command.set_transfer(true);
        command.set_write(true);
        command.set_regno(address as u32);
        self.write_reg(command)?;

        self.check_abstract_command()
    }

    /// Read general purpose register `x<number>`.
    pub fn read_gpr(&mut self, number: usize) -> Result<u32> {
        self.read_csr(GPR_BASE + number as u16)
    }

    /// Write general purpose register `x<number>`.
    pub fn write_gpr(&mut self, number: usize, value: u32) -> Result<()> {
        self.write_csr(GPR_BASE + number as u16, value)
    }

    /// Read floating point register `f<number>`.
    pub fn read_fpr(&mut self, number: usize) -> Result<u32> {
        self.read_csr(FPR_BASE + number as u16)
    }

    /// Write floating point register `f<number>`.
    pub fn write_fpr(&mut self, number: usize, value: u32) -> Result<()> {
        self.write_csr(FPR_BASE + number as u16, value)
    }

    /// Inspect `cmderr` after submitting an abstract command.
    ///
    /// `Busy` means the debug unit wedged: the documented recovery is to
    /// pulse `ndmreset` and then cycle `dmactive`, after which the error is
    /// reported without retrying the command. Any other nonzero code is
    /// cleared (write one to clear) and reported.
    fn check_abstract_command(&mut self) -> Result<()> {
        let status: Abstractcs = self.read_reg()?;
        match status.cmderr_kind() {
            CmdErr::None => Ok(()),
            CmdErr::Busy => {
                tracing::warn!("abstract command left the debug unit busy, resetting it");
                self.recover_busy()?;
                Err(Error::AbstractCommand(CmdErr::Busy))
            }
            err => {
                let mut clear = Abstractcs(0);
                clear.clear_cmderr();
                self.write_reg(clear)?;
                Err(Error::AbstractCommand(err))
            }
        }
    }

    /// Pulse `ndmreset` high then low, then take `dmactive` low and high.
    fn recover_busy(&mut self) -> Result<()> {
        for level in [true, false] {
            let mut control = self.control_frame();
            control.set_ndmreset(level);
            self.write_reg(control)?;
        }
        for level in [false, true] {
            let mut control = self.control_frame();
            control.set_dmactive(level);
            self.write_reg(control)?;
        }
        Ok(())
    }

    // ── System bus memory access ────────────────────────────────────────

    /// Read `buf.len()` bytes of memory starting at `address`.
    ///
    /// The access is decomposed into aligned 32-bit bus reads; partial head
    /// and tail words are trimmed to the requested range. An empty buffer
    /// succeeds without touching the bus.
    pub fn read_mem(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let start = (address & !3) as u64;
        let end = (address as u64 + buf.len() as u64 + 3) & !3;
        let n_words = ((end - start) / 4) as usize;

        // Reads are triggered by the address write and by each data read.
        let mut sbcs = Sbcs::at_reset();
        sbcs.set_sbreadonaddr(true);
        sbcs.set_sbaccess(BusAccess::A32);
        sbcs.set_sbautoincrement(n_words > 1);
        sbcs.set_sbreadondata(true);
        sbcs.clear_sberror();
        self.write_reg(sbcs)?;

        self.write_reg(Sbaddress0(start as u32))?;
        self.sb_wait()?;

        // Head word: skip the bytes below the requested address.
        let mut word = self.read_reg::<Sbdata0>()?.0;
        let mut index = 0;
        let offset = (address as u64 - start) as usize;
        for byte in offset..usize::min(offset + buf.len(), 4) {
            buf[index] = (word >> (8 * byte)) as u8;
            index += 1;
        }

        let mut next = start + 4;
        if next == end {
            return Ok(());
        }

        while next < end - 4 {
            self.sb_wait()?;
            word = self.read_reg::<Sbdata0>()?.0;
            for byte in 0..4 {
                buf[index] = (word >> (8 * byte)) as u8;
                index += 1;
            }
            next += 4;
        }

        // Tail word: stop at the end of the requested range.
        self.sb_wait()?;
        word = self.read_reg::<Sbdata0>()?.0;
        let tail_gap = (end - (address as u64 + buf.len() as u64)) as usize;
        for byte in 0..4 - tail_gap {
            buf[index] = (word >> (8 * byte)) as u8;
            index += 1;
        }

        Ok(())
    }

    /// Write `buf` to memory starting at `address`.
    ///
    /// Words not fully covered by `buf` are read first and merged so the
    /// neighbouring bytes keep their values. An empty buffer succeeds
    /// without touching the bus.
    pub fn write_mem(&mut self, address: u32, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let start = (address & !3) as u64;
        let end = (address as u64 + buf.len() as u64 + 3) & !3;
        let n_words = ((end - start) / 4) as usize;
        let start_aligned = start == address as u64;
        let end_aligned = end == address as u64 + buf.len() as u64;

        // The head word needs a read-modify-write when the range does not
        // cover it completely.
        let head_rmw = !start_aligned || (n_words == 1 && !end_aligned);

        let mut sbcs = Sbcs::at_reset();
        sbcs.set_sbreadonaddr(head_rmw);
        sbcs.set_sbaccess(BusAccess::A32);
        sbcs.set_sbautoincrement(n_words > 1);
        sbcs.set_sbreadondata(false);
        sbcs.clear_sberror();
        self.write_reg(sbcs)?;

        self.write_reg(Sbaddress0(start as u32))?;

        let mut word = 0u32;
        if head_rmw {
            self.sb_wait()?;
            word = self.read_reg::<Sbdata0>()?.0;

            // Drop the read trigger and restore the start address, which
            // the fetch may have auto-incremented past.
            let mut sbcs = Sbcs::at_reset();
            sbcs.set_sbreadonaddr(false);
            sbcs.set_sbaccess(BusAccess::A32);
            sbcs.set_sbautoincrement(n_words > 1);
            sbcs.set_sbreadondata(false);
            sbcs.clear_sberror();
            self.write_reg(sbcs)?;
            self.write_reg(Sbaddress0(start as u32))?;
        }

        // Head word: merge from the requested address up.
        let mut index = 0;
        let offset = (address as u64 - start) as usize;
        for byte in offset..usize::min(offset + buf.len(), 4) {
            word &= !(0xff << (8 * byte));
            word |= (buf[index] as u32) << (8 * byte);
            index += 1;
        }

        // The data write triggers the bus write.
        self.write_reg(Sbdata0(word))?;
        self.sb_wait()?;

        let mut next = start + 4;
        if next == end {
            return Ok(());
        }

        while next < end - 4 {
            let mut word = 0u32;
            for byte in 0..4 {
                word |= (buf[index] as u32) << (8 * byte);
                index += 1;
            }
            self.write_reg(Sbdata0(word))?;
            self.sb_wait()?;
            next += 4;
        }

        // Tail word: fetch it first if the range ends inside it.
        let mut word = 0u32;
        if !end_aligned {
            let mut sbcs = Sbcs::at_reset();
            sbcs.set_sbreadonaddr(true);
            sbcs.set_sbaccess(BusAccess::A32);
            sbcs.set_sbautoincrement(false);
            sbcs.set_sbreadondata(false);
            sbcs.clear_sberror();
            self.write_reg(sbcs)?;

            self.write_reg(Sbaddress0(next as u32))?;
            self.sb_wait()?;
            word = self.read_reg::<Sbdata0>()?.0;

            let mut sbcs = Sbcs::at_reset();
            sbcs.set_sbreadonaddr(false);
            sbcs.set_sbaccess(BusAccess::A32);
            sbcs.set_sbautoincrement(false);
            sbcs.set_sbreadondata(false);
            sbcs.clear_sberror();
            self.write_reg(sbcs)?;
        }

        let tail_gap = (end - (address as u64 + buf.len() as u64)) as usize;
        for byte in 0..4 - tail_gap {
            word &= !(0xff << (8 * byte));
            word |= (buf[index] as u32) << (8 * byte);
            index += 1;
        }

        self.write_reg(Sbdata0(word))?;
        self.sb_wait()
    }

    /// Poll `sbcs` until the bus is idle, then check for an access error.
    ///
    /// Each poll is a full DMI round trip, so the simulation clock advances
    /// between iterations and a stuck device cannot livelock the loop.
    fn sb_wait(&mut self) -> Result<()> {
        for _ in 0..SB_POLL_LIMIT {
            let sbcs: Sbcs = self.read_reg()?;
            if sbcs.sbbusy() {
                continue;
            }
            return match sbcs.sberror_kind() {
                SbError::None => Ok(()),
                err => Err(Error::SystemBus(err)),
            };
        }
        Err(Error::DmiHung(SB_POLL_LIMIT))
    }
}
