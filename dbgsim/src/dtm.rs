//! Debug Transport Module: DMI framing over JTAG.
//!
//! The DTM owns the TAP and turns debug module register accesses into DR
//! shifts of the DMIACCESS register. A request and its response travel in
//! separate shifts: the first shift submits the operation and the next one
//! collects its status and data. When the transport answers RETRY the
//! in-flight state is cleared through `dtmcs.dmireset` and the request is
//! submitted again, up to a fixed retry budget.

use bitfield::bitfield;

use crate::error::{Error, Result};
use crate::tap::Tap;

/// Instruction register opcodes of the debug TAP.
pub mod ir {
    /// Mandatory bypass register (all-zeros encoding).
    pub const BYPASS0: u8 = 0x00;
    /// Device identification register.
    pub const IDCODE: u8 = 0x01;
    /// DTM control and status.
    pub const DTMCS: u8 = 0x10;
    /// The DMI access register.
    pub const DMIACCESS: u8 = 0x11;
    /// Mandatory bypass register (all-ones encoding).
    pub const BYPASS1: u8 = 0x1f;
}

bitfield! {
    /// The `dtmcs` register of the debug TAP.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Dtmcs(u32);
    impl Debug;

    pub _, set_dmihardreset: 17;
    pub _, set_dmireset: 16;
    pub idle, _: 14, 12;
    pub dmistat, _: 11, 10;
    pub abits, _: 9, 4;
    pub version, _: 3, 0;
}

/// Offset of the address field in a DMIACCESS frame.
const DMI_ADDRESS_BIT_OFFSET: u32 = 34;

/// Offset of the data field in a DMIACCESS frame.
const DMI_DATA_BIT_OFFSET: u32 = 2;

/// How often a busy DMI access is resubmitted before giving up.
const DMI_RETRY_LIMIT: u32 = 64;

/// Operation code in the low two bits of an outgoing DMIACCESS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmiOp {
    NoOp = 0,
    Read = 1,
    Write = 2,
}

/// Status code in the low two bits of an incoming DMIACCESS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmiStatus {
    Ok,
    Reserved,
    Failed,
    Retry,
}

impl DmiStatus {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => DmiStatus::Ok,
            1 => DmiStatus::Reserved,
            2 => DmiStatus::Failed,
            _ => DmiStatus::Retry,
        }
    }
}

/// Assemble a DMIACCESS frame, LSB first: `{address, data, op}`.
fn frame(addr_mask: u64, op: DmiOp, address: u64, data: u32) -> u64 {
    ((address & addr_mask) << DMI_ADDRESS_BIT_OFFSET)
        | ((data as u64) << DMI_DATA_BIT_OFFSET)
        | op as u64
}

/// The JTAG flavor of the Debug Transport Module.
#[derive(Debug)]
pub struct JtagDtm {
    tap: Tap,
    /// Width of a DMIACCESS DR shift: 34 + abits.
    dmi_width: usize,
    /// Mask for the DMI address space, `(1 << abits) - 1`.
    addr_mask: u64,
}

impl JtagDtm {
    /// Wrap a TAP driver. [`JtagDtm::reset`] must run before any DMI
    /// traffic; until then a plausible 8-bit address space is assumed.
    pub fn new(tap: Tap) -> Self {
        JtagDtm {
            tap,
            dmi_width: 42,
            addr_mask: 0xff,
        }
    }

    /// Current simulated time in nanoseconds.
    pub fn sim_time_ns(&self) -> u64 {
        self.tap.sim_time_ns()
    }

    /// Reset the TAP and bring up the transport.
    ///
    /// Reads IDCODE and DTMCS, learns the DMI address width and the
    /// Run-Test/Idle dwell the transport needs between accesses, and clears
    /// any DMI state left over from before the reset.
    pub fn reset(&mut self) -> Result<()> {
        self.tap.reset()?;

        let idcode = self.tap.read_reg(ir::IDCODE, 32)? as u32;
        tracing::info!(
            "IDCODE {:#010x} [version {:#x}, part {:#06x}, JEP106 id {:#04x}, continuation {}]",
            idcode,
            (idcode >> 28) & 0xf,
            (idcode >> 12) & 0xffff,
            (idcode >> 1) & 0x7f,
            (idcode >> 8) & 0xf,
        );

        let dtmcs = Dtmcs(self.tap.read_reg(ir::DTMCS, 32)? as u32);
        tracing::info!(
            "DTMCS {:#010x} [idle {}, dmistat {}, abits {}, version {}]",
            dtmcs.0,
            dtmcs.idle(),
            dtmcs.dmistat(),
            dtmcs.abits(),
            dtmcs.version(),
        );

        if dtmcs.version() != 1 {
            return Err(Error::UnsupportedDtmVersion(dtmcs.version() as u8));
        }

        self.tap.set_rti_count(dtmcs.idle() as u8);
        let abits = dtmcs.abits();
        self.dmi_width = (DMI_ADDRESS_BIT_OFFSET + abits) as usize;
        self.addr_mask = (1u64 << abits) - 1;

        // Discard any in-flight DMI transaction from a previous session.
        self.clear_in_flight()
    }

    /// Read a debug module register.
    pub fn dmi_read(&mut self, address: u64) -> Result<u32> {
        let request = frame(self.addr_mask, DmiOp::Read, address, 0);

        for _ in 0..DMI_RETRY_LIMIT {
            // Submit the read; the response arrives with the next shift.
            self.tap.write_reg(ir::DMIACCESS, request, self.dmi_width)?;
            let response = self.tap.read_reg(ir::DMIACCESS, self.dmi_width)?;

            match DmiStatus::from_bits(response as u8) {
                DmiStatus::Ok => return Ok((response >> DMI_DATA_BIT_OFFSET) as u32),
                DmiStatus::Retry => {
                    tracing::debug!("DMI read of {address:#x} busy, retrying");
                    self.clear_in_flight()?;
                }
                status => {
                    tracing::warn!(
                        "unknown status {status:?} for DMI read of {address:#x}, \
                         returning data unchecked"
                    );
                    return Ok((response >> DMI_DATA_BIT_OFFSET) as u32);
                }
            }
        }

        Err(Error::DmiHung(DMI_RETRY_LIMIT))
    }

    /// Write a debug module register.
    pub fn dmi_write(&mut self, address: u64, data: u32) -> Result<()> {
        let request = frame(self.addr_mask, DmiOp::Write, address, data);

        for _ in 0..DMI_RETRY_LIMIT {
            self.tap.write_reg(ir::DMIACCESS, request, self.dmi_width)?;
            let response = self.tap.read_reg(ir::DMIACCESS, self.dmi_width)?;

            match DmiStatus::from_bits(response as u8) {
                DmiStatus::Ok => return Ok(()),
                DmiStatus::Retry => {
                    tracing::debug!("DMI write of {address:#x} busy, retrying");
                    self.clear_in_flight()?;
                }
                status => {
                    tracing::warn!("unknown status {status:?} for DMI write of {address:#x}");
                    return Ok(());
                }
            }
        }

        Err(Error::DmiHung(DMI_RETRY_LIMIT))
    }

    /// Clear a stale in-flight DMI transaction via `dtmcs.dmireset`.
    fn clear_in_flight(&mut self) -> Result<()> {
        let mut dtmcs = Dtmcs(0);
        dtmcs.set_dmireset(true);
        self.tap.write_reg(ir::DTMCS, dtmcs.0 as u64, 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_packed_lsb_first() {
        // op in bits 1:0, data in 33:2, address above.
        assert_eq!(frame(0x7f, DmiOp::Read, 0x11, 0), (0x11 << 34) | 1);
        assert_eq!(
            frame(0x7f, DmiOp::Write, 0x10, 0x8000_0001),
            (0x10 << 34) | (0x8000_0001u64 << 2) | 2
        );
        assert_eq!(frame(0x7f, DmiOp::NoOp, 0, 0), 0);
    }

    #[test]
    fn frame_addresses_are_masked_to_abits() {
        // High address bits beyond abits are silently dropped.
        assert_eq!(
            frame(0x7f, DmiOp::Read, 0xf91, 0),
            frame(0x7f, DmiOp::Read, 0x11, 0)
        );
    }

    #[test]
    fn dtmcs_fields_decode() {
        // version 1, abits 7, idle 1, dmistat 0.
        let dtmcs = Dtmcs(0x0000_1071);
        assert_eq!(dtmcs.version(), 1);
        assert_eq!(dtmcs.abits(), 7);
        assert_eq!(dtmcs.idle(), 1);
        assert_eq!(dtmcs.dmistat(), 0);
    }

    #[test]
    fn dmireset_is_bit_sixteen() {
        let mut dtmcs = Dtmcs(0);
        dtmcs.set_dmireset(true);
        assert_eq!(dtmcs.0, 0x0001_0000);
    }

    #[test]
    fn status_codes_decode() {
        assert_eq!(DmiStatus::from_bits(0), DmiStatus::Ok);
        assert_eq!(DmiStatus::from_bits(3), DmiStatus::Retry);
        assert_eq!(DmiStatus::from_bits(1), DmiStatus::Reserved);
        assert_eq!(DmiStatus::from_bits(2), DmiStatus::Failed);
    }
}
