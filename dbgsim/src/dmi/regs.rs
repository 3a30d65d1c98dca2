//! Typed models of the debug module registers.
//!
//! Every register is a newtype over the 32-bit word shifted across the DMI,
//! with `bitfield!` accessors for its fields and a [`DmRegister`]
//! implementation carrying its DMI address, name and reset value. Register
//! arrays (`data`, `progbuf`, `haltsum`, ...) additionally expose their
//! address tables for indexed access.

use bitfield::bitfield;

/// A debug module register with a fixed DMI address.
pub trait DmRegister: From<u32> + Into<u32> + Copy {
    /// DMI address of the register.
    const ADDRESS: u8;
    /// Name, as used in the debug specification.
    const NAME: &'static str;
    /// Documented reset value.
    const RESET: u32 = 0;
}

/// Implement [`DmRegister`] and the word conversions for a bitfield type.
macro_rules! dm_register {
    ($ty:ident, $addr:expr, $name:expr) => {
        dm_register!($ty, $addr, $name, reset = 0);
    };
    ($ty:ident, $addr:expr, $name:expr, reset = $reset:expr) => {
        impl DmRegister for $ty {
            const ADDRESS: u8 = $addr;
            const NAME: &'static str = $name;
            const RESET: u32 = $reset;
        }

        impl From<u32> for $ty {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$ty> for u32 {
            fn from(register: $ty) -> Self {
                register.0
            }
        }

        impl $ty {
            /// The register at its documented reset value.
            pub fn at_reset() -> Self {
                Self(<Self as DmRegister>::RESET)
            }
        }
    };
}

/// Declare a register that is a plain 32-bit word, without named fields.
macro_rules! data_register {
    ($(#[$outer:meta])* $ty:ident, $addr:expr, $name:expr) => {
        $(#[$outer])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub struct $ty(pub u32);

        dm_register!($ty, $addr, $name);
    };
}

// ── Field-level register models ─────────────────────────────────────────────

bitfield! {
    /// The `dmcontrol` register: hart selection and run control.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Dmcontrol(u32);
    impl Debug;

    pub haltreq, set_haltreq: 31;
    pub resumereq, set_resumereq: 30;
    pub hartreset, set_hartreset: 29;
    pub ackhavereset, set_ackhavereset: 28;
    pub hasel, set_hasel: 26;
    pub hartsello, set_hartsello: 25, 16;
    pub hartselhi, set_hartselhi: 15, 6;
    pub setresethaltreq, set_setresethaltreq: 3;
    pub clrresethaltreq, set_clrresethaltreq: 2;
    pub ndmreset, set_ndmreset: 1;
    pub dmactive, set_dmactive: 0;
}

dm_register!(Dmcontrol, 0x10, "dmcontrol");

impl Dmcontrol {
    /// Widest hart index expressible in the split `hartsel` field.
    pub const HARTSEL_MAX: u32 = (1 << 20) - 1;

    /// The selected hart, assembled from the split field.
    pub fn hartsel(&self) -> u32 {
        (self.hartselhi() << 10) | self.hartsello()
    }

    /// Select a hart. Bits beyond the 20-bit field are dropped, matching
    /// what the hardware would do with them.
    pub fn set_hartsel(&mut self, hart: u32) {
        if hart > Self::HARTSEL_MAX {
            tracing::warn!("hartsel {hart:#x} exceeds the 20 bit field, high bits dropped");
        }
        self.set_hartsello(hart & 0x3ff);
        self.set_hartselhi((hart >> 10) & 0x3ff);
    }
}

bitfield! {
    /// The read-only `dmstatus` register.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Dmstatus(u32);
    impl Debug;

    pub impebreak, _: 22;
    pub allhavereset, _: 19;
    pub anyhavereset, _: 18;
    pub allresumeack, _: 17;
    pub anyresumeack, _: 16;
    pub allnonexistent, _: 15;
    pub anynonexistent, _: 14;
    pub allunavail, _: 13;
    pub anyunavail, _: 12;
    pub allrunning, _: 11;
    pub anyrunning, _: 10;
    pub allhalted, _: 9;
    pub anyhalted, _: 8;
    pub authenticated, _: 7;
    pub authbusy, _: 6;
    pub hasresethaltreq, _: 5;
    pub confstrptrvalid, _: 4;
    pub version, _: 3, 0;
}

dm_register!(Dmstatus, 0x11, "dmstatus");

impl Dmstatus {
    /// With a single hart the all/any distinction collapses.
    pub fn halted(&self) -> bool {
        self.allhalted()
    }
}

bitfield! {
    /// The `hartinfo` register: properties of the selected hart.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Hartinfo(u32);
    impl Debug;

    pub nscratch, _: 23, 20;
    pub dataaccess, _: 16;
    pub datasize, _: 15, 12;
    pub dataaddr, _: 11, 0;
}

dm_register!(Hartinfo, 0x12, "hartinfo");

bitfield! {
    /// The `hawindowsel` register of the hart array window.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Hawindowsel(u32);
    impl Debug;

    pub hawindowsel, set_hawindowsel: 14, 0;
}

dm_register!(Hawindowsel, 0x14, "hawindowsel");

bitfield! {
    /// The `abstractcs` register: abstract command status.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Abstractcs(u32);
    impl Debug;

    pub progbufsize, _: 28, 24;
    pub busy, _: 12;
    pub cmderr, set_cmderr: 10, 8;
    pub datacount, _: 3, 0;
}

// Resets with the write-1-to-clear cmderr bits set, so that writing the
// reset value back clears a pending error.
dm_register!(Abstractcs, 0x16, "abstractcs", reset = 0x0000_0700);

impl Abstractcs {
    /// The completion code of the last abstract command.
    pub fn cmderr_kind(&self) -> CmdErr {
        CmdErr::from_bits(self.cmderr() as u8)
    }

    /// Arm every `cmderr` bit, clearing the field when written back.
    pub fn clear_cmderr(&mut self) {
        self.set_cmderr(0b111);
    }
}

bitfield! {
    /// The `command` register. Writing it submits an abstract command.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Command(u32);
    impl Debug;

    pub cmdtype, set_cmdtype: 31, 24;
    pub aamvirtual, set_aamvirtual: 23;
    pub u8, from into BusAccess, _, set_aarsize: 22, 20;
    pub aapostincrement, set_aapostincrement: 19;
    pub postexec, set_postexec: 18;
    pub transfer, set_transfer: 17;
    pub write, set_write: 16;
    pub target_specific, set_target_specific: 15, 14;
    pub regno, set_regno: 15, 0;
}

dm_register!(Command, 0x17, "command");

impl Command {
    /// An access-register command skeleton: 32-bit size, nothing else set.
    pub fn access_register() -> Self {
        let mut command = Command::at_reset();
        command.set_cmdtype(CmdType::AccessReg.bits() as u32);
        command.set_aarsize(BusAccess::A32);
        command
    }
}

bitfield! {
    /// The `abstractauto` register.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Abstractauto(u32);
    impl Debug;

    pub autoexecprogbuf, set_autoexecprogbuf: 31, 16;
    pub autoexecdata, set_autoexecdata: 11, 0;
}

dm_register!(Abstractauto, 0x18, "abstractauto");

bitfield! {
    /// The `sbcs` register: system bus access control and status.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Sbcs(u32);
    impl Debug;

    pub sbversion, _: 31, 29;
    pub sbbusyerror, set_sbbusyerror: 22;
    pub sbbusy, _: 21;
    pub sbreadonaddr, set_sbreadonaddr: 20;
    pub u8, from into BusAccess, sbaccess, set_sbaccess: 19, 17;
    pub sbautoincrement, set_sbautoincrement: 16;
    pub sbreadondata, set_sbreadondata: 15;
    pub sberror, set_sberror: 14, 12;
    pub sbasize, _: 11, 5;
    pub sbaccess128, _: 4;
    pub sbaccess64, _: 3;
    pub sbaccess32, _: 2;
    pub sbaccess16, _: 1;
    pub sbaccess8, _: 0;
}

// Reset default: sbversion 1, 32-bit access size selected.
dm_register!(Sbcs, 0x38, "sbcs", reset = 0x2004_0000);

impl Sbcs {
    /// The error code of the last system bus access.
    pub fn sberror_kind(&self) -> SbError {
        SbError::from_bits(self.sberror() as u8)
    }

    /// Arm every `sberror` bit, clearing the field when written back.
    pub fn clear_sberror(&mut self) {
        self.set_sberror(0b111);
    }
}

// ── Word registers and register arrays ──────────────────────────────────────

data_register!(
    /// First abstract command data register.
    Data0, 0x04, "data0"
);
data_register!(
    /// First halt summary register: one bit per hart.
    Haltsum0, 0x40, "haltsum0"
);
data_register!(
    /// Hart array window.
    Hawindow, 0x15, "hawindow"
);
data_register!(
    /// First configuration string pointer register.
    Confstrptr0, 0x19, "confstrptr0"
);
data_register!(
    /// Address of the next debug module, zero for the last one.
    Nextdm, 0x1d, "nextdm"
);
data_register!(
    /// First program buffer word.
    Progbuf0, 0x20, "progbuf0"
);
data_register!(
    /// Authentication data. Inert on this debug module, which does not
    /// implement authentication.
    Authdata, 0x30, "authdata"
);
data_register!(
    /// First system bus address register.
    Sbaddress0, 0x39, "sbaddress0"
);
data_register!(
    /// First system bus data register.
    Sbdata0, 0x3c, "sbdata0"
);

/// DMI addresses of the `data0`..`data11` registers.
pub const DATA_ADDR: [u8; 12] = [
    0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

/// DMI addresses of `haltsum0`..`haltsum3`.
pub const HALTSUM_ADDR: [u8; 4] = [0x40, 0x13, 0x34, 0x35];

/// DMI addresses of `confstrptr0`..`confstrptr3`.
pub const CONFSTRPTR_ADDR: [u8; 4] = [0x19, 0x1a, 0x1b, 0x1c];

/// DMI addresses of the `progbuf0`..`progbuf15` registers.
pub const PROGBUF_ADDR: [u8; 16] = [
    0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x2b, 0x2c, 0x2d, 0x2e,
    0x2f,
];

/// DMI addresses of `sbaddress0`..`sbaddress3`.
pub const SBADDRESS_ADDR: [u8; 4] = [0x39, 0x3a, 0x3b, 0x37];

/// DMI addresses of `sbdata0`..`sbdata3`.
pub const SBDATA_ADDR: [u8; 4] = [0x3c, 0x3d, 0x3e, 0x3f];

// ── Enumerated field codes ──────────────────────────────────────────────────

/// Access width used by both abstract commands (`aarsize`) and the system
/// bus (`sbaccess`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAccess {
    A8,
    A16,
    A32,
    A64,
    A128,
    /// A reserved encoding, preserved as read.
    Unknown(u8),
}

impl BusAccess {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => BusAccess::A8,
            1 => BusAccess::A16,
            2 => BusAccess::A32,
            3 => BusAccess::A64,
            4 => BusAccess::A128,
            other => BusAccess::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            BusAccess::A8 => 0,
            BusAccess::A16 => 1,
            BusAccess::A32 => 2,
            BusAccess::A64 => 3,
            BusAccess::A128 => 4,
            BusAccess::Unknown(other) => other,
        }
    }
}

impl From<u8> for BusAccess {
    fn from(bits: u8) -> Self {
        BusAccess::from_bits(bits)
    }
}

impl From<BusAccess> for u8 {
    fn from(access: BusAccess) -> Self {
        access.bits()
    }
}

/// The type of an abstract command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdType {
    AccessReg,
    QuickAccess,
    AccessMem,
    /// A reserved encoding, preserved as read.
    Unknown(u8),
}

impl CmdType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => CmdType::AccessReg,
            1 => CmdType::QuickAccess,
            2 => CmdType::AccessMem,
            other => CmdType::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            CmdType::AccessReg => 0,
            CmdType::QuickAccess => 1,
            CmdType::AccessMem => 2,
            CmdType::Unknown(other) => other,
        }
    }
}

/// Completion code of an abstract command, from `abstractcs.cmderr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdErr {
    None,
    Busy,
    NotSupported,
    Exception,
    HaltResume,
    Bus,
    Other,
    /// A reserved encoding, preserved as read.
    Unknown(u8),
}

impl CmdErr {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => CmdErr::None,
            1 => CmdErr::Busy,
            2 => CmdErr::NotSupported,
            3 => CmdErr::Exception,
            4 => CmdErr::HaltResume,
            5 => CmdErr::Bus,
            7 => CmdErr::Other,
            other => CmdErr::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            CmdErr::None => 0,
            CmdErr::Busy => 1,
            CmdErr::NotSupported => 2,
            CmdErr::Exception => 3,
            CmdErr::HaltResume => 4,
            CmdErr::Bus => 5,
            CmdErr::Other => 7,
            CmdErr::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for CmdErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmdErr::None => write!(f, "none"),
            CmdErr::Busy => write!(f, "busy"),
            CmdErr::NotSupported => write!(f, "not supported"),
            CmdErr::Exception => write!(f, "exception"),
            CmdErr::HaltResume => write!(f, "halt/resume"),
            CmdErr::Bus => write!(f, "bus error"),
            CmdErr::Other => write!(f, "other"),
            CmdErr::Unknown(bits) => write!(f, "reserved code {bits}"),
        }
    }
}

/// Error code of a system bus access, from `sbcs.sberror`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbError {
    None,
    Timeout,
    BadAddress,
    Alignment,
    BadSize,
    Other,
    /// A reserved encoding, preserved as read.
    Unknown(u8),
}

impl SbError {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => SbError::None,
            1 => SbError::Timeout,
            2 => SbError::BadAddress,
            3 => SbError::Alignment,
            4 => SbError::BadSize,
            7 => SbError::Other,
            other => SbError::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            SbError::None => 0,
            SbError::Timeout => 1,
            SbError::BadAddress => 2,
            SbError::Alignment => 3,
            SbError::BadSize => 4,
            SbError::Other => 7,
            SbError::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for SbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SbError::None => write!(f, "none"),
            SbError::Timeout => write!(f, "timeout"),
            SbError::BadAddress => write!(f, "bad address"),
            SbError::Alignment => write!(f, "alignment"),
            SbError::BadSize => write!(f, "bad size"),
            SbError::Other => write!(f, "other"),
            SbError::Unknown(bits) => write!(f, "reserved code {bits}"),
        }
    }
}

// ── The dcsr debug CSR ──────────────────────────────────────────────────────

bitfield! {
    /// The `dcsr` CSR (0x7b0), as seen through abstract register access.
    ///
    /// Not a DMI register; modeled here because run control manipulates its
    /// `step`, `ebreak*` and `cause` fields.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Dcsr(u32);
    impl Debug;

    pub xdebugver, _: 31, 28;
    pub ebreakm, set_ebreakm: 15;
    pub ebreaks, set_ebreaks: 13;
    pub ebreaku, set_ebreaku: 12;
    pub stepie, set_stepie: 11;
    pub stopcount, set_stopcount: 10;
    pub stoptime, set_stoptime: 9;
    pub cause, set_cause: 8, 6;
    pub mprven, set_mprven: 4;
    pub nmip, _: 3;
    pub step, set_step: 2;
    pub prv, set_prv: 1, 0;
}

impl Dcsr {
    /// `cause` value reporting an executed `ebreak` instruction.
    pub const CAUSE_EBREAK: u32 = 1;
    /// `cause` value reporting a trigger hit.
    pub const CAUSE_TRIGGER: u32 = 2;
    /// `cause` value reporting a halt request.
    pub const CAUSE_HALTREQ: u32 = 3;
    /// `cause` value reporting completion of a single step.
    pub const CAUSE_STEP: u32 = 4;

    /// Set or clear all three `ebreak` privilege-level bits together.
    pub fn set_ebreaks_all(&mut self, on: bool) {
        self.set_ebreakm(on);
        self.set_ebreaks(on);
        self.set_ebreaku(on);
    }
}

impl From<u32> for Dcsr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Dcsr> for u32 {
    fn from(register: Dcsr) -> Self {
        register.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hartsel_packs_and_unpacks_losslessly() {
        for hart in [0u32, 1, 0x3ff, 0x400, 0xabcde, Dmcontrol::HARTSEL_MAX] {
            let mut control = Dmcontrol(0);
            control.set_hartsel(hart);
            assert_eq!(control.hartsel(), hart, "hart {hart:#x}");
        }
    }

    #[test]
    fn hartsel_does_not_disturb_other_fields() {
        let mut control = Dmcontrol(0);
        control.set_haltreq(true);
        control.set_dmactive(true);
        control.set_hartsel(0x155aa);
        assert!(control.haltreq());
        assert!(control.dmactive());
        assert!(!control.ndmreset());
        assert_eq!(control.hartsel(), 0x155aa);
    }

    #[test]
    fn documented_reset_values() {
        assert_eq!(Dmcontrol::RESET, 0);
        assert_eq!(Abstractcs::RESET, 0x0000_0700);
        assert_eq!(Abstractcs::at_reset().cmderr(), 0b111);
        assert_eq!(Sbcs::RESET, 0x2004_0000);
        let sbcs = Sbcs::at_reset();
        assert_eq!(sbcs.sbversion(), 1);
        assert_eq!(sbcs.sbaccess(), BusAccess::A32);
    }

    #[test]
    fn sbcs_fields_land_on_their_documented_bits() {
        let mut sbcs = Sbcs(0);
        sbcs.set_sbreadonaddr(true);
        assert_eq!(sbcs.0, 0x0010_0000);
        sbcs.set_sbreadondata(true);
        assert_eq!(sbcs.0, 0x0010_8000);
        sbcs.set_sbautoincrement(true);
        assert_eq!(sbcs.0, 0x0011_8000);
        sbcs.set_sbaccess(BusAccess::A32);
        assert_eq!(sbcs.0, 0x0015_8000);
        sbcs.clear_sberror();
        assert_eq!(sbcs.0, 0x0015_f000);
    }

    #[test]
    fn command_fields_land_on_their_documented_bits() {
        let mut command = Command(0);
        command.set_cmdtype(CmdType::AccessReg.bits() as u32);
        command.set_aarsize(BusAccess::A32);
        command.set_transfer(true);
        command.set_write(true);
        command.set_regno(0x1008);
        assert_eq!(command.0, 0x0023_1008);
    }

    #[test]
    fn abstractcs_cmderr_round_trips() {
        for bits in 0..=7u8 {
            let mut abstractcs = Abstractcs(0);
            abstractcs.set_cmderr(bits as u32);
            assert_eq!(abstractcs.cmderr_kind().bits(), bits);
        }
        assert_eq!(CmdErr::from_bits(6), CmdErr::Unknown(6));
    }

    #[test]
    fn sberror_round_trips_reserved_codes() {
        for bits in 0..=7u8 {
            assert_eq!(SbError::from_bits(bits).bits(), bits);
        }
        assert_eq!(SbError::from_bits(5), SbError::Unknown(5));
        assert_eq!(SbError::from_bits(6), SbError::Unknown(6));
    }

    #[test]
    fn dcsr_run_control_fields() {
        let mut dcsr = Dcsr(0);
        dcsr.set_step(true);
        assert_eq!(dcsr.0, 0x0000_0004);
        dcsr.set_step(false);
        dcsr.set_ebreaks_all(true);
        assert_eq!(dcsr.0, 0x0000_b000);

        let mut cause = Dcsr(0);
        cause.set_cause(Dcsr::CAUSE_EBREAK);
        assert_eq!(cause.0, 0x0000_0040);
    }

    #[test]
    fn register_addresses_match_the_memory_map() {
        assert_eq!(Dmcontrol::ADDRESS, 0x10);
        assert_eq!(Dmstatus::ADDRESS, 0x11);
        assert_eq!(Hartinfo::ADDRESS, 0x12);
        assert_eq!(Abstractcs::ADDRESS, 0x16);
        assert_eq!(Command::ADDRESS, 0x17);
        assert_eq!(Sbcs::ADDRESS, 0x38);
        assert_eq!(Sbaddress0::ADDRESS, SBADDRESS_ADDR[0]);
        assert_eq!(Sbdata0::ADDRESS, SBDATA_ADDR[0]);
        assert_eq!(Data0::ADDRESS, DATA_ADDR[0]);
        assert_eq!(Haltsum0::ADDRESS, HALTSUM_ADDR[0]);
        assert_eq!(Progbuf0::ADDRESS, PROGBUF_ADDR[0]);
        assert_eq!(Confstrptr0::ADDRESS, CONFSTRPTR_ADDR[0]);
    }
}
