//! Directory of the control and status registers of the core.
//!
//! Maps each implemented 12-bit CSR address to its name, writability and
//! configuration class. The class is advisory: it selects which registers
//! appear in the GDB target description for a given core configuration, it
//! does not gate accesses.

use std::collections::HashMap;
use std::sync::LazyLock;

/// The `dcsr` debug control and status register.
pub const DCSR: u16 = 0x7b0;
/// The `dpc` debug program counter.
pub const DPC: u16 = 0x7b1;
/// Floating point accrued exception flags.
pub const FFLAGS: u16 = 0x001;
/// Floating point dynamic rounding mode.
pub const FRM: u16 = 0x002;
/// Floating point control and status (frm + fflags).
pub const FCSR: u16 = 0x003;
/// Machine cycle counter.
pub const MCYCLE: u16 = 0xb00;
/// Machine retired instruction counter.
pub const MINSTRET: u16 = 0xb02;

/// Which core configurations implement a CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrClass {
    /// Present in every configuration.
    Any,
    /// Present only when the FPU is fitted.
    Fp,
    /// Present only when hardware loops are fitted.
    Hwlp,
}

/// Metadata for one CSR.
#[derive(Debug, Clone, Copy)]
pub struct CsrInfo {
    /// Architectural name, lower case.
    pub name: &'static str,
    /// True if writes are architecturally ignored or illegal.
    pub read_only: bool,
    /// Configuration class.
    pub class: CsrClass,
}

const fn rw(name: &'static str, class: CsrClass) -> CsrInfo {
    CsrInfo {
        name,
        read_only: false,
        class,
    }
}

const fn ro(name: &'static str, class: CsrClass) -> CsrInfo {
    CsrInfo {
        name,
        read_only: true,
        class,
    }
}

#[rustfmt::skip]
static CSR_TABLE: &[(u16, CsrInfo)] = {
    use CsrClass::{Any, Fp, Hwlp};
    &[
        // Standard user CSRs
        (0x001, rw("fflags", Fp)),
        (0x002, rw("frm", Fp)),
        (0x003, rw("fcsr", Fp)),
        (0xc00, ro("cycle", Any)),
        (0xc02, ro("instret", Any)),
        (0xc03, ro("hpmcounter3", Any)),
        (0xc04, ro("hpmcounter4", Any)),
        (0xc05, ro("hpmcounter5", Any)),
        (0xc06, ro("hpmcounter6", Any)),
        (0xc07, ro("hpmcounter7", Any)),
        (0xc08, ro("hpmcounter8", Any)),
        (0xc09, ro("hpmcounter9", Any)),
        (0xc0a, ro("hpmcounter10", Any)),
        (0xc0b, ro("hpmcounter11", Any)),
        (0xc0c, ro("hpmcounter12", Any)),
        (0xc0d, ro("hpmcounter13", Any)),
        (0xc0e, ro("hpmcounter14", Any)),
        (0xc0f, ro("hpmcounter15", Any)),
        (0xc10, ro("hpmcounter16", Any)),
        (0xc11, ro("hpmcounter17", Any)),
        (0xc12, ro("hpmcounter18", Any)),
        (0xc13, ro("hpmcounter19", Any)),
        (0xc14, ro("hpmcounter20", Any)),
        (0xc15, ro("hpmcounter21", Any)),
        (0xc16, ro("hpmcounter22", Any)),
        (0xc17, ro("hpmcounter23", Any)),
        (0xc18, ro("hpmcounter24", Any)),
        (0xc19, ro("hpmcounter25", Any)),
        (0xc1a, ro("hpmcounter26", Any)),
        (0xc1b, ro("hpmcounter27", Any)),
        (0xc1c, ro("hpmcounter28", Any)),
        (0xc1d, ro("hpmcounter29", Any)),
        (0xc1e, ro("hpmcounter30", Any)),
        (0xc1f, ro("hpmcounter31", Any)),
        (0xc80, ro("cycleh", Any)),
        (0xc82, ro("instreth", Any)),
        (0xc83, ro("hpmcounterh3", Any)),
        (0xc84, ro("hpmcounterh4", Any)),
        (0xc85, ro("hpmcounterh5", Any)),
        (0xc86, ro("hpmcounterh6", Any)),
        (0xc87, ro("hpmcounterh7", Any)),
        (0xc88, ro("hpmcounterh8", Any)),
        (0xc89, ro("hpmcounterh9", Any)),
        (0xc8a, ro("hpmcounterh10", Any)),
        (0xc8b, ro("hpmcounterh11", Any)),
        (0xc8c, ro("hpmcounterh12", Any)),
        (0xc8d, ro("hpmcounterh13", Any)),
        (0xc8e, ro("hpmcounterh14", Any)),
        (0xc8f, ro("hpmcounterh15", Any)),
        (0xc90, ro("hpmcounterh16", Any)),
        (0xc91, ro("hpmcounterh17", Any)),
        (0xc92, ro("hpmcounterh18", Any)),
        (0xc93, ro("hpmcounterh19", Any)),
        (0xc94, ro("hpmcounterh20", Any)),
        (0xc95, ro("hpmcounterh21", Any)),
        (0xc96, ro("hpmcounterh22", Any)),
        (0xc97, ro("hpmcounterh23", Any)),
        (0xc98, ro("hpmcounterh24", Any)),
        (0xc99, ro("hpmcounterh25", Any)),
        (0xc9a, ro("hpmcounterh26", Any)),
        (0xc9b, ro("hpmcounterh27", Any)),
        (0xc9c, ro("hpmcounterh28", Any)),
        (0xc9d, ro("hpmcounterh29", Any)),
        (0xc9e, ro("hpmcounterh30", Any)),
        (0xc9f, ro("hpmcounterh31", Any)),
        // Custom user CSRs
        (0x800, rw("lpstart0", Hwlp)),
        (0x801, rw("lpend0", Hwlp)),
        (0x802, rw("lpcount0", Hwlp)),
        (0x804, rw("lpstart1", Hwlp)),
        (0x805, rw("lpend1", Hwlp)),
        (0x806, rw("lpcount1", Hwlp)),
        (0xcc0, ro("uhartid", Any)),
        (0xcc1, ro("privlv", Any)),
        // Standard machine CSRs
        (0x300, rw("mstatus", Any)),
        (0x301, rw("misa", Any)),
        (0x304, rw("mie", Any)),
        (0x305, rw("mtvec", Any)),
        (0x320, rw("mcountinhibit", Any)),
        (0x323, rw("mhpmevent3", Any)),
        (0x324, rw("mhpmevent4", Any)),
        (0x325, rw("mhpmevent5", Any)),
        (0x326, rw("mhpmevent6", Any)),
        (0x327, rw("mhpmevent7", Any)),
        (0x328, rw("mhpmevent8", Any)),
        (0x329, rw("mhpmevent9", Any)),
        (0x32a, rw("mhpmevent10", Any)),
        (0x32b, rw("mhpmevent11", Any)),
        (0x32c, rw("mhpmevent12", Any)),
        (0x32d, rw("mhpmevent13", Any)),
        (0x32e, rw("mhpmevent14", Any)),
        (0x32f, rw("mhpmevent15", Any)),
        (0x330, rw("mhpmevent16", Any)),
        (0x331, rw("mhpmevent17", Any)),
        (0x332, rw("mhpmevent18", Any)),
        (0x333, rw("mhpmevent19", Any)),
        (0x334, rw("mhpmevent20", Any)),
        (0x335, rw("mhpmevent21", Any)),
        (0x336, rw("mhpmevent22", Any)),
        (0x337, rw("mhpmevent23", Any)),
        (0x338, rw("mhpmevent24", Any)),
        (0x339, rw("mhpmevent25", Any)),
        (0x33a, rw("mhpmevent26", Any)),
        (0x33b, rw("mhpmevent27", Any)),
        (0x33c, rw("mhpmevent28", Any)),
        (0x33d, rw("mhpmevent29", Any)),
        (0x33e, rw("mhpmevent30", Any)),
        (0x33f, rw("mhpmevent31", Any)),
        (0x340, rw("mscratch", Any)),
        (0x341, rw("mepc", Any)),
        (0x342, rw("mcause", Any)),
        (0x343, rw("mtval", Any)),
        (0x344, rw("mip", Any)),
        (0x7a0, rw("tselect", Any)),
        (0x7a1, rw("tdata1", Any)),
        (0x7a2, rw("tdata2", Any)),
        (0x7a3, rw("tdata3", Any)),
        (0x7a4, ro("tinfo", Any)),
        (0x7a8, rw("mcontext", Any)),
        (0x7aa, rw("scontext", Any)),
        (0x7b0, rw("dcsr", Any)),
        (0x7b1, rw("dpc", Any)),
        (0x7b2, rw("dscratch0", Any)),
        (0x7b3, rw("dscratch1", Any)),
        (0xb00, rw("mcycle", Any)),
        (0xb02, rw("minstret", Any)),
        (0xb03, rw("mhpmcounter3", Any)),
        (0xb04, rw("mhpmcounter4", Any)),
        (0xb05, rw("mhpmcounter5", Any)),
        (0xb06, rw("mhpmcounter6", Any)),
        (0xb07, rw("mhpmcounter7", Any)),
        (0xb08, rw("mhpmcounter8", Any)),
        (0xb09, rw("mhpmcounter9", Any)),
        (0xb0a, rw("mhpmcounter10", Any)),
        (0xb0b, rw("mhpmcounter11", Any)),
        (0xb0c, rw("mhpmcounter12", Any)),
        (0xb0d, rw("mhpmcounter13", Any)),
        (0xb0e, rw("mhpmcounter14", Any)),
        (0xb0f, rw("mhpmcounter15", Any)),
        (0xb10, rw("mhpmcounter16", Any)),
        (0xb11, rw("mhpmcounter17", Any)),
        (0xb12, rw("mhpmcounter18", Any)),
        (0xb13, rw("mhpmcounter19", Any)),
        (0xb14, rw("mhpmcounter20", Any)),
        (0xb15, rw("mhpmcounter21", Any)),
        (0xb16, rw("mhpmcounter22", Any)),
        (0xb17, rw("mhpmcounter23", Any)),
        (0xb18, rw("mhpmcounter24", Any)),
        (0xb19, rw("mhpmcounter25", Any)),
        (0xb1a, rw("mhpmcounter26", Any)),
        (0xb1b, rw("mhpmcounter27", Any)),
        (0xb1c, rw("mhpmcounter28", Any)),
        (0xb1d, rw("mhpmcounter29", Any)),
        (0xb1e, rw("mhpmcounter30", Any)),
        (0xb1f, rw("mhpmcounter31", Any)),
        (0xb80, rw("mcycleh", Any)),
        (0xb82, rw("minstreth", Any)),
        (0xb83, rw("mhpmcounterh3", Any)),
        (0xb84, rw("mhpmcounterh4", Any)),
        (0xb85, rw("mhpmcounterh5", Any)),
        (0xb86, rw("mhpmcounterh6", Any)),
        (0xb87, rw("mhpmcounterh7", Any)),
        (0xb88, rw("mhpmcounterh8", Any)),
        (0xb89, rw("mhpmcounterh9", Any)),
        (0xb8a, rw("mhpmcounterh10", Any)),
        (0xb8b, rw("mhpmcounterh11", Any)),
        (0xb8c, rw("mhpmcounterh12", Any)),
        (0xb8d, rw("mhpmcounterh13", Any)),
        (0xb8e, rw("mhpmcounterh14", Any)),
        (0xb8f, rw("mhpmcounterh15", Any)),
        (0xb90, rw("mhpmcounterh16", Any)),
        (0xb91, rw("mhpmcounterh17", Any)),
        (0xb92, rw("mhpmcounterh18", Any)),
        (0xb93, rw("mhpmcounterh19", Any)),
        (0xb94, rw("mhpmcounterh20", Any)),
        (0xb95, rw("mhpmcounterh21", Any)),
        (0xb96, rw("mhpmcounterh22", Any)),
        (0xb97, rw("mhpmcounterh23", Any)),
        (0xb98, rw("mhpmcounterh24", Any)),
        (0xb99, rw("mhpmcounterh25", Any)),
        (0xb9a, rw("mhpmcounterh26", Any)),
        (0xb9b, rw("mhpmcounterh27", Any)),
        (0xb9c, rw("mhpmcounterh28", Any)),
        (0xb9d, rw("mhpmcounterh29", Any)),
        (0xb9e, rw("mhpmcounterh30", Any)),
        (0xb9f, rw("mhpmcounterh31", Any)),
        (0xf11, ro("mvendorid", Any)),
        (0xf12, ro("marchid", Any)),
        (0xf13, ro("mimpid", Any)),
        (0xf14, ro("mhartid", Any)),
    ]
};

/// The directory, keyed by CSR address. Built once, on first use.
static DIRECTORY: LazyLock<HashMap<u16, CsrInfo>> =
    LazyLock::new(|| CSR_TABLE.iter().copied().collect());

/// Look up a CSR by address.
pub fn lookup(addr: u16) -> Option<&'static CsrInfo> {
    DIRECTORY.get(&addr)
}

/// The name of a CSR, if it is implemented.
pub fn name(addr: u16) -> Option<&'static str> {
    lookup(addr).map(|info| info.name)
}

/// Whether a CSR is read only. Unimplemented CSRs report read only.
pub fn is_read_only(addr: u16) -> bool {
    lookup(addr).map_or(true, |info| info.read_only)
}

/// The configuration class of a CSR, if it is implemented.
pub fn class(addr: u16) -> Option<CsrClass> {
    lookup(addr).map(|info| info.class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keys_are_unique() {
        assert_eq!(DIRECTORY.len(), CSR_TABLE.len());
    }

    #[test]
    fn known_registers_resolve() {
        assert_eq!(name(DPC), Some("dpc"));
        assert_eq!(name(DCSR), Some("dcsr"));
        assert_eq!(name(MCYCLE), Some("mcycle"));
        assert_eq!(class(FFLAGS), Some(CsrClass::Fp));
        assert_eq!(class(0x800), Some(CsrClass::Hwlp));
        assert!(is_read_only(0xc00));
        assert!(!is_read_only(0x300));
    }

    #[test]
    fn unknown_registers_are_absent_and_read_only() {
        assert_eq!(name(0x123), None);
        assert_eq!(class(0xfff), None);
        assert!(is_read_only(0x123));
    }
}
