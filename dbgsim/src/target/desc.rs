//! GDB target description for the RV32 core.
//!
//! The description is assembled into a string once and cached by the
//! target. It exposes three features: the integer registers with the PC,
//! the single-precision floating point registers, and every CSR whose name
//! the directory knows.

use std::fmt::Write;

use super::{REG_CSR0, REG_FT0, REG_PC};
use crate::dmi::csr;

/// ABI names and GDB types of the integer registers, in register order.
const GPR_DESC: [(&str, &str); 32] = [
    ("zero", "int"),
    ("ra", "code_ptr"),
    ("sp", "data_ptr"),
    ("gp", "data_ptr"),
    ("tp", "data_ptr"),
    ("t0", "int"),
    ("t1", "int"),
    ("t2", "int"),
    ("fp", "data_ptr"),
    ("s1", "int"),
    ("a0", "int"),
    ("a1", "int"),
    ("a2", "int"),
    ("a3", "int"),
    ("a4", "int"),
    ("a5", "int"),
    ("a6", "int"),
    ("a7", "int"),
    ("s2", "int"),
    ("s3", "int"),
    ("s4", "int"),
    ("s5", "int"),
    ("s6", "int"),
    ("s7", "int"),
    ("s8", "int"),
    ("s9", "int"),
    ("s10", "int"),
    ("s11", "int"),
    ("t3", "int"),
    ("t4", "int"),
    ("t5", "int"),
    ("t6", "int"),
];

/// ABI names of the floating point registers, in register order.
const FPR_NAMES: [&str; 32] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

/// Assemble the target description XML.
pub(crate) fn build_target_xml() -> String {
    let mut xml = String::with_capacity(16 * 1024);

    xml.push_str("<?xml version=\"1.0\"?>\n");
    xml.push_str("<!DOCTYPE target SYSTEM \"gdb-target.dtd\">\n");
    xml.push_str("<target version=\"1.0\">\n");
    xml.push_str("  <architecture>riscv:rv32</architecture>\n");

    xml.push_str("  <feature name=\"org.gnu.gdb.riscv.cpu\">\n");
    for (regnum, (name, kind)) in GPR_DESC.iter().enumerate() {
        let _ = writeln!(
            xml,
            "    <reg name=\"{name}\" bitsize=\"32\" type=\"{kind}\" regnum=\"{regnum}\"/>"
        );
    }
    let _ = writeln!(
        xml,
        "    <reg name=\"pc\" bitsize=\"32\" type=\"code_ptr\" regnum=\"{REG_PC}\"/>"
    );
    xml.push_str("  </feature>\n");

    xml.push_str("  <feature name=\"org.gnu.gdb.riscv.fpu\">\n");
    for (index, name) in FPR_NAMES.iter().enumerate() {
        let _ = writeln!(
            xml,
            "    <reg name=\"{name}\" bitsize=\"32\" type=\"ieee_single\" regnum=\"{}\" \
             group=\"float\"/>",
            REG_FT0 + index
        );
    }
    xml.push_str("  </feature>\n");

    // Not every CSR address is populated; only named ones are described.
    xml.push_str("  <feature name=\"org.gnu.gdb.riscv.csr\">\n");
    for address in 0..=0xfffu16 {
        if let Some(name) = csr::name(address) {
            let _ = writeln!(
                xml,
                "    <reg name=\"{name}\" bitsize=\"32\" type=\"uint32\" save-restore=\"no\" \
                 regnum=\"{}\" group=\"csr\"/>",
                REG_CSR0 + address as usize
            );
        }
    }
    xml.push_str("  </feature>\n");

    xml.push_str("</target>\n");
    xml
}
