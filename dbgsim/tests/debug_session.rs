//! End-to-end debug sessions against the behavioral testbench device.
//!
//! Every test drives the full stack: target calls become abstract commands
//! or system bus traffic, framed over the DMI, shifted bit by bit through
//! the TAP of the pin-level device model.

use dbgsim::dmi::regs::Dmstatus;
use dbgsim::sim::testbench::{TestbenchDevice, TestbenchHandle, UNMAPPED_WORD};
use dbgsim::target::{ResumeAction, ResumeOutcome, WaitResult, REG_CSR0, REG_FT0, REG_PC};
use dbgsim::{Dmi, Error, JtagDtm, Riscv32Target, Sim, Tap, Target};

const DCSR_GDBNUM: usize = REG_CSR0 + 0x7b0;
const MSCRATCH_GDBNUM: usize = REG_CSR0 + 0x340;

/// A DMI stack with the transport brought up and hart 0 halted.
fn debug_module() -> (Dmi, TestbenchHandle) {
    let device = TestbenchDevice::new();
    let handle = device.handle();
    let sim = Sim::new(Box::new(device), 10, 0, None).unwrap();
    let mut dmi = Dmi::new(JtagDtm::new(Tap::new(sim)));
    dmi.dtm_reset().unwrap();
    dmi.select_hart(0).unwrap();
    dmi.halt_hart(0).unwrap();
    (dmi, handle)
}

/// A fully attached target.
fn attach() -> (Riscv32Target, TestbenchHandle) {
    let device = TestbenchDevice::new();
    let handle = device.handle();
    let sim = Sim::new(Box::new(device), 10, 0, None).unwrap();
    let target = Riscv32Target::new(Dmi::new(JtagDtm::new(Tap::new(sim)))).unwrap();
    (target, handle)
}

#[test]
fn bring_up_halts_hart_zero() {
    let (mut target, handle) = attach();

    assert!(handle.halted(), "attach must leave the hart halted");
    assert!(target.halt(), "halting an already halted hart succeeds");
    assert_eq!(target.cpu_count(), 1);
    assert_eq!(target.register_size(), 4);
}

#[test]
fn dmstatus_reports_a_v013_debug_module() {
    let (mut dmi, _handle) = debug_module();

    let status: Dmstatus = dmi.read_reg().unwrap();
    assert_eq!(status.version(), 2);
    assert!(status.authenticated());
    assert!(status.halted());
}

#[test]
fn hartsellen_reports_a_single_hart() {
    let (mut dmi, _handle) = debug_module();

    assert_eq!(dmi.hartsellen().unwrap(), 0);
    // Probing must not clobber the selection: the hart is still reachable.
    assert!(dmi.read_gpr(5).is_ok());
}

#[test]
fn hart_and_register_array_metadata() {
    use dbgsim::dmi::regs::{Hartinfo, HALTSUM_ADDR};

    let (mut dmi, _handle) = debug_module();

    let hartinfo: Hartinfo = dmi.read_reg().unwrap();
    assert_eq!(hartinfo.nscratch(), 2);

    // Hart 0 is halted, the other haltsum registers are empty.
    assert_eq!(dmi.read_indexed(&HALTSUM_ADDR, 0).unwrap(), 1);
    assert_eq!(dmi.read_indexed(&HALTSUM_ADDR, 1).unwrap(), 0);

    // Scratch through a data register: write, read back over the DMI.
    use dbgsim::dmi::regs::DATA_ADDR;
    dmi.write_indexed(&DATA_ADDR, 1, 0x55aa_00ff).unwrap();
    assert_eq!(dmi.read_indexed(&DATA_ADDR, 1).unwrap(), 0x55aa_00ff);
}

#[test]
fn single_byte_read_at_0x100() {
    let (mut target, handle) = attach();
    handle.poke_word(0x100, 0xdead_beef);

    let mut byte = [0u8; 1];
    assert_eq!(target.read(0x100, &mut byte), 1);
    assert_eq!(byte[0], 0xef, "low byte of the word at the address");
}

#[test]
fn unmapped_reads_return_the_marker_word() {
    let (mut target, _handle) = attach();

    let mut word = [0u8; 4];
    assert_eq!(target.read(0x7fff_0000, &mut word), 4);
    assert_eq!(u32::from_le_bytes(word), UNMAPPED_WORD);
}

#[test]
fn misaligned_seven_byte_write_at_0x103() {
    let (mut target, handle) = attach();
    handle.poke_word(0x100, 0x3322_1100);
    handle.poke_word(0x104, 0x7766_5544);
    handle.poke_word(0x108, 0xbbaa_9988);

    let data = [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6];
    assert_eq!(target.write(0x103, &data), 7);

    // The written bytes land at 0x103..0x10a; the three bytes around them
    // keep their previous values.
    assert_eq!(handle.peek_word(0x100), Some(0xa022_1100));
    assert_eq!(handle.peek_word(0x104), Some(0xa4a3_a2a1));
    assert_eq!(handle.peek_word(0x108), Some(0xbbaa_a6a5));
}

#[test]
fn block_transfers_round_trip_at_every_alignment() {
    let (mut target, _handle) = attach();

    let mut base = 0x2000u32;
    for size in [1usize, 2, 3, 4, 5, 7, 8, 11, 16, 21] {
        for misalign in 0..4u32 {
            let address = base + misalign;
            let data: Vec<u8> = (0..size).map(|i| (i as u8) ^ (address as u8)).collect();

            assert_eq!(target.write(address, &data), size);
            let mut readback = vec![0u8; size];
            assert_eq!(target.read(address, &mut readback), size);
            assert_eq!(readback, data, "{size} bytes at {address:#x}");

            base += 0x40;
        }
    }
}

#[test]
fn zero_length_write_succeeds_without_touching_the_bus() {
    let (mut target, handle) = attach();

    assert_eq!(target.write(0x300, &[]), 0);
    // No word was created at the address, so nothing reached the bus.
    assert_eq!(handle.peek_word(0x300), None);

    let mut empty = [0u8; 0];
    assert_eq!(target.read(0x300, &mut empty), 0);
    assert_eq!(handle.peek_word(0x300), None);
}

#[test]
fn gpr_round_trips_honor_the_zero_register() {
    let (mut target, _handle) = attach();

    for (reg, pattern) in [(1usize, 0xcafe_0001u32), (2, 0x8000_0000), (31, 0x0000_7fff)] {
        assert_eq!(target.write_register(reg, pattern), 4);
        let mut value = 0;
        assert_eq!(target.read_register(reg, &mut value), 4);
        assert_eq!(value, pattern, "x{reg}");
    }

    // x0 accepts the write and stays zero.
    assert_eq!(target.write_register(0, 0xffff_ffff), 4);
    let mut value = 0xaaaa_aaaa;
    assert_eq!(target.read_register(0, &mut value), 4);
    assert_eq!(value, 0);
}

#[test]
fn pc_fpr_and_csr_registers_dispatch_by_number() {
    let (mut target, _handle) = attach();

    assert_eq!(target.write_register(REG_PC, 0x0000_4000), 4);
    let mut pc = 0;
    assert_eq!(target.read_register(REG_PC, &mut pc), 4);
    assert_eq!(pc, 0x0000_4000);

    assert_eq!(target.write_register(REG_FT0 + 7, 0x3f80_0000), 4);
    let mut fpr = 0;
    assert_eq!(target.read_register(REG_FT0 + 7, &mut fpr), 4);
    assert_eq!(fpr, 0x3f80_0000);

    assert_eq!(target.write_register(MSCRATCH_GDBNUM, 0x1234_5678), 4);
    let mut csr = 0;
    assert_eq!(target.read_register(MSCRATCH_GDBNUM, &mut csr), 4);
    assert_eq!(csr, 0x1234_5678);

    // Out of range register numbers transfer zero bytes.
    let mut scratch = 0;
    assert_eq!(target.read_register(REG_CSR0 + 0x1000, &mut scratch), 0);
    assert_eq!(target.write_register(REG_CSR0 + 0x1000, 0), 0);
}

#[test]
fn step_sets_and_clears_dcsr_step() {
    let (mut target, _handle) = attach();

    assert!(target.prepare(&[ResumeAction::Step]));
    assert!(target.resume());

    let mut results = Vec::new();
    assert_eq!(target.wait(&mut results), WaitResult::EventOccurred);
    assert_eq!(results, [ResumeOutcome::Interrupted]);

    let mut dcsr = 0;
    assert_eq!(target.read_register(DCSR_GDBNUM, &mut dcsr), 4);
    assert_eq!(dcsr & (1 << 2), 0, "step bit is cleared after the wait");
    assert_eq!((dcsr >> 6) & 0x7, 4, "cause reports the completed step");
    assert!(target.instr_count() > 0);
}

#[test]
fn continue_runs_to_the_breakpoint() {
    let (mut target, handle) = attach();
    handle.set_run_polls(5);

    assert!(target.prepare(&[ResumeAction::Continue]));
    assert!(target.resume());
    assert!(!handle.halted(), "the hart is running after resume");

    let mut results = Vec::new();
    assert_eq!(target.wait(&mut results), WaitResult::EventOccurred);
    assert_eq!(results, [ResumeOutcome::Interrupted]);

    let mut dcsr = 0;
    assert_eq!(target.read_register(DCSR_GDBNUM, &mut dcsr), 4);
    assert_eq!(dcsr & 0xb000, 0, "ebreak bits are cleared after the wait");
    assert_eq!((dcsr >> 6) & 0x7, 1, "cause reports the ebreak");
}

#[test]
fn continue_halted_by_request_reports_failure() {
    let (mut target, _handle) = attach();

    assert!(target.prepare(&[ResumeAction::Continue]));
    assert!(target.resume());

    // An external halt beats the breakpoint; the wait must notice that the
    // stop was not an ebreak.
    assert!(target.halt());
    let mut results = Vec::new();
    assert_eq!(target.wait(&mut results), WaitResult::EventOccurred);
    assert_eq!(results, [ResumeOutcome::Failure]);
}

#[test]
fn prepare_rejects_bad_action_lists() {
    let (mut target, _handle) = attach();

    assert!(!target.prepare(&[]));
    assert!(!target.prepare(&[ResumeAction::Step, ResumeAction::Step]));
    assert!(!target.prepare(&[ResumeAction::None]));
    // A rejected None still parks the state machine: resume refuses.
    assert!(!target.resume());
}

#[test]
fn dmi_retry_is_cleared_and_resubmitted() {
    let (mut dmi, handle) = debug_module();

    let resets_before = handle.dmireset_count();
    handle.inject_dmi_retries(1);

    // The read still succeeds, after one dmireset and a resubmission.
    let status: Dmstatus = dmi.read_reg().unwrap();
    assert!(status.halted());
    assert_eq!(handle.dmireset_count(), resets_before + 1);
}

#[test]
fn busy_abstract_command_triggers_one_recovery_sequence() {
    let (mut dmi, handle) = debug_module();

    handle.inject_cmderr_busy(1);
    let result = dmi.read_csr(0x340);
    match result {
        Err(Error::AbstractCommand(err)) => assert_eq!(format!("{err}"), "busy"),
        other => panic!("expected a busy error, got {other:?}"),
    }
    assert_eq!(handle.ndmreset_pulses(), 1, "exactly one ndmreset pulse");

    // The recovery brought the debug unit back: the next access works.
    dmi.write_csr(0x340, 0x5a5a_5a5a).unwrap();
    assert_eq!(dmi.read_csr(0x340).unwrap(), 0x5a5a_5a5a);
}

#[test]
fn write_to_a_read_only_csr_reports_an_error() {
    let (mut dmi, _handle) = debug_module();

    // mhartid is read only; the command traps and the error is cleared.
    assert!(dmi.write_csr(0xf14, 1).is_err());
    // The sticky error was cleared: follow-up accesses work again.
    assert!(dmi.read_csr(0x340).is_ok());
}

#[test]
fn register_access_requires_a_halted_hart() {
    let (mut target, handle) = attach();
    handle.set_run_polls(u32::MAX >> 1);

    assert!(target.prepare(&[ResumeAction::Continue]));
    assert!(target.resume());

    // The hart is running, so the abstract command fails and the register
    // read reports zero bytes.
    let mut value = 0;
    assert_eq!(target.read_register(1, &mut value), 0);

    assert!(target.halt());
    assert_eq!(target.read_register(1, &mut value), 4);
}

#[test]
fn target_xml_is_complete_and_cached() {
    let (mut target, _handle) = attach();

    assert!(target.supports_target_xml());

    let first = target.target_xml("target.xml").unwrap().to_owned();
    assert!(first.starts_with("<?xml version=\"1.0\"?>"));
    assert!(first.contains("<architecture>riscv:rv32</architecture>"));

    // 32 GPRs and the PC in the cpu feature, 32 FPRs in the fpu feature.
    let gprs = first
        .lines()
        .filter(|line| line.contains("type=\"int\"") || line.contains("type=\"code_ptr\"") || line.contains("type=\"data_ptr\""))
        .count();
    assert_eq!(gprs, 33);
    assert_eq!(first.matches("type=\"ieee_single\"").count(), 32);
    assert!(first.matches("group=\"csr\"").count() > 100);

    let second = target.target_xml("target.xml").unwrap();
    assert_eq!(second, first, "the description is cached");
}

#[test]
fn reset_tears_down_the_debug_interface() {
    let (mut target, _handle) = attach();

    assert_eq!(
        target.reset(dbgsim::target::ResetKind::Warm),
        ResumeOutcome::Success
    );

    // Every later operation reports failure through its return value.
    let mut value = 0;
    assert_eq!(target.read_register(1, &mut value), 0);
    assert_eq!(target.write(0x100, &[1, 2, 3]), 0);
    assert!(!target.halt());
    assert_eq!(target.terminate(), ResumeOutcome::None);
}

#[test]
fn exhausted_sim_budget_surfaces_as_simulation_ended() {
    // 150ns covers the reset window but not the IDCODE scan.
    let device = TestbenchDevice::new();
    let sim = Sim::new(Box::new(device), 10, 150, None).unwrap();
    let result = Riscv32Target::new(Dmi::new(JtagDtm::new(Tap::new(sim))));

    assert!(matches!(result, Err(Error::SimulationEnded)));
}

#[test]
fn matchpoints_and_commands_are_not_supported() {
    let (mut target, _handle) = attach();

    use dbgsim::target::MatchType;
    assert!(!target.insert_matchpoint(0x100, MatchType::BreakSw));
    assert!(!target.remove_matchpoint(0x100, MatchType::BreakHw));

    let mut sink = Vec::new();
    assert!(!target.command("reset halt", &mut sink));
    assert!(sink.is_empty());

    let layout = target.syscall_arg_locs().unwrap();
    assert_eq!(layout.id, dbgsim::target::ArgLoc::Register(1));
    assert_eq!(layout.args.len(), 3);
    assert_eq!(layout.ret, dbgsim::target::ArgLoc::Register(5));
}
