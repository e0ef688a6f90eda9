//! Execution loop scenarios driven by a small test instruction set.
//!
//! The semantics below understand just enough encodings to exercise the loop:
//! `BEQ zero, zero` as an unconditional branch, `ADDIU`, `SW`, `BREAK`, `SYSCALL` and
//! coprocessor instructions. Everything else is a reserved instruction.

#![allow(clippy::pedantic, clippy::nursery)]

use mips_sim_core::monitor::{HALT_INSTRUCTION, HALT_STUB_STATUS};
use mips_sim_core::state::{CAUSE_BD, REG_A0, REG_RA, SR_CU2, SR_IE};
use mips_sim_core::{
    AccessWidth, BufferedHost, CpuVariant, Exception, ExceptionClass, ExceptionKind, Instruction,
    RunBoundary, SimConfig, SimFault, Simulator, StepOutcome, StopReason, Trap,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const ENTRY: u64 = 0xFFFF_FFFF_8002_0000;
const NOP: u32 = 0;
const SYSCALL: u32 = 0x0000_000C;

const fn branch(offset: u16) -> u32 {
    0x1000_0000 | offset as u32
}

const fn addiu(rt: u32, rs: u32, imm: u16) -> u32 {
    (9 << 26) | (rs << 21) | (rt << 16) | imm as u32
}

const fn sw(rt: u32, base: u32, imm: u16) -> u32 {
    (0x2B << 26) | (base << 21) | (rt << 16) | imm as u32
}

fn semantics(sim: &mut Simulator, insn: Instruction) -> Result<u32, Trap> {
    let word = insn.word;
    let rs = ((word >> 21) & 0x1F) as u8;
    let rt = ((word >> 16) & 0x1F) as u8;
    let imm = word as u16 as i16 as i64 as u64;
    match word >> 26 {
        0 if word == NOP => Ok(1),
        0 if word == SYSCALL => Err(ExceptionKind::SystemCall.into()),
        0 if word == HALT_INSTRUCTION => {
            let status = sim.cpu.gpr(REG_A0) as u32;
            Err(Trap::Halt(StopReason::Exited(status)))
        }
        4 if rs == 0 && rt == 0 => {
            let target = insn.cia.wrapping_add(4).wrapping_add(imm << 2);
            sim.cpu.delay_slot(target);
            Ok(1)
        }
        9 => {
            let value = sim.cpu.gpr(rs).wrapping_add(imm);
            sim.cpu.set_gpr(rt, value as u32 as i32 as i64 as u64);
            Ok(1)
        }
        0x2B => {
            let addr = sim.cpu.gpr(rs).wrapping_add(imm);
            sim.store(addr, AccessWidth::Word, sim.cpu.gpr(rt))?;
            Ok(1)
        }
        0x10..=0x13 => {
            sim.decode_coproc(insn.cia, word)?;
            Ok(1)
        }
        _ => Err(Exception::reserved_instruction(word).into()),
    }
}

fn load(words: &[u32]) -> Simulator {
    load_with(SimConfig::default(), words)
}

fn load_with(config: SimConfig, words: &[u32]) -> Simulator {
    let mut sim = Simulator::new(config);
    let image: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    assert_eq!(sim.write_memory(ENTRY, &image), image.len());
    sim.create_inferior(ENTRY);
    sim.cpu.set_sr(0);
    sim
}

proptest! {
    #[test]
    fn register_zero_reads_zero_after_any_write(imm in any::<u16>(), rs in 0u32..32) {
        let mut sim = load(&[addiu(0, rs, imm)]);
        let mut host = BufferedHost::new();
        sim.step(&mut semantics, &mut host);
        prop_assert_eq!(sim.cpu.gpr(0), 0);
    }

    #[test]
    fn delay_slot_commits_after_exactly_one_instruction(skip in 1u16..8) {
        let mut words = vec![branch(skip), addiu(8, 8, 1)];
        words.extend(std::iter::repeat(addiu(9, 9, 1)).take(usize::from(skip) + 2));
        let mut sim = load(&words);
        let mut host = BufferedHost::new();

        sim.step(&mut semantics, &mut host);
        prop_assert_eq!(sim.cpu.pc(), ENTRY + 4);
        sim.step(&mut semantics, &mut host);
        prop_assert_eq!(sim.cpu.gpr(8), 1);
        prop_assert_eq!(sim.cpu.pc(), ENTRY + 4 + u64::from(skip) * 4);
        prop_assert_eq!(sim.cpu.gpr(9), 0);
        sim.step(&mut semantics, &mut host);
        prop_assert_eq!(sim.cpu.gpr(8), 1);
        prop_assert_eq!(sim.cpu.gpr(9), 1);
    }
}

#[test]
fn unmapped_fetch_halts_without_executing() {
    let mut sim = load(&[]);
    let mut host = BufferedHost::new();
    let pc = 0xFFFF_FFFF_9F00_0000;
    sim.cpu.set_pc(pc);
    let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Halt);
    assert_eq!(
        outcome.stop,
        Some(StopReason::Faulted(SimFault::UnmappedFetch { pc }))
    );
    assert_eq!(outcome.steps, 1);
    assert_eq!(sim.stats().instructions(), 0);
}

#[test]
fn fault_in_a_delay_slot_reports_the_branch() {
    let mut sim = load(&[branch(4), sw(0, 0, 1)]);
    let mut host = BufferedHost::new();
    let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Halt);
    assert_eq!(outcome.stop, Some(StopReason::Signalled(mips_sim_core::Signal::Bus)));
    assert_eq!(sim.cpu.epc(), ENTRY);
    assert_ne!(sim.cpu.cause() & CAUSE_BD, 0);
    assert_eq!(sim.cpu.pc(), ENTRY);
    assert_eq!(sim.stats().exceptions(ExceptionClass::Memory), 1);
}

#[test]
fn unhandled_exceptions_run_the_monitor_halt_stub() {
    let mut sim = load(&[SYSCALL]);
    let mut host = BufferedHost::new();
    let words = [HALT_STUB_STATUS, HALT_INSTRUCTION];
    for (i, word) in words.iter().enumerate() {
        let addr = 0xFFFF_FFFF_8000_0180 + 4 * i as u64;
        assert_eq!(
            sim.memory.load(addr, AccessWidth::Word),
            Ok(u64::from(*word))
        );
    }
    let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Halt);
    assert_eq!(outcome.stop, Some(StopReason::Exited(47)));
    assert_eq!(outcome.steps, 3);
}

#[test]
fn monitor_write_through_the_loop() {
    let mut sim = load(&[]);
    let mut host = BufferedHost::new();
    sim.write_memory(0x8000_4000, b"hello");
    sim.cpu.set_gpr(REG_A0, 1);
    sim.cpu.set_gpr(5, 0x8000_4000);
    sim.cpu.set_gpr(6, 5);
    sim.cpu.set_gpr(REG_RA, ENTRY);
    // The write service sits in ROM slot 16.
    sim.cpu.set_pc(0xFFFF_FFFF_BFC0_0040);
    assert_eq!(sim.step(&mut semantics, &mut host), StepOutcome::Restarted);
    assert_eq!(host.stdout(), b"hello");
    assert_eq!(sim.cpu.gpr(2), 5);
    assert_eq!(sim.cpu.pc(), ENTRY);
}

#[test]
fn compressed_entry_builds_a_frame_through_the_loop() {
    let mut sim = load(&[0xE869_0000]);
    let mut host = BufferedHost::new();
    let sp = 0xFFFF_FFFF_8000_8000;
    sim.cpu.set_gpr(29, sp);
    sim.cpu.set_gpr(16, 0x77);
    sim.cpu.set_gpr(REG_RA, 0x8000_0100);
    sim.cpu.set_pc(ENTRY + 1);
    assert_eq!(sim.step(&mut semantics, &mut host), StepOutcome::Restarted);
    assert_eq!(sim.cpu.gpr(29), sp - 32);
    let mut frame = [0u8; 8];
    assert_eq!(sim.read_memory(sp - 8, &mut frame), 8);
    assert_eq!(frame, [0, 0, 0, 0x77, 0x80, 0, 1, 0]);
}

#[rstest]
#[case(CpuVariant::Generic, 0x4400_0000, ExceptionKind::ReservedInstruction)]
#[case(CpuVariant::R5900, 0x4A00_0000, ExceptionKind::CoProcessorUnusable)]
#[case(CpuVariant::Generic, 0x4C00_0000, ExceptionKind::ReservedInstruction)]
fn coprocessor_faults_halt_as_illegal_instructions(
    #[case] variant: CpuVariant,
    #[case] word: u32,
    #[case] kind: ExceptionKind,
) {
    let mut sim = load_with(
        SimConfig {
            variant,
            ..SimConfig::default()
        },
        &[word],
    );
    let mut host = BufferedHost::new();
    let outcome = sim.step(&mut semantics, &mut host);
    assert_eq!(
        outcome,
        StepOutcome::Halted(StopReason::Signalled(mips_sim_core::Signal::Illegal))
    );
    assert_eq!(sim.cpu.cause_code(), kind.as_u8());
}

#[test]
fn vector_macro_instructions_reach_the_micro_engine() {
    // VADD.xyzw vf2, vf2, vf3
    let mut sim = load_with(
        SimConfig {
            variant: CpuVariant::R5900,
            ..SimConfig::default()
        },
        &[0x4BE3_10A8, NOP],
    );
    let mut host = BufferedHost::new();
    sim.cpu.set_sr(SR_CU2);
    assert_eq!(
        sim.step(&mut semantics, &mut host),
        StepOutcome::Retired { cycles: 1 }
    );
    assert_eq!(sim.stats().exceptions(ExceptionClass::Instruction), 0);
}

#[test]
fn interrupts_wake_a_parked_processor() {
    let mut sim = load(&[NOP, NOP]);
    let mut host = BufferedHost::new();
    sim.cpu.set_sr(SR_IE);
    sim.cpu.flags.halted_in = true;
    sim.schedule_interrupt(3);
    let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Steps(3));
    assert_eq!(outcome.stop, None);
    assert!(!sim.cpu.flags.is_parked());
    assert_eq!(sim.cpu.cause_code(), 0);
    assert_eq!(sim.stats().exceptions(ExceptionClass::Asynchronous), 1);
}
