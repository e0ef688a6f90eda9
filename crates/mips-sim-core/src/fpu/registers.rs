use crate::{CpuState, Exception, FloatingPoint, FpFormat, SimFault, Trap};

use super::UPPER_HALF_POISON;

const LOW_WORD: u64 = 0xFFFF_FFFF;

fn register_width(fp: FloatingPoint) -> Result<u32, Trap> {
    match fp.width_bits() {
        0 => Err(Exception::new(crate::ExceptionKind::CoProcessorUnusable).into()),
        width => Ok(width),
    }
}

/// Reads floating-point register `fpr` interpreted as `fmt`.
///
/// An uninterpreted register adopts `fmt` on first access. Reading a register through a
/// format other than its tag poisons it, and a poisoned register yields the quiet NaN of
/// the requested format. [`FpFormat::Uninterpreted`] and [`FpFormat::Unknown`] requests
/// read through the register's current tag.
///
/// # Errors
///
/// - Reserved instruction when a 64-bit format names an odd register of a 32-bit FPU.
/// - Coprocessor unusable without floating-point hardware.
/// - [`SimFault::UnsupportedFormat`] when no typed interpretation applies.
pub fn value_fpr(
    cpu: &mut CpuState,
    fp: FloatingPoint,
    fpr: u8,
    fmt: FpFormat,
) -> Result<u64, Trap> {
    let width = register_width(fp)?;
    let fpr = fpr & 0x1F;
    let mut fmt = fmt;
    if matches!(fmt, FpFormat::Uninterpreted | FpFormat::Unknown) {
        fmt = cpu.fpr_state(fpr);
    }

    if cpu.fpr_state(fpr) == FpFormat::Uninterpreted {
        cpu.set_fpr_state(fpr, fmt);
    }
    if cpu.fpr_state(fpr) != fmt {
        tracing::warn!(
            fpr,
            tag = ?cpu.fpr_state(fpr),
            requested = ?fmt,
            pc = cpu.pc(),
            "FPR accessed with conflicting format, marking unknown"
        );
        cpu.set_fpr_state(fpr, FpFormat::Unknown);
    }

    if cpu.fpr_state(fpr) == FpFormat::Unknown {
        return fmt.quiet_nan().map_err(|_| {
            Trap::Fault(SimFault::UnsupportedFormat {
                operation: "value_fpr",
                format: fmt,
            })
        });
    }

    match fmt {
        FpFormat::Single | FpFormat::Word => Ok(cpu.fgr(fpr) & LOW_WORD),
        FpFormat::Uninterpreted | FpFormat::Double | FpFormat::Long if width == 64 => {
            Ok(cpu.fgr(fpr))
        }
        FpFormat::Uninterpreted | FpFormat::Double | FpFormat::Long => {
            if fpr & 1 == 0 {
                Ok((cpu.fgr(fpr + 1) << 32) | (cpu.fgr(fpr) & LOW_WORD))
            } else {
                Err(Exception::new(crate::ExceptionKind::ReservedInstruction).into())
            }
        }
        FpFormat::Unknown | FpFormat::Uninterpreted32 | FpFormat::Uninterpreted64 => {
            Err(SimFault::UnsupportedFormat {
                operation: "value_fpr",
                format: fmt,
            }
            .into())
        }
    }
}

/// Writes `value` to floating-point register `fpr` and tags it with `fmt`.
///
/// On a 64-bit FPU a 32-bit value fills the upper half with a poison pattern. On a
/// 32-bit FPU a 64-bit value occupies the even/odd register pair.
///
/// # Errors
///
/// - Reserved instruction when a 64-bit format names an odd register of a 32-bit FPU.
///   Both registers of the pair are tagged unknown first.
/// - Coprocessor unusable without floating-point hardware.
/// - [`SimFault::UnsupportedFormat`] for [`FpFormat::Unknown`].
pub fn store_fpr(
    cpu: &mut CpuState,
    fp: FloatingPoint,
    fpr: u8,
    fmt: FpFormat,
    value: u64,
) -> Result<(), Trap> {
    let width = register_width(fp)?;
    let fpr = fpr & 0x1F;
    let narrow = fmt.is_narrow();
    let tag = match fmt {
        FpFormat::Uninterpreted32 | FpFormat::Uninterpreted64 => FpFormat::Uninterpreted,
        FpFormat::Single
        | FpFormat::Word
        | FpFormat::Uninterpreted
        | FpFormat::Double
        | FpFormat::Long => fmt,
        FpFormat::Unknown => {
            cpu.set_fpr_state(fpr, FpFormat::Unknown);
            return Err(SimFault::UnsupportedFormat {
                operation: "store_fpr",
                format: fmt,
            }
            .into());
        }
    };

    if width == 64 {
        let stored = if narrow {
            UPPER_HALF_POISON | (value & LOW_WORD)
        } else {
            value
        };
        cpu.set_fgr(fpr, stored);
        cpu.set_fpr_state(fpr, tag);
    } else if narrow {
        cpu.set_fgr(fpr, value & LOW_WORD);
        cpu.set_fpr_state(fpr, tag);
    } else if fpr & 1 == 0 {
        cpu.set_fgr(fpr + 1, value >> 32);
        cpu.set_fgr(fpr, value & LOW_WORD);
        cpu.set_fpr_state(fpr + 1, tag);
        cpu.set_fpr_state(fpr, tag);
    } else {
        cpu.set_fpr_state(fpr, FpFormat::Unknown);
        if fpr < 31 {
            cpu.set_fpr_state(fpr + 1, FpFormat::Unknown);
        }
        return Err(Exception::new(crate::ExceptionKind::ReservedInstruction).into());
    }
    Ok(())
}

fn floating_point_coprocessor(cpu: &CpuState, fp: FloatingPoint, coproc: u8, op: &str) -> bool {
    if coproc == 1 && fp.width_bits() != 0 {
        return true;
    }
    tracing::warn!(coproc, pc = cpu.pc(), op, "coprocessor transfer not implemented");
    false
}

/// Loads a memory word into coprocessor register `reg`.
///
/// The register is left uninterpreted so its first typed use decides the format.
///
/// # Errors
///
/// Propagates [`store_fpr`] failures.
pub fn cop_lw(
    cpu: &mut CpuState,
    fp: FloatingPoint,
    coproc: u8,
    reg: u8,
    word: u32,
) -> Result<(), Trap> {
    if floating_point_coprocessor(cpu, fp, coproc, "lwc") {
        store_fpr(cpu, fp, reg, FpFormat::Word, u64::from(word))?;
        cpu.set_fpr_state(reg, FpFormat::Uninterpreted);
    }
    Ok(())
}

/// Loads a memory doubleword into coprocessor register `reg`.
///
/// # Errors
///
/// Propagates [`store_fpr`] failures.
pub fn cop_ld(
    cpu: &mut CpuState,
    fp: FloatingPoint,
    coproc: u8,
    reg: u8,
    dword: u64,
) -> Result<(), Trap> {
    if floating_point_coprocessor(cpu, fp, coproc, "ldc") {
        store_fpr(cpu, fp, reg, FpFormat::Uninterpreted, dword)?;
    }
    Ok(())
}

/// Returns the word held in coprocessor register `reg` for a store, without disturbing its tag.
///
/// # Errors
///
/// Propagates [`value_fpr`] failures.
pub fn cop_sw(cpu: &mut CpuState, fp: FloatingPoint, coproc: u8, reg: u8) -> Result<u32, Trap> {
    if !floating_point_coprocessor(cpu, fp, coproc, "swc") {
        return Ok(0);
    }
    let hold = cpu.fpr_state(reg);
    cpu.set_fpr_state(reg, FpFormat::Word);
    let value = value_fpr(cpu, fp, reg, FpFormat::Uninterpreted);
    cpu.set_fpr_state(reg, hold);
    Ok((value? & LOW_WORD) as u32)
}

/// Returns the doubleword held in coprocessor register `reg` for a store.
///
/// # Errors
///
/// Propagates [`value_fpr`] failures.
pub fn cop_sd(cpu: &mut CpuState, fp: FloatingPoint, coproc: u8, reg: u8) -> Result<u64, Trap> {
    if !floating_point_coprocessor(cpu, fp, coproc, "sdc") {
        return Ok(0);
    }
    value_fpr(cpu, fp, reg, FpFormat::Uninterpreted)
}
