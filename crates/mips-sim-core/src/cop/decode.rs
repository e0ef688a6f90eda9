//! Field extraction and pattern-matched decode of coprocessor instructions.

/// Coprocessor number addressed by a `COPz` instruction.
#[must_use]
pub const fn coprocessor_number(insn: u32) -> u8 {
    ((insn >> 26) & 3) as u8
}

const fn field(insn: u32, shift: u32, mask: u32) -> u32 {
    (insn >> shift) & mask
}

/// Decoded coprocessor-0 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cop0Instruction {
    /// `MFC0 rt, rd`.
    MoveFrom {
        /// Destination GPR.
        rt: u8,
        /// Source COP0 register.
        rd: u8,
    },
    /// `MTC0 rt, rd`.
    MoveTo {
        /// Source GPR.
        rt: u8,
        /// Destination COP0 register.
        rd: u8,
    },
    /// Exception return.
    Eret,
    /// R3000-style restore from exception.
    Rfe,
    /// Debug exception return.
    Deret,
    /// Any other COP0 encoding.
    Unrecognised,
}

/// Decodes a coprocessor-0 instruction word.
#[must_use]
pub const fn decode_cop0(insn: u32) -> Cop0Instruction {
    let code = field(insn, 21, 0x1F);
    let rt = field(insn, 16, 0x1F) as u8;
    let rd = field(insn, 11, 0x1F) as u8;
    match (code, insn & 0x7FF, insn & 0x3F) {
        (0x00, 0, _) => Cop0Instruction::MoveFrom { rt, rd },
        (0x04, 0, _) => Cop0Instruction::MoveTo { rt, rd },
        (0x10, _, 0x18) => Cop0Instruction::Eret,
        (0x10, _, 0x10) => Cop0Instruction::Rfe,
        (0x10, _, 0x1F) => Cop0Instruction::Deret,
        _ => Cop0Instruction::Unrecognised,
    }
}

/// Register operands of a COP2 move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cop2Move {
    /// General-purpose register.
    pub rt: u8,
    /// Vector-unit register or control register number.
    pub id: u8,
    /// Waits for the micro-engine before transferring.
    pub interlock: bool,
}

/// Decoded coprocessor-2 (vector unit) instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cop2Instruction {
    /// `BC2F`/`BC2FL`/`BC2T`/`BC2TL`.
    Branch {
        /// Taken when the unit is busy (`BC2T*`) rather than idle (`BC2F*`).
        on_busy: bool,
        /// Branch-likely form: nullifies the delay slot when not taken.
        likely: bool,
        /// Sign-extended byte offset from the delay-slot address.
        offset: u64,
    },
    /// `CFC2`: control register to GPR.
    ControlFrom(Cop2Move),
    /// `QMFC2`: 128-bit vector register to GPR pair.
    QuadFrom(Cop2Move),
    /// `CTC2`: GPR to control register.
    ControlTo(Cop2Move),
    /// `QMTC2`: GPR pair to 128-bit vector register.
    QuadTo(Cop2Move),
    /// `VWAITQ`: wait for the `Q` result.
    WaitQ,
    /// `VCALLMS`: start the micro-program at an immediate address.
    CallMicroprogram {
        /// Micro-program start address.
        address: u32,
    },
    /// `VCALLMSR`: start the micro-program at `CMSAR0`.
    CallMicroprogramRegister,
    /// Upper-pipeline macro-instruction with a lower `NOP`.
    UpperMacro {
        /// Upper micro-instruction.
        upper: u32,
        /// Lower micro-instruction.
        lower: u32,
    },
    /// Lower-pipeline macro-instruction with an upper `NOP`.
    LowerMacro {
        /// Upper micro-instruction.
        upper: u32,
        /// Lower micro-instruction.
        lower: u32,
    },
    /// No COP2 instruction has this encoding.
    Reserved,
}

/// Lower micro-instruction `NOP`.
pub const VU_LOWER_NOP: u32 = 0x8000_033C;
/// Upper micro-instruction `NOP`.
pub const VU_UPPER_NOP: u32 = 0x0000_02FF;

/// Decodes a coprocessor-2 instruction word.
#[must_use]
pub const fn decode_cop2(insn: u32) -> Cop2Instruction {
    let i_25_21 = field(insn, 21, 0x1F);
    let i_20_16 = field(insn, 16, 0x1F);
    let i_20_6 = field(insn, 6, 0x7FFF);
    let i_15_11 = field(insn, 11, 0x1F);
    let i_10_1 = field(insn, 1, 0x3FF);
    let i_10_0 = insn & 0x7FF;
    let i_10_6 = field(insn, 6, 0x1F);
    let i_5_0 = insn & 0x3F;
    let operands = Cop2Move {
        rt: i_20_16 as u8,
        id: i_15_11 as u8,
        interlock: insn & 1 != 0,
    };

    if i_25_21 == 0x08 && i_20_16 <= 0x03 {
        return Cop2Instruction::Branch {
            on_busy: i_20_16 & 1 != 0,
            likely: i_20_16 & 2 != 0,
            offset: ((insn & 0xFFFF) as u16 as i16 as i64 as u64) << 2,
        };
    }
    if (i_25_21 == 0x02 && i_10_1 == 0) || i_25_21 == 0x01 {
        return if i_25_21 == 0x01 {
            Cop2Instruction::QuadFrom(operands)
        } else {
            Cop2Instruction::ControlFrom(operands)
        };
    }
    if (i_25_21 == 0x06 && i_10_1 == 0) || i_25_21 == 0x05 {
        return if i_25_21 == 0x05 {
            Cop2Instruction::QuadTo(operands)
        } else {
            Cop2Instruction::ControlTo(operands)
        };
    }
    if i_10_0 == 0x3BF {
        return Cop2Instruction::WaitQ;
    }
    if i_5_0 == 0x38 {
        return Cop2Instruction::CallMicroprogram { address: i_20_6 };
    }
    if i_5_0 == 0x39 {
        return Cop2Instruction::CallMicroprogramRegister;
    }
    if i_5_0 < 0x30 || (i_5_0 >= 0x3C && i_10_6 < 0x0C) {
        return Cop2Instruction::UpperMacro {
            upper: insn & 0x01FF_FFFF,
            lower: VU_LOWER_NOP,
        };
    }
    if (i_5_0 >= 0x30 && i_5_0 <= 0x35) || (i_5_0 >= 0x3C && i_10_6 >= 0x0C) {
        return Cop2Instruction::LowerMacro {
            upper: VU_UPPER_NOP,
            lower: 0x8000_0000 | (insn & 0x01FF_FFFF),
        };
    }
    Cop2Instruction::Reserved
}

#[cfg(test)]
mod tests {
    use super::{
        coprocessor_number, decode_cop0, decode_cop2, Cop0Instruction, Cop2Instruction, Cop2Move,
        VU_LOWER_NOP, VU_UPPER_NOP,
    };
    use rstest::rstest;

    #[rstest]
    #[case(0x4008_6000, Cop0Instruction::MoveFrom { rt: 8, rd: 12 })]
    #[case(0x4089_6800, Cop0Instruction::MoveTo { rt: 9, rd: 13 })]
    #[case(0x4200_0018, Cop0Instruction::Eret)]
    #[case(0x4200_0010, Cop0Instruction::Rfe)]
    #[case(0x4200_001F, Cop0Instruction::Deret)]
    #[case(0x4008_6001, Cop0Instruction::Unrecognised)]
    #[case(0x4200_0001, Cop0Instruction::Unrecognised)]
    fn cop0_patterns(#[case] insn: u32, #[case] expected: Cop0Instruction) {
        assert_eq!(decode_cop0(insn), expected);
    }

    #[test]
    fn coprocessor_number_comes_from_opcode_low_bits() {
        assert_eq!(coprocessor_number(0x4200_0018), 0);
        assert_eq!(coprocessor_number(0x4800_0000), 2);
        assert_eq!(coprocessor_number(0x4C00_0000), 3);
    }

    #[test]
    fn cop2_branches_decode_sense_and_likely() {
        assert_eq!(
            decode_cop2(0x4903_FFFF),
            Cop2Instruction::Branch {
                on_busy: true,
                likely: true,
                offset: (-4i64) as u64
            }
        );
        assert_eq!(
            decode_cop2(0x4900_0010),
            Cop2Instruction::Branch {
                on_busy: false,
                likely: false,
                offset: 0x40
            }
        );
    }

    #[test]
    fn cop2_moves_carry_interlock_bit() {
        assert_eq!(
            decode_cop2(0x4845_D801),
            Cop2Instruction::ControlFrom(Cop2Move {
                rt: 5,
                id: 27,
                interlock: true
            })
        );
        assert_eq!(
            decode_cop2(0x4826_2000),
            Cop2Instruction::QuadFrom(Cop2Move {
                rt: 6,
                id: 4,
                interlock: false
            })
        );
        assert!(matches!(decode_cop2(0x48C5_D800), Cop2Instruction::ControlTo(_)));
        assert!(matches!(decode_cop2(0x48A6_2000), Cop2Instruction::QuadTo(_)));
    }

    #[test]
    fn cop2_microprogram_calls_and_waits() {
        assert_eq!(decode_cop2(0x4A00_03BF), Cop2Instruction::WaitQ);
        assert_eq!(
            decode_cop2(0x4A00_0438),
            Cop2Instruction::CallMicroprogram { address: 0x10 }
        );
        assert_eq!(
            decode_cop2(0x4A00_0039),
            Cop2Instruction::CallMicroprogramRegister
        );
    }

    #[test]
    fn cop2_macros_split_into_pipelines() {
        assert_eq!(
            decode_cop2(0x4BE2_0828),
            Cop2Instruction::UpperMacro {
                upper: 0x01E2_0828,
                lower: VU_LOWER_NOP
            }
        );
        assert_eq!(
            decode_cop2(0x4A01_0030),
            Cop2Instruction::LowerMacro {
                upper: VU_UPPER_NOP,
                lower: 0x8001_0030
            }
        );
        assert_eq!(decode_cop2(0x4A00_0036), Cop2Instruction::Reserved);
    }
}
