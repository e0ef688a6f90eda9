//! Coprocessor instruction dispatch.
//!
//! Coprocessor 0 handles system control moves and the privileged returns. Coprocessor 2
//! reaches the vector unit where the variant has one. Coprocessors 1 and 3 have no
//! instructions decoded here and raise reserved-instruction.

mod cop0;
mod cop2;
/// Pattern-matched decode of COP0 and COP2 instruction words.
pub mod decode;

pub use cop0::COP0_POISON;
pub use decode::{
    coprocessor_number, decode_cop0, decode_cop2, Cop0Instruction, Cop2Instruction, Cop2Move,
    VU_LOWER_NOP, VU_UPPER_NOP,
};

use crate::{Exception, Simulator, Trap};

impl Simulator {
    /// Executes a `COPz` instruction fetched at `cia`.
    ///
    /// # Errors
    ///
    /// Returns reserved-instruction for coprocessors 1 and 3 and for unknown COP2
    /// encodings, coprocessor-unusable for COP2 with `SR.CU2` clear, and a stalled
    /// vector-unit fault when a busy-wait exceeds the configured limit.
    pub fn decode_coproc(&mut self, cia: u64, insn: u32) -> Result<(), Trap> {
        match coprocessor_number(insn) {
            0 => {
                self.execute_cop0(insn);
                Ok(())
            }
            2 => self.execute_cop2(cia, insn),
            _ => Err(Exception::reserved_instruction(insn).into()),
        }
    }
}
