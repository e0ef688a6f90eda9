//! Architectural processor state, run flags and the register descriptor table.

/// Register descriptor table in debugger numbering.
pub mod descriptor;
/// Register file and COP0 state.
pub mod registers;
/// Run flags and the host-observable execution state machine.
pub mod run_state;

pub use descriptor::{
    RegisterClass, RegisterDescriptor, RegisterTable, VuSpecial, AUX_BASE, BASE_REGISTER_COUNT,
    FGR_BASE, GPR_UPPER_BASE, R5900_REGISTER_COUNT, VU_ACC_BASE, VU_INTEGER_BASE,
    VU_SPECIAL_BASE, VU_VECTOR_BASE,
};
pub use registers::{
    CpuState, AUX_REGISTER_COUNT, CAUSE_BD, CAUSE_EXCCODE_MASK, CAUSE_EXCCODE_SHIFT, DEBUG_DBD,
    DEBUG_DBP, DEBUG_DM, FGR_COUNT, GPR_COUNT, REG_A0, REG_A1, REG_A2, REG_A3, REG_RA, REG_SP,
    REG_V0, REG_ZERO, SR_BEV, SR_CU0, SR_CU1, SR_CU2, SR_CU3, SR_ERL, SR_EXL, SR_FR, SR_IE,
    SR_RP, SR_SR, SR_TS,
};
pub use run_state::{RunFlags, RunState};
