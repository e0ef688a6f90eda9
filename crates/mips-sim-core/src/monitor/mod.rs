//! Firmware monitor emulation: reserved-instruction traps serviced by the host.
//!
//! The monitor ROM is filled with reserved instructions that carry their own slot
//! number. A program calls a monitor routine with a linking jump into the ROM; the
//! resulting reserved-instruction exception is serviced here and execution resumes
//! at the return address.

mod host;
/// Target-memory `printf` engine.
pub mod printf;

pub use host::{BufferedHost, HostCallbacks};
pub use printf::{format, read_c_string, ByteSource, MAX_FIELD};

use crate::memory::{encode_value, MONITOR_BASE, MONITOR_SIZE};
use crate::state::{REG_A0, REG_A1, REG_A2, REG_V0};
use crate::{Simulator, StopReason, WordSize};

/// Mask selecting the opcode and function fields of a monitor trap.
pub const MONITOR_TRAP_MASK: u32 = 0xFC00_003F;
/// Opcode and function fields of a monitor trap.
pub const MONITOR_TRAP: u32 = 0x0000_0005;
/// Shift of the reason field in a monitor trap.
pub const MONITOR_REASON_SHIFT: u32 = 6;
/// Mask of the reason field in a monitor trap, after shifting.
pub const MONITOR_REASON_MASK: u32 = 0xF_FFFF;

/// PMON function table inside the monitor ROM.
pub const PMON_TABLE: u64 = MONITOR_BASE + 0x500;
/// Alternate PMON function table location.
pub const PMON_TABLE_ALT: u64 = PMON_TABLE - 0x300;
/// Number of PMON table entries.
pub const PMON_TABLE_ENTRIES: u64 = 24;

/// `addiu a0, zero, 47`: the exit status loaded by the unhandled-exception stubs.
pub const HALT_STUB_STATUS: u32 = 0x2404_002F;
/// `BREAK` recognised by instruction semantics as a request to halt.
pub const HALT_INSTRUCTION: u32 = 0x03FF_000D;
/// Addresses that receive the unhandled-exception halt stub.
pub const HALT_STUB_ADDRESSES: [u64; 2] = [0x8000_0180, 0xBFC0_0380];

/// Extracts the reason field when `insn` is a monitor trap.
#[must_use]
pub const fn monitor_trap_reason(insn: u32) -> Option<u32> {
    if insn & MONITOR_TRAP_MASK == MONITOR_TRAP {
        Some((insn >> MONITOR_REASON_SHIFT) & MONITOR_REASON_MASK)
    } else {
        None
    }
}

/// Monitor trap instruction for ROM slot `slot`.
#[must_use]
pub const fn monitor_trap(slot: u32) -> u32 {
    MONITOR_TRAP | ((slot & MONITOR_REASON_MASK) << MONITOR_REASON_SHIFT)
}

/// Monitor service selected by a trap, after halving the raw slot reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorService {
    /// `int open(char *path, int flags)`.
    Open,
    /// `int read(int fd, char *buf, int len)`.
    Read,
    /// `int write(int fd, char *buf, int len)`.
    Write,
    /// `int close(int fd)`.
    Close,
    /// `char inbyte(int waitflag)`.
    InByteWait,
    /// `char inbyte(void)`.
    InByte,
    /// `void outbyte(char c)`.
    OutByte,
    /// `void _exit(int status)`.
    Exit,
    /// PMON `flush_cache`.
    FlushCache,
    /// `void get_mem_info(unsigned *info)`.
    MemInfo,
    /// PMON `printf`.
    Printf,
}

impl MonitorService {
    /// Service for a halved reason code.
    #[must_use]
    pub const fn from_reason(reason: u32) -> Option<Self> {
        Some(match reason {
            6 => Self::Open,
            7 => Self::Read,
            8 => Self::Write,
            10 => Self::Close,
            2 => Self::InByteWait,
            11 => Self::InByte,
            3 | 12 => Self::OutByte,
            17 => Self::Exit,
            28 => Self::FlushCache,
            55 => Self::MemInfo,
            158 => Self::Printf,
            _ => return None,
        })
    }
}

/// Halved reason each PMON table entry redirects to.
const fn pmon_reason(entry: u64) -> u64 {
    match entry {
        0 => 7,
        1 => 8,
        2 => 6,
        3 => 10,
        5 => (0x500 - 16) / 8,
        8 => 17,
        11 => 28,
        _ => (0x500 - 8) / 8,
    }
}

impl Simulator {
    /// Writes the firmware vectors into target memory.
    ///
    /// Every ROM word becomes a monitor trap for its own slot, both PMON tables point
    /// at the matching trap, and the unhandled-exception vectors get a halt stub.
    pub fn install_monitor_vectors(&mut self) {
        let mut written = true;
        for slot in 0..(MONITOR_SIZE as u64 / 4) {
            written &= self
                .memory
                .raw_write_word(MONITOR_BASE + slot * 4, monitor_trap(slot as u32));
        }
        for entry in 0..PMON_TABLE_ENTRIES {
            let target = (MONITOR_BASE + pmon_reason(entry) * 8) as u32;
            for table in [PMON_TABLE, PMON_TABLE_ALT] {
                written &= self.memory.raw_write_word(table + entry * 4, target);
            }
        }
        for addr in HALT_STUB_ADDRESSES {
            written &= self.memory.raw_write_word(addr, HALT_STUB_STATUS);
            written &= self.memory.raw_write_word(addr + 4, HALT_INSTRUCTION);
        }
        if !written {
            tracing::warn!("monitor vectors only partially installed");
        }
    }

    /// Services a monitor trap with raw slot `reason`.
    ///
    /// Returns the stop reason when the program asked to exit.
    pub fn monitor_call(
        &mut self,
        host: &mut dyn HostCallbacks,
        cia: u64,
        reason: u32,
    ) -> Option<StopReason> {
        self.stats.record_monitor_call();
        let reason = reason >> 1;
        let Some(service) = MonitorService::from_reason(reason) else {
            tracing::error!(reason, cia = format_args!("{cia:#x}"), "unimplemented monitor call");
            return None;
        };
        tracing::trace!(?service, "monitor call");

        let a0 = self.cpu.gpr(REG_A0);
        let a1 = self.cpu.gpr(REG_A1);
        let a2 = self.cpu.gpr(REG_A2);
        match service {
            MonitorService::Open => {
                let path = read_c_string(&self.memory, a0);
                let result = host.open(&path, a1 as i32);
                self.set_return(result);
            }
            MonitorService::Read => {
                let mut buf = vec![0; self.transfer_len(a2)];
                let result = host.read(a0 as i32, &mut buf);
                self.set_return(result);
                self.write_memory(a1, &buf);
            }
            MonitorService::Write => {
                let mut buf = vec![0; self.transfer_len(a2)];
                self.read_memory(a1, &mut buf);
                let result = host.write(a0 as i32, &buf);
                self.set_return(result);
            }
            MonitorService::Close => {
                let result = host.close(a0 as i32);
                self.set_return(result);
            }
            MonitorService::InByteWait | MonitorService::InByte => {
                if service == MonitorService::InByteWait && a0 == 0 {
                    self.set_return(-1);
                }
                match host.read_stdin() {
                    Some(byte) => self.set_return(i64::from(byte as i8)),
                    None => {
                        tracing::error!("invalid return from character read");
                        self.set_return(-1);
                    }
                }
            }
            MonitorService::OutByte => host.write_stdout(&[a0 as u8]),
            MonitorService::Exit => return Some(StopReason::Exited(a0 as u32)),
            MonitorService::FlushCache => {}
            MonitorService::MemInfo => {
                let mut info = [0u8; 12];
                let endian = self.memory.endian();
                encode_value(self.memory.ram_size() as u64, endian, &mut info[..4]);
                self.write_memory(a0, &info);
            }
            MonitorService::Printf => {
                let args: Vec<u64> = (REG_A1..32).map(|reg| self.cpu.gpr(reg)).collect();
                let text = format(&self.memory, a0, args);
                host.write_stdout(&text);
            }
        }
        None
    }

    /// Clamps a guest-supplied length to what target memory could hold.
    fn transfer_len(&self, raw: u64) -> usize {
        usize::try_from(raw as i32)
            .unwrap_or(0)
            .min(self.memory.ram_size())
    }

    fn set_return(&mut self, value: i64) {
        let value = match self.config.word_size {
            WordSize::Bits32 => u64::from(value as u32),
            WordSize::Bits64 => value as u64,
        };
        self.cpu.set_gpr(REG_V0, value);
    }
}
