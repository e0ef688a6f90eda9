#![no_main]

use libfuzzer_sys::fuzz_target;
use mips_sim_core::monitor::{self, HostCallbacks};
use mips_sim_core::state::{REG_A0, REG_RA};
use mips_sim_core::{BufferedHost, Exception, SimConfig, Simulator};

const FORMAT: u64 = 0x8000_1000;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (seed, format) = data.split_at(8);
    let arg = u64::from_le_bytes(seed.try_into().unwrap_or_default());

    // Formatter over a plain byte image: arguments may point anywhere in it.
    let _ = monitor::format(format, 0, [arg, arg >> 3, u64::from(seed[0]), arg.rotate_left(17)]);

    // Same string serviced through the monitor trap, reading target memory.
    let mut sim = Simulator::new(SimConfig::default());
    let mut host = BufferedHost::new();
    sim.write_memory(FORMAT, format);
    sim.cpu.set_gpr(REG_A0, FORMAT);
    for reg in 5u8..12 {
        sim.cpu.set_gpr(reg, arg.rotate_left(u32::from(reg)));
    }
    sim.cpu.set_gpr(REG_RA, 0x8000_0000);
    let host: &mut dyn HostCallbacks = &mut host;
    let _ = sim.signal_exception(host, Exception::reserved_instruction(monitor::monitor_trap(316)), 0);
});
