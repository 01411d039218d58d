/// I/O register file for the 1 KiB window at 0x04000000
///
/// Every mapped register has a descriptor with a read mask and a write
/// mask: write-only bits read back as zero, read-only bits survive any
/// write. Registers owned by other subsystems (DMA, interrupts, keypad)
/// are routed by the bus before reaching this file; everything here is
/// plain storage plus the few side effects noted below.
///
/// Unmapped offsets read as 0 and drop writes (logged at debug level).
use ahash::AHashMap;

// Display block
pub const DISPCNT: u32 = 0x000;
pub const DISPSTAT: u32 = 0x004;
pub const VCOUNT: u32 = 0x006;

// Timer block (CNT_L is reload-on-write / counter-on-read)
pub const TM0CNT_L: u32 = 0x100;
pub const TM0CNT_H: u32 = 0x102;
pub const TM3CNT_H: u32 = 0x10E;

// Serial stubs
pub const SIOCNT: u32 = 0x128;
pub const RCNT: u32 = 0x134;

// System block
pub const WAITCNT: u32 = 0x204;
pub const POSTFLG: u32 = 0x300;

/// Read/write masks for one mapped register
#[derive(Debug, Clone, Copy)]
struct IoRegDef {
    read_mask: u16,
    write_mask: u16,
}

/// One hardware timer's register cell. The counter itself is advanced by
/// the timer collaborator, not by this file.
#[derive(Debug, Clone, Copy, Default)]
struct TimerCell {
    counter: u16,
    reload: u16,
}

pub struct IoRegisters {
    defs: AHashMap<u32, IoRegDef>,
    values: AHashMap<u32, u16>,
    timers: [TimerCell; 4],
    halt_requested: bool,
}

impl IoRegisters {
    pub fn new() -> Self {
        let mut defs = AHashMap::new();
        let mut register = |offset: u32, read_mask: u16, write_mask: u16| {
            defs.insert(
                offset,
                IoRegDef {
                    read_mask,
                    write_mask,
                },
            );
        };

        register(DISPCNT, 0xFFFF, 0xFFFF);
        // DISPSTAT bits 0-2 are hardware status, read-only
        register(DISPSTAT, 0xFFFF, 0xFF38);
        register(VCOUNT, 0x00FF, 0x0000);

        // Timer controls: prescaler, count-up, IRQ, enable
        for timer in 0..4 {
            register(TM0CNT_H + timer * 4, 0x00C7, 0x00C7);
        }

        register(SIOCNT, 0xFFFF, 0xFFFF);
        register(RCNT, 0xFFFF, 0xFFFF);
        register(WAITCNT, 0x5FFF, 0x5FFF);
        // POSTFLG is the low byte; a write touching the high byte (HALTCNT)
        // requests a halt
        register(POSTFLG, 0x0001, 0x0001);

        Self {
            defs,
            values: AHashMap::new(),
            timers: [TimerCell::default(); 4],
            halt_requested: false,
        }
    }

    /// Halfword read at an even offset inside the window
    pub fn read16(&self, offset: u32) -> u16 {
        let offset = offset & !1;

        // Timer counters read the live counter, not the reload latch
        if (TM0CNT_L..=TM3CNT_H).contains(&offset) && offset & 2 == 0 {
            let timer = ((offset - TM0CNT_L) / 4) as usize;
            return self.timers[timer].counter;
        }

        match self.defs.get(&offset) {
            Some(def) => self.values.get(&offset).copied().unwrap_or(0) & def.read_mask,
            None => 0, // unmapped I/O reads as zero
        }
    }

    /// Halfword write at an even offset inside the window
    pub fn write16(&mut self, offset: u32, value: u16) {
        let offset = offset & !1;

        if (TM0CNT_L..=TM3CNT_H).contains(&offset) && offset & 2 == 0 {
            let timer = ((offset - TM0CNT_L) / 4) as usize;
            self.timers[timer].reload = value;
            return;
        }

        if offset == POSTFLG {
            // HALTCNT lives in the high byte: bit 15 low = halt, high = stop.
            // Both power states park the CPU until an interrupt.
            self.halt_requested = true;
        }

        match self.defs.get(&offset) {
            Some(def) => {
                let old = self.values.get(&offset).copied().unwrap_or(0);
                let new = (old & !def.write_mask) | (value & def.write_mask);
                self.values.insert(offset, new);
            }
            None => {
                log::debug!("unmapped I/O write: 0x{:03X} = 0x{value:04X}", offset);
            }
        }
    }

    /// Consuma la richiesta di HALT (scrittura su HALTCNT)
    pub fn take_halt_request(&mut self) -> bool {
        std::mem::take(&mut self.halt_requested)
    }

    /// Collaborator hook: advance the vertical counter
    ///
    /// Updates VCOUNT and the DISPSTAT status bits (VBlank flag for lines
    /// 160-226, VCount match against the DISPSTAT trigger line).
    pub fn set_vcount(&mut self, line: u8) {
        self.values.insert(VCOUNT, line as u16);

        let dispstat = self.values.get(&DISPSTAT).copied().unwrap_or(0);
        let mut status = dispstat & !0x0007;
        if (160..=226).contains(&line) {
            status |= 1 << 0; // VBlank flag
        }
        if line as u16 == dispstat >> 8 {
            status |= 1 << 2; // VCount match
        }
        self.values.insert(DISPSTAT, status);
    }

    /// Collaborator hook: HBlank entered on the current line
    pub fn set_hblank_flag(&mut self) {
        let dispstat = self.values.get(&DISPSTAT).copied().unwrap_or(0);
        self.values.insert(DISPSTAT, dispstat | (1 << 1));
    }

    /// Collaborator hook: advance a timer counter
    pub fn set_timer_counter(&mut self, timer: usize, counter: u16) {
        self.timers[timer].counter = counter;
    }

    /// Timer reload latch, for the timer collaborator
    pub fn timer_reload(&self, timer: usize) -> u16 {
        self.timers[timer].reload
    }
}

impl Default for IoRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_offset_reads_zero() {
        let mut io = IoRegisters::new();
        assert_eq!(io.read16(0x3F0), 0);
        io.write16(0x3F0, 0xFFFF);
        assert_eq!(io.read16(0x3F0), 0);
    }

    #[test]
    fn test_dispstat_status_bits_are_read_only() {
        let mut io = IoRegisters::new();
        io.write16(DISPSTAT, 0xFFFF);
        // Bits 0-2 must not be writable from the bus
        assert_eq!(io.read16(DISPSTAT) & 0x0007, 0);
        assert_eq!(io.read16(DISPSTAT) & 0xFF38, 0xFF38);
    }

    #[test]
    fn test_vcount_is_read_only() {
        let mut io = IoRegisters::new();
        io.write16(VCOUNT, 0x1234);
        assert_eq!(io.read16(VCOUNT), 0);

        io.set_vcount(42);
        assert_eq!(io.read16(VCOUNT), 42);
    }

    #[test]
    fn test_vcount_updates_dispstat_flags() {
        let mut io = IoRegisters::new();
        io.set_vcount(100);
        assert_eq!(io.read16(DISPSTAT) & 1, 0);

        io.set_vcount(160);
        assert_eq!(io.read16(DISPSTAT) & 1, 1);

        // VCount match against the trigger line in the high byte
        io.write16(DISPSTAT, 80 << 8);
        io.set_vcount(80);
        assert_eq!(io.read16(DISPSTAT) & (1 << 2), 1 << 2);
    }

    #[test]
    fn test_timer_reload_vs_counter() {
        let mut io = IoRegisters::new();
        io.write16(TM0CNT_L, 0xFF00);
        // The write lands in the reload latch, not the counter
        assert_eq!(io.read16(TM0CNT_L), 0);
        assert_eq!(io.timer_reload(0), 0xFF00);

        io.set_timer_counter(0, 0xFF42);
        assert_eq!(io.read16(TM0CNT_L), 0xFF42);
    }

    #[test]
    fn test_haltcnt_write_requests_halt() {
        let mut io = IoRegisters::new();
        assert!(!io.take_halt_request());

        io.write16(POSTFLG, 0x0001);
        assert!(io.take_halt_request());
        assert!(!io.take_halt_request());
    }
}
