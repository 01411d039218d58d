use super::constants::{ADDR_DECREMENT, ADDR_INCREMENT, ADDR_RELOAD};
use super::types::{DmaBurst, DmaControl, DmaTiming};
use serde::{Deserialize, Serialize};

/// Single DMA channel
///
/// The channel is a small state machine: Idle (enable clear), Armed
/// (enable set, waiting for its trigger event) and Transferring (the bus
/// is walking a burst extracted with `begin_burst`). The `armed` flag is
/// internal state, distinct from the externally visible enable bit, so a
/// trigger can never re-arm a channel whose burst is in flight.
///
/// Source, destination and count are latched when the enable bit goes
/// 0 -> 1; later register writes only matter at the next latch point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmaChannel {
    pub channel_id: usize,
    pub source_addr: u32,
    pub dest_addr: u32,
    pub word_count: u16,
    pub control: DmaControl,

    // Internal latches, captured at enable time
    internal_source: u32,
    internal_dest: u32,
    internal_count: u32,
    pub armed: bool,
}

impl DmaChannel {
    pub fn new(channel_id: usize) -> Self {
        Self {
            channel_id,
            source_addr: 0,
            dest_addr: 0,
            word_count: 0,
            control: DmaControl::default(),
            internal_source: 0,
            internal_dest: 0,
            internal_count: 0,
            armed: false,
        }
    }

    /// Reset channel to initial state
    pub fn reset(&mut self) {
        *self = Self::new(self.channel_id);
    }

    /// Write source address
    pub fn write_source(&mut self, value: u32) {
        // Mask valid bits based on channel
        let mask = match self.channel_id {
            0 => 0x07FF_FFFF, // DMA0: internal memory only
            _ => 0x0FFF_FFFF, // DMA1-3: any memory
        };
        self.source_addr = value & mask;
    }

    /// Write destination address
    pub fn write_dest(&mut self, value: u32) {
        // Mask valid bits based on channel
        let mask = match self.channel_id {
            0..=2 => 0x07FF_FFFF, // DMA0-2: internal memory only
            _ => 0x0FFF_FFFF,     // DMA3: any memory
        };
        self.dest_addr = value & mask;
    }

    /// Write word count (14 bits on channels 0-2, 16 bits on channel 3)
    pub fn write_count(&mut self, value: u16) {
        let mask: u16 = if self.channel_id == 3 { 0xFFFF } else { 0x3FFF };
        self.word_count = value & mask;
    }

    /// Max unit count; a programmed count of zero means this
    pub fn max_count(&self) -> u32 {
        if self.channel_id == 3 {
            0x1_0000
        } else {
            0x4000
        }
    }

    /// Write control register
    ///
    /// The 0 -> 1 transition of the enable bit latches source, destination
    /// and count; clearing enable disarms the channel.
    pub fn write_control(&mut self, value: u16) {
        let was_enabled = self.control.enabled;
        self.control = DmaControl::from_u16(value);
        if self.channel_id != 3 {
            self.control.game_pak_drq = false;
        }

        if !was_enabled && self.control.enabled {
            self.latch();
            if self.control.start_timing() == DmaTiming::Immediate {
                self.armed = true;
            }
        }

        if !self.control.enabled {
            self.armed = false;
        }
    }

    /// Read control register
    pub fn read_control(&self) -> u16 {
        self.control.to_u16()
    }

    /// Capture the register values into the internal latches
    fn latch(&mut self) {
        self.internal_source = self.source_addr;
        self.internal_dest = self.dest_addr;
        self.internal_count = self.latched_count();
    }

    fn latched_count(&self) -> u32 {
        if self.word_count == 0 {
            self.max_count()
        } else {
            self.word_count as u32
        }
    }

    /// FIFO refill mode: channels 1/2 with Special timing
    fn fifo_mode(&self) -> bool {
        self.control.start_timing() == DmaTiming::Special
            && (self.channel_id == 1 || self.channel_id == 2)
    }

    /// Trigger DMA transfer (for VBlank/HBlank/Special timing)
    ///
    /// Arms the channel when the event matches its programmed timing.
    /// HBlank never triggers channel 0 on real hardware.
    pub fn trigger(&mut self, timing: DmaTiming) {
        if !self.control.enabled || self.armed {
            return;
        }
        if timing == DmaTiming::HBlank && self.channel_id == 0 {
            return;
        }

        if self.control.start_timing() == timing {
            // Repeat transfers re-latch the count on every trigger
            self.internal_count = self.latched_count();
            self.armed = true;
        }
    }

    /// Extract the pending burst, moving the channel into its transfer
    /// phase; `None` when the channel is not armed
    pub fn begin_burst(&mut self) -> Option<DmaBurst> {
        if !self.armed {
            return None;
        }
        self.armed = false;

        let (unit, count, dest_delta) = if self.fifo_mode() {
            // Audio FIFO refill: 4 words to a fixed destination
            (4, 4, 0)
        } else {
            let unit = self.control.transfer_size();
            let dest_delta = match self.control.dest_control {
                ADDR_INCREMENT | ADDR_RELOAD => unit as i32,
                ADDR_DECREMENT => -(unit as i32),
                _ => 0, // ADDR_FIXED
            };
            (unit, self.internal_count, dest_delta)
        };

        let source_delta = match self.control.source_control {
            ADDR_INCREMENT => unit as i32,
            ADDR_DECREMENT => -(unit as i32),
            _ => 0, // ADDR_FIXED (the prohibited 3 behaves as fixed)
        };

        Some(DmaBurst {
            channel_id: self.channel_id,
            source: self.internal_source,
            dest: self.internal_dest,
            count,
            unit,
            source_delta,
            dest_delta,
        })
    }

    /// Complete a burst: store the final addresses and either keep the
    /// channel enabled (repeat, non-immediate timing) or clear the enable
    /// bit. Returns true when the channel should raise its IRQ.
    pub fn finish_burst(&mut self, final_source: u32, final_dest: u32) -> bool {
        self.internal_source = final_source;

        // "dst reload" increments during the transfer but snaps back to the
        // latched destination at the end
        if self.control.dest_control == ADDR_RELOAD && !self.fifo_mode() {
            self.internal_dest = self.dest_addr;
        } else {
            self.internal_dest = final_dest;
        }

        let repeats =
            self.control.repeat && self.control.start_timing() != DmaTiming::Immediate;
        if !repeats {
            self.control.enabled = false;
        }

        self.control.irq_enable
    }

    /// Latched source address (debug/test access)
    pub fn current_source(&self) -> u32 {
        self.internal_source
    }

    /// Latched destination address (debug/test access)
    pub fn current_dest(&self) -> u32 {
        self.internal_dest
    }
}
