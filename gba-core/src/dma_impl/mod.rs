/// DMA - Direct Memory Access Controller
/// Modular implementation
mod channel;
mod constants;
mod types;

pub use constants::*;
pub use types::{DmaBurst, DmaControl, DmaTiming};

use channel::DmaChannel;
use serde::{Deserialize, Serialize};

/// DMA Controller (4 channels)
///
/// The controller owns the register surface and the arbitration; the bus
/// owns the actual memory traffic. A triggered channel surfaces through
/// `next_burst` (lowest channel number first) and is completed with
/// `finish_burst` once the bus has moved the data.
#[derive(Serialize, Deserialize)]
pub struct Dma {
    channels: [DmaChannel; DMA_CHANNEL_COUNT],
}

impl Dma {
    pub fn new() -> Self {
        Self {
            channels: [
                DmaChannel::new(0),
                DmaChannel::new(1),
                DmaChannel::new(2),
                DmaChannel::new(3),
            ],
        }
    }

    /// Reset all DMA channels
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Trigger DMA channels waiting on a timing event
    pub fn trigger(&mut self, timing: DmaTiming) {
        for channel in &mut self.channels {
            channel.trigger(timing);
        }
    }

    /// Trigger a single channel's Special timing (FIFO refill targets one
    /// specific channel, not the whole event class)
    pub fn trigger_special(&mut self, channel_id: usize) {
        self.channels[channel_id].trigger(DmaTiming::Special);
    }

    /// Extract the highest-priority pending burst (lowest channel wins)
    pub fn next_burst(&mut self) -> Option<DmaBurst> {
        self.channels
            .iter_mut()
            .find_map(|channel| channel.begin_burst())
    }

    /// Complete a burst; returns true when the channel requests its IRQ
    pub fn finish_burst(&mut self, channel_id: usize, final_source: u32, final_dest: u32) -> bool {
        self.channels[channel_id].finish_burst(final_source, final_dest)
    }

    /// Halfword write into the DMA register block (I/O window offset)
    pub fn write16(&mut self, offset: u32, value: u16) {
        let relative = offset - DMA0SAD;
        let channel = &mut self.channels[(relative / 12) as usize];

        match relative % 12 {
            0 => channel.write_source(
                (channel.source_addr & 0xFFFF_0000) | value as u32,
            ),
            2 => channel.write_source(
                (channel.source_addr & 0x0000_FFFF) | ((value as u32) << 16),
            ),
            4 => channel.write_dest((channel.dest_addr & 0xFFFF_0000) | value as u32),
            6 => channel.write_dest(
                (channel.dest_addr & 0x0000_FFFF) | ((value as u32) << 16),
            ),
            8 => channel.write_count(value),
            10 => channel.write_control(value),
            _ => {}
        }
    }

    /// Halfword read from the DMA register block
    ///
    /// Only the control registers are readable; SAD/DAD/CNT_L are
    /// write-only and read back as zero.
    pub fn read16(&self, offset: u32) -> u16 {
        let relative = offset - DMA0SAD;
        let channel = &self.channels[(relative / 12) as usize];

        match relative % 12 {
            10 => channel.read_control(),
            _ => 0,
        }
    }

    /// Check if any channel has a pending burst
    pub fn is_active(&self) -> bool {
        self.channels.iter().any(|ch| ch.armed)
    }

    /// Lowest armed channel, if any (for debugging)
    pub fn active_channel(&self) -> Option<usize> {
        self.channels.iter().position(|ch| ch.armed)
    }

    /// Debug/test access to a channel's latched addresses
    pub fn channel_latches(&self, channel_id: usize) -> (u32, u32) {
        let channel = &self.channels[channel_id];
        (channel.current_source(), channel.current_dest())
    }

    /// Debug/test access to a channel's register values
    pub fn channel_registers(&self, channel_id: usize) -> (u32, u32, u16) {
        let channel = &self.channels[channel_id];
        (channel.source_addr, channel.dest_addr, channel.word_count)
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}
