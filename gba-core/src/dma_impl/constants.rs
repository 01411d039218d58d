/// DMA - Direct Memory Access Controller
/// GBA has 4 DMA channels (DMA0-DMA3)
///
/// Register offsets inside the I/O window (add 0x04000000 for the bus
/// address). Each channel owns 12 bytes.
/// DMA0 registers (highest priority)
pub const DMA0SAD: u32 = 0x0B0; // Source Address
pub const DMA0DAD: u32 = 0x0B4; // Destination Address
pub const DMA0CNT_L: u32 = 0x0B8; // Word Count
pub const DMA0CNT_H: u32 = 0x0BA; // Control

/// DMA1 registers
pub const DMA1SAD: u32 = 0x0BC;
pub const DMA1DAD: u32 = 0x0C0;
pub const DMA1CNT_L: u32 = 0x0C4;
pub const DMA1CNT_H: u32 = 0x0C6;

/// DMA2 registers
pub const DMA2SAD: u32 = 0x0C8;
pub const DMA2DAD: u32 = 0x0CC;
pub const DMA2CNT_L: u32 = 0x0D0;
pub const DMA2CNT_H: u32 = 0x0D2;

/// DMA3 registers (lowest priority, most flexible)
pub const DMA3SAD: u32 = 0x0D4;
pub const DMA3DAD: u32 = 0x0D8;
pub const DMA3CNT_L: u32 = 0x0DC;
pub const DMA3CNT_H: u32 = 0x0DE;

/// First/last byte of the DMA register block
pub const DMA_REG_FIRST: u32 = DMA0SAD;
pub const DMA_REG_LAST: u32 = DMA3CNT_H + 1;

/// Number of DMA channels
pub const DMA_CHANNEL_COUNT: usize = 4;

/// DMA timing modes
pub const TIMING_IMMEDIATE: u8 = 0;
pub const TIMING_VBLANK: u8 = 1;
pub const TIMING_HBLANK: u8 = 2;
pub const TIMING_SPECIAL: u8 = 3; // Special (audio FIFO, video capture)

/// Address control modes
pub const ADDR_INCREMENT: u8 = 0;
pub const ADDR_DECREMENT: u8 = 1;
pub const ADDR_FIXED: u8 = 2;
pub const ADDR_RELOAD: u8 = 3; // Increment and reload
