use crate::dma::{Dma, DmaTiming, DMA_REG_FIRST, DMA_REG_LAST};
use crate::input::InputController;
use crate::interrupt::{InterruptController, InterruptFlags};
use crate::io::IoRegisters;
use crate::memory::{region, Memory, Region};
use gba_arm7tdmi::cpu::MemoryBus;

/// Bus principale del sistema GBA
///
/// Smista gli accessi della CPU (e del DMA) tra banco di memoria, registri
/// I/O, controller interrupt e keypad. Qui vivono anche i comportamenti
/// trasversali del bus:
/// - le letture word disallineate ruotano il valore (ARM7)
/// - gli indirizzi non mappati rispondono con l'ultimo valore transitato
///   sul bus (open bus, in pratica l'ultima parola prefetchata)
/// - la SRAM ha il bus a 8 bit: gli accessi larghi replicano/riducono
/// - i burst DMA girano qui, rubando cicli alla CPU
pub struct Bus {
    pub memory: Memory,
    pub io: IoRegisters,
    pub dma: Dma,
    pub interrupt: InterruptController,
    pub input: InputController,

    // Ultimo valore letto sul bus, usato per l'open bus
    open_bus: u32,
    // Indirizzo dell'ultimo fetch istruzione (per il BIOS protetto)
    last_fetch_addr: u32,
    // Cicli rubati dai burst DMA, drenati dal loop di emulazione
    dma_stall: u32,
}

const IO_BASE: u32 = 0x0400_0000;
const IO_SIZE: u32 = 0x400;

impl Bus {
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            io: IoRegisters::new(),
            dma: Dma::new(),
            interrupt: InterruptController::new(),
            input: InputController::new(),
            open_bus: 0,
            last_fetch_addr: 0,
            dma_stall: 0,
        }
    }

    pub fn load_bios(&mut self, bios: Vec<u8>) {
        self.memory.load_bios(bios);
    }

    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.memory.load_rom(rom);
    }

    #[inline]
    fn fetch_in_bios(&self) -> bool {
        self.last_fetch_addr < 0x4000
    }

    /// Cicli rubati dal DMA dall'ultimo drenaggio
    pub fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.dma_stall)
    }

    /// Richiesta di HALT generata da una scrittura su HALTCNT
    pub fn take_halt_request(&mut self) -> bool {
        self.io.take_halt_request()
    }

    //==========================================================================
    // HOOK DEI COLLABORATORI (PPU/APU)
    //==========================================================================

    /// Fronte di salita del VBlank: arma i canali DMA in attesa
    pub fn notify_vblank(&mut self) {
        self.dma.trigger(DmaTiming::VBlank);
        self.service_dma();
    }

    /// Fronte di salita dell'HBlank: arma i canali DMA in attesa
    pub fn notify_hblank(&mut self) {
        self.io.set_hblank_flag();
        self.dma.trigger(DmaTiming::HBlank);
        self.service_dma();
    }

    /// FIFO audio A drenata: ricarica via DMA1
    pub fn notify_fifo_a(&mut self) {
        self.dma.trigger_special(1);
        self.service_dma();
    }

    /// FIFO audio B drenata: ricarica via DMA2
    pub fn notify_fifo_b(&mut self) {
        self.dma.trigger_special(2);
        self.service_dma();
    }

    /// Cattura video: trigger speciale del DMA3
    pub fn notify_video_capture(&mut self) {
        self.dma.trigger_special(3);
        self.service_dma();
    }

    /// Aggiorna VCOUNT (e i flag di stato del display)
    pub fn set_vcount(&mut self, line: u8) {
        self.io.set_vcount(line);
    }

    //==========================================================================
    // DMA
    //==========================================================================

    /// Esegue tutti i burst DMA pendenti, in ordine di priorità
    ///
    /// I burst sono atomici rispetto alla CPU: una volta partiti corrono
    /// fino in fondo e i loro cicli finiscono nel conto `dma_stall`.
    fn service_dma(&mut self) {
        while let Some(burst) = self.dma.next_burst() {
            let mut source = burst.source;
            let mut dest = burst.dest;

            for _ in 0..burst.count {
                if burst.unit == 4 {
                    let value = self.read_word(source & !3);
                    self.write_word(dest & !3, value);
                } else {
                    let value = self.read_halfword(source & !1);
                    self.write_halfword(dest & !1, value);
                }
                source = source.wrapping_add(burst.source_delta as u32);
                dest = dest.wrapping_add(burst.dest_delta as u32);
            }

            // 2 cicli per unità più il setup del burst
            self.dma_stall += burst.count * 2 + 2;

            if self.dma.finish_burst(burst.channel_id, source, dest) {
                self.interrupt
                    .request(InterruptFlags::dma(burst.channel_id));
            }
        }
    }

    //==========================================================================
    // REGISTRI I/O (decomposizione byte/halfword come sul bus reale)
    //==========================================================================

    /// Leggi I/O register (halfword)
    fn read_io_halfword(&mut self, offset: u32) -> u16 {
        match offset & !1 {
            DMA_REG_FIRST..=DMA_REG_LAST => self.dma.read16(offset & !1),

            // Keypad
            0x130 => self.input.read_keyinput(),
            0x132 => self.input.read_keycnt(),

            // Interrupt registers
            0x200 => self.interrupt.ie,
            0x202 => self.interrupt.if_,
            0x208 => self.interrupt.ime as u16,
            0x20A => 0,

            other => self.io.read16(other),
        }
    }

    /// Scrivi I/O register (halfword)
    fn write_io_halfword(&mut self, offset: u32, value: u16) {
        match offset & !1 {
            DMA_REG_FIRST..=DMA_REG_LAST => {
                self.dma.write16(offset & !1, value);
                // L'enable di un canale immediato parte subito
                self.service_dma();
            }

            0x130 => {} // KEYINPUT è read-only
            0x132 => self.input.write_keycnt(value),

            0x200 => self.interrupt.ie = value & 0x3FFF,
            // IF è write-1-to-clear
            0x202 => self.interrupt.write_if(value),
            0x208 => self.interrupt.ime = value & 1 != 0,
            0x20A => {}

            other => self.io.write16(other, value),
        }
    }

    /// Leggi I/O register (byte)
    fn read_io_byte(&mut self, offset: u32) -> u8 {
        let halfword = self.read_io_halfword(offset & !1);
        if offset & 1 == 0 {
            (halfword & 0xFF) as u8
        } else {
            (halfword >> 8) as u8
        }
    }

    /// Scrivi I/O register (byte)
    fn write_io_byte(&mut self, offset: u32, value: u8) {
        let aligned = offset & !1;

        // IF è write-1-to-clear: il read-modify-write azzererebbe anche i
        // bit dell'altro byte, quindi il byte scritto viaggia da solo
        if aligned == 0x202 {
            self.interrupt.write_if((value as u16) << ((offset & 1) * 8));
            return;
        }

        let current = self.read_io_halfword(aligned);
        let new_value = if offset & 1 == 0 {
            (current & 0xFF00) | (value as u16)
        } else {
            (current & 0x00FF) | ((value as u16) << 8)
        };
        self.write_io_halfword(aligned, new_value);
    }
}

impl MemoryBus for Bus {
    fn read_byte(&mut self, addr: u32) -> u8 {
        match region(addr) {
            Region::Io => {
                let offset = addr - IO_BASE;
                if offset < IO_SIZE {
                    self.read_io_byte(offset)
                } else {
                    0
                }
            }
            Region::Unmapped => (self.open_bus >> ((addr & 3) * 8)) as u8,
            _ => {
                let fetch_in_bios = self.fetch_in_bios();
                self.memory
                    .read_byte(addr, fetch_in_bios)
                    .unwrap_or((self.open_bus >> ((addr & 3) * 8)) as u8)
            }
        }
    }

    fn read_halfword(&mut self, addr: u32) -> u16 {
        let aligned = addr & !1;
        let value = match region(aligned) {
            Region::Io => {
                let offset = aligned - IO_BASE;
                if offset < IO_SIZE {
                    self.read_io_halfword(offset)
                } else {
                    0
                }
            }
            // SRAM ha il bus a 8 bit: il byte viene replicato
            Region::Sram => {
                let byte = self.memory.read_byte(aligned, false).unwrap_or(0xFF) as u16;
                byte * 0x0101
            }
            Region::Unmapped => (self.open_bus >> ((aligned & 2) * 8)) as u16,
            _ => {
                let fetch_in_bios = self.fetch_in_bios();
                self.memory
                    .read_halfword(aligned, fetch_in_bios)
                    .unwrap_or((self.open_bus >> ((aligned & 2) * 8)) as u16)
            }
        };

        self.open_bus = (value as u32) | ((value as u32) << 16);
        value
    }

    fn read_word(&mut self, addr: u32) -> u32 {
        let aligned = addr & !3;
        let value = match region(aligned) {
            Region::Io => {
                let offset = aligned - IO_BASE;
                if offset < IO_SIZE {
                    let low = self.read_io_halfword(offset);
                    let high = self.read_io_halfword(offset + 2);
                    (low as u32) | ((high as u32) << 16)
                } else {
                    0
                }
            }
            Region::Sram => {
                let byte = self.memory.read_byte(aligned, false).unwrap_or(0xFF) as u32;
                byte * 0x0101_0101
            }
            Region::Unmapped => self.open_bus,
            _ => {
                let fetch_in_bios = self.fetch_in_bios();
                self.memory
                    .read_word(aligned, fetch_in_bios)
                    .unwrap_or(self.open_bus)
            }
        };

        self.open_bus = value;
        // Accesso disallineato: il valore ruota (comportamento ARM7)
        value.rotate_right((addr & 3) * 8)
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        match region(addr) {
            Region::Io => {
                let offset = addr - IO_BASE;
                if offset < IO_SIZE {
                    self.write_io_byte(offset, value);
                }
            }
            _ => self.memory.write_byte(addr, value),
        }
    }

    fn write_halfword(&mut self, addr: u32, value: u16) {
        let aligned = addr & !1;
        match region(aligned) {
            Region::Io => {
                let offset = aligned - IO_BASE;
                if offset < IO_SIZE {
                    self.write_io_halfword(offset, value);
                }
            }
            // SRAM: sul bus a 8 bit arriva solo il byte ruotato
            Region::Sram => {
                let byte = (value >> ((addr & 1) * 8)) as u8;
                self.memory.write_byte(aligned, byte);
            }
            _ => self.memory.write_halfword(aligned, value),
        }
    }

    fn write_word(&mut self, addr: u32, value: u32) {
        let aligned = addr & !3;
        match region(aligned) {
            Region::Io => {
                let offset = aligned - IO_BASE;
                if offset < IO_SIZE {
                    self.write_io_halfword(offset, value as u16);
                    self.write_io_halfword(offset + 2, (value >> 16) as u16);
                }
            }
            Region::Sram => {
                let byte = (value >> ((addr & 3) * 8)) as u8;
                self.memory.write_byte(aligned, byte);
            }
            _ => self.memory.write_word(aligned, value),
        }
    }

    /// Fetch istruzione THUMB: aggiorna lo stato del BIOS protetto
    fn fetch_halfword(&mut self, addr: u32) -> u16 {
        self.last_fetch_addr = addr;
        let value = self.read_halfword(addr);
        if region(addr) == Region::Bios {
            self.memory.bios_latch = (value as u32) | ((value as u32) << 16);
        }
        value
    }

    /// Fetch istruzione ARM: aggiorna lo stato del BIOS protetto
    fn fetch_word(&mut self, addr: u32) -> u32 {
        self.last_fetch_addr = addr;
        let value = self.read_word(addr);
        if region(addr) == Region::Bios {
            self.memory.bios_latch = value;
        }
        value
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with_ram() -> Bus {
        let mut bus = Bus::new();
        bus.last_fetch_addr = 0x0800_0000; // fetch "fuori dal BIOS"
        bus
    }

    #[test]
    fn test_unaligned_word_read_rotates() {
        let mut bus = bus_with_ram();
        bus.write_word(0x0300_0000, 0xAABB_CCDD);

        assert_eq!(bus.read_word(0x0300_0000), 0xAABB_CCDD);
        assert_eq!(bus.read_word(0x0300_0001), 0xDDAA_BBCC);
        assert_eq!(bus.read_word(0x0300_0002), 0xCCDD_AABB);
        assert_eq!(bus.read_word(0x0300_0003), 0xBBCC_DDAA);
    }

    #[test]
    fn test_open_bus_returns_last_read_value() {
        let mut bus = bus_with_ram();
        bus.write_word(0x0300_0000, 0x1234_5678);

        // Simula il prefetch: l'ultima lettura lascia il valore sul bus
        let _ = bus.read_word(0x0300_0000);

        // Regione non mappata: risponde l'ultimo valore sul bus
        assert_eq!(bus.read_word(0x0100_0000), 0x1234_5678);
        assert_eq!(bus.read_word(0xF000_0000), 0x1234_5678);
        assert_eq!(bus.read_byte(0x0100_0002), 0x34);
    }

    #[test]
    fn test_sram_eight_bit_bus() {
        let mut bus = bus_with_ram();

        // Le scritture larghe depositano un solo byte (ruotato)
        bus.write_halfword(0x0E00_0000, 0xBBAA);
        assert_eq!(bus.read_byte(0x0E00_0000), 0xAA);

        bus.write_word(0x0E00_0010, 0xDDCC_BBAA);
        assert_eq!(bus.read_byte(0x0E00_0010), 0xAA);

        // Le letture larghe replicano il byte
        assert_eq!(bus.read_halfword(0x0E00_0010), 0xAAAA);
        assert_eq!(bus.read_word(0x0E00_0010), 0xAAAA_AAAA);
    }

    #[test]
    fn test_io_word_access_decomposes() {
        let mut bus = bus_with_ram();

        // IME (0x208) scritto via word: arriva la halfword bassa
        bus.write_word(0x0400_0208, 0x0000_0001);
        assert!(bus.interrupt.ime);
        assert_eq!(bus.read_word(0x0400_0208), 1);
    }

    #[test]
    fn test_if_byte_write_is_w1c_without_rmw() {
        let mut bus = bus_with_ram();
        bus.interrupt.request(InterruptFlags::VBLANK);
        bus.interrupt.request(InterruptFlags::DMA0);

        // Azzera solo il byte basso scritto: DMA0 (bit 8) deve sopravvivere
        bus.write_byte(0x0400_0202, 0x01);
        assert_eq!(bus.interrupt.if_, InterruptFlags::DMA0.bits());
    }

    #[test]
    fn test_bios_protected_after_fetch_outside() {
        let mut bus = Bus::new();
        bus.load_bios(vec![0xEA; 0x4000]);

        // Fetch dentro il BIOS: lettura reale e latch aggiornato
        let from_inside = bus.fetch_word(0x0000_0000);
        assert_eq!(from_inside, 0xEAEA_EAEA);

        // Fetch fuori, poi lettura dati dal BIOS: risponde il latch
        bus.last_fetch_addr = 0x0800_0000;
        bus.memory.bios_latch = 0x1122_3344;
        assert_eq!(bus.read_word(0x0000_0000), 0x1122_3344);
    }

    #[test]
    fn test_immediate_dma_copies_through_bus() {
        let mut bus = bus_with_ram();
        for i in 0..16u32 {
            bus.write_word(0x0200_0000 + i * 4, 0xCAFE_0000 | i);
        }

        // DMA0: src=0x02000000, dst=0x02001000, 16 word da 32 bit, immediato
        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0200_1000);
        bus.write_halfword(0x0400_00B8, 16);
        bus.write_halfword(0x0400_00BA, 0x8400); // enable + 32 bit

        for i in 0..16u32 {
            assert_eq!(bus.read_word(0x0200_1000 + i * 4), 0xCAFE_0000 | i);
        }

        // A fine burst l'enable è tornato basso
        assert_eq!(bus.read_halfword(0x0400_00BA) & 0x8000, 0);
        // E i cicli rubati sono contabilizzati
        assert_eq!(bus.take_stall_cycles(), 16 * 2 + 2);
    }

    #[test]
    fn test_dma_irq_on_end() {
        let mut bus = bus_with_ram();
        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0200_0100);
        bus.write_halfword(0x0400_00B8, 4);
        bus.write_halfword(0x0400_00BA, 0xC000); // enable + IRQ, 16 bit

        assert_eq!(bus.interrupt.if_ & InterruptFlags::DMA0.bits(), InterruptFlags::DMA0.bits());
    }

    #[test]
    fn test_vblank_dma_waits_for_trigger() {
        let mut bus = bus_with_ram();
        bus.write_word(0x0200_0000, 0x1234_5678);

        bus.write_word(0x0400_00BC, 0x0200_0000); // DMA1 src
        bus.write_word(0x0400_00C0, 0x0200_0200); // DMA1 dst
        bus.write_halfword(0x0400_00C4, 1);
        bus.write_halfword(0x0400_00C6, 0x9400); // enable + VBlank + 32 bit

        // Nessun trasferimento prima del trigger
        assert_eq!(bus.read_word(0x0200_0200), 0);

        bus.notify_vblank();
        assert_eq!(bus.read_word(0x0200_0200), 0x1234_5678);
    }

    #[test]
    fn test_unmapped_io_reads_zero() {
        let mut bus = bus_with_ram();
        assert_eq!(bus.read_halfword(0x0400_03F0), 0);
        // Oltre la finestra da 1 KiB
        assert_eq!(bus.read_halfword(0x0400_0800), 0);
    }
}
