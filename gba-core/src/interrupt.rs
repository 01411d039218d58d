use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Sorgenti di interrupt (bit condivisi da IE e IF)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptFlags: u16 {
        const VBLANK  = 1 << 0;
        const HBLANK  = 1 << 1;
        const VCOUNT  = 1 << 2;
        const TIMER0  = 1 << 3;
        const TIMER1  = 1 << 4;
        const TIMER2  = 1 << 5;
        const TIMER3  = 1 << 6;
        const SERIAL  = 1 << 7;
        const DMA0    = 1 << 8;
        const DMA1    = 1 << 9;
        const DMA2    = 1 << 10;
        const DMA3    = 1 << 11;
        const KEYPAD  = 1 << 12;
        const GAMEPAK = 1 << 13;
    }
}

impl InterruptFlags {
    /// Flag del canale DMA indicato (0-3)
    pub fn dma(channel: usize) -> Self {
        InterruptFlags::from_bits_truncate(InterruptFlags::DMA0.bits() << channel)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptController {
    /// Interrupt Enable
    pub ie: u16,

    /// Interrupt Flags
    pub if_: u16,

    /// Interrupt Master Enable
    pub ime: bool,
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            ie: 0,
            if_: 0,
            ime: false,
        }
    }

    /// Richiedi un interrupt
    pub fn request(&mut self, flag: InterruptFlags) {
        self.if_ |= flag.bits();
    }

    /// Richiedi interrupt da un bitset grezzo (contratto verso l'host)
    pub fn request_raw(&mut self, bits: u16) {
        self.if_ |= bits & InterruptFlags::all().bits();
    }

    /// Scrittura su IF: write-1-to-clear
    pub fn write_if(&mut self, value: u16) {
        self.if_ &= !value;
    }

    /// Sorgenti pendenti e abilitate, ignorando IME (usato dal wake da HALT)
    pub fn raw_pending(&self) -> u16 {
        self.ie & self.if_
    }

    /// Verifica se c'è un interrupt da servire
    pub fn pending(&self) -> bool {
        self.ime && self.raw_pending() != 0
    }

    /// Acknowledge un interrupt
    pub fn acknowledge(&mut self, flag: InterruptFlags) {
        self.if_ &= !flag.bits();
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_requires_ime_and_ie() {
        let mut ic = InterruptController::new();
        ic.request(InterruptFlags::VBLANK);
        assert!(!ic.pending());

        ic.ie = InterruptFlags::VBLANK.bits();
        assert!(!ic.pending());
        assert_eq!(ic.raw_pending(), InterruptFlags::VBLANK.bits());

        ic.ime = true;
        assert!(ic.pending());
    }

    #[test]
    fn test_write_if_clears_only_written_bits() {
        let mut ic = InterruptController::new();
        ic.request(InterruptFlags::VBLANK | InterruptFlags::DMA0);

        ic.write_if(InterruptFlags::VBLANK.bits());
        assert_eq!(ic.if_, InterruptFlags::DMA0.bits());
    }

    #[test]
    fn test_dma_flag_per_channel() {
        assert_eq!(InterruptFlags::dma(0), InterruptFlags::DMA0);
        assert_eq!(InterruptFlags::dma(3), InterruptFlags::DMA3);
    }
}
