use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeError};
use gba_arm7tdmi::ARM7TDMI;
use thiserror::Error;

//==============================================================================
// EMULATORE GBA - COMPONENTE PRINCIPALE
//==============================================================================
// Questo è il "cervello" che coordina tutti i componenti:
// - CPU (ARM7TDMI)
// - Bus di sistema (memoria, I/O, DMA, interrupt)
//
// CONTRATTO VERSO L'HOST:
// - run_for(cicli): esegue istruzioni (e i burst DMA che scatenano) finché
//   il budget di cicli non è consumato, poi ritorna
// - raise_irq(bit): OR nel registro IF; il core campiona al prossimo
//   confine di istruzione
// - notify_vblank/notify_hblank/notify_fifo_*: fronti degli eventi PPU e
//   audio, usati come trigger DMA
// - read_register/write_register/read_cpsr: superficie per il debugger
//
// Gli errori verso l'host sono tipizzati e non mutano lo stato del core;
// i fault del guest (istruzioni undefined, SWI) restano dentro
// all'emulazione come cambi di modalità hardware-equivalenti.
//==============================================================================

/// Errori di uso scorretto dell'API da parte dell'host
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EmulatorError {
    #[error("Invalid register index: {0} (valid: 0-15)")]
    InvalidRegister(usize),

    #[error("No ROM loaded")]
    NoRomLoaded,
}

/// Emulatore GBA principale
///
/// Coordina CPU, memoria e tutti i componenti del sistema
pub struct GbaEmulator {
    pub cpu: ARM7TDMI,
    pub bus: Bus,
    rom_loaded: bool,
}

impl GbaEmulator {
    pub fn new() -> Self {
        Self {
            cpu: ARM7TDMI::new(),
            bus: Bus::new(),
            rom_loaded: false,
        }
    }

    /// Costruisce un core pronto a partire: BIOS e ROM come byte opachi
    pub fn init(bios: Vec<u8>, rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let mut emulator = Self::new();
        emulator.load_bios(bios);
        emulator.load_cartridge(Cartridge::from_bytes(rom)?);
        emulator.reset();
        Ok(emulator)
    }

    /// Carica un BIOS
    pub fn load_bios(&mut self, bios: Vec<u8>) {
        self.bus.load_bios(bios);
    }

    /// Carica una cartridge
    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        log::info!("Loading ROM: {}", cartridge.header.title);
        log::info!("Game Code: {}", cartridge.header.game_code);
        log::info!("Maker Code: {}", cartridge.header.maker_code);
        log::info!("Version: {}", cartridge.header.version);

        self.bus.load_rom(cartridge.rom);
        self.rom_loaded = true;
    }

    /// Reset dell'emulatore: PC all'entry della cartridge, modalità System,
    /// stato ARM, registri azzerati
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.regs.set_pc(0x0800_0000);
    }

    /// Campiona gli interrupt al confine di istruzione
    fn poll_interrupts(&mut self) {
        // IE & IF sveglia la CPU dall'HALT anche con IME spento
        if self.bus.interrupt.raw_pending() != 0 {
            self.cpu.halted = false;
        }
        if self.bus.interrupt.pending() {
            self.cpu.request_interrupt(&mut self.bus);
        }
    }

    /// Esegue finché il budget di cicli non è consumato
    ///
    /// I burst DMA scatenati dalle istruzioni sono atomici e i loro cicli
    /// rubati finiscono nello stesso budget. Ritorna i cicli effettivi.
    pub fn run_for(&mut self, cycles: u64) -> Result<u64, EmulatorError> {
        if !self.rom_loaded {
            return Err(EmulatorError::NoRomLoaded);
        }

        let mut executed: u64 = 0;

        while executed < cycles {
            self.poll_interrupts();

            executed += self.cpu.step(&mut self.bus) as u64;
            executed += self.bus.take_stall_cycles() as u64;

            if self.bus.take_halt_request() {
                self.cpu.halted = true;
            }
        }

        Ok(executed)
    }

    //==========================================================================
    // SUPERFICIE PER IL DEBUGGER
    //==========================================================================

    /// Leggi un registro visibile (R0-R15)
    pub fn read_register(&self, index: usize) -> Result<u32, EmulatorError> {
        if index >= 16 {
            return Err(EmulatorError::InvalidRegister(index));
        }
        Ok(self.cpu.regs.r[index])
    }

    /// Scrivi un registro visibile (R0-R15)
    pub fn write_register(&mut self, index: usize, value: u32) -> Result<(), EmulatorError> {
        if index >= 16 {
            return Err(EmulatorError::InvalidRegister(index));
        }
        self.cpu.regs.r[index] = value;
        Ok(())
    }

    /// Leggi il CPSR corrente
    pub fn read_cpsr(&self) -> u32 {
        self.cpu.regs.cpsr
    }

    //==========================================================================
    // LINEE DI INTERRUPT E HOOK DEI COLLABORATORI
    //==========================================================================

    /// OR del bitset nel registro IF; campionato al prossimo confine
    pub fn raise_irq(&mut self, source_bits: u16) {
        self.bus.interrupt.request_raw(source_bits);
    }

    /// Fronte di salita del VBlank (dal PPU)
    pub fn notify_vblank(&mut self) {
        self.bus.notify_vblank();
    }

    /// Fronte di salita dell'HBlank (dal PPU)
    pub fn notify_hblank(&mut self) {
        self.bus.notify_hblank();
    }

    /// FIFO audio A drenata (dall'APU)
    pub fn notify_fifo_a(&mut self) {
        self.bus.notify_fifo_a();
    }

    /// FIFO audio B drenata (dall'APU)
    pub fn notify_fifo_b(&mut self) {
        self.bus.notify_fifo_b();
    }

    /// Trigger di cattura video per il DMA3
    pub fn notify_video_capture(&mut self) {
        self.bus.notify_video_capture();
    }

    /// Avanza il contatore verticale (dal PPU)
    pub fn set_vcount(&mut self, line: u8) {
        self.bus.set_vcount(line);
    }

    /// Ottieni riferimento mutabile all'input controller
    pub fn input_mut(&mut self) -> &mut crate::input::InputController {
        &mut self.bus.input
    }
}

impl Default for GbaEmulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_code(words: &[u32]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x100.max(words.len() * 4)];
        for (i, word) in words.iter().enumerate() {
            rom[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        rom
    }

    #[test]
    fn test_run_without_rom_is_typed_error() {
        let mut emulator = GbaEmulator::new();
        assert_eq!(emulator.run_for(100), Err(EmulatorError::NoRomLoaded));
    }

    #[test]
    fn test_invalid_register_index() {
        let mut emulator = GbaEmulator::new();
        assert_eq!(
            emulator.read_register(16),
            Err(EmulatorError::InvalidRegister(16))
        );
        assert_eq!(
            emulator.write_register(99, 0),
            Err(EmulatorError::InvalidRegister(99))
        );
        // Lo stato non è stato toccato
        assert_eq!(emulator.read_register(0), Ok(0));
    }

    #[test]
    fn test_reset_state() {
        let rom = rom_with_code(&[0xE3A0_0001]);
        let emulator = GbaEmulator::init(Vec::new(), rom).unwrap();

        assert_eq!(emulator.cpu.regs.pc(), 0x0800_0000);
        // Modalità System, stato ARM
        assert_eq!(emulator.read_cpsr() & 0x1F, 0b11111);
        assert_eq!(emulator.read_cpsr() & (1 << 5), 0);
    }

    #[test]
    fn test_run_for_consumes_at_least_budget() {
        // B . (loop infinito)
        let rom = rom_with_code(&[0xEAFF_FFFE]);
        let mut emulator = GbaEmulator::init(Vec::new(), rom).unwrap();

        let executed = emulator.run_for(100).unwrap();
        assert!(executed >= 100);
    }

    #[test]
    fn test_haltcnt_parks_cpu() {
        // STRB r0, [r1] su HALTCNT (0x04000301), poi loop
        let rom = rom_with_code(&[
            0xE3A0_1301, // MOV r1, #0x04000000 (imm 0x04 ror 6... vedi sotto)
            0xE281_1C03, // ADD r1, r1, #0x300
            0xE281_1001, // ADD r1, r1, #1
            0xE3A0_0000, // MOV r0, #0
            0xE5C1_0000, // STRB r0, [r1]
            0xEAFF_FFFE, // B .
        ]);
        let mut emulator = GbaEmulator::init(Vec::new(), rom).unwrap();

        emulator.run_for(40).unwrap();
        assert!(emulator.cpu.halted);

        // Un interrupt abilitato sveglia la CPU
        emulator.bus.interrupt.ie = 1;
        emulator.raise_irq(1);
        emulator.run_for(4).unwrap();
        assert!(!emulator.cpu.halted);
    }
}
