pub mod bus;
pub mod cartridge;
pub mod dma;
mod dma_impl;
#[cfg(test)]
mod dma_tests;
pub mod emulator;
pub mod input;
pub mod interrupt;
pub mod io;
pub mod memory;

pub use bus::Bus;
pub use cartridge::Cartridge;
pub use emulator::{EmulatorError, GbaEmulator};
pub use input::InputController;
