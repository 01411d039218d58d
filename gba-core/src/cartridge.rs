use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("Failed to load ROM: {0}")]
    LoadError(String),

    #[error("Invalid ROM size")]
    InvalidSize,

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Informazioni header ROM GBA
#[derive(Debug, Clone)]
pub struct RomHeader {
    pub title: String,
    pub game_code: String,
    pub maker_code: String,
    pub version: u8,
}

pub struct Cartridge {
    pub rom: Vec<u8>,
    pub header: RomHeader,
    pub rom_path: Option<PathBuf>,
}

impl Cartridge {
    /// Carica una ROM da file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let rom = fs::read(path.as_ref())?;
        let mut cartridge = Self::from_bytes(rom)?;
        cartridge.rom_path = Some(path.as_ref().to_path_buf());
        Ok(cartridge)
    }

    /// Costruisce una cartridge da byte grezzi (la ROM è opaca per il core)
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.len() < 0xC0 {
            return Err(CartridgeError::InvalidSize);
        }

        let header = Self::parse_header(&rom)?;

        Ok(Self {
            rom,
            header,
            rom_path: None,
        })
    }

    /// Parse dell'header ROM
    fn parse_header(rom: &[u8]) -> Result<RomHeader, CartridgeError> {
        // Title @ 0xA0-0xAB
        let title_bytes = &rom[0xA0..0xAC];
        let title = String::from_utf8_lossy(title_bytes)
            .trim_end_matches('\0')
            .to_string();

        // Game Code @ 0xAC-0xAF
        let game_code_bytes = &rom[0xAC..0xB0];
        let game_code = String::from_utf8_lossy(game_code_bytes).to_string();

        // Maker Code @ 0xB0-0xB1
        let maker_code_bytes = &rom[0xB0..0xB2];
        let maker_code = String::from_utf8_lossy(maker_code_bytes).to_string();

        // Version @ 0xBC
        let version = rom[0xBC];

        Ok(RomHeader {
            title,
            game_code,
            maker_code,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_parses_header() {
        let mut rom = vec![0u8; 0x100];
        rom[0xA0..0xA4].copy_from_slice(b"TEST");
        rom[0xAC..0xB0].copy_from_slice(b"ATST");
        rom[0xB0..0xB2].copy_from_slice(b"01");
        rom[0xBC] = 3;

        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.header.title, "TEST");
        assert_eq!(cart.header.game_code, "ATST");
        assert_eq!(cart.header.maker_code, "01");
        assert_eq!(cart.header.version, 3);
        assert!(cart.rom_path.is_none());
    }

    #[test]
    fn test_too_small_rom_is_rejected() {
        assert!(matches!(
            Cartridge::from_bytes(vec![0; 0x40]),
            Err(CartridgeError::InvalidSize)
        ));
    }
}
