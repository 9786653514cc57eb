//! Flash and PSRAM address space for a single node

use crate::error::{EmulatorError, Result};
use ncp_layout::{FLASH_BASE, FLASH_SIZE, PSRAM_BASE, PSRAM_SIZE};

/// Bootloader region within flash
pub const BOOTLOADER_SIZE: usize = 16 * 1024;
/// Application firmware region size within flash
pub const APP_FIRMWARE_SIZE: usize = 112 * 1024;
/// Address of the firmware staging buffer within flash
pub const FIRMWARE_BUFFER_ADDR: u32 = FLASH_BASE + 0x0002_0000;
/// Reserved PSRAM footprint below which bytes are not counted as free
const PSRAM_RESERVED: usize = 1024 * 1024;

/// Simulated flash + PSRAM address space, matching the node's real memory map.
pub struct Memory {
    flash: Vec<u8>,
    psram: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            flash: vec![0u8; FLASH_SIZE],
            psram: vec![0u8; PSRAM_SIZE],
        }
    }
}

impl Memory {
    /// Read `length` bytes starting at `addr`, from whichever region it falls in.
    pub fn read(&self, addr: u32, length: usize) -> Result<Vec<u8>> {
        let (region, base, size) = self.region_for(addr)?;
        let offset = (addr - base) as usize;
        if offset + length > size {
            return Err(EmulatorError::out_of_bounds(region, addr, length));
        }
        let slice = if region == "psram" { &self.psram } else { &self.flash };
        Ok(slice[offset..offset + length].to_vec())
    }

    /// Write `data` starting at `addr`. Both regions are writable in the
    /// emulator (real flash is not, but test injection needs it to be).
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<usize> {
        let (region, base, size) = self.region_for(addr)?;
        let offset = (addr - base) as usize;
        if offset + data.len() > size {
            return Err(EmulatorError::out_of_bounds(region, addr, data.len()));
        }
        let slice = if region == "psram" {
            &mut self.psram
        } else {
            &mut self.flash
        };
        slice[offset..offset + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    /// Approximate free PSRAM, matching the reserved-footprint convention
    /// the real firmware uses for its own bookkeeping.
    pub fn free_psram(&self) -> usize {
        self.psram.len().saturating_sub(PSRAM_RESERVED)
    }

    fn region_for(&self, addr: u32) -> Result<(&'static str, u32, usize)> {
        if addr >= PSRAM_BASE {
            Ok(("psram", PSRAM_BASE, self.psram.len()))
        } else if addr >= FLASH_BASE {
            Ok(("flash", FLASH_BASE, self.flash.len()))
        } else {
            Err(EmulatorError::InvalidAddress { addr })
        }
    }
}
