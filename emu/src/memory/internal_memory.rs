//! Byte-array devices: BIOS, work RAMs, video memories and the cartridge ROM.

use crate::memory::io_device::IoDevice;

pub const BIOS_SIZE: usize = 0x4000;
pub const EWRAM_SIZE: usize = 0x4_0000;
pub const IWRAM_SIZE: usize = 0x8000;
pub const PALETTE_SIZE: usize = 0x400;
pub const VRAM_SIZE: usize = 0x1_8000;
pub const OAM_SIZE: usize = 0x400;

/// Largest cartridge image a single wait-state window can address.
pub const CARTRIDGE_WINDOW: u32 = 0x0200_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mirroring {
    /// The block repeats every `len` bytes.
    Repeat,
    /// 96 KB repeated every 128 KB, the last 32 KB folding onto the OBJ area.
    Vram,
    /// Repeats every 32 MB; reads past the image see the address bus.
    Cartridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteWrites {
    Direct,
    /// Byte written to both halves of the addressed halfword.
    Duplicate,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct InternalMemory {
    base: u32,
    data: Vec<u8>,
    writable: bool,
    mirroring: Mirroring,
    byte_writes: ByteWrites,
}

impl InternalMemory {
    #[must_use]
    pub fn ram(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
            writable: true,
            mirroring: Mirroring::Repeat,
            byte_writes: ByteWrites::Direct,
        }
    }

    /// Read-only image, zero padded up to `size`.
    #[must_use]
    pub fn rom(base: u32, mut image: Vec<u8>, size: usize) -> Self {
        if image.len() < size {
            image.resize(size, 0);
        }
        Self {
            base,
            data: image,
            writable: false,
            mirroring: Mirroring::Repeat,
            byte_writes: ByteWrites::Ignore,
        }
    }

    #[must_use]
    pub fn palette(base: u32) -> Self {
        Self {
            byte_writes: ByteWrites::Duplicate,
            ..Self::ram(base, PALETTE_SIZE)
        }
    }

    #[must_use]
    pub fn vram(base: u32) -> Self {
        Self {
            mirroring: Mirroring::Vram,
            byte_writes: ByteWrites::Duplicate,
            ..Self::ram(base, VRAM_SIZE)
        }
    }

    #[must_use]
    pub fn oam(base: u32) -> Self {
        Self {
            byte_writes: ByteWrites::Ignore,
            ..Self::ram(base, OAM_SIZE)
        }
    }

    #[must_use]
    pub fn cartridge(base: u32, mut image: Vec<u8>) -> Self {
        image.truncate(CARTRIDGE_WINDOW as usize);
        Self {
            base,
            data: image,
            writable: false,
            mirroring: Mirroring::Cartridge,
            byte_writes: ByteWrites::Ignore,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw contents, for loaders and debuggers.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn locate(&self, address: u32) -> Option<usize> {
        let offset = address.wrapping_sub(self.base);
        let index = match self.mirroring {
            Mirroring::Repeat => (offset as usize) % self.data.len().max(1),
            Mirroring::Vram => {
                let folded = offset & 0x1_FFFF;
                let folded = if folded >= 0x1_8000 {
                    folded - 0x8000
                } else {
                    folded
                };
                folded as usize
            }
            Mirroring::Cartridge => (offset & (CARTRIDGE_WINDOW - 1)) as usize,
        };
        (index < self.data.len()).then_some(index)
    }

    /// Value seen on the cartridge bus when reading past the image.
    const fn open_bus_half(address: u32) -> u16 {
        ((address >> 1) & 0xFFFF) as u16
    }
}

impl IoDevice for InternalMemory {
    fn read_8(&mut self, address: u32) -> Option<u8> {
        match self.locate(address) {
            Some(index) => Some(self.data[index]),
            None => Some(Self::open_bus_half(address).to_le_bytes()[(address & 1) as usize]),
        }
    }

    fn read_16(&mut self, address: u32) -> Option<u16> {
        match self.locate(address) {
            Some(index) if index + 1 < self.data.len() => Some(u16::from_le_bytes([
                self.data[index],
                self.data[index + 1],
            ])),
            Some(_) => None,
            None => Some(Self::open_bus_half(address)),
        }
    }

    fn read_32(&mut self, address: u32) -> Option<u32> {
        match self.locate(address) {
            Some(index) if index + 3 < self.data.len() => Some(u32::from_le_bytes([
                self.data[index],
                self.data[index + 1],
                self.data[index + 2],
                self.data[index + 3],
            ])),
            _ => None,
        }
    }

    fn write_8(&mut self, address: u32, value: u8) -> bool {
        if !self.writable {
            return true;
        }
        match (self.byte_writes, self.locate(address)) {
            (ByteWrites::Direct, Some(index)) => self.data[index] = value,
            (ByteWrites::Duplicate, Some(index)) => {
                let even = index & !1;
                self.data[even] = value;
                if let Some(odd) = self.data.get_mut(even + 1) {
                    *odd = value;
                }
            }
            _ => {}
        }
        true
    }

    fn write_16(&mut self, address: u32, value: u16) -> bool {
        if !self.writable {
            return true;
        }
        match self.locate(address) {
            Some(index) if index + 1 < self.data.len() => {
                self.data[index..index + 2].copy_from_slice(&value.to_le_bytes());
                true
            }
            _ => false,
        }
    }

    fn write_32(&mut self, address: u32, value: u32) -> bool {
        if !self.writable {
            return true;
        }
        match self.locate(address) {
            Some(index) if index + 3 < self.data.len() => {
                self.data[index..index + 4].copy_from_slice(&value.to_le_bytes());
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        if self.writable {
            self.data.fill(0);
        }
    }
}
