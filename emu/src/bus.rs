//! Address-space router.
//!
//! Every access goes through a flat table of mappings, each owning a
//! half-open address range, the device answering it and the timing of the
//! region. The last resolved mapping is kept as a single-slot cache since
//! instruction fetches and block transfers hit the same region back to back.
//!
//! Timed accessors (`read_*`/`write_*`) charge wait states into a pending
//! cycle accumulator drained by the CPU with [`Bus::take_cycles`]. Devices
//! answer the widths they natively support; the router splits words into
//! halfwords and halfwords into bytes for the rest.

use std::ops::Range;

use crate::cpu::hardware::dma::{DMA_BASE, DMA_END, Dma};
use crate::cpu::hardware::interrupt_control::{InterruptControl, WaitState};
use crate::cpu::hardware::timers::{TIMERS_BASE, TIMERS_END, Timers};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::memory::internal_memory::{
    BIOS_SIZE, EWRAM_SIZE, IWRAM_SIZE, InternalMemory,
};
use crate::memory::io_device::{AccessWidth, IoDevice};

pub const BIOS_BASE: u32 = 0x0000_0000;
pub const EWRAM_BASE: u32 = 0x0200_0000;
pub const IWRAM_BASE: u32 = 0x0300_0000;
pub const IO_BASE: u32 = 0x0400_0000;
pub const PALETTE_BASE: u32 = 0x0500_0000;
pub const VRAM_BASE: u32 = 0x0600_0000;
pub const OAM_BASE: u32 = 0x0700_0000;
pub const ROM_WS0_BASE: u32 = 0x0800_0000;
pub const ROM_WS1_BASE: u32 = 0x0A00_0000;
pub const ROM_WS2_BASE: u32 = 0x0C00_0000;
pub const SRAM_BASE: u32 = 0x0E00_0000;

const INTERRUPT_CONTROL_RANGE: Range<u32> = 0x0400_0200..0x0400_0210;
const POWER_CONTROL_RANGE: Range<u32> = 0x0400_0300..0x0400_0304;

/// Sequential bursts restart at every 128 KB boundary.
const SEQUENTIAL_BOUNDARY_MASK: u32 = 0x1_FFFF;

/// Value seen for every byte of an unmapped read.
const OPEN_BUS: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTiming {
    /// Cycles per byte, halfword and word access.
    Fixed { byte: u32, half_word: u32, word: u32 },
    /// Cartridge ROM, timed from WAITCNT.
    GamePak(WaitState),
    /// Backup storage, 8-bit bus timed from WAITCNT.
    Sram,
}

impl RegionTiming {
    const FAST: Self = Self::uniform(1);

    #[must_use]
    pub const fn uniform(cycles: u32) -> Self {
        Self::Fixed {
            byte: cycles,
            half_word: cycles,
            word: cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceSlot {
    Bios,
    Ewram,
    Iwram,
    Palette,
    Vram,
    Oam,
    Cartridge,
    InterruptControl,
    Dma,
    Timers,
    External(usize),
}

/// Handle of a device registered with [`Bus::register_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

#[derive(Debug, Clone, Copy)]
struct Mapping {
    name: &'static str,
    start: u32,
    end: u32,
    slot: DeviceSlot,
    timing: RegionTiming,
}

impl Mapping {
    const fn contains(&self, address: u32) -> bool {
        self.start <= address && address < self.end
    }

    const fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start < end && start < self.end
    }
}

pub struct Bus {
    bios: InternalMemory,
    ewram: InternalMemory,
    iwram: InternalMemory,
    palette: InternalMemory,
    vram: InternalMemory,
    oam: InternalMemory,
    cartridge: InternalMemory,

    pub interrupt_control: InterruptControl,
    pub dma: Dma,
    pub timers: Timers,
    external: Vec<Box<dyn IoDevice>>,

    mappings: Vec<Mapping>,
    last_hit: Option<usize>,
    last_access: Option<(u32, AccessWidth)>,
    /// Address the next access may treat as sequential after a pipeline refill.
    refill_continues_at: Option<u32>,
    pending_cycles: u32,

    pub diagnostics: Diagnostics,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Bus {
    #[must_use]
    pub fn new(bios: Vec<u8>, cartridge: Vec<u8>) -> Self {
        let mut bus = Self {
            bios: InternalMemory::rom(BIOS_BASE, bios, BIOS_SIZE),
            ewram: InternalMemory::ram(EWRAM_BASE, EWRAM_SIZE),
            iwram: InternalMemory::ram(IWRAM_BASE, IWRAM_SIZE),
            palette: InternalMemory::palette(PALETTE_BASE),
            vram: InternalMemory::vram(VRAM_BASE),
            oam: InternalMemory::oam(OAM_BASE),
            cartridge: InternalMemory::cartridge(ROM_WS0_BASE, cartridge),
            interrupt_control: InterruptControl::default(),
            dma: Dma::default(),
            timers: Timers::default(),
            external: Vec::new(),
            mappings: Vec::new(),
            last_hit: None,
            last_access: None,
            refill_continues_at: None,
            pending_cycles: 0,
            diagnostics: Diagnostics::default(),
        };

        let waits = |byte, half_word, word| RegionTiming::Fixed {
            byte,
            half_word,
            word,
        };
        let core = [
            ("bios", BIOS_BASE..BIOS_BASE + BIOS_SIZE as u32, DeviceSlot::Bios, RegionTiming::FAST),
            ("ewram", EWRAM_BASE..IWRAM_BASE, DeviceSlot::Ewram, waits(3, 3, 6)),
            ("iwram", IWRAM_BASE..IO_BASE, DeviceSlot::Iwram, RegionTiming::FAST),
            ("interrupt control", INTERRUPT_CONTROL_RANGE, DeviceSlot::InterruptControl, RegionTiming::FAST),
            ("power control", POWER_CONTROL_RANGE, DeviceSlot::InterruptControl, RegionTiming::FAST),
            ("dma", DMA_BASE..DMA_END, DeviceSlot::Dma, RegionTiming::FAST),
            ("timers", TIMERS_BASE..TIMERS_END, DeviceSlot::Timers, RegionTiming::FAST),
            ("palette", PALETTE_BASE..VRAM_BASE, DeviceSlot::Palette, waits(1, 1, 2)),
            ("vram", VRAM_BASE..OAM_BASE, DeviceSlot::Vram, waits(1, 1, 2)),
            ("oam", OAM_BASE..ROM_WS0_BASE, DeviceSlot::Oam, RegionTiming::FAST),
            ("rom ws0", ROM_WS0_BASE..ROM_WS1_BASE, DeviceSlot::Cartridge, RegionTiming::GamePak(WaitState::Ws0)),
            ("rom ws1", ROM_WS1_BASE..ROM_WS2_BASE, DeviceSlot::Cartridge, RegionTiming::GamePak(WaitState::Ws1)),
            ("rom ws2", ROM_WS2_BASE..SRAM_BASE, DeviceSlot::Cartridge, RegionTiming::GamePak(WaitState::Ws2)),
        ];
        for (name, range, slot, timing) in core {
            bus.map(name, range, slot, timing);
        }

        bus
    }

    fn map(&mut self, name: &'static str, range: Range<u32>, slot: DeviceSlot, timing: RegionTiming) {
        if let Some(existing) = self
            .mappings
            .iter()
            .find(|mapping| mapping.overlaps(range.start, range.end))
        {
            let existing = existing.name;
            self.diagnostics.record(Diagnostic::DeviceOverlap {
                name,
                start: range.start,
                end: range.end,
                existing,
            });
        }

        tracing::debug!(
            "mapped {name} at [0x{:08X}, 0x{:08X})",
            range.start,
            range.end
        );
        self.mappings.push(Mapping {
            name,
            start: range.start,
            end: range.end,
            slot,
            timing,
        });
    }

    /// Maps an external peripheral. Overlapping an existing mapping is
    /// reported but accepted; the earlier mapping keeps answering the
    /// shared addresses.
    pub fn register_device(
        &mut self,
        name: &'static str,
        range: Range<u32>,
        timing: RegionTiming,
        device: Box<dyn IoDevice>,
    ) -> DeviceId {
        let idx = self.external.len();
        self.external.push(device);
        self.map(name, range, DeviceSlot::External(idx), timing);
        DeviceId(idx)
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut dyn IoDevice> {
        Some(self.external.get_mut(id.0)?.as_mut())
    }

    fn device(&mut self, slot: DeviceSlot) -> Option<&mut dyn IoDevice> {
        let device: &mut dyn IoDevice = match slot {
            DeviceSlot::Bios => &mut self.bios,
            DeviceSlot::Ewram => &mut self.ewram,
            DeviceSlot::Iwram => &mut self.iwram,
            DeviceSlot::Palette => &mut self.palette,
            DeviceSlot::Vram => &mut self.vram,
            DeviceSlot::Oam => &mut self.oam,
            DeviceSlot::Cartridge => &mut self.cartridge,
            DeviceSlot::InterruptControl => &mut self.interrupt_control,
            DeviceSlot::Dma => &mut self.dma,
            DeviceSlot::Timers => &mut self.timers,
            DeviceSlot::External(idx) => self.external.get_mut(idx)?.as_mut(),
        };
        Some(device)
    }

    fn resolve(&mut self, address: u32) -> Option<Mapping> {
        if let Some(mapping) = self.last_hit.map(|idx| self.mappings[idx]) {
            if mapping.contains(address) {
                return Some(mapping);
            }
        }

        let idx = self
            .mappings
            .iter()
            .position(|mapping| mapping.contains(address))?;
        self.last_hit = Some(idx);
        Some(self.mappings[idx])
    }

    fn is_sequential(&self, address: u32) -> bool {
        if self.refill_continues_at == Some(address) {
            return true;
        }
        let continues = self
            .last_access
            .is_some_and(|(previous, width)| previous.wrapping_add(width.bytes()) == address);
        continues && address & SEQUENTIAL_BOUNDARY_MASK != 0
    }

    /// Cycles an access of `width` at `address` would take.
    pub fn access_cycles(&mut self, address: u32, width: AccessWidth, sequential: bool) -> u32 {
        let Some(mapping) = self.resolve(address) else {
            return 1;
        };

        match mapping.timing {
            RegionTiming::Fixed {
                byte,
                half_word,
                word,
            } => match width {
                AccessWidth::Byte => byte,
                AccessWidth::HalfWord => half_word,
                AccessWidth::Word => word,
            },
            RegionTiming::GamePak(window) => {
                let (first, second) = self.interrupt_control.rom_wait(window);
                let half = 1 + if sequential { second } else { first };
                match width {
                    AccessWidth::Word => half + 1 + second,
                    _ => half,
                }
            }
            RegionTiming::Sram => 1 + self.interrupt_control.sram_wait(),
        }
    }

    fn charge(&mut self, address: u32, width: AccessWidth) {
        let sequential = self.is_sequential(address);
        self.pending_cycles += self.access_cycles(address, width, sequential);
        self.last_access = Some((address, width));
        self.refill_continues_at = None;
    }

    /// Marks `address` as continuing a fetch run that was already charged
    /// (the N+S pipeline refill), so its next fetch is sequential even on a
    /// 128 KB boundary.
    pub const fn continue_refill_at(&mut self, address: u32) {
        self.refill_continues_at = Some(address);
    }

    /// Internal cycles with no bus activity.
    pub const fn idle(&mut self, cycles: u32) {
        self.pending_cycles += cycles;
    }

    /// Drains the cycles accumulated since the last call.
    pub const fn take_cycles(&mut self) -> u32 {
        let cycles = self.pending_cycles;
        self.pending_cycles = 0;
        cycles
    }

    /// Advances the cycle-driven devices.
    pub fn tick(&mut self, cycles: u32) {
        self.timers.step(cycles, &mut self.interrupt_control);
    }

    pub fn read_8(&mut self, address: u32) -> u8 {
        self.charge(address, AccessWidth::Byte);
        self.load_8(address)
    }

    pub fn read_16(&mut self, address: u32) -> u16 {
        let address = address & !1;
        self.charge(address, AccessWidth::HalfWord);
        self.load_16(address)
    }

    pub fn read_32(&mut self, address: u32) -> u32 {
        let address = address & !3;
        self.charge(address, AccessWidth::Word);
        self.load_32(address)
    }

    pub fn write_8(&mut self, address: u32, value: u8) {
        self.charge(address, AccessWidth::Byte);
        self.store_8(address, value);
    }

    pub fn write_16(&mut self, address: u32, value: u16) {
        let address = address & !1;
        self.charge(address, AccessWidth::HalfWord);
        self.store_16(address, value);
    }

    pub fn write_32(&mut self, address: u32, value: u32) {
        let address = address & !3;
        self.charge(address, AccessWidth::Word);
        self.store_32(address, value);
    }

    fn load_8(&mut self, address: u32) -> u8 {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_read(address, AccessWidth::Byte);
            return OPEN_BUS;
        };

        match self.device(mapping.slot).and_then(|device| device.read_8(address)) {
            Some(value) => value,
            None => {
                self.diagnostics.record(Diagnostic::UnsupportedWidth {
                    device: mapping.name,
                    address,
                    width: AccessWidth::Byte,
                });
                OPEN_BUS
            }
        }
    }

    fn load_16(&mut self, address: u32) -> u16 {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_read(address, AccessWidth::HalfWord);
            return u16::from_le_bytes([OPEN_BUS; 2]);
        };

        if let Some(value) = self.device(mapping.slot).and_then(|device| device.read_16(address)) {
            return value;
        }
        u16::from_le_bytes([self.load_8(address), self.load_8(address + 1)])
    }

    fn load_32(&mut self, address: u32) -> u32 {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_read(address, AccessWidth::Word);
            return u32::from_le_bytes([OPEN_BUS; 4]);
        };

        if let Some(value) = self.device(mapping.slot).and_then(|device| device.read_32(address)) {
            return value;
        }
        u32::from(self.load_16(address)) | (u32::from(self.load_16(address + 2)) << 16)
    }

    fn store_8(&mut self, address: u32, value: u8) {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_write(address, AccessWidth::Byte, value.into());
            return;
        };

        let handled = self
            .device(mapping.slot)
            .is_some_and(|device| device.write_8(address, value));
        if !handled {
            self.diagnostics.record(Diagnostic::UnsupportedWidth {
                device: mapping.name,
                address,
                width: AccessWidth::Byte,
            });
        }
    }

    fn store_16(&mut self, address: u32, value: u16) {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_write(address, AccessWidth::HalfWord, value.into());
            return;
        };

        if self
            .device(mapping.slot)
            .is_some_and(|device| device.write_16(address, value))
        {
            return;
        }
        let [low, high] = value.to_le_bytes();
        self.store_8(address, low);
        self.store_8(address + 1, high);
    }

    fn store_32(&mut self, address: u32, value: u32) {
        let Some(mapping) = self.resolve(address) else {
            self.unmapped_write(address, AccessWidth::Word, value);
            return;
        };

        if self
            .device(mapping.slot)
            .is_some_and(|device| device.write_32(address, value))
        {
            return;
        }
        self.store_16(address, value as u16);
        self.store_16(address + 2, (value >> 16) as u16);
    }

    fn unmapped_read(&mut self, address: u32, width: AccessWidth) {
        self.diagnostics
            .record(Diagnostic::UnmappedRead { address, width });
    }

    fn unmapped_write(&mut self, address: u32, width: AccessWidth, value: u32) {
        self.diagnostics.record(Diagnostic::UnmappedWrite {
            address,
            width,
            value,
        });
    }

    /// Power-on state for RAM and registers. ROM images are kept.
    pub fn reset(&mut self) {
        for memory in [
            &mut self.bios,
            &mut self.ewram,
            &mut self.iwram,
            &mut self.palette,
            &mut self.vram,
            &mut self.oam,
            &mut self.cartridge,
        ] {
            memory.reset();
        }
        self.interrupt_control.reset();
        self.dma.reset();
        self.timers.reset();
        for device in &mut self.external {
            device.reset();
        }

        self.last_access = None;
        self.refill_continues_at = None;
        self.pending_cycles = 0;
    }
}
