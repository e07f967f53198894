//! DMA engine (0x0400_00B0 - 0x0400_00DF).
//!
//! Four channels laid out 12 bytes apart:
//!
//! ```text
//! +0  SAD    source address (write-only)
//! +4  DAD    destination address (write-only)
//! +8  CNT_L  unit count, 0 means the channel maximum (write-only)
//! +10 CNT_H  control
//!            bits 5-6   destination step: inc, dec, fixed, inc+reload
//!            bits 7-8   source step: inc, dec, fixed, (prohibited)
//!            bit  9     repeat
//!            bit  10    32-bit units
//!            bit  11    game pak DRQ (channel 3 only)
//!            bits 12-13 start timing: immediate, vblank, hblank, special
//!            bit  14    IRQ on completion
//!            bit  15    enable
//! ```
//!
//! Enabling a channel latches SAD/DAD/CNT_L into internal copies, so software
//! can rewrite the registers while a transfer is running. A running channel
//! owns the bus: the CPU does not execute until every active channel is done,
//! and the lowest-numbered active channel always moves the next unit.

use crate::bus::Bus;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::memory::io_device::{AccessWidth, IoDevice};
use crate::memory::io_registers::{IoRegister, IoRegisterAccessControl};

pub const DMA_BASE: u32 = 0x0400_00B0;
pub const DMA_END: u32 = 0x0400_00E0;
const CHANNEL_STRIDE: u32 = 12;

const SRC_MASK: [u32; 4] = [0x07FF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF];
const DST_MASK: [u32; 4] = [0x07FF_FFFF, 0x07FF_FFFF, 0x07FF_FFFF, 0x0FFF_FFFF];
const COUNT_MASK: [u32; 4] = [0x3FFF, 0x3FFF, 0x3FFF, 0xFFFF];
const CONTROL_MASK: [u32; 4] = [0xF7E0, 0xF7E0, 0xF7E0, 0xFFE0];

const CONTROL_REPEAT: u32 = 1 << 9;
const CONTROL_WORD: u32 = 1 << 10;
const CONTROL_IRQ: u32 = 1 << 14;
const CONTROL_ENABLE: u32 = 1 << 15;

/// Units moved by one sound FIFO request.
const FIFO_UNITS: u32 = 4;

/// Internal cycles spent before the first unit of a run.
const STARTUP_CYCLES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    IncrementReload,
}

impl From<u32> for AddressControl {
    fn from(value: u32) -> Self {
        match value & 3 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            _ => Self::IncrementReload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTiming {
    Immediate,
    VBlank,
    HBlank,
    Special,
}

impl From<u32> for DmaTiming {
    fn from(value: u32) -> Self {
        match value & 3 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

/// One unit to move, computed before touching the bus.
#[derive(Debug, Clone, Copy)]
pub struct DmaUnit {
    pub channel: usize,
    pub source: u32,
    pub destination: u32,
    pub width: AccessWidth,
    pub first: bool,
}

struct DmaChannel {
    source: IoRegister,
    destination: IoRegister,
    count: IoRegister,
    control: IoRegister,

    internal_source: u32,
    internal_destination: u32,
    remaining: u32,
    active: bool,
    started: bool,
    fifo: bool,
}

impl DmaChannel {
    fn new(idx: usize) -> Self {
        use IoRegisterAccessControl::{ReadWrite, Write};

        Self {
            source: IoRegister::new(AccessWidth::Word, Write).with_mask(SRC_MASK[idx]),
            destination: IoRegister::new(AccessWidth::Word, Write).with_mask(DST_MASK[idx]),
            count: IoRegister::new(AccessWidth::HalfWord, Write).with_mask(COUNT_MASK[idx]),
            control: IoRegister::new(AccessWidth::HalfWord, ReadWrite)
                .with_mask(CONTROL_MASK[idx]),
            internal_source: 0,
            internal_destination: 0,
            remaining: 0,
            active: false,
            started: false,
            fifo: false,
        }
    }

    const fn enabled(&self) -> bool {
        self.control.value() & CONTROL_ENABLE != 0
    }

    fn timing(&self) -> DmaTiming {
        DmaTiming::from(self.control.value() >> 12)
    }

    fn source_control(&self) -> AddressControl {
        AddressControl::from(self.control.value() >> 7)
    }

    fn destination_control(&self) -> AddressControl {
        AddressControl::from(self.control.value() >> 5)
    }

    const fn unit_width(&self) -> AccessWidth {
        if self.fifo || self.control.value() & CONTROL_WORD != 0 {
            AccessWidth::Word
        } else {
            AccessWidth::HalfWord
        }
    }

    /// Count register value, with 0 standing for the channel maximum.
    const fn latched_count(&self, idx: usize) -> u32 {
        match self.count.value() {
            0 => COUNT_MASK[idx] + 1,
            count => count,
        }
    }

    fn start(&mut self, idx: usize, fifo: bool) {
        self.fifo = fifo;
        self.remaining = if fifo {
            FIFO_UNITS
        } else {
            self.latched_count(idx)
        };
        self.active = true;
        self.started = false;
        tracing::debug!(
            "dma {idx} start: 0x{:08X} -> 0x{:08X}, {} units of {}",
            self.internal_source,
            self.internal_destination,
            self.remaining,
            self.unit_width()
        );
    }

    fn step(address: u32, control: AddressControl, bytes: u32) -> u32 {
        match control {
            AddressControl::Increment | AddressControl::IncrementReload => {
                address.wrapping_add(bytes)
            }
            AddressControl::Decrement => address.wrapping_sub(bytes),
            AddressControl::Fixed => address,
        }
    }

    /// Moves the internal pointers past the unit just transferred.
    /// Returns true when the run is over.
    fn advance(&mut self) -> bool {
        let bytes = self.unit_width().bytes();

        let source_control = match self.internal_source {
            0x0800_0000..=0x0DFF_FFFF => AddressControl::Increment,
            _ => self.source_control(),
        };
        let destination_control = if self.fifo {
            AddressControl::Fixed
        } else {
            self.destination_control()
        };

        self.internal_source = Self::step(self.internal_source, source_control, bytes);
        self.internal_destination =
            Self::step(self.internal_destination, destination_control, bytes);
        self.remaining -= 1;
        self.remaining == 0
    }

    /// End of a run. Returns whether the completion IRQ should fire.
    fn finish(&mut self, idx: usize) -> bool {
        self.active = false;
        self.fifo = false;

        let control = self.control.value();
        if control & CONTROL_REPEAT != 0 && self.timing() != DmaTiming::Immediate {
            if self.destination_control() == AddressControl::IncrementReload {
                self.internal_destination = self.destination.value();
            }
        } else {
            self.control.set_value(control & !CONTROL_ENABLE);
        }

        tracing::debug!("dma {idx} finished");
        control & CONTROL_IRQ != 0
    }
}

pub struct Dma {
    channels: [DmaChannel; 4],
}

impl Default for Dma {
    fn default() -> Self {
        Self {
            channels: std::array::from_fn(DmaChannel::new),
        }
    }
}

impl Dma {
    /// Lowest-numbered channel with a transfer in flight.
    #[must_use]
    pub fn active_channel(&self) -> Option<usize> {
        self.channels.iter().position(|channel| channel.active)
    }

    #[must_use]
    pub fn is_active(&self, idx: usize) -> bool {
        self.channels[idx].active
    }

    /// Units left in the current run of channel `idx`.
    #[must_use]
    pub fn remaining(&self, idx: usize) -> u32 {
        self.channels[idx].remaining
    }

    /// Starts every enabled, idle channel waiting for `timing`.
    pub fn trigger(&mut self, timing: DmaTiming) {
        for (idx, channel) in self.channels.iter_mut().enumerate() {
            if channel.enabled() && !channel.active && channel.timing() == timing {
                channel.start(idx, false);
            }
        }
    }

    /// Peripheral request on a channel configured for special timing:
    /// sound FIFO refills on channels 1 and 2, video capture on channel 3.
    pub fn special_request(&mut self, idx: usize) {
        let Some(channel) = self.channels.get_mut(idx) else {
            return;
        };
        if idx == 0
            || !channel.enabled()
            || channel.active
            || channel.timing() != DmaTiming::Special
        {
            return;
        }
        channel.start(idx, idx != 3);
    }

    /// Next unit of the highest-priority active channel.
    #[must_use]
    pub fn next_unit(&self) -> Option<DmaUnit> {
        let idx = self.active_channel()?;
        let channel = &self.channels[idx];
        let width = channel.unit_width();
        let align = !(width.bytes() - 1);

        Some(DmaUnit {
            channel: idx,
            source: channel.internal_source & align,
            destination: channel.internal_destination & align,
            width,
            first: !channel.started,
        })
    }

    /// Books a transferred unit. Returns the completion interrupt, if any.
    pub fn complete_unit(&mut self, idx: usize) -> Option<Interrupt> {
        let channel = &mut self.channels[idx];
        channel.started = true;
        if channel.advance() && channel.finish(idx) {
            Some(Interrupt::dma(idx))
        } else {
            None
        }
    }

    fn write_control(&mut self, idx: usize, byte: u8, value: u8) {
        let channel = &mut self.channels[idx];
        let was_enabled = channel.enabled();
        channel.control.write_byte(byte, value);

        if !channel.enabled() {
            channel.active = false;
            return;
        }
        if !was_enabled {
            channel.internal_source = channel.source.value();
            channel.internal_destination = channel.destination.value();
            if channel.timing() == DmaTiming::Immediate {
                channel.start(idx, false);
            }
        }
    }

    const fn locate(address: u32) -> Option<(usize, u32)> {
        if address < DMA_BASE || address >= DMA_END {
            return None;
        }
        let offset = address - DMA_BASE;
        Some((
            (offset / CHANNEL_STRIDE) as usize,
            offset % CHANNEL_STRIDE,
        ))
    }
}

impl IoDevice for Dma {
    fn read_8(&mut self, address: u32) -> Option<u8> {
        let (idx, offset) = Self::locate(address)?;
        let channel = &self.channels[idx];
        Some(match offset {
            0..=3 => channel.source.read_byte(offset as u8),
            4..=7 => channel.destination.read_byte((offset - 4) as u8),
            8..=9 => channel.count.read_byte((offset - 8) as u8),
            _ => channel.control.read_byte((offset - 10) as u8),
        })
    }

    fn write_8(&mut self, address: u32, value: u8) -> bool {
        let Some((idx, offset)) = Self::locate(address) else {
            return false;
        };
        let channel = &mut self.channels[idx];
        match offset {
            0..=3 => channel.source.write_byte(offset as u8, value),
            4..=7 => channel.destination.write_byte((offset - 4) as u8, value),
            8..=9 => channel.count.write_byte((offset - 8) as u8, value),
            _ => self.write_control(idx, (offset - 10) as u8, value),
        }
        true
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Bus {
    /// Moves one unit for the highest-priority active channel.
    /// `None` when no channel is active, otherwise the cycles consumed.
    pub fn step_dma(&mut self) -> Option<u32> {
        let unit = self.dma.next_unit()?;
        if unit.first {
            self.idle(STARTUP_CYCLES);
        }

        match unit.width {
            AccessWidth::Word => {
                let value = self.read_32(unit.source);
                self.write_32(unit.destination, value);
            }
            _ => {
                let value = self.read_16(unit.source);
                self.write_16(unit.destination, value);
            }
        }

        if let Some(interrupt) = self.dma.complete_unit(unit.channel) {
            self.interrupt_control.request(interrupt);
        }
        Some(self.take_cycles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::interrupt_control::IF_ADDRESS;
    use pretty_assertions::assert_eq;

    const EWRAM: u32 = 0x0200_0000;
    const IWRAM: u32 = 0x0300_0000;

    fn channel_base(idx: u32) -> u32 {
        DMA_BASE + idx * CHANNEL_STRIDE
    }

    fn program(bus: &mut Bus, idx: u32, source: u32, destination: u32, count: u16, control: u16) {
        let base = channel_base(idx);
        bus.write_32(base, source);
        bus.write_32(base + 4, destination);
        bus.write_16(base + 8, count);
        bus.write_16(base + 10, control);
    }

    fn run_to_completion(bus: &mut Bus) -> u32 {
        let mut units = 0;
        while bus.step_dma().is_some() {
            units += 1;
        }
        units
    }

    #[test]
    fn immediate_copy_halfwords() {
        let mut bus = Bus::default();
        for i in 0..4 {
            bus.write_16(EWRAM + i * 2, 0x1111 * (i as u16 + 1));
        }

        program(&mut bus, 3, EWRAM, IWRAM, 4, 0x8000);
        assert_eq!(run_to_completion(&mut bus), 4);

        for i in 0..4 {
            assert_eq!(bus.read_16(IWRAM + i * 2), 0x1111 * (i as u16 + 1));
        }
        assert_eq!(bus.read_16(channel_base(3) + 10), 0);
    }

    #[test]
    fn zero_count_means_maximum() {
        let mut bus = Bus::default();
        program(&mut bus, 0, EWRAM, IWRAM, 0, 0x8100);
        assert_eq!(bus.dma.remaining(0), 0x4000);
        assert_eq!(run_to_completion(&mut bus), 16384);

        program(&mut bus, 3, EWRAM, IWRAM, 0, 0x8100);
        assert_eq!(run_to_completion(&mut bus), 65536);
    }

    #[test]
    fn decrementing_word_copy() {
        let mut bus = Bus::default();
        bus.write_32(EWRAM + 4, 0xAAAA_AAAA);
        bus.write_32(EWRAM, 0xBBBB_BBBB);

        // dest decrement, source decrement, 32-bit
        program(&mut bus, 1, EWRAM + 4, IWRAM + 4, 2, 0x8000 | 0x0400 | 0x0080 | 0x0020);
        run_to_completion(&mut bus);

        assert_eq!(bus.read_32(IWRAM + 4), 0xAAAA_AAAA);
        assert_eq!(bus.read_32(IWRAM), 0xBBBB_BBBB);
    }

    #[test]
    fn fixed_source_fills() {
        let mut bus = Bus::default();
        bus.write_32(EWRAM, 0x1234_5678);
        program(&mut bus, 3, EWRAM, IWRAM, 3, 0x8000 | 0x0400 | 0x0100);
        run_to_completion(&mut bus);

        for i in 0..3 {
            assert_eq!(bus.read_32(IWRAM + i * 4), 0x1234_5678);
        }
    }

    #[test]
    fn completion_raises_irq() {
        let mut bus = Bus::default();
        program(&mut bus, 2, EWRAM, IWRAM, 1, 0xC000);
        run_to_completion(&mut bus);

        assert_eq!(bus.read_16(IF_ADDRESS), Interrupt::Dma2.mask());
    }

    #[test]
    fn repeat_waits_for_next_event_and_reloads_destination() {
        let mut bus = Bus::default();
        bus.write_16(EWRAM, 0xBEEF);
        bus.write_16(EWRAM + 2, 0xCAFE);

        // hblank, repeat, dest inc+reload
        program(&mut bus, 0, EWRAM, IWRAM, 1, 0x8000 | 0x2000 | 0x0200 | 0x0060);
        assert_eq!(bus.step_dma(), None);

        bus.dma.trigger(DmaTiming::HBlank);
        assert_eq!(run_to_completion(&mut bus), 1);
        assert_eq!(bus.read_16(channel_base(0) + 10) & 0x8000, 0x8000);

        bus.dma.trigger(DmaTiming::HBlank);
        run_to_completion(&mut bus);
        // Destination reloaded, source kept going.
        assert_eq!(bus.read_16(IWRAM), 0xCAFE);
        assert_eq!(bus.read_16(IWRAM + 2), 0);
    }

    #[test]
    fn lower_channel_runs_first() {
        let mut bus = Bus::default();
        program(&mut bus, 3, EWRAM, IWRAM, 2, 0x8000 | 0x1000);
        program(&mut bus, 1, EWRAM, IWRAM + 0x100, 2, 0x8000 | 0x1000);
        bus.dma.trigger(DmaTiming::VBlank);

        assert_eq!(bus.dma.next_unit().map(|unit| unit.channel), Some(1));
        bus.step_dma();
        bus.step_dma();
        assert_eq!(bus.dma.active_channel(), Some(3));
    }

    #[test]
    fn fifo_request_moves_four_words_to_fixed_destination() {
        let mut bus = Bus::default();
        for i in 0..4 {
            bus.write_32(EWRAM + i * 4, i + 1);
        }

        // special timing, repeat, 16-bit setting ignored
        program(&mut bus, 1, EWRAM, IWRAM, 1, 0x8000 | 0x3000 | 0x0200);
        bus.dma.special_request(1);
        assert_eq!(run_to_completion(&mut bus), 4);
        assert_eq!(bus.read_32(IWRAM), 4);
        assert_eq!(bus.read_32(IWRAM + 4), 0);
    }

    #[test]
    fn first_unit_pays_startup() {
        let mut bus = Bus::default();
        program(&mut bus, 3, IWRAM, IWRAM + 0x10, 2, 0x8000);
        bus.take_cycles();

        // IWRAM halfword accesses take one cycle each.
        assert_eq!(bus.step_dma(), Some(STARTUP_CYCLES + 2));
        assert_eq!(bus.step_dma(), Some(2));
    }

    #[test]
    fn registers_are_write_only_but_control_reads_back() {
        let mut bus = Bus::default();
        program(&mut bus, 2, EWRAM, IWRAM, 5, 0x1200);
        assert_eq!(bus.read_32(channel_base(2)), 0);
        assert_eq!(bus.read_16(channel_base(2) + 10), 0x1200);
    }
}
