//! Timer bank (0x0400_0100 - 0x0400_010F).
//!
//! Each channel owns a 16-bit counter:
//!
//! ```text
//! TMxCNT_L  read: live counter, write: reload value
//! TMxCNT_H  bits 0-1 prescaler (1, 64, 256, 1024 cycles per tick)
//!           bit  2   count-up: tick once per overflow of timer x-1
//!           bit  6   IRQ on overflow
//!           bit  7   enable
//! ```

use crate::cpu::hardware::interrupt_control::{Interrupt, InterruptControl};
use crate::memory::io_device::{AccessWidth, IoDevice};
use crate::memory::io_registers::{IoRegister, IoRegisterAccessControl};

pub const TIMERS_BASE: u32 = 0x0400_0100;
pub const TIMERS_END: u32 = 0x0400_0110;

const PRESCALER_DIVS: [u32; 4] = [1, 64, 256, 1024];

const CONTROL_COUNT_UP: u32 = 1 << 2;
const CONTROL_IRQ: u32 = 1 << 6;
const CONTROL_ENABLE: u32 = 1 << 7;

struct TimerChannel {
    reload: IoRegister,
    control: IoRegister,
    counter: u16,
    sub_cycles: u32,
}

impl TimerChannel {
    fn new(idx: usize) -> Self {
        // Timer 0 has nothing to count up from.
        let control_mask = if idx == 0 { 0x00C3 } else { 0x00C7 };
        Self {
            reload: IoRegister::new(AccessWidth::HalfWord, IoRegisterAccessControl::ReadWrite),
            control: IoRegister::new(AccessWidth::HalfWord, IoRegisterAccessControl::ReadWrite)
                .with_mask(control_mask),
            counter: 0,
            sub_cycles: 0,
        }
    }

    const fn enabled(&self) -> bool {
        self.control.value() & CONTROL_ENABLE != 0
    }

    const fn count_up(&self) -> bool {
        self.control.value() & CONTROL_COUNT_UP != 0
    }

    const fn irq_enabled(&self) -> bool {
        self.control.value() & CONTROL_IRQ != 0
    }

    const fn divider(&self) -> u32 {
        PRESCALER_DIVS[(self.control.value() & 3) as usize]
    }

    /// Advances the counter by `ticks`, returning how many times it overflowed.
    fn advance(&mut self, mut ticks: u32) -> u32 {
        let mut overflows = 0;
        while ticks > 0 {
            let room = 0x1_0000 - u32::from(self.counter);
            if ticks >= room {
                ticks -= room;
                overflows += 1;
                self.counter = self.reload.value() as u16;
            } else {
                self.counter += ticks as u16;
                ticks = 0;
            }
        }
        overflows
    }
}

pub struct Timers {
    channels: [TimerChannel; 4],
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            channels: std::array::from_fn(TimerChannel::new),
        }
    }
}

impl Timers {
    /// Live counter of timer `idx`.
    #[must_use]
    pub fn counter(&self, idx: usize) -> u16 {
        self.channels[idx].counter
    }

    /// Runs every free-running timer for `cycles` bus cycles, cascading
    /// overflows into count-up successors.
    pub fn step(&mut self, cycles: u32, interrupts: &mut InterruptControl) {
        for idx in 0..self.channels.len() {
            let channel = &mut self.channels[idx];
            if !channel.enabled() || (idx > 0 && channel.count_up()) {
                continue;
            }

            channel.sub_cycles += cycles;
            let divider = channel.divider();
            let ticks = channel.sub_cycles / divider;
            channel.sub_cycles %= divider;

            let overflows = channel.advance(ticks);
            self.overflowed(idx, overflows, interrupts);
        }
    }

    fn overflowed(&mut self, idx: usize, overflows: u32, interrupts: &mut InterruptControl) {
        if overflows == 0 {
            return;
        }
        if self.channels[idx].irq_enabled() {
            interrupts.request(Interrupt::timer(idx));
        }

        let next = idx + 1;
        if let Some(successor) = self.channels.get_mut(next) {
            if successor.enabled() && successor.count_up() {
                let cascaded = successor.advance(overflows);
                self.overflowed(next, cascaded, interrupts);
            }
        }
    }

    fn write_control(&mut self, idx: usize, byte: u8, value: u8) {
        let channel = &mut self.channels[idx];
        let was_enabled = channel.enabled();
        channel.control.write_byte(byte, value);

        if !was_enabled && channel.enabled() {
            channel.counter = channel.reload.value() as u16;
            channel.sub_cycles = 0;
            tracing::debug!(
                "timer {idx} started: reload=0x{:04X} div={}",
                channel.counter,
                channel.divider()
            );
        }
    }

    const fn locate(address: u32) -> Option<(usize, u32)> {
        if address < TIMERS_BASE || address >= TIMERS_END {
            return None;
        }
        let offset = address - TIMERS_BASE;
        Some(((offset / 4) as usize, offset % 4))
    }
}

impl IoDevice for Timers {
    fn read_8(&mut self, address: u32) -> Option<u8> {
        let (idx, offset) = Self::locate(address)?;
        let channel = &self.channels[idx];
        Some(match offset {
            0 | 1 => channel.counter.to_le_bytes()[offset as usize],
            _ => channel.control.read_byte((offset - 2) as u8),
        })
    }

    fn write_8(&mut self, address: u32, value: u8) -> bool {
        let Some((idx, offset)) = Self::locate(address) else {
            return false;
        };
        match offset {
            0 | 1 => self.channels[idx].reload.write_byte(offset as u8, value),
            _ => self.write_control(idx, (offset - 2) as u8, value),
        }
        true
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::interrupt_control::IF_ADDRESS;
    use pretty_assertions::assert_eq;

    fn write_16(timers: &mut Timers, address: u32, value: u16) {
        let [low, high] = value.to_le_bytes();
        timers.write_8(address, low);
        timers.write_8(address + 1, high);
    }

    fn pending_flags(interrupts: &mut InterruptControl) -> u16 {
        u16::from_le_bytes([
            interrupts.read_8(IF_ADDRESS).unwrap_or(0),
            interrupts.read_8(IF_ADDRESS + 1).unwrap_or(0),
        ])
    }

    #[test]
    fn enable_loads_reload() {
        let mut timers = Timers::default();
        write_16(&mut timers, TIMERS_BASE, 0xFF00);
        assert_eq!(timers.counter(0), 0);

        write_16(&mut timers, TIMERS_BASE + 2, 0x0080);
        assert_eq!(timers.counter(0), 0xFF00);
        assert_eq!(timers.read_8(TIMERS_BASE), Some(0x00));
        assert_eq!(timers.read_8(TIMERS_BASE + 1), Some(0xFF));
    }

    #[test]
    fn prescaler_divides_cycles() {
        let mut timers = Timers::default();
        let mut interrupts = InterruptControl::default();
        write_16(&mut timers, TIMERS_BASE + 2, 0x0081);

        timers.step(63, &mut interrupts);
        assert_eq!(timers.counter(0), 0);
        timers.step(1, &mut interrupts);
        assert_eq!(timers.counter(0), 1);
        timers.step(64 * 10, &mut interrupts);
        assert_eq!(timers.counter(0), 11);
    }

    #[test]
    fn overflow_reloads_and_raises_irq() {
        let mut timers = Timers::default();
        let mut interrupts = InterruptControl::default();
        write_16(&mut timers, TIMERS_BASE + 8, 0xFFFE);
        write_16(&mut timers, TIMERS_BASE + 10, 0x00C0);

        timers.step(2, &mut interrupts);
        assert_eq!(timers.counter(2), 0xFFFE);
        assert_eq!(pending_flags(&mut interrupts), Interrupt::Timer2.mask());

        timers.step(1, &mut interrupts);
        assert_eq!(timers.counter(2), 0xFFFF);
    }

    #[test]
    fn count_up_ticks_once_per_overflow() {
        let mut timers = Timers::default();
        let mut interrupts = InterruptControl::default();

        // Timer 0 overflows every 4 cycles, timer 1 chained with the
        // slowest prescaler that must be ignored.
        write_16(&mut timers, TIMERS_BASE, 0xFFFC);
        write_16(&mut timers, TIMERS_BASE + 2, 0x0080);
        write_16(&mut timers, TIMERS_BASE + 6, 0x0087);

        for overflow in 1..=5_u16 {
            timers.step(4, &mut interrupts);
            assert_eq!(timers.counter(1), overflow);
        }

        timers.step(4 * 7, &mut interrupts);
        assert_eq!(timers.counter(1), 12);
    }

    #[test]
    fn chained_overflow_cascades() {
        let mut timers = Timers::default();
        let mut interrupts = InterruptControl::default();
        write_16(&mut timers, TIMERS_BASE, 0xFFFF);
        write_16(&mut timers, TIMERS_BASE + 2, 0x0080);
        write_16(&mut timers, TIMERS_BASE + 4, 0xFFFF);
        write_16(&mut timers, TIMERS_BASE + 6, 0x00C4);
        write_16(&mut timers, TIMERS_BASE + 10, 0x0084);

        timers.step(1, &mut interrupts);
        assert_eq!(timers.counter(1), 0xFFFF);
        assert_eq!(timers.counter(2), 1);
        assert_eq!(pending_flags(&mut interrupts), Interrupt::Timer1.mask());
    }

    #[test]
    fn timer3_overflow_goes_nowhere() {
        let mut timers = Timers::default();
        let mut interrupts = InterruptControl::default();
        write_16(&mut timers, TIMERS_BASE + 12, 0xFFFF);
        write_16(&mut timers, TIMERS_BASE + 14, 0x00C0);

        timers.step(1, &mut interrupts);
        assert_eq!(pending_flags(&mut interrupts), Interrupt::Timer3.mask());
    }
}
