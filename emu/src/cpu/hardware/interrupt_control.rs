//! Interrupt, wait-state and power-down control (0x0400_0200 - 0x0400_0301).
//!
//! ```text
//! 0x0400_0200  IE       interrupt enable
//! 0x0400_0202  IF       interrupt request flags, write 1 to acknowledge
//! 0x0400_0204  WAITCNT  game pak wait-state control
//! 0x0400_0208  IME      interrupt master enable (bit 0)
//! 0x0400_0300  POSTFLG  set once the BIOS finished booting
//! 0x0400_0301  HALTCNT  write-only, entering halt or stop
//! ```

use crate::memory::io_device::{AccessWidth, IoDevice};
use crate::memory::io_registers::{IoRegister, IoRegisterAccessControl};

pub const IE_ADDRESS: u32 = 0x0400_0200;
pub const IF_ADDRESS: u32 = 0x0400_0202;
pub const WAITCNT_ADDRESS: u32 = 0x0400_0204;
pub const IME_ADDRESS: u32 = 0x0400_0208;
pub const POSTFLG_ADDRESS: u32 = 0x0400_0300;
pub const HALTCNT_ADDRESS: u32 = 0x0400_0301;

const INTERRUPT_MASK: u32 = 0x3FFF;

/// Interrupt sources; the discriminant is the IE/IF bit and lower numbers
/// win when several are pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    pub const ALL: [Self; 14] = [
        Self::VBlank,
        Self::HBlank,
        Self::VCount,
        Self::Timer0,
        Self::Timer1,
        Self::Timer2,
        Self::Timer3,
        Self::Serial,
        Self::Dma0,
        Self::Dma1,
        Self::Dma2,
        Self::Dma3,
        Self::Keypad,
        Self::GamePak,
    ];

    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }

    /// Overflow interrupt of timer `idx` (0..=3).
    #[must_use]
    pub const fn timer(idx: usize) -> Self {
        match idx {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            _ => Self::Timer3,
        }
    }

    /// Completion interrupt of DMA channel `idx` (0..=3).
    #[must_use]
    pub const fn dma(idx: usize) -> Self {
        match idx {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }
}

/// Game pak ROM windows, each with its own WAITCNT timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Ws0,
    Ws1,
    Ws2,
}

const FIRST_ACCESS: [u32; 4] = [4, 3, 2, 8];

pub struct InterruptControl {
    interrupt_enable: IoRegister,
    interrupt_request: IoRegister,
    wait_state_control: IoRegister,
    interrupt_master_enable: IoRegister,
    post_boot_flag: IoRegister,
    power_down_control: IoRegister,
    halt_requested: bool,
}

impl Default for InterruptControl {
    fn default() -> Self {
        use IoRegisterAccessControl::{ReadWrite, Write};

        Self {
            interrupt_enable: IoRegister::new(AccessWidth::HalfWord, ReadWrite)
                .with_mask(INTERRUPT_MASK),
            interrupt_request: IoRegister::new(AccessWidth::HalfWord, ReadWrite)
                .with_mask(INTERRUPT_MASK)
                .clear_on_write(),
            wait_state_control: IoRegister::new(AccessWidth::HalfWord, ReadWrite)
                .with_mask(0x5FFF),
            interrupt_master_enable: IoRegister::new(AccessWidth::HalfWord, ReadWrite)
                .with_mask(1),
            post_boot_flag: IoRegister::new(AccessWidth::Byte, ReadWrite).with_mask(1),
            power_down_control: IoRegister::new(AccessWidth::Byte, Write),
            halt_requested: false,
        }
    }
}

impl InterruptControl {
    /// Marks `interrupt` pending. Idempotent.
    pub fn request(&mut self, interrupt: Interrupt) {
        let flags = self.interrupt_request.value() | u32::from(interrupt.mask());
        self.interrupt_request.set_value(flags);
    }

    /// Enabled and requested sources (IE & IF).
    #[must_use]
    pub const fn pending(&self) -> u16 {
        (self.interrupt_enable.value() & self.interrupt_request.value()) as u16
    }

    #[must_use]
    pub const fn master_enabled(&self) -> bool {
        self.interrupt_master_enable.value() & 1 == 1
    }

    /// True when the IRQ line towards the CPU is asserted.
    #[must_use]
    pub const fn irq_line(&self) -> bool {
        self.master_enabled() && self.pending() != 0
    }

    #[must_use]
    pub fn highest_priority_pending(&self) -> Option<Interrupt> {
        let pending = self.pending();
        Interrupt::ALL
            .into_iter()
            .find(|interrupt| pending & interrupt.mask() != 0)
    }

    /// Returns and clears a halt request written to HALTCNT.
    pub const fn take_halt_request(&mut self) -> bool {
        let requested = self.halt_requested;
        self.halt_requested = false;
        requested
    }

    pub fn set_post_boot_flag(&mut self, value: bool) {
        self.post_boot_flag.set_value(u32::from(value));
    }

    /// Wait cycles of the (first, sequential) access to a ROM window.
    #[must_use]
    pub const fn rom_wait(&self, window: WaitState) -> (u32, u32) {
        let waitcnt = self.wait_state_control.value();
        match window {
            WaitState::Ws0 => (
                FIRST_ACCESS[((waitcnt >> 2) & 3) as usize],
                if waitcnt & (1 << 4) == 0 { 2 } else { 1 },
            ),
            WaitState::Ws1 => (
                FIRST_ACCESS[((waitcnt >> 5) & 3) as usize],
                if waitcnt & (1 << 7) == 0 { 4 } else { 1 },
            ),
            WaitState::Ws2 => (
                FIRST_ACCESS[((waitcnt >> 8) & 3) as usize],
                if waitcnt & (1 << 10) == 0 { 8 } else { 1 },
            ),
        }
    }

    #[must_use]
    pub const fn sram_wait(&self) -> u32 {
        FIRST_ACCESS[(self.wait_state_control.value() & 3) as usize]
    }

    const fn register(&self, address: u32) -> Option<(&IoRegister, u8)> {
        match address {
            0x0400_0200..=0x0400_0201 => {
                Some((&self.interrupt_enable, (address - IE_ADDRESS) as u8))
            }
            0x0400_0202..=0x0400_0203 => {
                Some((&self.interrupt_request, (address - IF_ADDRESS) as u8))
            }
            0x0400_0204..=0x0400_0205 => Some((
                &self.wait_state_control,
                (address - WAITCNT_ADDRESS) as u8,
            )),
            0x0400_0208..=0x0400_0209 => Some((
                &self.interrupt_master_enable,
                (address - IME_ADDRESS) as u8,
            )),
            POSTFLG_ADDRESS => Some((&self.post_boot_flag, 0)),
            HALTCNT_ADDRESS => Some((&self.power_down_control, 0)),
            _ => None,
        }
    }

    const fn register_mut(&mut self, address: u32) -> Option<(&mut IoRegister, u8)> {
        match address {
            0x0400_0200..=0x0400_0201 => {
                Some((&mut self.interrupt_enable, (address - IE_ADDRESS) as u8))
            }
            0x0400_0202..=0x0400_0203 => {
                Some((&mut self.interrupt_request, (address - IF_ADDRESS) as u8))
            }
            0x0400_0204..=0x0400_0205 => Some((
                &mut self.wait_state_control,
                (address - WAITCNT_ADDRESS) as u8,
            )),
            0x0400_0208..=0x0400_0209 => Some((
                &mut self.interrupt_master_enable,
                (address - IME_ADDRESS) as u8,
            )),
            POSTFLG_ADDRESS => Some((&mut self.post_boot_flag, 0)),
            HALTCNT_ADDRESS => Some((&mut self.power_down_control, 0)),
            _ => None,
        }
    }
}

/// Unused bytes between the registers: read as zero, writes dropped.
const fn is_gap(address: u32) -> bool {
    matches!(
        address,
        0x0400_0206..=0x0400_0207 | 0x0400_020A..=0x0400_020F | 0x0400_0302..=0x0400_0303
    )
}

impl IoDevice for InterruptControl {
    fn read_8(&mut self, address: u32) -> Option<u8> {
        if is_gap(address) {
            return Some(0);
        }
        self.register(address)
            .map(|(register, byte)| register.read_byte(byte))
    }

    fn write_8(&mut self, address: u32, value: u8) -> bool {
        if is_gap(address) {
            return true;
        }
        let Some((register, byte)) = self.register_mut(address) else {
            return false;
        };
        register.write_byte(byte, value);

        if address == HALTCNT_ADDRESS {
            if value & 0x80 != 0 {
                tracing::debug!("stop requested, handled as halt");
            }
            self.halt_requested = true;
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
    use pretty_assertions::assert_eq;

    fn write_16(control: &mut InterruptControl, address: u32, value: u16) {
        let [low, high] = value.to_le_bytes();
        control.write_8(address, low);
        control.write_8(address + 1, high);
    }

    fn read_16(control: &mut InterruptControl, address: u32) -> u16 {
        u16::from_le_bytes([
            control.read_8(address).unwrap_or(0),
            control.read_8(address + 1).unwrap_or(0),
        ])
    }

    #[test]
    fn request_is_idempotent() {
        let mut control = InterruptControl::default();
        control.request(Interrupt::Timer1);
        control.request(Interrupt::Timer1);
        assert_eq!(read_16(&mut control, IF_ADDRESS), 1 << 4);
    }

    #[test]
    fn write_one_acknowledges() {
        let mut control = InterruptControl::default();
        control.request(Interrupt::VBlank);
        control.request(Interrupt::Dma2);

        write_16(&mut control, IF_ADDRESS, Interrupt::VBlank.mask());
        assert_eq!(read_16(&mut control, IF_ADDRESS), Interrupt::Dma2.mask());
    }

    #[test]
    fn lowest_source_wins() {
        let mut control = InterruptControl::default();
        write_16(&mut control, IE_ADDRESS, 0x3FFF);
        control.request(Interrupt::Keypad);
        control.request(Interrupt::Timer2);
        control.request(Interrupt::Dma0);

        assert_eq!(control.highest_priority_pending(), Some(Interrupt::Timer2));
    }

    #[test]
    fn irq_line_needs_master_enable_and_enable() {
        let mut control = InterruptControl::default();
        control.request(Interrupt::HBlank);
        assert!(!control.irq_line());

        write_16(&mut control, IE_ADDRESS, Interrupt::HBlank.mask());
        assert!(!control.irq_line());
        assert_eq!(control.pending(), Interrupt::HBlank.mask());

        write_16(&mut control, IME_ADDRESS, 1);
        assert!(control.irq_line());
    }

    #[test]
    fn haltcnt_is_write_only_and_requests_halt() {
        let mut control = InterruptControl::default();
        control.write_8(HALTCNT_ADDRESS, 0);
        assert_eq!(control.read_8(HALTCNT_ADDRESS), Some(0));
        assert!(control.take_halt_request());
        assert!(!control.take_halt_request());
    }

    #[test]
    fn waitcnt_decodes_rom_timings() {
        let mut control = InterruptControl::default();
        assert_eq!(control.rom_wait(WaitState::Ws0), (4, 2));
        assert_eq!(control.rom_wait(WaitState::Ws2), (4, 8));

        // WS0 first=3 second=1, WS1 first=8 second=1, SRAM=8
        write_16(&mut control, WAITCNT_ADDRESS, 0b0_0_00_1_11_1_01_11);
        assert_eq!(control.rom_wait(WaitState::Ws0), (3, 1));
        assert_eq!(control.rom_wait(WaitState::Ws1), (8, 1));
        assert_eq!(control.sram_wait(), 8);
    }

    #[test]
    fn unused_bytes_read_zero() {
        let mut control = InterruptControl::default();
        assert!(control.write_8(0x0400_0206, 1));
        assert_eq!(control.read_8(0x0400_0206), Some(0));
        assert_eq!(control.read_8(0x0400_0400), None);
        assert!(!control.write_8(0x0400_0400, 1));
    }
}
