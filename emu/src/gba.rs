use tracing::{debug, info};

use crate::bus::Bus;
use crate::cpu::arm7tdmi::{Arm7tdmi, FatalError};
use crate::cpu::hardware::dma::DmaTiming;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::diagnostics::Diagnostics;

/// Where execution starts after power-on or [`Gba::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMode {
    /// Architectural reset: Supervisor, ARM, r15 at 0x0000_0000.
    #[default]
    Bios,
    /// The state the BIOS leaves behind before jumping to 0x0800_0000.
    Cartridge,
}

/// Display timing points reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlineEvent {
    HBlank,
    VBlank,
}

impl From<ScanlineEvent> for DmaTiming {
    fn from(event: ScanlineEvent) -> Self {
        match event {
            ScanlineEvent::HBlank => Self::HBlank,
            ScanlineEvent::VBlank => Self::VBlank,
        }
    }
}

pub struct Gba {
    pub cpu: Arm7tdmi,

    boot_mode: BootMode,
    cycles: u64,
}

impl Gba {
    #[must_use]
    pub fn new(bios: Vec<u8>, cartridge: Vec<u8>, boot_mode: BootMode) -> Self {
        info!(
            bios_len = bios.len(),
            cartridge_len = cartridge.len(),
            ?boot_mode,
            "creating core"
        );
        let bus = Bus::new(bios, cartridge);
        let mut gba = Self {
            cpu: Arm7tdmi::new(bus),
            boot_mode,
            cycles: 0,
        };
        gba.boot();
        gba
    }

    fn boot(&mut self) {
        match self.boot_mode {
            BootMode::Bios => self.cpu.reset(),
            BootMode::Cartridge => self.cpu.boot_from_cartridge(),
        }
    }

    /// One CPU or DMA step. The elapsed cycles also advance the timers.
    pub fn step(&mut self) -> Result<u32, FatalError> {
        let cycles = self.cpu.step()?;
        self.cpu.bus.tick(cycles);
        self.cycles += u64::from(cycles);
        Ok(cycles)
    }

    /// Back to the boot state. ROM images survive.
    pub fn reset(&mut self) {
        debug!(boot_mode = ?self.boot_mode, "reset");
        self.cpu.bus.reset();
        self.boot();
        self.cycles = 0;
    }

    pub fn raise_interrupt(&mut self, interrupt: Interrupt) {
        self.cpu.bus.interrupt_control.request(interrupt);
    }

    /// Starts the DMA channels waiting for `event`.
    pub fn on_scanline_event(&mut self, event: ScanlineEvent) {
        self.cpu.bus.dma.trigger(event.into());
    }

    /// Peripheral request for a special-timing DMA channel.
    pub fn on_special_request(&mut self, channel: usize) {
        self.cpu.bus.dma.special_request(channel);
    }

    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.cpu.bus
    }

    pub const fn bus_mut(&mut self) -> &mut Bus {
        &mut self.cpu.bus
    }

    /// Cycles elapsed since power-on or the last reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.cpu.bus.diagnostics
    }
}
