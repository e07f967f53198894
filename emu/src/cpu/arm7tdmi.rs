//! # ARM7TDMI Core
//!
//! One call to [`Arm7tdmi::step`] performs exactly one of:
//!
//! 1. a DMA unit, when any channel is active (the CPU is stalled);
//! 2. an idle cycle, when halted with nothing pending;
//! 3. IRQ entry, when the line is asserted and CPSR.I is clear;
//! 4. fetch, decode and execute of one instruction.
//!
//! It returns the cycles consumed, which the caller feeds to the timers and
//! any external peripheral.
//!
//! ## Pipeline
//!
//! Between steps r15 holds the address of the next instruction. While an
//! instruction executes r15 is moved two instructions ahead, which is what
//! every read of r15 observes:
//!
//! ```text
//!   address      fetch     decode    execute
//!   addr         ───►
//!   addr + 1i              ───►
//!   addr + 2i  (r15)                  ───►   (current instruction = addr)
//! ```
//!
//! Writing r15 flushes the pipeline; the refill is charged as one
//! non-sequential and one sequential fetch at the target.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::bus::Bus;
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_PROGRAM_COUNTER, REG_SP, Registers};
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::memory::io_device::AccessWidth;

/// Reset stack pointers installed by the BIOS before it jumps to the cartridge.
pub const SP_USER_BOOT: u32 = 0x0300_7F00;
pub const SP_IRQ_BOOT: u32 = 0x0300_7FA0;
pub const SP_SUPERVISOR_BOOT: u32 = 0x0300_7FE0;
pub const CARTRIDGE_ENTRY: u32 = 0x0800_0000;

/// Conditions that stop execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FatalError {
    /// Never produced while the ARM format table covers every encoding.
    #[error("undecodable ARM opcode 0x{opcode:08X} at 0x{address:08X}")]
    UndecodableArm { opcode: u32, address: u32 },
    /// Never produced while the THUMB format table covers every encoding.
    #[error("undecodable THUMB opcode 0x{opcode:04X} at 0x{address:08X}")]
    UndecodableThumb { opcode: u16, address: u32 },
    #[error("unsupported exception: {0}")]
    UnsupportedException(Exception),
}

pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    halted: bool,

    /// Set by every write to r15 while an instruction executes.
    flushed: bool,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new(Bus::default())
    }
}

impl Arm7tdmi {
    /// A core in the architectural reset state: Supervisor, ARM, IRQ and FIQ
    /// disabled, r15 at the reset vector.
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        let mut cpu = Self {
            bus,
            cpsr: Psr::from(Mode::Supervisor),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            halted: false,
            flushed: false,
        };
        cpu.reset();
        cpu
    }

    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.register_bank = RegisterBank::default();

        self.cpsr = Psr::from(Mode::Supervisor);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        self.cpsr.set_fiq_disable(true);

        self.registers
            .set_program_counter(Exception::Reset.vector());
        self.halted = false;
        self.flushed = false;
    }

    /// The state the BIOS leaves behind when it hands over to the cartridge.
    pub fn boot_from_cartridge(&mut self) {
        self.reset();
        self.cpsr = Psr::from(Mode::System);

        self.registers
            .set_register_at(REG_SP, SP_USER_BOOT, Mode::System);
        self.registers.set_register_at(REG_SP, SP_IRQ_BOOT, Mode::Irq);
        self.registers
            .set_register_at(REG_SP, SP_SUPERVISOR_BOOT, Mode::Supervisor);
        self.registers.set_program_counter(CARTRIDGE_ENTRY);

        self.bus.interrupt_control.set_post_boot_flag(true);
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Register `reg` as seen from the current mode.
    #[must_use]
    pub fn read_register(&self, reg: usize) -> u32 {
        self.registers.register_at(reg, self.cpsr.mode())
    }

    /// Writes `reg` in the current mode. Writing r15 is a branch.
    pub fn write_register(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.branch_to(value);
        } else {
            self.registers
                .set_register_at(reg, value, self.cpsr.mode());
        }
    }

    /// Jumps to `target`, aligned for the current state, and charges the
    /// pipeline refill.
    pub(crate) fn branch_to(&mut self, target: u32) {
        let state = self.cpsr.cpu_state();
        let (target, width) = match state {
            CpuState::Arm => (target & !3, AccessWidth::Word),
            CpuState::Thumb => (target & !1, AccessWidth::HalfWord),
        };

        let refill = self.bus.access_cycles(target, width, false)
            + self.bus.access_cycles(
                target.wrapping_add(state.instruction_size()),
                width,
                true,
            );
        self.bus.idle(refill);
        self.bus.continue_refill_at(target);

        self.registers.set_program_counter(target);
        self.flushed = true;
    }

    /// Address of the instruction being executed.
    pub(crate) fn current_instruction_address(&self) -> u32 {
        let size = self.cpsr.cpu_state().instruction_size();
        self.registers.program_counter().wrapping_sub(2 * size)
    }

    /// Address of the instruction after the one being executed.
    pub(crate) fn next_instruction_address(&self) -> u32 {
        let size = self.cpsr.cpu_state().instruction_size();
        self.registers.program_counter().wrapping_sub(size)
    }

    pub fn step(&mut self) -> Result<u32, FatalError> {
        if let Some(cycles) = self.bus.step_dma() {
            return Ok(cycles);
        }

        if self.halted {
            if self.bus.interrupt_control.pending() == 0 {
                self.bus.idle(1);
                return Ok(self.bus.take_cycles());
            }
            debug!("leaving halt");
            self.halted = false;
        }

        if self.bus.interrupt_control.irq_line() && !self.cpsr.irq_disable() {
            // LR_irq = next instruction + 4, so `SUBS pc, lr, #4` resumes it.
            let return_address = self.registers.program_counter().wrapping_add(4);
            self.enter_exception(Exception::Irq, return_address);
            return Ok(self.bus.take_cycles());
        }

        match self.cpsr.cpu_state() {
            CpuState::Arm => self.step_arm()?,
            CpuState::Thumb => self.step_thumb()?,
        }

        if self.bus.interrupt_control.take_halt_request() {
            debug!(pc = self.registers.program_counter(), "halting");
            self.halted = true;
        }

        Ok(self.bus.take_cycles())
    }

    fn step_arm(&mut self) -> Result<(), FatalError> {
        let address = self.registers.program_counter() & !3;
        let raw = self.bus.read_32(address);
        let op_code = ArmModeOpcode::try_from(raw).map_err(|err| FatalError::UndecodableArm {
            opcode: err.opcode,
            address,
        })?;
        trace!("0x{address:08X}: {:08X} {}", raw, op_code.disassembly());

        self.registers.set_program_counter(address.wrapping_add(8));
        self.flushed = false;
        self.execute_arm(op_code);
        if !self.flushed {
            self.registers.set_program_counter(address.wrapping_add(4));
        }
        Ok(())
    }

    fn step_thumb(&mut self) -> Result<(), FatalError> {
        let address = self.registers.program_counter() & !1;
        let raw = self.bus.read_16(address);
        let op_code =
            ThumbModeOpcode::try_from(raw).map_err(|_| FatalError::UndecodableThumb {
                opcode: raw,
                address,
            })?;
        trace!("0x{address:08X}: {:04X}     {}", raw, op_code.instruction);

        self.registers.set_program_counter(address.wrapping_add(4));
        self.flushed = false;
        self.execute_thumb(op_code);
        if !self.flushed {
            self.registers.set_program_counter(address.wrapping_add(2));
        }
        Ok(())
    }
}
