//! # Program Status Registers (CPSR and SPSR)
//!
//! ```text
//! 31 30 29 28 27        8 7 6 5 4   0
//! ┌──┬──┬──┬──┬──────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │ Reserved │I│F│T│Mode │
//! └──┴──┴──┴──┴──────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: tested by [`Condition`]
//! - **I/F (7-6)**: IRQ/FIQ disable
//! - **T (5)**: THUMB (1) or ARM (0) encoding
//! - **Mode (4-0)**: one of the seven [`Mode`] codes
//!
//! The current word must always hold a valid mode, so every write path that
//! can touch the mode field goes through [`Psr::write_fields`] or
//! [`Psr::restore`], which keep the previous mode when handed invalid bits.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArithmeticOpResult;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::{InvalidMode, Mode};

const MODE_MASK: u32 = 0b1_1111;
const STATE_BIT: u8 = 5;

/// Byte fields addressable by MSR, selected by opcode bits 16-19.
pub const FIELD_CONTROL: u32 = 0x0000_00FF;
pub const FIELD_EXTENSION: u32 = 0x0000_FF00;
pub const FIELD_STATUS: u32 = 0x00FF_0000;
pub const FIELD_FLAGS: u32 = 0xFF00_0000;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `None` when the condition is the reserved NV code.
    pub(crate) const fn can_execute(self, cond: Condition) -> Option<bool> {
        cond.holds(
            self.sign_flag(),
            self.zero_flag(),
            self.carry_flag(),
            self.overflow_flag(),
        )
    }

    /// N => Bit 31
    #[must_use]
    pub const fn sign_flag(self) -> bool {
        self.0 & (1 << 31) != 0
    }

    /// Z => Bit 30
    #[must_use]
    pub const fn zero_flag(self) -> bool {
        self.0 & (1 << 30) != 0
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub const fn carry_flag(self) -> bool {
        self.0 & (1 << 29) != 0
    }

    /// V => Bit 28
    #[must_use]
    pub const fn overflow_flag(self) -> bool {
        self.0 & (1 << 28) != 0
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(STATE_BIT)
    }

    pub fn try_mode(self) -> Result<Mode, InvalidMode> {
        Mode::try_from(self.0 & MODE_MASK)
    }

    /// Current mode. Only words that never bypassed the validated write
    /// paths (such as the CPSR) are guaranteed to decode; anything else
    /// reads as Supervisor.
    #[must_use]
    pub fn mode(self) -> Mode {
        self.try_mode().unwrap_or_else(|InvalidMode(bits)| {
            tracing::debug!("invalid mode bits 0b{bits:05b} in PSR=0x{:08X}", self.0);
            Mode::Supervisor
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// Arithmetic update: N, Z, C and V.
    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_sign_flag(op_result.sign);
        self.set_zero_flag(op_result.zero);
        self.set_carry_flag(op_result.carry);
        self.set_overflow_flag(op_result.overflow);
    }

    /// Logical update: N and Z from the result, C from the shifter, V untouched.
    pub fn set_logical_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_sign_flag(op_result.sign);
        self.set_zero_flag(op_result.zero);
        self.set_carry_flag(op_result.carry);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    pub fn set_mode(&mut self, m: Mode) {
        self.0 = (self.0 & !MODE_MASK) | u32::from(m);
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.0.set_bit(STATE_BIT, state.into());
    }

    /// MSR write into the current status word.
    ///
    /// `fields` is the union of the `FIELD_*` masks selected by the opcode.
    /// Unprivileged writes only reach the flag byte, the T bit is never
    /// written this way, and invalid mode bits leave the mode untouched
    /// (reported through the returned error, the rest of the write applies).
    pub fn write_fields(
        &mut self,
        value: u32,
        fields: u32,
        privileged: bool,
    ) -> Result<(), InvalidMode> {
        let mut mask = fields;
        if !privileged {
            mask &= FIELD_FLAGS;
        }
        mask &= !(1 << STATE_BIT);

        let previous_mode = self.0 & MODE_MASK;
        let candidate = (self.0 & !mask) | (value & mask);

        match Mode::try_from(candidate & MODE_MASK) {
            Ok(_) => {
                self.0 = candidate;
                Ok(())
            }
            Err(err) => {
                self.0 = (candidate & !MODE_MASK) | previous_mode;
                Err(err)
            }
        }
    }

    /// Exception return: copies a saved word over this one. A saved word
    /// carrying invalid mode bits keeps the current mode.
    pub fn restore(&mut self, saved: Self) -> Result<(), InvalidMode> {
        let previous_mode = self.0 & MODE_MASK;
        match saved.try_mode() {
            Ok(_) => {
                self.0 = saved.0;
                Ok(())
            }
            Err(err) => {
                self.0 = (saved.0 & !MODE_MASK) | previous_mode;
                Err(err)
            }
        }
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);
        s.set_mode(m);
        s
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

/// Instruction encoding selected by the T bit. Switched by `BX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Thumb,
    Arm,
}

impl CpuState {
    /// Instruction width in bytes.
    #[must_use]
    pub const fn instruction_size(self) -> u32 {
        match self {
            Self::Thumb => 2,
            Self::Arm => 4,
        }
    }
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}
