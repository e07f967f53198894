//! # ARM7TDMI register file
//!
//! Sixteen registers are visible at any time, but some of them have one
//! physical slot per privilege mode:
//!
//! ```text
//!            USR/SYS   FIQ      IRQ      SVC      ABT      UND
//! r0-r7      shared
//! r8-r12     r8        r8_fiq   (USR)    (USR)    (USR)    (USR)
//! r13 (SP)   r13       r13_fiq  r13_irq  r13_svc  r13_abt  r13_und
//! r14 (LR)   r14       r14_fiq  r14_irq  r14_svc  r14_abt  r14_und
//! r15 (PC)   shared
//! ```
//!
//! The storage is a flat `[bank][register]` array and [`bank_index`] picks the
//! live slot for a `(register, mode)` pair. Switching mode does not copy
//! anything, it only changes which slot later accesses resolve to.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines and exceptions).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

const BANK_COUNT: usize = 6;
const USER_BANK: usize = 0;
const FIQ_BANK: usize = 1;

const fn mode_bank(mode: Mode) -> usize {
    match mode {
        Mode::User | Mode::System => USER_BANK,
        Mode::Fiq => FIQ_BANK,
        Mode::Irq => 2,
        Mode::Supervisor => 3,
        Mode::Abort => 4,
        Mode::Undefined => 5,
    }
}

/// Bank holding the live slot of `register` while in `mode`.
#[must_use]
pub const fn bank_index(register: usize, mode: Mode) -> usize {
    match register {
        8..=12 if matches!(mode, Mode::Fiq) => FIQ_BANK,
        REG_SP | REG_LR => mode_bank(mode),
        _ => USER_BANK,
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    banks: [[u32; 16]; BANK_COUNT],
}

impl Registers {
    #[must_use]
    pub const fn register_at(&self, reg: usize, mode: Mode) -> u32 {
        self.banks[bank_index(reg, mode)][reg]
    }

    pub const fn set_register_at(&mut self, reg: usize, new_value: u32, mode: Mode) {
        self.banks[bank_index(reg, mode)][reg] = new_value;
    }

    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.banks[USER_BANK][REG_PROGRAM_COUNTER]
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.banks[USER_BANK][REG_PROGRAM_COUNTER] = new_value;
    }

    /// The sixteen values visible in `mode`.
    #[must_use]
    pub fn visible(&self, mode: Mode) -> [u32; 16] {
        std::array::from_fn(|reg| self.register_at(reg, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_MODES: [Mode; 7] = [
        Mode::User,
        Mode::Fiq,
        Mode::Irq,
        Mode::Supervisor,
        Mode::Abort,
        Mode::Undefined,
        Mode::System,
    ];

    #[test]
    fn check_bank_selection() {
        assert_eq!(bank_index(0, Mode::Fiq), USER_BANK);
        assert_eq!(bank_index(8, Mode::Fiq), FIQ_BANK);
        assert_eq!(bank_index(8, Mode::Irq), USER_BANK);
        assert_eq!(bank_index(REG_SP, Mode::System), USER_BANK);
        assert_eq!(bank_index(REG_LR, Mode::Undefined), 5);
        assert_eq!(bank_index(REG_PROGRAM_COUNTER, Mode::Supervisor), USER_BANK);
    }

    #[test]
    fn check_banked_sp_survives_mode_switch() {
        for first in ALL_MODES {
            for second in ALL_MODES {
                let mut registers = Registers::default();
                registers.set_register_at(REG_SP, 0x0300_7F00, first);

                if mode_bank(first) != mode_bank(second) {
                    registers.set_register_at(REG_SP, 0xDEAD_BEEF, second);
                }

                assert_eq!(registers.register_at(REG_SP, first), 0x0300_7F00);
            }
        }
    }

    #[test]
    fn check_user_and_system_share_bank() {
        let mut registers = Registers::default();
        registers.set_register_at(REG_LR, 0x0800_0000, Mode::User);
        assert_eq!(registers.register_at(REG_LR, Mode::System), 0x0800_0000);
        assert_eq!(registers.register_at(REG_LR, Mode::Irq), 0);
    }

    #[test]
    fn check_fiq_banks_high_registers() {
        let mut registers = Registers::default();
        for reg in 8..=12 {
            registers.set_register_at(reg, reg as u32, Mode::User);
            registers.set_register_at(reg, 0x100 + reg as u32, Mode::Fiq);
        }

        let user = registers.visible(Mode::User);
        let fiq = registers.visible(Mode::Fiq);
        assert_eq!(&user[8..=12], &[8, 9, 10, 11, 12]);
        assert_eq!(&fiq[8..=12], &[0x108, 0x109, 0x10A, 0x10B, 0x10C]);
    }

    #[test]
    fn check_pc_is_shared() {
        let mut registers = Registers::default();
        registers.set_program_counter(0x0800_0000);
        for mode in ALL_MODES {
            assert_eq!(registers.register_at(REG_PROGRAM_COUNTER, mode), 0x0800_0000);
        }
    }
}
