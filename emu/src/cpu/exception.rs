//! # Exception Vectors
//!
//! ```text
//! ┌────────────┬──────────┬────────────┬───────────┐
//! │ Exception  │ Vector   │ Mode       │ Disables  │
//! ├────────────┼──────────┼────────────┼───────────┤
//! │ Reset      │ 0x00     │ Supervisor │ I, F      │
//! │ Undefined  │ 0x04     │ Undefined  │ I         │
//! │ SWI        │ 0x08     │ Supervisor │ I         │
//! │ Prefetch   │ 0x0C     │ Abort      │ I         │
//! │ Data abort │ 0x10     │ Abort      │ I         │
//! │ IRQ        │ 0x18     │ IRQ        │ I         │
//! │ FIQ        │ 0x1C     │ FIQ        │ I, F      │
//! └────────────┴──────────┴────────────┴───────────┘
//! ```
//!
//! Entry saves CPSR into the target mode's SPSR, stores the return address
//! in the target mode's LR, forces ARM state and jumps to the vector.
//! Returning (`MOVS pc, lr` / `SUBS pc, lr, #4` / `LDM ..^` with r15) copies
//! SPSR back and consumes the bank.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpu::arm7tdmi::{Arm7tdmi, FatalError};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;
use crate::cpu::register_bank::SavedStatusFault;
use crate::cpu::registers::REG_LR;
use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exception {
    Reset,
    Undefined,
    SoftwareInterrupt,
    PrefetchAbort,
    DataAbort,
    Irq,
    Fiq,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Undefined => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::Irq => 0x18,
            Self::Fiq => 0x1C,
        }
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Undefined => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::Irq => Mode::Irq,
            Self::Fiq => Mode::Fiq,
        }
    }

    /// Exceptions the handheld never signals.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::PrefetchAbort | Self::DataAbort | Self::Fiq)
    }
}

impl std::fmt::Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Reset => "reset",
            Self::Undefined => "undefined instruction",
            Self::SoftwareInterrupt => "software interrupt",
            Self::PrefetchAbort => "prefetch abort",
            Self::DataAbort => "data abort",
            Self::Irq => "IRQ",
            Self::Fiq => "FIQ",
        })
    }
}

impl Arm7tdmi {
    /// Raises `exception` from outside the instruction stream.
    ///
    /// `return_address` is what the handler finds in LR.
    pub fn raise_exception(
        &mut self,
        exception: Exception,
        return_address: u32,
    ) -> Result<(), FatalError> {
        if !exception.is_supported() {
            return Err(FatalError::UnsupportedException(exception));
        }
        self.enter_exception(exception, return_address);
        Ok(())
    }

    pub(crate) fn enter_exception(&mut self, exception: Exception, return_address: u32) {
        let saved = self.cpsr;
        let mode = exception.mode();

        self.cpsr.set_mode(mode);
        if self.register_bank.write(mode, saved).is_err() {
            self.bus
                .diagnostics
                .record(Diagnostic::SavedStatusUnavailable { mode });
        }
        self.registers.set_register_at(REG_LR, return_address, mode);

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        if matches!(exception, Exception::Reset | Exception::Fiq) {
            self.cpsr.set_fiq_disable(true);
        }

        debug!(%exception, return_address, from = %saved.mode(), "exception entry");
        self.branch_to(exception.vector());
    }

    /// Copies the current mode's SPSR into CPSR.
    ///
    /// Without a live bank the safest observed value is used (CPSR itself
    /// or the stale word) and the access is reported.
    pub(crate) fn restore_saved_status(&mut self) {
        let mode = self.cpsr.mode();
        let saved = match self.register_bank.consume(mode) {
            Ok(psr) => psr,
            Err(SavedStatusFault::Unavailable) => {
                self.bus
                    .diagnostics
                    .record(Diagnostic::SavedStatusUnavailable { mode });
                self.cpsr
            }
            Err(SavedStatusFault::Stale(psr)) => {
                self.bus
                    .diagnostics
                    .record(Diagnostic::StaleSavedStatus { mode });
                psr
            }
        };

        if let Err(invalid) = self.cpsr.restore(saved) {
            self.bus
                .diagnostics
                .record(Diagnostic::InvalidModeWrite { bits: invalid.0 });
        }
        debug!(mode = %self.cpsr.mode(), "exception return");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::psr::Psr;
    use crate::cpu::registers::REG_PROGRAM_COUNTER;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_vectors() {
        assert_eq!(Exception::SoftwareInterrupt.vector(), 0x08);
        assert_eq!(Exception::Irq.vector(), 0x18);
        assert_eq!(Exception::Undefined.mode(), Mode::Undefined);
        assert_eq!(Exception::Reset.mode(), Mode::Supervisor);
    }

    #[test]
    fn check_entry_banks_state() {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::User);
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.cpsr.set_carry_flag(true);
        let saved = cpu.cpsr;

        cpu.enter_exception(Exception::Irq, 0x0800_0104);

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(cpu.cpsr.irq_disable());
        assert!(!cpu.cpsr.fiq_disable());
        assert_eq!(cpu.register_bank.read(Mode::Irq), Ok(saved));
        assert_eq!(cpu.registers.register_at(REG_LR, Mode::Irq), 0x0800_0104);
        assert_eq!(cpu.registers.register_at(REG_LR, Mode::User), 0);
        assert_eq!(cpu.registers.register_at(REG_PROGRAM_COUNTER, Mode::Irq), 0x18);
    }

    #[test]
    fn check_restore_consumes_bank() {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::System);
        let saved = cpu.cpsr;
        cpu.enter_exception(Exception::SoftwareInterrupt, 0x100);

        cpu.restore_saved_status();
        assert_eq!(cpu.cpsr, saved);
        assert_eq!(cpu.bus.diagnostics.total(), 0);

        // Second return from the same bank reads a consumed word.
        cpu.cpsr.set_mode(Mode::Supervisor);
        cpu.restore_saved_status();
        assert_eq!(cpu.cpsr, saved);
        assert_eq!(
            cpu.bus.diagnostics.drain(),
            vec![Diagnostic::StaleSavedStatus {
                mode: Mode::Supervisor
            }]
        );
    }

    #[test]
    fn check_restore_without_bank_keeps_cpsr() {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::User);
        cpu.cpsr.set_zero_flag(true);
        let before = cpu.cpsr;

        cpu.restore_saved_status();
        assert_eq!(cpu.cpsr, before);
        assert_eq!(
            cpu.bus.diagnostics.drain(),
            vec![Diagnostic::SavedStatusUnavailable { mode: Mode::User }]
        );
    }

    #[test]
    fn check_restore_invalid_mode_keeps_mode() {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::Irq);
        cpu.register_bank
            .write(Mode::Irq, Psr::from_raw(0xF000_0000))
            .unwrap();

        cpu.restore_saved_status();
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.sign_flag());
        assert_eq!(
            cpu.bus.diagnostics.drain(),
            vec![Diagnostic::InvalidModeWrite { bits: 0 }]
        );
    }

    #[test]
    fn check_unsupported_exception_is_fatal() {
        let mut cpu = Arm7tdmi::default();
        assert_eq!(
            cpu.raise_exception(Exception::DataAbort, 0),
            Err(FatalError::UnsupportedException(Exception::DataAbort))
        );
        assert_eq!(cpu.raise_exception(Exception::Irq, 0x44), Ok(()));
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
    }
}
