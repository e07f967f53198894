//! Saved status words (SPSR), one per exception mode.
//!
//! A bank is filled on exception entry (or by an explicit MSR) and emptied by
//! the matching return. Reading a bank that was never filled, or that a return
//! already consumed, is reported as stale but still yields the stored word.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SavedStatus {
    psr: Psr,
    live: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedStatusFault {
    /// The mode has no saved status word.
    Unavailable,
    /// The bank holds a word that was not written since its last consumption.
    Stale(Psr),
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    spsr: [SavedStatus; 5],
}

const fn slot(mode: Mode) -> Option<usize> {
    match mode {
        Mode::Fiq => Some(0),
        Mode::Irq => Some(1),
        Mode::Supervisor => Some(2),
        Mode::Abort => Some(3),
        Mode::Undefined => Some(4),
        Mode::User | Mode::System => None,
    }
}

impl RegisterBank {
    pub fn read(&self, mode: Mode) -> Result<Psr, SavedStatusFault> {
        let idx = slot(mode).ok_or(SavedStatusFault::Unavailable)?;
        let saved = self.spsr[idx];
        if saved.live {
            Ok(saved.psr)
        } else {
            Err(SavedStatusFault::Stale(saved.psr))
        }
    }

    pub fn write(&mut self, mode: Mode, psr: Psr) -> Result<(), SavedStatusFault> {
        let idx = slot(mode).ok_or(SavedStatusFault::Unavailable)?;
        self.spsr[idx] = SavedStatus { psr, live: true };
        Ok(())
    }

    /// Read for an exception return. The bank is marked consumed.
    pub fn consume(&mut self, mode: Mode) -> Result<Psr, SavedStatusFault> {
        let value = self.read(mode);
        if let Some(idx) = slot(mode) {
            self.spsr[idx].live = false;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_user_has_no_bank() {
        let mut bank = RegisterBank::default();
        assert_eq!(bank.read(Mode::User), Err(SavedStatusFault::Unavailable));
        assert_eq!(
            bank.write(Mode::System, Psr::default()),
            Err(SavedStatusFault::Unavailable)
        );
    }

    #[test]
    fn check_write_then_consume() {
        let mut bank = RegisterBank::default();
        let saved = Psr::from(Mode::User);

        bank.write(Mode::Irq, saved).unwrap();
        assert_eq!(bank.read(Mode::Irq), Ok(saved));
        assert_eq!(bank.consume(Mode::Irq), Ok(saved));
        assert_eq!(bank.read(Mode::Irq), Err(SavedStatusFault::Stale(saved)));
    }

    #[test]
    fn check_banks_are_independent() {
        let mut bank = RegisterBank::default();
        bank.write(Mode::Supervisor, Psr::from_raw(0x1F)).unwrap();

        assert_eq!(bank.read(Mode::Supervisor), Ok(Psr::from_raw(0x1F)));
        assert_eq!(
            bank.read(Mode::Undefined),
            Err(SavedStatusFault::Stale(Psr::default()))
        );
    }
}
