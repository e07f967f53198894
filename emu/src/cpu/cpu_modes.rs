use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// The normal program execution state.
    User = 0b10000,

    /// Fast interrupt, banks r8-r14.
    Fiq = 0b10001,

    /// General-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system, entered on reset and SWI.
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed.
    Undefined = 0b11011,

    /// Privileged mode sharing the User register bank.
    System = 0b11111,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid mode bits 0b{0:05b}")]
pub struct InvalidMode(pub u32);

impl Mode {
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = InvalidMode;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n & 0b11111 {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            bits => Err(InvalidMode(bits)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "USR",
            Self::Fiq => "FIQ",
            Self::Irq => "IRQ",
            Self::Supervisor => "SVC",
            Self::Abort => "ABT",
            Self::Undefined => "UND",
            Self::System => "SYS",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_valid_modes() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(u32::from(mode)), Ok(mode));
        }
    }

    #[test]
    fn check_invalid_mode() {
        assert_eq!(Mode::try_from(0b10100), Err(InvalidMode(0b10100)));
        assert_eq!(Mode::try_from(0), Err(InvalidMode(0)));
    }

    #[test]
    fn check_privileged_modes() {
        assert!(!Mode::User.is_privileged());
        assert!(Mode::System.is_privileged());
        assert!(Mode::Irq.is_privileged());
    }
}
