//! # Conditional execution
//!
//! Bits 31-28 of every ARM opcode (and bits 11-8 of a THUMB conditional
//! branch) select a predicate over the N, Z, C and V flags:
//!
//! ```text
//! ┌───────┬────────┬──────────────────────────┬─────────────────────┐
//! │ Code  │ Suffix │ Meaning                  │ Flags tested        │
//! ├───────┼────────┼──────────────────────────┼─────────────────────┤
//! │ 0000  │   EQ   │ equal                    │ Z=1                 │
//! │ 0001  │   NE   │ not equal                │ Z=0                 │
//! │ 0010  │   CS   │ unsigned higher or same  │ C=1                 │
//! │ 0011  │   CC   │ unsigned lower           │ C=0                 │
//! │ 0100  │   MI   │ negative                 │ N=1                 │
//! │ 0101  │   PL   │ positive or zero         │ N=0                 │
//! │ 0110  │   VS   │ overflow                 │ V=1                 │
//! │ 0111  │   VC   │ no overflow              │ V=0                 │
//! │ 1000  │   HI   │ unsigned higher          │ C=1 and Z=0         │
//! │ 1001  │   LS   │ unsigned lower or same   │ C=0 or Z=1          │
//! │ 1010  │   GE   │ signed greater or equal  │ N=V                 │
//! │ 1011  │   LT   │ signed less than         │ N≠V                 │
//! │ 1100  │   GT   │ signed greater than      │ Z=0 and N=V         │
//! │ 1101  │   LE   │ signed less or equal     │ Z=1 or N≠V          │
//! │ 1110  │   AL   │ always                   │                     │
//! │ 1111  │   NV   │ reserved                 │                     │
//! └───────┴────────┴──────────────────────────┴─────────────────────┘
//! ```
//!
//! A false predicate turns the instruction into a NOP that still pays for its
//! fetch. NV has no defined predicate on ARMv4T: the core skips the instruction
//! and reports it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    EQ = 0x0,
    NE = 0x1,
    CS = 0x2,
    CC = 0x3,
    MI = 0x4,
    PL = 0x5,
    VS = 0x6,
    VC = 0x7,
    HI = 0x8,
    LS = 0x9,
    GE = 0xA,
    LT = 0xB,
    GT = 0xC,
    LE = 0xD,
    AL = 0xE,
    /// Reserved.
    NV = 0xF,
}

impl Condition {
    /// Evaluates the predicate against the given flags.
    /// `None` for the reserved code.
    #[must_use]
    pub const fn holds(self, n: bool, z: bool, c: bool, v: bool) -> Option<bool> {
        let result = match self {
            Self::EQ => z,
            Self::NE => !z,
            Self::CS => c,
            Self::CC => !c,
            Self::MI => n,
            Self::PL => !n,
            Self::VS => v,
            Self::VC => !v,
            Self::HI => c && !z,
            Self::LS => !c || z,
            Self::GE => n == v,
            Self::LT => n != v,
            Self::GT => !z && n == v,
            Self::LE => z || n != v,
            Self::AL => true,
            Self::NV => return None,
        };
        Some(result)
    }
}

impl From<u8> for Condition {
    fn from(item: u8) -> Self {
        match item & 0xF {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            _ => Self::NV,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AL => Ok(()),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_signed_conditions() {
        // N=1, V=0: negative result without overflow means "less than".
        assert_eq!(Condition::LT.holds(true, false, false, false), Some(true));
        assert_eq!(Condition::GE.holds(true, false, false, false), Some(false));
        assert_eq!(Condition::GT.holds(true, false, false, true), Some(true));
        assert_eq!(Condition::LE.holds(false, true, false, false), Some(true));
    }

    #[test]
    fn check_unsigned_conditions() {
        assert_eq!(Condition::HI.holds(false, false, true, false), Some(true));
        assert_eq!(Condition::HI.holds(false, true, true, false), Some(false));
        assert_eq!(Condition::LS.holds(false, true, true, false), Some(true));
    }

    #[test]
    fn check_reserved() {
        assert_eq!(Condition::from(0xF), Condition::NV);
        assert_eq!(Condition::NV.holds(true, true, true, true), None);
        assert_eq!(Condition::AL.to_string(), "");
        assert_eq!(Condition::NE.to_string(), "NE");
    }
}
