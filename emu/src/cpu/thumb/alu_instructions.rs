use std::fmt;

use serde::{Deserialize, Serialize};

/// Format 4 opcodes, bits 6-9.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Lsl = 0x2,
    Lsr = 0x3,
    Asr = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Ror = 0x7,
    Tst = 0x8,
    Neg = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mul = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u16> for ThumbModeAluInstruction {
    fn from(alu_op_code: u16) -> Self {
        use ThumbModeAluInstruction::*;
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Lsl,
            0x3 => Lsr,
            0x4 => Asr,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Ror,
            0x8 => Tst,
            0x9 => Neg,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mul,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

impl fmt::Display for ThumbModeAluInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ThumbModeAluInstruction::*;
        f.write_str(match self {
            And => "AND",
            Eor => "EOR",
            Lsl => "LSL",
            Lsr => "LSR",
            Asr => "ASR",
            Adc => "ADC",
            Sbc => "SBC",
            Ror => "ROR",
            Tst => "TST",
            Neg => "NEG",
            Cmp => "CMP",
            Cmn => "CMN",
            Orr => "ORR",
            Mul => "MUL",
            Bic => "BIC",
            Mvn => "MVN",
        })
    }
}

/// Format 5 opcodes, bits 8-9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbHighRegisterOperation {
    Add,
    Cmp,
    Mov,
    Bx,
}

impl fmt::Display for ThumbHighRegisterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mov => f.write_str("MOV"),
            Self::Cmp => f.write_str("CMP"),
            Self::Add => f.write_str("ADD"),
            Self::Bx => f.write_str("BX"),
        }
    }
}

impl From<u16> for ThumbHighRegisterOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Add,
            1 => Self::Cmp,
            2 => Self::Mov,
            _ => Self::Bx,
        }
    }
}

/// Format 3 opcodes, bits 11-12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbImmediateOperation {
    Mov,
    Cmp,
    Add,
    Sub,
}

impl From<u16> for ThumbImmediateOperation {
    fn from(op: u16) -> Self {
        match op & 0b11 {
            0 => Self::Mov,
            1 => Self::Cmp,
            2 => Self::Add,
            _ => Self::Sub,
        }
    }
}

impl fmt::Display for ThumbImmediateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mov => "MOV",
            Self::Cmp => "CMP",
            Self::Add => "ADD",
            Self::Sub => "SUB",
        })
    }
}

/// Format 8 transfers, selected by the H (bit 11) and S (bit 10) flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbSignedTransfer {
    StoreHalfword,
    LoadHalfword,
    LoadSignedByte,
    LoadSignedHalfword,
}

impl ThumbSignedTransfer {
    #[must_use]
    pub const fn from_flags(h: bool, s: bool) -> Self {
        match (s, h) {
            (false, false) => Self::StoreHalfword,
            (false, true) => Self::LoadHalfword,
            (true, false) => Self::LoadSignedByte,
            (true, true) => Self::LoadSignedHalfword,
        }
    }
}

impl fmt::Display for ThumbSignedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StoreHalfword => "STRH",
            Self::LoadHalfword => "LDRH",
            Self::LoadSignedByte => "LDSB",
            Self::LoadSignedHalfword => "LDSH",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversion_thumb_alu_op() {
        let op: ThumbModeAluInstruction = 0b0000.into();
        assert_eq!(op, ThumbModeAluInstruction::And);
        let op: ThumbModeAluInstruction = 0b0001.into();
        assert_eq!(op, ThumbModeAluInstruction::Eor);
        let op: ThumbModeAluInstruction = 0b1101.into();
        assert_eq!(op, ThumbModeAluInstruction::Mul);
        let op: ThumbModeAluInstruction = 0b1111.into();
        assert_eq!(op, ThumbModeAluInstruction::Mvn);
    }

    #[test]
    fn test_signed_transfer_flags() {
        assert_eq!(
            ThumbSignedTransfer::from_flags(false, false),
            ThumbSignedTransfer::StoreHalfword
        );
        assert_eq!(
            ThumbSignedTransfer::from_flags(true, true),
            ThumbSignedTransfer::LoadSignedHalfword
        );
        assert_eq!(ThumbSignedTransfer::from_flags(false, true).to_string(), "LDSB");
    }
}
