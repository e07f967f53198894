use crate::cpu::flags::DecodeError;
use crate::cpu::thumb::instruction::ThumbModeInstruction;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ThumbModeOpcode {
    pub instruction: ThumbModeInstruction,
    pub raw: u16,
}

impl TryFrom<u16> for ThumbModeOpcode {
    type Error = DecodeError;

    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        Ok(Self {
            instruction: ThumbModeInstruction::try_from(op_code)?,
            raw: op_code,
        })
    }
}

impl std::ops::Deref for ThumbModeOpcode {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl ThumbModeOpcode {
    const fn layout(&self) -> &'static str {
        match &self.instruction {
            ThumbModeInstruction::MoveShiftedRegister { .. } => {
                "FMT: |0_0_0|Op_|__Offset_|_Rs__|_Rd__|"
            }
            ThumbModeInstruction::AddSubtract { .. } => "FMT: |0_0_0_1_1|I|O|RnOff|_Rs__|_Rd__|",
            ThumbModeInstruction::MoveCompareAddSubtractImm { .. } => {
                "FMT: |0_0_1|Op_|_Rd__|____Offset_____|"
            }
            ThumbModeInstruction::AluOperation { .. } => "FMT: |0_1_0_0_0_0|__Op___|_Rs__|_Rd__|",
            ThumbModeInstruction::HiRegisterOperation { .. } => {
                "FMT: |0_1_0_0_0_1|_Op|H|H|Rs/Hs|Rd/Hd|"
            }
            ThumbModeInstruction::PcRelativeLoad { .. } => "FMT: |0_1_0_0_1|_Rd__|_____Word8_____|",
            ThumbModeInstruction::LoadStoreRegisterOffset { .. } => {
                "FMT: |0_1_0_1|L|B|0|_Ro__|_Rb__|_Rd__|"
            }
            ThumbModeInstruction::LoadStoreSignExtended { .. } => {
                "FMT: |0_1_0_1|H|S|1|_Ro__|_Rb__|_Rd__|"
            }
            ThumbModeInstruction::LoadStoreImmediateOffset { .. } => {
                "FMT: |0_1_1|B|L|_Offset5_|_Rb__|_Rd__|"
            }
            ThumbModeInstruction::LoadStoreHalfword { .. } => {
                "FMT: |1_0_0_0|L|_Offset5_|_Rb__|_Rd__|"
            }
            ThumbModeInstruction::SpRelativeLoadStore { .. } => {
                "FMT: |1_0_0_1|L|_Rd__|_____Word8_____|"
            }
            ThumbModeInstruction::LoadAddress { .. } => "FMT: |1_0_1_0|S|_Rd__|_____Word8_____|",
            ThumbModeInstruction::AddOffsetSp { .. } => "FMT: |1_0_1_1_0_0_0_0|S|____Word7____|",
            ThumbModeInstruction::PushPop { .. } => "FMT: |1_0_1_1|L|1_0|R|_____Rlist_____|",
            ThumbModeInstruction::MultipleLoadStore { .. } => {
                "FMT: |1_1_0_0|L|_Rb__|_____Rlist_____|"
            }
            ThumbModeInstruction::ConditionalBranch { .. } => {
                "FMT: |1_1_0_1|_Cond__|_____Offset____|"
            }
            ThumbModeInstruction::SoftwareInterrupt { .. } => {
                "FMT: |1_1_0_1_1_1_1_1|_____Value_____|"
            }
            ThumbModeInstruction::UnconditionalBranch { .. } => {
                "FMT: |1_1_1_0_0|________Offset11_____|"
            }
            ThumbModeInstruction::LongBranchLink { .. } => {
                "FMT: |1_1_1_1|H|_______Offset________|"
            }
            ThumbModeInstruction::Breakpoint => "FMT: |1_0_1_1_1_1_1_0|____Comment____|",
            ThumbModeInstruction::Undefined => "FMT: |_______________xxx_____________|",
        }
    }
}

impl std::fmt::Display for ThumbModeOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = format!("INS: {}\n", self.instruction);

        let bytes_pos1 = "POS: |..........1 ..................0|\n";
        let bytes_pos2 = "     |5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0|\n";

        let mut raw_bits = String::new();
        for i in format!("{:#018b}", self.raw).chars().skip(2) {
            raw_bits.push(i);
            raw_bits.push('_');
        }
        raw_bits.pop();
        let raw_bits = format!("RAW: |{raw_bits}|\n");

        writeln!(
            f,
            "{instruction}{bytes_pos1}{bytes_pos2}{raw_bits}{}",
            self.layout()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_shows_bit_layout() {
        let op_code = ThumbModeOpcode::try_from(0xDF00).unwrap();
        assert_eq!(*op_code, 0xDF00);

        let text = op_code.to_string();
        assert!(text.starts_with("INS: SWI 0x00\n"));
        assert!(text.contains("RAW: |1_1_0_1_1_1_1_1_0_0_0_0_0_0_0_0|"));
        assert!(text.contains("FMT: |1_1_0_1_1_1_1_1|"));
    }
}
