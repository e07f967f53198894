use crate::bitwise::Bits;
use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::condition::Condition;
use crate::cpu::flags::DecodeError;

/// A decoded ARM word: condition plus instruction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmModeOpcode {
    pub instruction: ArmModeInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl TryFrom<u32> for ArmModeOpcode {
    type Error = DecodeError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        Ok(Self {
            instruction: ArmModeInstruction::try_from(op_code)?,
            condition: Condition::from(op_code.get_bits(28..=31) as u8),
            raw: op_code,
        })
    }
}

impl std::ops::Deref for ArmModeOpcode {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl ArmModeOpcode {
    /// Disassembly with the condition suffix folded into the mnemonic.
    #[must_use]
    pub fn disassembly(&self) -> String {
        let text = self.instruction.to_string();
        let condition = self.condition.to_string();
        if condition.is_empty() {
            return text;
        }
        match text.split_once(' ') {
            Some((mnemonic, operands)) => format!("{mnemonic}{condition} {operands}"),
            None => format!("{text}{condition}"),
        }
    }

    const fn layout(&self) -> &'static str {
        match &self.instruction {
            ArmModeInstruction::DataProcessing { .. } => {
                "FMT: |_Cond__|0_0|I|_code__|S|__Rn___|__Rd___|_______operand2________|"
            }
            ArmModeInstruction::PsrTransfer { .. } => {
                "FMT: |_Cond__|0_0|I|1_0|P|x|0|_Field_|__Rd___|_______operand2________|"
            }
            ArmModeInstruction::Multiply { .. } => {
                "FMT: |_Cond__|0_0_0_0_0_0|A|S|__Rd___|__Rn___|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::MultiplyLong { .. } => {
                "FMT: |_Cond__|0_0_0_0_1|U|A|S|_RdHi__|_RdLo__|__Rs___|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::SingleDataSwap { .. } => {
                "FMT: |_Cond__|0_0_0_1_0|B|0_0|__Rn___|__Rd___|0_0_0_0|1_0_0_1|__Rm___|"
            }
            ArmModeInstruction::BranchAndExchange { .. } => {
                "FMT: |_Cond__|0_0_0_1|0_0_1_0|1_1_1_1|1_1_1_1|1_1_1_1|0_0_0_1|__Rn___|"
            }
            ArmModeInstruction::HalfwordDataTransfer {
                offset_kind: crate::cpu::flags::HalfwordDataTransferOffsetKind::Register { .. },
                ..
            } => "FMT: |_Cond__|0_0_0|P|U|0|W|L|__Rn___|__Rd___|0_0_0_0|1|S|H|1|__Rm___|",
            ArmModeInstruction::HalfwordDataTransfer { .. } => {
                "FMT: |_Cond__|0_0_0|P|U|1|W|L|__Rn___|__Rd___|_Offset|1|S|H|1|_Offset|"
            }
            ArmModeInstruction::SingleDataTransfer { .. } => {
                "FMT: |_Cond__|0_1|I|P|U|B|W|L|__Rn___|__Rd___|________Offset_________|"
            }
            ArmModeInstruction::BlockDataTransfer { .. } => {
                "FMT: |_Cond__|1_0_0|P|U|S|W|L|__Rn___|_____________Reg_List__________|"
            }
            ArmModeInstruction::Branch { .. } => {
                "FMT: |_Cond__|1_0_1|L|______________________Offset___________________|"
            }
            ArmModeInstruction::CoprocessorDataTransfer => {
                "FMT: |_Cond__|1_1_0|P|U|N|W|L|__Rn___|__CRd__|__Cp#__|____Offset_____|"
            }
            ArmModeInstruction::CoprocessorDataOperation => {
                "FMT: |_Cond__|1_1_1_0|_CP_Opc|__CRn__|__CRd__|__Cp#__|_CP__|0|__CRm__|"
            }
            ArmModeInstruction::CoprocessorRegisterTransfer => {
                "FMT: |_Cond__|1_1_1_0|CPOpc|L|__CRn__|__Rd___|__Cp#__|_CP__|1|__CRm__|"
            }
            ArmModeInstruction::SoftwareInterrupt { .. } => {
                "FMT: |_Cond__|1_1_1_1|_____________Ignored by processor______________|"
            }
            ArmModeInstruction::Breakpoint => {
                "FMT: |_Cond__|0_0_0_1_0_0_1_0|___________Comment___________|0_1_1_1|_Cmt_|"
            }
            ArmModeInstruction::Undefined => {
                "FMT: |_Cond__|0_1_1|___________________xxx_________________|1|__xxx__|"
            }
        }
    }
}

impl std::fmt::Display for ArmModeOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = format!("INS: {}\n", self.disassembly());

        let bytes_pos1 = "POS: |..3 ..................2 ..................1 ..................0|\n";
        let bytes_pos2 = "     |1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0_9_8_7_6_5_4_3_2_1_0|\n";

        let mut raw_bits = String::new();
        for i in format!("{:#034b}", self.raw).chars().skip(2) {
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
    fn condition_is_split_from_instruction() {
        let op_code = ArmModeOpcode::try_from(0x1A00_0002).unwrap();
        assert_eq!(op_code.condition, Condition::NE);
        assert_eq!(op_code.disassembly(), "BNE +8");
        assert_eq!(*op_code, 0x1A00_0002);
    }

    #[test]
    fn display_shows_bit_layout() {
        let op_code = ArmModeOpcode::try_from(0xE12F_FF11).unwrap();
        let text = op_code.to_string();
        assert!(text.starts_with("INS: BX R1\n"));
        assert!(text.contains("RAW: |1_1_1_0_0_0_0_1_0_0_1_0_1_1_1_1"));
        assert!(text.contains("|0_0_0_1|__Rn___|"));
    }
}
