//! # THUMB Instruction Decoding
//!
//! Sixteen-bit opcodes are classified by a priority-ordered table of
//! `(mask, pattern)` pairs. Several entries overlap (the conditional branch
//! space contains SWI and an undefined condition, the `0xB` page holds
//! PUSH/POP, `ADD SP` and BKPT), so the first match wins.
//!
//! ```text
//! ┌────┬───────────────────────────┬────────┬─────────┐
//! │ #  │ Format                    │ Mask   │ Pattern │
//! ├────┼───────────────────────────┼────────┼─────────┤
//! │  1 │ Long branch with link     │ 0xF000 │ 0xF000  │
//! │  2 │ BLX suffix (undefined)    │ 0xF800 │ 0xE800  │
//! │  3 │ Unconditional branch      │ 0xF800 │ 0xE000  │
//! │  4 │ Software interrupt        │ 0xFF00 │ 0xDF00  │
//! │  5 │ Undefined condition       │ 0xFF00 │ 0xDE00  │
//! │  6 │ Conditional branch        │ 0xF000 │ 0xD000  │
//! │  7 │ Multiple load/store       │ 0xF000 │ 0xC000  │
//! │  8 │ Breakpoint                │ 0xFF00 │ 0xBE00  │
//! │  9 │ Push/pop                  │ 0xF600 │ 0xB400  │
//! │ 10 │ Add offset to SP          │ 0xFF00 │ 0xB000  │
//! │ 11 │ Undefined (0xB page)      │ 0xF000 │ 0xB000  │
//! │ 12 │ Load address              │ 0xF000 │ 0xA000  │
//! │ 13 │ SP-relative load/store    │ 0xF000 │ 0x9000  │
//! │ 14 │ Load/store halfword       │ 0xF000 │ 0x8000  │
//! │ 15 │ Load/store imm. offset    │ 0xE000 │ 0x6000  │
//! │ 16 │ Load/store sign-extended  │ 0xF200 │ 0x5200  │
//! │ 17 │ Load/store reg. offset    │ 0xF200 │ 0x5000  │
//! │ 18 │ PC-relative load          │ 0xF800 │ 0x4800  │
//! │ 19 │ Hi register ops / BX      │ 0xFC00 │ 0x4400  │
//! │ 20 │ ALU operations            │ 0xFC00 │ 0x4000  │
//! │ 21 │ Move/compare/add/sub imm. │ 0xE000 │ 0x2000  │
//! │ 22 │ Add/subtract              │ 0xF800 │ 0x1800  │
//! │ 23 │ Move shifted register     │ 0xE000 │ 0x0000  │
//! └────┴───────────────────────────┴────────┴─────────┘
//! ```
//!
//! ## Register Restrictions
//!
//! Most THUMB instructions only reach R0-R7. R8-R15 are available through
//! the hi register operations, BX, and the LR/PC bit of PUSH/POP.
//!
//! ## Long Branch (BL)
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, sign_extended};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{DecodeError, LoadStoreKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
    ThumbSignedTransfer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbFormat {
    LongBranchLink,
    BlxSuffix,
    UnconditionalBranch,
    SoftwareInterrupt,
    UndefinedCondition,
    ConditionalBranch,
    MultipleLoadStore,
    Breakpoint,
    PushPop,
    AddOffsetSp,
    UndefinedMisc,
    LoadAddress,
    SpRelativeLoadStore,
    LoadStoreHalfword,
    LoadStoreImmediateOffset,
    LoadStoreSignExtended,
    LoadStoreRegisterOffset,
    PcRelativeLoad,
    HiRegisterOperation,
    AluOperation,
    MoveCompareAddSubtract,
    AddSubtract,
    MoveShiftedRegister,
}

const THUMB_FORMATS: [(u16, u16, ThumbFormat); 23] = [
    (0xF000, 0xF000, ThumbFormat::LongBranchLink),
    (0xF800, 0xE800, ThumbFormat::BlxSuffix),
    (0xF800, 0xE000, ThumbFormat::UnconditionalBranch),
    (0xFF00, 0xDF00, ThumbFormat::SoftwareInterrupt),
    (0xFF00, 0xDE00, ThumbFormat::UndefinedCondition),
    (0xF000, 0xD000, ThumbFormat::ConditionalBranch),
    (0xF000, 0xC000, ThumbFormat::MultipleLoadStore),
    (0xFF00, 0xBE00, ThumbFormat::Breakpoint),
    (0xF600, 0xB400, ThumbFormat::PushPop),
    (0xFF00, 0xB000, ThumbFormat::AddOffsetSp),
    (0xF000, 0xB000, ThumbFormat::UndefinedMisc),
    (0xF000, 0xA000, ThumbFormat::LoadAddress),
    (0xF000, 0x9000, ThumbFormat::SpRelativeLoadStore),
    (0xF000, 0x8000, ThumbFormat::LoadStoreHalfword),
    (0xE000, 0x6000, ThumbFormat::LoadStoreImmediateOffset),
    (0xF200, 0x5200, ThumbFormat::LoadStoreSignExtended),
    (0xF200, 0x5000, ThumbFormat::LoadStoreRegisterOffset),
    (0xF800, 0x4800, ThumbFormat::PcRelativeLoad),
    (0xFC00, 0x4400, ThumbFormat::HiRegisterOperation),
    (0xFC00, 0x4000, ThumbFormat::AluOperation),
    (0xE000, 0x2000, ThumbFormat::MoveCompareAddSubtract),
    (0xF800, 0x1800, ThumbFormat::AddSubtract),
    (0xE000, 0x0000, ThumbFormat::MoveShiftedRegister),
];

impl ThumbFormat {
    /// First table entry matching `op_code`.
    #[must_use]
    pub fn classify(op_code: u16) -> Option<Self> {
        THUMB_FORMATS
            .iter()
            .find(|(mask, pattern, _)| op_code & mask == *pattern)
            .map(|&(_, _, format)| format)
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbModeInstruction {
    MoveShiftedRegister {
        shift_kind: ShiftKind,
        offset: u32,
        rs: usize,
        rd: usize,
    },
    AddSubtract {
        immediate: bool,
        subtract: bool,
        /// Rn, or a 3-bit value when `immediate`.
        operand: u32,
        rs: usize,
        rd: usize,
    },
    MoveCompareAddSubtractImm {
        operation: ThumbImmediateOperation,
        rd: usize,
        offset: u32,
    },
    AluOperation {
        alu_operation: ThumbModeAluInstruction,
        rs: usize,
        rd: usize,
    },
    HiRegisterOperation {
        operation: ThumbHighRegisterOperation,
        rs: usize,
        rd: usize,
    },
    PcRelativeLoad {
        rd: usize,
        offset: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        ro: usize,
        rb: usize,
        rd: usize,
    },
    LoadStoreSignExtended {
        transfer: ThumbSignedTransfer,
        ro: usize,
        rb: usize,
        rd: usize,
    },
    LoadStoreImmediateOffset {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        /// Already scaled by the transfer size.
        offset: u32,
        rb: usize,
        rd: usize,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        rb: usize,
        rd: usize,
    },
    SpRelativeLoadStore {
        load_store: LoadStoreKind,
        rd: usize,
        offset: u32,
    },
    LoadAddress {
        sp: bool,
        rd: usize,
        offset: u32,
    },
    AddOffsetSp {
        subtract: bool,
        offset: u32,
    },
    PushPop {
        load_store: LoadStoreKind,
        /// LR for PUSH, PC for POP.
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        rb: usize,
        register_list: u16,
    },
    ConditionalBranch {
        condition: Condition,
        /// Sign-extended byte offset.
        offset: u32,
    },
    SoftwareInterrupt {
        comment: u8,
    },
    UnconditionalBranch {
        offset: u32,
    },
    LongBranchLink {
        /// Set on the second (branching) halfword.
        high: bool,
        offset: u32,
    },
    Breakpoint,
    Undefined,
}

const fn low_register(op_code: u16, low_bit: u16) -> usize {
    ((op_code >> low_bit) & 0b111) as usize
}

impl TryFrom<u16> for ThumbModeInstruction {
    type Error = DecodeError;

    fn try_from(op_code: u16) -> Result<Self, Self::Error> {
        let format = ThumbFormat::classify(op_code).ok_or(DecodeError {
            opcode: u32::from(op_code),
        })?;

        let rd = low_register(op_code, 0);
        let rs = low_register(op_code, 3);

        Ok(match format {
            ThumbFormat::MoveShiftedRegister => Self::MoveShiftedRegister {
                shift_kind: u32::from(op_code.get_bits(11..=12)).into(),
                offset: u32::from(op_code.get_bits(6..=10)),
                rs,
                rd,
            },
            ThumbFormat::AddSubtract => Self::AddSubtract {
                immediate: op_code.get_bit(10),
                subtract: op_code.get_bit(9),
                operand: u32::from(op_code.get_bits(6..=8)),
                rs,
                rd,
            },
            ThumbFormat::MoveCompareAddSubtract => Self::MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                rd: low_register(op_code, 8),
                offset: u32::from(op_code.get_bits(0..=7)),
            },
            ThumbFormat::AluOperation => Self::AluOperation {
                alu_operation: op_code.get_bits(6..=9).into(),
                rs,
                rd,
            },
            ThumbFormat::HiRegisterOperation => Self::HiRegisterOperation {
                operation: op_code.get_bits(8..=9).into(),
                rs: usize::from(op_code.get_bits(3..=6)),
                rd: rd | (usize::from(op_code.get_bit(7)) << 3),
            },
            ThumbFormat::PcRelativeLoad => Self::PcRelativeLoad {
                rd: low_register(op_code, 8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFormat::LoadStoreRegisterOffset => Self::LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                quantity: op_code.get_bit(10).into(),
                ro: low_register(op_code, 6),
                rb: rs,
                rd,
            },
            ThumbFormat::LoadStoreSignExtended => Self::LoadStoreSignExtended {
                transfer: ThumbSignedTransfer::from_flags(op_code.get_bit(11), op_code.get_bit(10)),
                ro: low_register(op_code, 6),
                rb: rs,
                rd,
            },
            ThumbFormat::LoadStoreImmediateOffset => {
                let quantity: ReadWriteKind = op_code.get_bit(12).into();
                let offset = u32::from(op_code.get_bits(6..=10));
                Self::LoadStoreImmediateOffset {
                    load_store: op_code.get_bit(11).into(),
                    quantity,
                    offset: match quantity {
                        ReadWriteKind::Word => offset << 2,
                        ReadWriteKind::Byte => offset,
                    },
                    rb: rs,
                    rd,
                }
            }
            ThumbFormat::LoadStoreHalfword => Self::LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                rb: rs,
                rd,
            },
            ThumbFormat::SpRelativeLoadStore => Self::SpRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                rd: low_register(op_code, 8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFormat::LoadAddress => Self::LoadAddress {
                sp: op_code.get_bit(11),
                rd: low_register(op_code, 8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            },
            ThumbFormat::AddOffsetSp => Self::AddOffsetSp {
                subtract: op_code.get_bit(7),
                offset: u32::from(op_code.get_bits(0..=6)) << 2,
            },
            ThumbFormat::PushPop => Self::PushPop {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            },
            ThumbFormat::MultipleLoadStore => Self::MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                rb: low_register(op_code, 8),
                register_list: op_code.get_bits(0..=7),
            },
            ThumbFormat::ConditionalBranch => Self::ConditionalBranch {
                condition: Condition::from(op_code.get_bits(8..=11) as u8),
                offset: sign_extended(u32::from(op_code.get_bits(0..=7)) << 1, 9),
            },
            ThumbFormat::SoftwareInterrupt => Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=7) as u8,
            },
            ThumbFormat::UnconditionalBranch => Self::UnconditionalBranch {
                offset: sign_extended(u32::from(op_code.get_bits(0..=10)) << 1, 12),
            },
            ThumbFormat::LongBranchLink => Self::LongBranchLink {
                high: op_code.get_bit(11),
                offset: u32::from(op_code.get_bits(0..=10)),
            },
            ThumbFormat::Breakpoint => Self::Breakpoint,
            ThumbFormat::BlxSuffix | ThumbFormat::UndefinedCondition | ThumbFormat::UndefinedMisc => {
                Self::Undefined
            }
        })
    }
}

fn register_list_text(register_list: u16, extra: Option<&str>) -> String {
    let mut registers: Vec<String> = (0..8_u8)
        .filter(|&reg| register_list.get_bit(reg))
        .map(|reg| format!("R{reg}"))
        .collect();
    if let Some(extra) = extra {
        registers.push(extra.to_owned());
    }
    registers.join(", ")
}

/// Signed display of an already sign-extended offset.
fn signed_offset(offset: u32) -> String {
    let offset = offset as i32;
    if offset < 0 {
        format!("-{}", offset.unsigned_abs())
    } else {
        format!("+{offset}")
    }
}

impl fmt::Display for ThumbModeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveShiftedRegister {
                shift_kind,
                offset,
                rs,
                rd,
            } => write!(f, "{shift_kind} R{rd}, R{rs}, #{offset}"),
            Self::AddSubtract {
                immediate,
                subtract,
                operand,
                rs,
                rd,
            } => {
                let op = if *subtract { "SUB" } else { "ADD" };
                if *immediate {
                    write!(f, "{op} R{rd}, R{rs}, #{operand}")
                } else {
                    write!(f, "{op} R{rd}, R{rs}, R{operand}")
                }
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                rd,
                offset,
            } => write!(f, "{operation} R{rd}, #{offset}"),
            Self::AluOperation {
                alu_operation,
                rs,
                rd,
            } => write!(f, "{alu_operation} R{rd}, R{rs}"),
            Self::HiRegisterOperation {
                operation: ThumbHighRegisterOperation::Bx,
                rs,
                ..
            } => write!(f, "BX R{rs}"),
            Self::HiRegisterOperation { operation, rs, rd } => {
                write!(f, "{operation} R{rd}, R{rs}")
            }
            Self::PcRelativeLoad { rd, offset } => write!(f, "LDR R{rd}, [PC, #{offset}]"),
            Self::LoadStoreRegisterOffset {
                load_store,
                quantity,
                ro,
                rb,
                rd,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                write!(f, "{load_store}{b} R{rd}, [R{rb}, R{ro}]")
            }
            Self::LoadStoreSignExtended {
                transfer,
                ro,
                rb,
                rd,
            } => write!(f, "{transfer} R{rd}, [R{rb}, R{ro}]"),
            Self::LoadStoreImmediateOffset {
                load_store,
                quantity,
                offset,
                rb,
                rd,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                write!(f, "{load_store}{b} R{rd}, [R{rb}, #{offset}]")
            }
            Self::LoadStoreHalfword {
                load_store,
                offset,
                rb,
                rd,
            } => write!(f, "{load_store}H R{rd}, [R{rb}, #{offset}]"),
            Self::SpRelativeLoadStore {
                load_store,
                rd,
                offset,
            } => write!(f, "{load_store} R{rd}, [SP, #{offset}]"),
            Self::LoadAddress { sp, rd, offset } => {
                let source = if *sp { "SP" } else { "PC" };
                write!(f, "ADD R{rd}, {source}, #{offset}")
            }
            Self::AddOffsetSp { subtract, offset } => {
                let sign = if *subtract { "-" } else { "" };
                write!(f, "ADD SP, #{sign}{offset}")
            }
            Self::PushPop {
                load_store,
                pc_lr,
                register_list,
            } => {
                let (op, extra) = match load_store {
                    LoadStoreKind::Store => ("PUSH", "LR"),
                    LoadStoreKind::Load => ("POP", "PC"),
                };
                let registers = register_list_text(*register_list, pc_lr.then_some(extra));
                write!(f, "{op} {{{registers}}}")
            }
            Self::MultipleLoadStore {
                load_store,
                rb,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDMIA",
                    LoadStoreKind::Store => "STMIA",
                };
                let registers = register_list_text(*register_list, None);
                write!(f, "{op} R{rb}!, {{{registers}}}")
            }
            Self::ConditionalBranch { condition, offset } => {
                write!(f, "B{condition} {}", signed_offset(*offset))
            }
            Self::SoftwareInterrupt { comment } => write!(f, "SWI 0x{comment:02X}"),
            Self::UnconditionalBranch { offset } => write!(f, "B {}", signed_offset(*offset)),
            Self::LongBranchLink { high, offset } => {
                let half = if *high { "L" } else { "H" };
                write!(f, "BL{half} #0x{offset:03X}")
            }
            Self::Breakpoint => f.write_str("BKPT"),
            Self::Undefined => f.write_str("UNDEFINED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(op_code: u16) -> ThumbModeInstruction {
        ThumbModeInstruction::try_from(op_code).unwrap()
    }

    #[test]
    fn decode_every_opcode_has_a_format() {
        for op_code in 0..=u16::MAX {
            assert!(ThumbFormat::classify(op_code).is_some());
        }
    }

    #[test]
    fn decode_priority_prefers_earlier_entry() {
        // ADD/SUB sits inside the move-shifted-register space.
        assert_eq!(ThumbFormat::classify(0x1800), Some(ThumbFormat::AddSubtract));
        // SWI and the undefined condition sit inside the conditional branch space.
        assert_eq!(ThumbFormat::classify(0xDF00), Some(ThumbFormat::SoftwareInterrupt));
        assert_eq!(ThumbFormat::classify(0xDE00), Some(ThumbFormat::UndefinedCondition));
        assert_eq!(ThumbFormat::classify(0xD100), Some(ThumbFormat::ConditionalBranch));
        assert_eq!(ThumbFormat::classify(0xBE00), Some(ThumbFormat::Breakpoint));
        assert_eq!(ThumbFormat::classify(0xB500), Some(ThumbFormat::PushPop));
        assert_eq!(ThumbFormat::classify(0xB200), Some(ThumbFormat::UndefinedMisc));
        assert_eq!(ThumbFormat::classify(0xE800), Some(ThumbFormat::BlxSuffix));
    }

    #[test]
    fn decode_move_shifted_register() {
        let output = decode(0b000_01_00011_010_001);
        assert_eq!(
            output,
            ThumbModeInstruction::MoveShiftedRegister {
                shift_kind: ShiftKind::Lsr,
                offset: 3,
                rs: 2,
                rd: 1,
            }
        );
        assert_eq!(output.to_string(), "LSR R1, R2, #3");
    }

    #[test]
    fn decode_add_subtract() {
        let output = decode(0b00011_1_1_101_010_001);
        assert_eq!(
            output,
            ThumbModeInstruction::AddSubtract {
                immediate: true,
                subtract: true,
                operand: 5,
                rs: 2,
                rd: 1,
            }
        );
        assert_eq!(output.to_string(), "SUB R1, R2, #5");
        assert_eq!(decode(0x1800).to_string(), "ADD R0, R0, R0");
    }

    #[test]
    fn decode_move_compare_add_subtract_immediate() {
        let output = decode(0b001_01_011_1111_0000);
        assert_eq!(
            output,
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation: ThumbImmediateOperation::Cmp,
                rd: 3,
                offset: 0xF0,
            }
        );
        assert_eq!(output.to_string(), "CMP R3, #240");
    }

    #[test]
    fn decode_alu_operation() {
        let output = decode(0b0100_0011_0110_0000);
        assert_eq!(
            output,
            ThumbModeInstruction::AluOperation {
                alu_operation: ThumbModeAluInstruction::Mul,
                rs: 4,
                rd: 0,
            }
        );
        assert_eq!(output.to_string(), "MUL R0, R4");

        let output = decode(0b0100_0010_0100_0000);
        assert_eq!(output.to_string(), "NEG R0, R0");
    }

    #[test]
    fn decode_hi_register_operation() {
        let output = decode(0b0100_0111_0111_0000);
        assert_eq!(
            output,
            ThumbModeInstruction::HiRegisterOperation {
                operation: ThumbHighRegisterOperation::Bx,
                rs: 14,
                rd: 0,
            }
        );
        assert_eq!(output.to_string(), "BX R14");

        let output = decode(0b010001_00_0_1_000_001);
        assert_eq!(output.to_string(), "ADD R1, R8");

        let output = decode(0b010001_10_1_0_001_111);
        assert_eq!(output.to_string(), "MOV R15, R1");
    }

    #[test]
    fn decode_pc_relative_load() {
        let output = decode(0b0100_1001_0101_1000);
        assert_eq!(
            output,
            ThumbModeInstruction::PcRelativeLoad { rd: 1, offset: 352 }
        );
        assert_eq!(output.to_string(), "LDR R1, [PC, #352]");
    }

    #[test]
    fn decode_load_store_register_offset() {
        let output = decode(0b0101_00_0_000_001_010);
        assert_eq!(
            output,
            ThumbModeInstruction::LoadStoreRegisterOffset {
                load_store: LoadStoreKind::Store,
                quantity: ReadWriteKind::Word,
                ro: 0,
                rb: 1,
                rd: 2,
            }
        );
        assert_eq!(output.to_string(), "STR R2, [R1, R0]");
        assert_eq!(decode(0b0101_11_0_000_001_010).to_string(), "LDRB R2, [R1, R0]");
    }

    #[test]
    fn decode_load_store_sign_extended() {
        let output = decode(0b0101_1_1_1_011_001_010);
        assert_eq!(
            output,
            ThumbModeInstruction::LoadStoreSignExtended {
                transfer: ThumbSignedTransfer::LoadSignedHalfword,
                ro: 3,
                rb: 1,
                rd: 2,
            }
        );
        assert_eq!(output.to_string(), "LDSH R2, [R1, R3]");
    }

    #[test]
    fn decode_load_store_immediate_offset() {
        let output = decode(0b0110_1_00010_001_010);
        assert_eq!(
            output,
            ThumbModeInstruction::LoadStoreImmediateOffset {
                load_store: LoadStoreKind::Load,
                quantity: ReadWriteKind::Word,
                offset: 8,
                rb: 1,
                rd: 2,
            }
        );
        assert_eq!(output.to_string(), "LDR R2, [R1, #8]");

        // Byte offsets are not scaled.
        let output = decode(0b0111_1_00111_110_101);
        assert_eq!(output.to_string(), "LDRB R5, [R6, #7]");
    }

    #[test]
    fn decode_load_store_halfword() {
        let output = decode(0b1000_1_00001_000_001);
        assert_eq!(
            output,
            ThumbModeInstruction::LoadStoreHalfword {
                load_store: LoadStoreKind::Load,
                offset: 2,
                rb: 0,
                rd: 1,
            }
        );
        assert_eq!(output.to_string(), "LDRH R1, [R0, #2]");
    }

    #[test]
    fn decode_sp_relative_and_load_address() {
        assert_eq!(
            decode(0b1001_0_011_0000_0010),
            ThumbModeInstruction::SpRelativeLoadStore {
                load_store: LoadStoreKind::Store,
                rd: 3,
                offset: 8,
            }
        );
        let output = decode(0b1010_1_010_0000_0001);
        assert_eq!(
            output,
            ThumbModeInstruction::LoadAddress {
                sp: true,
                rd: 2,
                offset: 4,
            }
        );
        assert_eq!(output.to_string(), "ADD R2, SP, #4");
    }

    #[test]
    fn decode_add_offset_sp() {
        let output = decode(0b1011_0000_1_000_0011);
        assert_eq!(
            output,
            ThumbModeInstruction::AddOffsetSp {
                subtract: true,
                offset: 12,
            }
        );
        assert_eq!(output.to_string(), "ADD SP, #-12");
    }

    #[test]
    fn decode_push_pop() {
        let output = decode(0b1011_0101_1111_0000);
        assert_eq!(
            output,
            ThumbModeInstruction::PushPop {
                load_store: LoadStoreKind::Store,
                pc_lr: true,
                register_list: 0xF0,
            }
        );
        assert_eq!(output.to_string(), "PUSH {R4, R5, R6, R7, LR}");
        assert_eq!(decode(0xBD01).to_string(), "POP {R0, PC}");
    }

    #[test]
    fn decode_multiple_load_store() {
        let output = decode(0b1100_1001_1010_0000);
        assert_eq!(
            output,
            ThumbModeInstruction::MultipleLoadStore {
                load_store: LoadStoreKind::Load,
                rb: 1,
                register_list: 0xA0,
            }
        );
        assert_eq!(output.to_string(), "LDMIA R1!, {R5, R7}");
    }

    #[test]
    fn decode_branches() {
        let output = decode(0xD1FE);
        assert_eq!(
            output,
            ThumbModeInstruction::ConditionalBranch {
                condition: Condition::NE,
                offset: (-4_i32) as u32,
            }
        );
        assert_eq!(output.to_string(), "BNE -4");

        let output = decode(0b1110_0001_0010_1111);
        assert_eq!(output, ThumbModeInstruction::UnconditionalBranch { offset: 606 });
        assert_eq!(output.to_string(), "B +606");

        // Negative 11-bit offsets are sign extended.
        let output = decode(0xE7FE);
        assert_eq!(output, ThumbModeInstruction::UnconditionalBranch { offset: (-4_i32) as u32 });
    }

    #[test]
    fn decode_long_branch_link() {
        assert_eq!(
            decode(0b1111_0_000_0000_0001),
            ThumbModeInstruction::LongBranchLink {
                high: false,
                offset: 1,
            }
        );
        assert_eq!(
            decode(0b1111_1_000_0000_0010),
            ThumbModeInstruction::LongBranchLink {
                high: true,
                offset: 2,
            }
        );
    }

    #[test]
    fn decode_exceptions() {
        assert_eq!(
            decode(0xDF2A),
            ThumbModeInstruction::SoftwareInterrupt { comment: 0x2A }
        );
        assert_eq!(decode(0xBE00), ThumbModeInstruction::Breakpoint);
        assert_eq!(decode(0xDE00), ThumbModeInstruction::Undefined);
        assert_eq!(decode(0xE800), ThumbModeInstruction::Undefined);
    }
}
