//! # ARM Instruction Decoding
//!
//! Classification is a first-match scan over a `(mask, pattern)` table. The
//! patterns overlap (BX, MRS and MSR all live inside the data-processing
//! space, multiplies and halfword transfers inside its register form), so the
//! table order is the tie-break:
//!
//! ```text
//! ┌────┬──────────────────────────┬────────────┬────────────┐
//! │ #  │ Format                   │ Mask       │ Pattern    │
//! ├────┼──────────────────────────┼────────────┼────────────┤
//! │  1 │ Branch and exchange      │ 0x0FFFFFF0 │ 0x012FFF10 │
//! │  2 │ Multiply                 │ 0x0FC000F0 │ 0x00000090 │
//! │  3 │ Multiply long            │ 0x0F8000F0 │ 0x00800090 │
//! │  4 │ Single data swap         │ 0x0FB00FF0 │ 0x01000090 │
//! │  5 │ Halfword, register       │ 0x0E400F90 │ 0x00000090 │
//! │  6 │ Halfword, immediate      │ 0x0E400090 │ 0x00400090 │
//! │  7 │ Breakpoint               │ 0x0FF000F0 │ 0x01200070 │
//! │  8 │ MRS                      │ 0x0FBF0FFF │ 0x010F0000 │
//! │  9 │ MSR, register            │ 0x0FB0FFF0 │ 0x0120F000 │
//! │ 10 │ MSR, immediate           │ 0x0FB0F000 │ 0x0320F000 │
//! │ 11 │ Data processing          │ 0x0C000000 │ 0x00000000 │
//! │ 12 │ Undefined                │ 0x0E000010 │ 0x06000010 │
//! │ 13 │ Single data transfer     │ 0x0C000000 │ 0x04000000 │
//! │ 14 │ Block data transfer      │ 0x0E000000 │ 0x08000000 │
//! │ 15 │ Branch                   │ 0x0E000000 │ 0x0A000000 │
//! │ 16 │ Coprocessor transfer     │ 0x0E000000 │ 0x0C000000 │
//! │ 17 │ Coprocessor operation    │ 0x0F000010 │ 0x0E000000 │
//! │ 18 │ Coprocessor register     │ 0x0F000010 │ 0x0E000010 │
//! │ 19 │ Software interrupt       │ 0x0F000000 │ 0x0F000000 │
//! └────┴──────────────────────────┴────────────┴────────────┘
//! ```
//!
//! ## Instruction Encoding Example
//!
//! ```text
//! ADD R0, R1, R2, LSL #3
//!
//! 31-28  27-26  25  24-21  20  19-16  15-12  11-7   6-5  4  3-0
//! [1110] [ 00 ] [0] [0100] [0] [0001] [0000] [00011][00] [0][0010]
//!   ↑       ↑    ↑    ↑     ↑    ↑      ↑      ↑     ↑   ↑   ↑
//!   │       │    │    │     │    │      │      │     │   │   └─ Rm = R2
//!   │       │    │    │     │    │      │      │     │   └──── Shift by imm
//!   │       │    │    │     │    │      │      │     └──────── LSL
//!   │       │    │    │     │    │      │      └────────────── Shift = 3
//!   │       │    │    │     │    │      └───────────────────── Rd = R0
//!   │       │    │    │     │    └──────────────────────────── Rn = R1
//!   │       │    │    │     └───────────────────────────────── S = 0 (no flags)
//!   │       │    │    └─────────────────────────────────────── ADD opcode
//!   │       │    └──────────────────────────────────────────── Register operand
//!   │       └───────────────────────────────────────────────── Data processing
//!   └───────────────────────────────────────────────────────── Always execute
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, sign_extended};
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, PsrOpKind, ShiftOperator, field_mask,
};
use crate::cpu::flags::{
    DecodeError, HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind,
    Offsetting, ReadWriteKind, ShiftKind,
};

/// Format tag produced by the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmFormat {
    BranchAndExchange,
    Multiply,
    MultiplyLong,
    SingleDataSwap,
    HalfwordRegisterOffset,
    HalfwordImmediateOffset,
    Breakpoint,
    Mrs,
    MsrRegister,
    MsrImmediate,
    DataProcessing,
    Undefined,
    SingleDataTransfer,
    BlockDataTransfer,
    Branch,
    CoprocessorDataTransfer,
    CoprocessorDataOperation,
    CoprocessorRegisterTransfer,
    SoftwareInterrupt,
}

const ARM_FORMATS: [(u32, u32, ArmFormat); 19] = [
    (0x0FFF_FFF0, 0x012F_FF10, ArmFormat::BranchAndExchange),
    (0x0FC0_00F0, 0x0000_0090, ArmFormat::Multiply),
    (0x0F80_00F0, 0x0080_0090, ArmFormat::MultiplyLong),
    (0x0FB0_0FF0, 0x0100_0090, ArmFormat::SingleDataSwap),
    (0x0E40_0F90, 0x0000_0090, ArmFormat::HalfwordRegisterOffset),
    (0x0E40_0090, 0x0040_0090, ArmFormat::HalfwordImmediateOffset),
    (0x0FF0_00F0, 0x0120_0070, ArmFormat::Breakpoint),
    (0x0FBF_0FFF, 0x010F_0000, ArmFormat::Mrs),
    (0x0FB0_FFF0, 0x0120_F000, ArmFormat::MsrRegister),
    (0x0FB0_F000, 0x0320_F000, ArmFormat::MsrImmediate),
    (0x0C00_0000, 0x0000_0000, ArmFormat::DataProcessing),
    (0x0E00_0010, 0x0600_0010, ArmFormat::Undefined),
    (0x0C00_0000, 0x0400_0000, ArmFormat::SingleDataTransfer),
    (0x0E00_0000, 0x0800_0000, ArmFormat::BlockDataTransfer),
    (0x0E00_0000, 0x0A00_0000, ArmFormat::Branch),
    (0x0E00_0000, 0x0C00_0000, ArmFormat::CoprocessorDataTransfer),
    (0x0F00_0010, 0x0E00_0000, ArmFormat::CoprocessorDataOperation),
    (0x0F00_0010, 0x0E00_0010, ArmFormat::CoprocessorRegisterTransfer),
    (0x0F00_0000, 0x0F00_0000, ArmFormat::SoftwareInterrupt),
];

impl ArmFormat {
    /// First table entry matching `op_code`.
    #[must_use]
    pub fn classify(op_code: u32) -> Option<Self> {
        ARM_FORMATS
            .iter()
            .find(|(mask, pattern, _)| op_code & mask == *pattern)
            .map(|&(_, _, format)| format)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: usize,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#{offset}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

/// All ARM instruction types after decoding, each carrying only the fields
/// its handler needs. The condition lives in
/// [`ArmModeOpcode`](super::mode::ArmModeOpcode).
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        accumulate: bool,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    MultiplyLong {
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    },
    PsrTransfer {
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        byte: bool,
        rn: usize,
        rd: usize,
        rm: usize,
    },
    BranchAndExchange {
        register: usize,
    },
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    },
    Branch {
        link: bool,
        /// Signed byte offset, already scaled.
        offset: u32,
    },
    SoftwareInterrupt {
        comment: u32,
    },
    Breakpoint,
    CoprocessorDataTransfer,
    CoprocessorDataOperation,
    CoprocessorRegisterTransfer,
    Undefined,
}

const fn register(op_code: u32, low_bit: u32) -> usize {
    ((op_code >> low_bit) & 0xF) as usize
}

fn decode_data_processing(op_code: u32) -> ArmModeInstruction {
    let op2 = if op_code.get_bit(25) {
        AluSecondOperandInfo::Immediate {
            base: op_code.get_bits(0..=7),
            shift: op_code.get_bits(8..=11) * 2,
        }
    } else {
        let shift_op = if op_code.get_bit(4) {
            ShiftOperator::Register(register(op_code, 8))
        } else {
            ShiftOperator::Immediate(op_code.get_bits(7..=11))
        };
        AluSecondOperandInfo::Register {
            shift_op,
            shift_kind: op_code.get_bits(5..=6).into(),
            register: register(op_code, 0),
        }
    };

    ArmModeInstruction::DataProcessing {
        alu_instruction: op_code.get_bits(21..=24).into(),
        set_conditions: op_code.get_bit(20),
        rn: register(op_code, 16),
        destination: register(op_code, 12),
        op2,
    }
}

fn decode_halfword(op_code: u32, immediate: bool) -> ArmModeInstruction {
    let load_store_kind: LoadStoreKind = op_code.get_bit(20).into();
    let Some(transfer_kind) = HalfwordTransferKind::from_sh(op_code.get_bits(5..=6)) else {
        return ArmModeInstruction::Undefined;
    };
    // Signed stores are not defined on ARMv4T.
    if load_store_kind == LoadStoreKind::Store
        && transfer_kind != HalfwordTransferKind::UnsignedHalfwords
    {
        return ArmModeInstruction::Undefined;
    }

    let offset_kind = if immediate {
        HalfwordDataTransferOffsetKind::Immediate {
            offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
        }
    } else {
        HalfwordDataTransferOffsetKind::Register {
            register: register(op_code, 0),
        }
    };

    ArmModeInstruction::HalfwordDataTransfer {
        indexing: op_code.get_bit(24).into(),
        offsetting: op_code.get_bit(23).into(),
        write_back: op_code.get_bit(21),
        load_store_kind,
        offset_kind,
        base_register: register(op_code, 16),
        source_destination_register: register(op_code, 12),
        transfer_kind,
    }
}

fn decode_single_data_transfer(op_code: u32) -> ArmModeInstruction {
    // The I bit is inverted compared to data processing: set means register.
    let offset_info = if op_code.get_bit(25) {
        SingleDataTransferOffsetInfo::RegisterImmediate {
            shift_amount: op_code.get_bits(7..=11),
            shift_kind: op_code.get_bits(5..=6).into(),
            reg_offset: register(op_code, 0),
        }
    } else {
        SingleDataTransferOffsetInfo::Immediate {
            offset: op_code.get_bits(0..=11),
        }
    };

    ArmModeInstruction::SingleDataTransfer {
        load_store: op_code.get_bit(20).into(),
        quantity: op_code.get_bit(22).into(),
        write_back: op_code.get_bit(21),
        indexing: op_code.get_bit(24).into(),
        rd: register(op_code, 12),
        base_register: register(op_code, 16),
        offset_info,
        offsetting: op_code.get_bit(23).into(),
    }
}

impl TryFrom<u32> for ArmModeInstruction {
    type Error = DecodeError;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        let format = ArmFormat::classify(op_code).ok_or(DecodeError { opcode: op_code })?;

        Ok(match format {
            ArmFormat::BranchAndExchange => Self::BranchAndExchange {
                register: register(op_code, 0),
            },
            ArmFormat::Multiply => Self::Multiply {
                accumulate: op_code.get_bit(21),
                set_conditions: op_code.get_bit(20),
                rd: register(op_code, 16),
                rn: register(op_code, 12),
                rs: register(op_code, 8),
                rm: register(op_code, 0),
            },
            ArmFormat::MultiplyLong => Self::MultiplyLong {
                signed: op_code.get_bit(22),
                accumulate: op_code.get_bit(21),
                set_conditions: op_code.get_bit(20),
                rd_hi: register(op_code, 16),
                rd_lo: register(op_code, 12),
                rs: register(op_code, 8),
                rm: register(op_code, 0),
            },
            ArmFormat::SingleDataSwap => Self::SingleDataSwap {
                byte: op_code.get_bit(22),
                rn: register(op_code, 16),
                rd: register(op_code, 12),
                rm: register(op_code, 0),
            },
            ArmFormat::HalfwordRegisterOffset => decode_halfword(op_code, false),
            ArmFormat::HalfwordImmediateOffset => decode_halfword(op_code, true),
            ArmFormat::Breakpoint => Self::Breakpoint,
            ArmFormat::Mrs => Self::PsrTransfer {
                psr_kind: op_code.get_bit(22).into(),
                kind: PsrOpKind::Mrs {
                    destination_register: register(op_code, 12),
                },
            },
            ArmFormat::MsrRegister => Self::PsrTransfer {
                psr_kind: op_code.get_bit(22).into(),
                kind: PsrOpKind::Msr {
                    source_register: register(op_code, 0),
                    field_mask: field_mask(op_code),
                },
            },
            ArmFormat::MsrImmediate => Self::PsrTransfer {
                psr_kind: op_code.get_bit(22).into(),
                kind: PsrOpKind::MsrImmediate {
                    operand: op_code
                        .get_bits(0..=7)
                        .rotate_right(op_code.get_bits(8..=11) * 2),
                    field_mask: field_mask(op_code),
                },
            },
            ArmFormat::DataProcessing => decode_data_processing(op_code),
            ArmFormat::Undefined => Self::Undefined,
            ArmFormat::SingleDataTransfer => decode_single_data_transfer(op_code),
            ArmFormat::BlockDataTransfer => Self::BlockDataTransfer {
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: register(op_code, 16),
                register_list: op_code.get_bits(0..=15) as u16,
            },
            ArmFormat::Branch => Self::Branch {
                link: op_code.get_bit(24),
                offset: sign_extended(op_code.get_bits(0..=23), 24) << 2,
            },
            ArmFormat::CoprocessorDataTransfer => Self::CoprocessorDataTransfer,
            ArmFormat::CoprocessorDataOperation => Self::CoprocessorDataOperation,
            ArmFormat::CoprocessorRegisterTransfer => Self::CoprocessorRegisterTransfer,
            ArmFormat::SoftwareInterrupt => Self::SoftwareInterrupt {
                comment: op_code.get_bits(0..=23),
            },
        })
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                let s = if *set_conditions && !alu_instruction.is_test() {
                    "S"
                } else {
                    ""
                };
                match alu_instruction {
                    ArmModeAluInstruction::Mov | ArmModeAluInstruction::Mvn => {
                        write!(f, "{alu_instruction}{s} R{destination}, {op2}")
                    }
                    test if test.is_test() => write!(f, "{alu_instruction} R{rn}, {op2}"),
                    _ => write!(f, "{alu_instruction}{s} R{destination}, R{rn}, {op2}"),
                }
            }
            Self::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                let s = if *set_conditions { "S" } else { "" };
                if *accumulate {
                    write!(f, "MLA{s} R{rd}, R{rm}, R{rs}, R{rn}")
                } else {
                    write!(f, "MUL{s} R{rd}, R{rm}, R{rs}")
                }
            }
            Self::MultiplyLong {
                signed,
                accumulate,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => {
                let sign = if *signed { "S" } else { "U" };
                let op = if *accumulate { "MLAL" } else { "MULL" };
                let s = if *set_conditions { "S" } else { "" };
                write!(f, "{sign}{op}{s} R{rd_lo}, R{rd_hi}, R{rm}, R{rs}")
            }
            Self::PsrTransfer { psr_kind, kind } => match kind {
                PsrOpKind::Mrs {
                    destination_register,
                } => write!(f, "MRS R{destination_register}, {psr_kind}"),
                PsrOpKind::Msr {
                    source_register,
                    field_mask,
                } => write!(f, "MSR {psr_kind}_{field_mask:08X}, R{source_register}"),
                PsrOpKind::MsrImmediate {
                    operand,
                    field_mask,
                } => write!(f, "MSR {psr_kind}_{field_mask:08X}, #0x{operand:X}"),
            },
            Self::SingleDataSwap { byte, rn, rd, rm } => {
                let b = if *byte { "B" } else { "" };
                write!(f, "SWP{b} R{rd}, R{rm}, [R{rn}]")
            }
            Self::BranchAndExchange { register } => write!(f, "BX R{register}"),
            Self::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                let sign = match offsetting {
                    Offsetting::Up => "",
                    Offsetting::Down => "-",
                };
                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset } => {
                        format!("#{sign}{offset}")
                    }
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        format!("{sign}R{register}")
                    }
                };
                let address = match indexing {
                    Indexing::Pre => {
                        let w = if *write_back { "!" } else { "" };
                        format!("[R{base_register}, {offset}]{w}")
                    }
                    Indexing::Post => format!("[R{base_register}], {offset}"),
                };
                write!(
                    f,
                    "{load_store_kind}{transfer_kind} R{source_destination_register}, {address}"
                )
            }
            Self::SingleDataTransfer {
                load_store,
                quantity,
                rd,
                base_register,
                offset_info,
                ..
            } => {
                let b = match quantity {
                    ReadWriteKind::Word => "",
                    ReadWriteKind::Byte => "B",
                };
                write!(f, "{load_store}{b} R{rd}, [R{base_register}], {offset_info}")
            }
            Self::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Store => "STM",
                    LoadStoreKind::Load => "LDM",
                };
                let direction = match offsetting {
                    Offsetting::Down => "D",
                    Offsetting::Up => "I",
                };
                let when = match indexing {
                    Indexing::Pre => "B",
                    Indexing::Post => "A",
                };
                let registers = (0..16_u8)
                    .filter(|&i| register_list.get_bit(i))
                    .map(|i| format!("R{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let w = if *write_back { "!" } else { "" };
                let caret = if *load_psr { "^" } else { "" };
                write!(f, "{op}{direction}{when} R{rn}{w}, {{{registers}}}{caret}")
            }
            Self::Branch { link, offset } => {
                let l = if *link { "L" } else { "" };
                write!(f, "B{l} {:+}", *offset as i32)
            }
            Self::SoftwareInterrupt { comment } => write!(f, "SWI 0x{comment:06X}"),
            Self::Breakpoint => f.write_str("BKPT"),
            Self::CoprocessorDataTransfer => f.write_str("LDC/STC"),
            Self::CoprocessorDataOperation => f.write_str("CDP"),
            Self::CoprocessorRegisterTransfer => f.write_str("MRC/MCR"),
            Self::Undefined => f.write_str("UND"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(op_code: u32) -> ArmModeInstruction {
        ArmModeInstruction::try_from(op_code).unwrap()
    }

    #[test]
    fn decode_every_opcode_has_a_format() {
        for _ in 0..10_000 {
            let op_code: u32 = rand::random();
            assert!(ArmFormat::classify(op_code).is_some());
        }
    }

    #[test]
    fn decode_priority_prefers_earlier_entry() {
        // Matches BX and data processing (TEQ, S=0).
        let op_code = 0xE12F_FF11;
        let matches: Vec<_> = ARM_FORMATS
            .iter()
            .filter(|(mask, pattern, _)| op_code & mask == *pattern)
            .map(|&(_, _, format)| format)
            .collect();
        assert_eq!(
            matches,
            vec![ArmFormat::BranchAndExchange, ArmFormat::DataProcessing]
        );
        assert_eq!(ArmFormat::classify(op_code), Some(ArmFormat::BranchAndExchange));

        // MUL is also a data-processing pattern.
        assert_eq!(ArmFormat::classify(0xE000_0291), Some(ArmFormat::Multiply));
        // SWP also matches the halfword register pattern with SH = 00.
        assert_eq!(ArmFormat::classify(0xE103_1092), Some(ArmFormat::SingleDataSwap));
        // MRS/MSR sit in the TST/CMP space with S clear.
        assert_eq!(ArmFormat::classify(0xE10F_0000), Some(ArmFormat::Mrs));
        assert_eq!(ArmFormat::classify(0xE129_F001), Some(ArmFormat::MsrRegister));
        assert_eq!(ArmFormat::classify(0xE328_F20F), Some(ArmFormat::MsrImmediate));
        assert_eq!(ArmFormat::classify(0xE120_0070), Some(ArmFormat::Breakpoint));
        // Register-offset LDR with bit 4 set.
        assert_eq!(ArmFormat::classify(0xE790_0011), Some(ArmFormat::Undefined));
    }

    #[test]
    fn decode_branch() {
        let output = decode(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                link: true,
                offset: 508,
            }
        );
        assert_eq!(output.to_string(), "BL +508");

        let output = decode(0xEAFF_FFFE);
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                link: false,
                offset: (-8_i32) as u32,
            }
        );
    }

    #[test]
    fn decode_branch_and_exchange() {
        let output = decode(0b1110_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!(output, ArmModeInstruction::BranchAndExchange { register: 1 });
        assert_eq!(output.to_string(), "BX R1");
    }

    #[test]
    fn decode_data_processing() {
        // ADD R0, R1, R2, LSL #3
        let output = decode(0xE081_0182);
        assert_eq!(
            output,
            ArmModeInstruction::DataProcessing {
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(3),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            }
        );
        assert_eq!(output.to_string(), "ADD R0, R1, R2, LSL #3");

        // MOVS R0, #0xFF000000
        let output = decode(0xE3B0_04FF);
        assert_eq!(output.to_string(), "MOVS R0, #0xFF000000");

        // CMP R3, R4, ROR R5
        let output = decode(0xE153_0574);
        assert_eq!(output.to_string(), "CMP R3, R4, ROR R5");
    }

    #[test]
    fn decode_psr_transfer() {
        let output = decode(0b1110_00_0_1011_0_1001_1111_000000001110);
        assert_eq!(
            output,
            ArmModeInstruction::PsrTransfer {
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    source_register: 14,
                    field_mask: 0xFF00_00FF,
                }
            }
        );

        let output = decode(0xE328_F20F);
        assert_eq!(
            output,
            ArmModeInstruction::PsrTransfer {
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::MsrImmediate {
                    operand: 0xF000_0000,
                    field_mask: 0xFF00_0000,
                }
            }
        );
    }

    #[test]
    fn decode_multiply() {
        assert_eq!(
            decode(0xE031_0392),
            ArmModeInstruction::Multiply {
                accumulate: true,
                set_conditions: true,
                rd: 1,
                rn: 0,
                rs: 3,
                rm: 2,
            }
        );
        assert_eq!(
            decode(0xE0C1_0392),
            ArmModeInstruction::MultiplyLong {
                signed: true,
                accumulate: false,
                set_conditions: false,
                rd_hi: 1,
                rd_lo: 0,
                rs: 3,
                rm: 2,
            }
        );
    }

    #[test]
    fn decode_half_word_data_transfer_immediate_offset() {
        let output = decode(0b1110_0001_1100_0001_0000_0000_1011_0000);
        assert_eq!(
            output,
            ArmModeInstruction::HalfwordDataTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Store,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 0 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            }
        );
    }

    #[test]
    fn decode_half_word_data_transfer_register_offset() {
        let output = decode(0b1110_0001_1001_0010_0000_0000_1111_0001);
        assert_eq!(
            output,
            ArmModeInstruction::HalfwordDataTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Load,
                offset_kind: HalfwordDataTransferOffsetKind::Register { register: 1 },
                base_register: 2,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::SignedHalfwords,
            }
        );
        assert_eq!(output.to_string(), "LDRSH R0, [R2, R1]");
    }

    #[test]
    fn decode_signed_store_is_undefined() {
        assert_eq!(decode(0xE1C0_00F0), ArmModeInstruction::Undefined);
    }

    #[test]
    fn decode_single_data_transfer() {
        let output = decode(0b11100111010100010101000000001100);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataTransfer {
                load_store: LoadStoreKind::Load,
                quantity: ReadWriteKind::Byte,
                write_back: false,
                indexing: Indexing::Pre,
                rd: 5,
                base_register: 1,
                offset_info: SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: 0,
                    shift_kind: ShiftKind::Lsl,
                    reg_offset: 12
                },
                offsetting: Offsetting::Down
            }
        );
    }

    #[test]
    fn decode_block_data_transfer() {
        // STMDB SP!, {R0-R3, LR}
        let output = decode(0xE92D_400F);
        assert_eq!(
            output,
            ArmModeInstruction::BlockDataTransfer {
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                load_psr: false,
                write_back: true,
                load_store: LoadStoreKind::Store,
                rn: 13,
                register_list: 0x400F,
            }
        );
        assert_eq!(output.to_string(), "STMDB R13!, {R0, R1, R2, R3, R14}");
    }

    #[test]
    fn decode_single_data_swap() {
        let output = decode(0b1110_0001_0100_0110_0100_0000_1001_0101);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataSwap {
                byte: true,
                rn: 6,
                rd: 4,
                rm: 5,
            }
        );
        assert_eq!(output.to_string(), "SWPB R4, R5, [R6]");
    }

    #[test]
    fn decode_software_interrupt_and_coprocessor() {
        assert_eq!(
            decode(0xEF00_0005),
            ArmModeInstruction::SoftwareInterrupt { comment: 5 }
        );
        assert_eq!(decode(0xEE01_0F10), ArmModeInstruction::CoprocessorRegisterTransfer);
        assert_eq!(decode(0xEE01_0F00), ArmModeInstruction::CoprocessorDataOperation);
        assert_eq!(decode(0xED90_0000), ArmModeInstruction::CoprocessorDataTransfer);
    }
}
