//! ALU opcodes, second-operand forms and the barrel shifter.
//!
//! Shifter results follow the register-specified semantics; the immediate
//! encodings (LSR#0, ASR#0 meaning 32 and ROR#0 meaning RRX) are mapped onto
//! them by [`shift_immediate`].

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;
use crate::cpu::psr::{FIELD_CONTROL, FIELD_EXTENSION, FIELD_FLAGS, FIELD_STATUS};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum AluInstructionKind {
    Logical,
    Arithmetic,
}

pub trait Kind {
    fn kind(&self) -> AluInstructionKind;
}

impl Kind for ArmModeAluInstruction {
    fn kind(&self) -> AluInstructionKind {
        use ArmModeAluInstruction::*;
        match &self {
            And | Eor | Tst | Teq | Orr | Mov | Bic | Mvn => AluInstructionKind::Logical,
            Sub | Rsb | Add | Adc | Sbc | Rsc | Cmp | Cmn => AluInstructionKind::Arithmetic,
        }
    }
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only update flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::*;
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

/// Source of the shift amount for a register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOperator {
    /// 5-bit amount in the opcode.
    Immediate(u32),
    /// Bottom byte of a register.
    Register(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    /// 8-bit value rotated right by an even amount.
    Immediate { base: u32, shift: u32 },
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: usize,
    },
}

impl Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { base, shift } => write!(f, "#0x{:X}", base.rotate_right(*shift)),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Lsl,
                register,
            } => write!(f, "R{register}"),
            Self::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} #{amount}"),
            Self::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} R{rs}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

impl Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrOpKind {
    Mrs {
        destination_register: usize,
    },
    /// `field_mask` is the union of the selected `FIELD_*` byte masks.
    Msr {
        source_register: usize,
        field_mask: u32,
    },
    MsrImmediate {
        operand: u32,
        field_mask: u32,
    },
}

/// Control, extension, status and flags, in opcode bit order 16-19.
const PSR_FIELDS: [u32; 4] = [FIELD_CONTROL, FIELD_EXTENSION, FIELD_STATUS, FIELD_FLAGS];

/// Byte mask selected by the MSR field bits 16-19.
#[must_use]
pub fn field_mask(op_code: u32) -> u32 {
    PSR_FIELDS
        .iter()
        .zip(16_u8..)
        .filter(|&(_, bit)| op_code.get_bit(bit))
        .fold(0, |mask, (field, _)| mask | field)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    /// Result of a logical operation: `carry` comes from the shifter.
    #[must_use]
    pub const fn logical(result: u32, carry: bool) -> Self {
        Self {
            result,
            carry,
            overflow: false,
            sign: result >> 31 == 1,
            zero: result == 0,
        }
    }
}

/// `a + b + carry_in` with the carry taken from bit 32.
#[must_use]
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let result = wide as u32;
    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow: (!(a ^ b) & (a ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `a - b - !carry_in`. Carry out means no borrow.
#[must_use]
pub fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    let subtrahend = u64::from(b) + u64::from(!carry_in);
    let result = a.wrapping_sub(b).wrapping_sub(u32::from(!carry_in));
    ArithmeticOpResult {
        result,
        carry: u64::from(a) >= subtrahend,
        overflow: ((a ^ b) & (a ^ result)).get_bit(31),
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// Barrel shifter with a shift amount taken from a register (any value).
///
/// An amount of 0 leaves both value and carry untouched.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    let (result, carry) = match (kind, shift_amount) {
        (_, 0) => (rm, carry),

        (ShiftKind::Lsl, 1..=31) => (rm << shift_amount, rm.get_bit((32 - shift_amount) as u8)),
        (ShiftKind::Lsl, 32) => (0, rm.get_bit(0)),
        (ShiftKind::Lsl, _) => (0, false),

        (ShiftKind::Lsr, 1..=31) => (rm >> shift_amount, rm.get_bit((shift_amount - 1) as u8)),
        (ShiftKind::Lsr, 32) => (0, rm.get_bit(31)),
        (ShiftKind::Lsr, _) => (0, false),

        (ShiftKind::Asr, 1..=31) => (
            ((rm as i32) >> shift_amount) as u32,
            rm.get_bit((shift_amount - 1) as u8),
        ),
        (ShiftKind::Asr, _) => (((rm as i32) >> 31) as u32, rm.get_bit(31)),

        (ShiftKind::Ror, _) => match shift_amount % 32 {
            0 => (rm, rm.get_bit(31)),
            amount => (rm.rotate_right(amount), rm.get_bit((amount - 1) as u8)),
        },
    };

    ArithmeticOpResult::logical(result, carry)
}

/// Barrel shifter with a 5-bit immediate amount.
///
/// `LSR #0` and `ASR #0` encode a shift by 32, `ROR #0` encodes RRX
/// (rotate right by one through the carry flag).
#[must_use]
pub fn shift_immediate(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    match (kind, shift_amount) {
        (ShiftKind::Lsl, _) => shift(kind, shift_amount, rm, carry),
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift(kind, 32, rm, carry),
        (ShiftKind::Ror, 0) => {
            ArithmeticOpResult::logical((u32::from(carry) << 31) | (rm >> 1), rm.get_bit(0))
        }
        _ => shift(kind, shift_amount, rm, carry),
    }
}

/// Immediate second operand: carry is bit 31 of the result when rotated,
/// otherwise the current carry.
#[must_use]
pub const fn rotated_immediate(base: u32, rotate: u32, carry: bool) -> ArithmeticOpResult {
    let result = base.rotate_right(rotate);
    let carry = if rotate == 0 { carry } else { result >> 31 == 1 };
    ArithmeticOpResult::logical(result, carry)
}

/// Internal cycles `m` spent by the multiplier on the operand `rs`:
/// one per significant byte, stopping early when the upper bytes are all
/// zero (or all one, for the signed forms).
#[must_use]
pub const fn multiplier_cycles(rs: u32, signed: bool) -> u32 {
    let masks = [0xFFFF_FF00, 0xFFFF_0000, 0xFF00_0000];
    let mut idx = 0;
    while idx < masks.len() {
        let upper = rs & masks[idx];
        if upper == 0 || (signed && upper == masks[idx]) {
            return idx as u32 + 1;
        }
        idx += 1;
    }
    4
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_logical_instruction() {
        let alu_op_code = 9;
        let instruction_kind = ArmModeAluInstruction::from(alu_op_code).kind();

        assert_eq!(instruction_kind, AluInstructionKind::Logical);
    }

    #[test]
    fn test_arithmetic_instruction() {
        let alu_op_code = 2;
        let instruction_kind = ArmModeAluInstruction::from(alu_op_code).kind();

        assert_eq!(instruction_kind, AluInstructionKind::Arithmetic);
    }

    const AMOUNTS: [u32; 7] = [0, 1, 31, 32, 33, 63, 64];

    fn table(kind: ShiftKind, rm: u32, carry: bool) -> Vec<(u32, bool)> {
        AMOUNTS
            .iter()
            .map(|&amount| {
                let out = shift(kind, amount, rm, carry);
                (out.result, out.carry)
            })
            .collect()
    }

    #[test]
    fn check_lsl_edges() {
        let rm = 0x8000_0001;
        assert_eq!(
            table(ShiftKind::Lsl, rm, true),
            vec![
                (rm, true),
                (0x0000_0002, true),
                (0x8000_0000, false),
                (0, true),
                (0, false),
                (0, false),
                (0, false),
            ]
        );
    }

    #[test]
    fn check_lsr_edges() {
        let rm = 0x8000_0001;
        assert_eq!(
            table(ShiftKind::Lsr, rm, false),
            vec![
                (rm, false),
                (0x4000_0000, true),
                (0x0000_0001, false),
                (0, true),
                (0, false),
                (0, false),
                (0, false),
            ]
        );
    }

    #[test]
    fn check_asr_edges() {
        let rm = 0x8000_0001;
        assert_eq!(
            table(ShiftKind::Asr, rm, false),
            vec![
                (rm, false),
                (0xC000_0000, true),
                (0xFFFF_FFFF, false),
                (0xFFFF_FFFF, true),
                (0xFFFF_FFFF, true),
                (0xFFFF_FFFF, true),
                (0xFFFF_FFFF, true),
            ]
        );

        let positive = table(ShiftKind::Asr, 0x4000_0000, true);
        assert_eq!(positive[3], (0, false));
        assert_eq!(positive[6], (0, false));
    }

    #[test]
    fn check_ror_edges() {
        let rm = 0x8000_0001;
        assert_eq!(
            table(ShiftKind::Ror, rm, false),
            vec![
                (rm, false),
                (0xC000_0000, true),
                (0x0000_0003, false),
                (rm, true),
                (0xC000_0000, true),
                (0x0000_0003, false),
                (rm, true),
            ]
        );
    }

    #[test]
    fn check_immediate_encodings() {
        let rm = 0x8000_0003;
        assert_eq!(
            shift_immediate(ShiftKind::Lsr, 0, rm, false),
            shift(ShiftKind::Lsr, 32, rm, false)
        );
        assert_eq!(
            shift_immediate(ShiftKind::Asr, 0, rm, false),
            shift(ShiftKind::Asr, 32, rm, false)
        );
        assert_eq!(
            shift_immediate(ShiftKind::Lsl, 0, rm, true),
            shift(ShiftKind::Lsl, 0, rm, true)
        );
        for amount in [1, 31] {
            for kind in [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror] {
                assert_eq!(
                    shift_immediate(kind, amount, rm, false),
                    shift(kind, amount, rm, false)
                );
            }
        }
    }

    #[test]
    fn check_rrx() {
        let out = shift_immediate(ShiftKind::Ror, 0, 0x0000_0003, true);
        assert_eq!((out.result, out.carry), (0x8000_0001, true));

        let out = shift_immediate(ShiftKind::Ror, 0, 0x0000_0002, false);
        assert_eq!((out.result, out.carry), (0x0000_0001, false));
    }

    #[test]
    fn check_rotated_immediate_carry() {
        assert!(rotated_immediate(0xFF, 0, true).carry);
        let out = rotated_immediate(0x02, 2, false);
        assert_eq!((out.result, out.carry), (0x8000_0000, true));
    }

    #[test]
    fn check_add_flags() {
        let out = add_with_carry(0xFFFF_FFFF, 1, false);
        assert_eq!((out.result, out.carry, out.zero, out.overflow), (0, true, true, false));

        let out = add_with_carry(0x7FFF_FFFF, 1, false);
        assert_eq!((out.sign, out.overflow, out.carry), (true, true, false));

        assert_eq!(add_with_carry(1, 1, true).result, 3);
    }

    #[test]
    fn check_sub_flags() {
        let out = sub_with_carry(5, 3, true);
        assert_eq!((out.result, out.carry, out.overflow), (2, true, false));

        let out = sub_with_carry(3, 5, true);
        assert_eq!((out.result, out.carry, out.sign), (0xFFFF_FFFE, false, true));

        let out = sub_with_carry(0x8000_0000, 1, true);
        assert_eq!((out.overflow, out.carry), (true, true));

        // SBC with borrow-in.
        let out = sub_with_carry(5, 5, false);
        assert_eq!((out.result, out.carry), (0xFFFF_FFFF, false));
    }

    #[test]
    fn check_add_then_sub_restores() {
        for _ in 0..256 {
            let a: u32 = rand::random();
            let b: u32 = rand::random();
            let sum = add_with_carry(a, b, false).result;
            let back = sub_with_carry(sum, b, true);
            assert_eq!(back.result, a);
            assert_eq!(back.carry, sum >= b);
        }
    }

    #[test]
    fn check_field_mask() {
        assert_eq!(field_mask(0x0009_0000), 0xFF00_00FF);
        assert_eq!(field_mask(0x0002_0000), FIELD_EXTENSION);
        assert_eq!(field_mask(0x0004_0000), FIELD_STATUS);
        assert_eq!(field_mask(0x000F_0000), 0xFFFF_FFFF);
        assert_eq!(field_mask(0), 0);
    }

    #[test]
    fn check_multiplier_cycles() {
        assert_eq!(multiplier_cycles(0xFF, false), 1);
        assert_eq!(multiplier_cycles(0x100, false), 2);
        assert_eq!(multiplier_cycles(0x00FF_FFFF, false), 3);
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, false), 4);
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, true), 1);
        assert_eq!(multiplier_cycles(0xFFFF_8000, true), 2);
        assert_eq!(multiplier_cycles(0x8000_0000, true), 4);
    }
}
