use crate::bitwise::sign_extended;
use crate::cpu::arm::alu_instruction::{
    ArithmeticOpResult, add_with_carry, multiplier_cycles, shift, shift_immediate, sub_with_carry,
};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
    ThumbSignedTransfer,
};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::diagnostics::Diagnostic;

impl Arm7tdmi {
    pub fn execute_thumb(&mut self, op_code: ThumbModeOpcode) {
        let address = self.current_instruction_address();
        let opcode = u32::from(op_code.raw);

        match op_code.instruction {
            ThumbModeInstruction::MoveShiftedRegister {
                shift_kind,
                offset,
                rs,
                rd,
            } => self.move_shifted_reg(shift_kind, offset, rs, rd),
            ThumbModeInstruction::AddSubtract {
                immediate,
                subtract,
                operand,
                rs,
                rd,
            } => self.add_subtract(immediate, subtract, operand, rs, rd),
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation,
                rd,
                offset,
            } => self.move_compare_add_sub_imm(operation, rd, offset),
            ThumbModeInstruction::AluOperation {
                alu_operation,
                rs,
                rd,
            } => self.alu_op(alu_operation, rs, rd),
            ThumbModeInstruction::HiRegisterOperation { operation, rs, rd } => {
                self.hi_reg_operation_branch_ex(operation, rs, rd);
            }
            ThumbModeInstruction::PcRelativeLoad { rd, offset } => {
                self.pc_relative_load(rd, offset);
            }
            ThumbModeInstruction::LoadStoreRegisterOffset {
                load_store,
                quantity,
                ro,
                rb,
                rd,
            } => {
                let address = self.read_register(rb).wrapping_add(self.read_register(ro));
                self.load_store_word_byte(load_store, quantity, address, rd);
            }
            ThumbModeInstruction::LoadStoreSignExtended {
                transfer,
                ro,
                rb,
                rd,
            } => self.load_store_sign_extend_byte_halfword(transfer, ro, rb, rd),
            ThumbModeInstruction::LoadStoreImmediateOffset {
                load_store,
                quantity,
                offset,
                rb,
                rd,
            } => {
                let address = self.read_register(rb).wrapping_add(offset);
                self.load_store_word_byte(load_store, quantity, address, rd);
            }
            ThumbModeInstruction::LoadStoreHalfword {
                load_store,
                offset,
                rb,
                rd,
            } => self.load_store_halfword(load_store, offset, rb, rd),
            ThumbModeInstruction::SpRelativeLoadStore {
                load_store,
                rd,
                offset,
            } => {
                let address = self.read_register(REG_SP).wrapping_add(offset);
                self.load_store_word_byte(load_store, ReadWriteKind::Word, address, rd);
            }
            ThumbModeInstruction::LoadAddress { sp, rd, offset } => {
                self.load_address(sp, rd, offset);
            }
            ThumbModeInstruction::AddOffsetSp { subtract, offset } => {
                self.add_offset_sp(subtract, offset);
            }
            ThumbModeInstruction::PushPop {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            ThumbModeInstruction::MultipleLoadStore {
                load_store,
                rb,
                register_list,
            } => self.block_data_transfer(
                Indexing::Post,
                Offsetting::Up,
                false,
                true,
                load_store,
                rb,
                register_list,
            ),
            ThumbModeInstruction::ConditionalBranch { condition, offset } => {
                self.cond_branch(condition, offset);
            }
            ThumbModeInstruction::SoftwareInterrupt { .. } => self.software_interrupt(),
            ThumbModeInstruction::UnconditionalBranch { offset } => {
                let pc = self.read_register(REG_PROGRAM_COUNTER);
                self.branch_to(pc.wrapping_add(offset));
            }
            ThumbModeInstruction::LongBranchLink { high, offset } => {
                self.long_branch_link(high, offset);
            }
            ThumbModeInstruction::Breakpoint => {
                self.undefined_instruction(Diagnostic::Breakpoint { address, opcode });
            }
            ThumbModeInstruction::Undefined => {
                self.undefined_instruction(Diagnostic::UndefinedInstruction { address, opcode });
            }
        }
    }

    pub fn move_shifted_reg(&mut self, shift_kind: ShiftKind, offset: u32, rs: usize, rd: usize) {
        let source = self.read_register(rs);
        let result = shift_immediate(shift_kind, offset, source, self.cpsr.carry_flag());
        self.write_register(rd, result.result);
        self.cpsr.set_logical_flags(&result);
    }

    pub fn add_subtract(
        &mut self,
        immediate: bool,
        subtract: bool,
        operand: u32,
        rs: usize,
        rd: usize,
    ) {
        let op1 = self.read_register(rs);
        let op2 = if immediate {
            operand
        } else {
            self.read_register(operand as usize)
        };

        let result = if subtract {
            sub_with_carry(op1, op2, true)
        } else {
            add_with_carry(op1, op2, false)
        };
        self.write_register(rd, result.result);
        self.cpsr.set_flags(&result);
    }

    pub fn move_compare_add_sub_imm(
        &mut self,
        operation: ThumbImmediateOperation,
        rd: usize,
        offset: u32,
    ) {
        let value = self.read_register(rd);
        match operation {
            ThumbImmediateOperation::Mov => {
                // Same as MOVS Rd, #imm8 in ARM: no rotation, so C is kept.
                let result = ArithmeticOpResult::logical(offset, self.cpsr.carry_flag());
                self.write_register(rd, offset);
                self.cpsr.set_logical_flags(&result);
            }
            ThumbImmediateOperation::Cmp => {
                self.cpsr.set_flags(&sub_with_carry(value, offset, true));
            }
            ThumbImmediateOperation::Add => {
                let result = add_with_carry(value, offset, false);
                self.write_register(rd, result.result);
                self.cpsr.set_flags(&result);
            }
            ThumbImmediateOperation::Sub => {
                let result = sub_with_carry(value, offset, true);
                self.write_register(rd, result.result);
                self.cpsr.set_flags(&result);
            }
        }
    }

    pub fn alu_op(&mut self, op: ThumbModeAluInstruction, rs: usize, rd: usize) {
        let source = self.read_register(rs);
        let destination = self.read_register(rd);
        let carry = self.cpsr.carry_flag();

        use ThumbModeAluInstruction::*;
        let (result, logical) = match op {
            And | Tst => (ArithmeticOpResult::logical(destination & source, carry), true),
            Eor => (ArithmeticOpResult::logical(destination ^ source, carry), true),
            Orr => (ArithmeticOpResult::logical(destination | source, carry), true),
            Bic => (ArithmeticOpResult::logical(destination & !source, carry), true),
            Mvn => (ArithmeticOpResult::logical(!source, carry), true),
            Lsl | Lsr | Asr | Ror => {
                let kind = match op {
                    Lsl => ShiftKind::Lsl,
                    Lsr => ShiftKind::Lsr,
                    Asr => ShiftKind::Asr,
                    _ => ShiftKind::Ror,
                };
                self.bus.idle(1);
                (shift(kind, source & 0xFF, destination, carry), true)
            }
            Adc => (add_with_carry(destination, source, carry), false),
            Sbc => (sub_with_carry(destination, source, carry), false),
            Neg => (sub_with_carry(0, source, true), false),
            Cmp => (sub_with_carry(destination, source, true), false),
            Cmn => (add_with_carry(destination, source, false), false),
            Mul => {
                self.bus.idle(multiplier_cycles(destination, true));
                // C is left as it was.
                (
                    ArithmeticOpResult::logical(destination.wrapping_mul(source), carry),
                    true,
                )
            }
        };

        if !matches!(op, Tst | Cmp | Cmn) {
            self.write_register(rd, result.result);
        }
        if logical {
            self.cpsr.set_logical_flags(&result);
        } else {
            self.cpsr.set_flags(&result);
        }
    }

    /// Format 5. Flags are only touched by CMP.
    pub fn hi_reg_operation_branch_ex(
        &mut self,
        operation: ThumbHighRegisterOperation,
        rs: usize,
        rd: usize,
    ) {
        let source = self.read_register(rs);
        match operation {
            ThumbHighRegisterOperation::Add => {
                let value = self.read_register(rd).wrapping_add(source);
                self.write_register(rd, value);
            }
            ThumbHighRegisterOperation::Cmp => {
                let result = sub_with_carry(self.read_register(rd), source, true);
                self.cpsr.set_flags(&result);
            }
            ThumbHighRegisterOperation::Mov => self.write_register(rd, source),
            ThumbHighRegisterOperation::Bx => self.branch_and_exchange(rs),
        }
    }

    /// r15 is word-aligned before adding the offset.
    pub fn pc_relative_load(&mut self, rd: usize, offset: u32) {
        let address = (self.read_register(REG_PROGRAM_COUNTER) & !2).wrapping_add(offset);
        let value = self.load_word(address);
        self.bus.idle(1);
        self.write_register(rd, value);
    }

    fn load_store_word_byte(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        address: u32,
        rd: usize,
    ) {
        match (load_store, quantity) {
            (LoadStoreKind::Store, ReadWriteKind::Word) => {
                self.bus.write_32(address, self.read_register(rd));
            }
            (LoadStoreKind::Store, ReadWriteKind::Byte) => {
                self.bus.write_8(address, self.read_register(rd) as u8);
            }
            (LoadStoreKind::Load, quantity) => {
                let value = match quantity {
                    ReadWriteKind::Word => self.load_word(address),
                    ReadWriteKind::Byte => u32::from(self.bus.read_8(address)),
                };
                self.bus.idle(1);
                self.write_register(rd, value);
            }
        }
    }

    pub fn load_store_sign_extend_byte_halfword(
        &mut self,
        transfer: ThumbSignedTransfer,
        ro: usize,
        rb: usize,
        rd: usize,
    ) {
        let address = self.read_register(rb).wrapping_add(self.read_register(ro));
        let value = match transfer {
            ThumbSignedTransfer::StoreHalfword => {
                self.bus.write_16(address, self.read_register(rd) as u16);
                return;
            }
            ThumbSignedTransfer::LoadHalfword => self.load_half_word(address),
            ThumbSignedTransfer::LoadSignedByte => self.load_signed_byte(address),
            ThumbSignedTransfer::LoadSignedHalfword => self.load_signed_half_word(address),
        };
        self.bus.idle(1);
        self.write_register(rd, value);
    }

    pub fn load_store_halfword(
        &mut self,
        load_store: LoadStoreKind,
        offset: u32,
        rb: usize,
        rd: usize,
    ) {
        let address = self.read_register(rb).wrapping_add(offset);
        match load_store {
            LoadStoreKind::Store => self.bus.write_16(address, self.read_register(rd) as u16),
            LoadStoreKind::Load => {
                let value = self.load_half_word(address);
                self.bus.idle(1);
                self.write_register(rd, value);
            }
        }
    }

    pub fn load_address(&mut self, sp: bool, rd: usize, offset: u32) {
        let base = if sp {
            self.read_register(REG_SP)
        } else {
            self.read_register(REG_PROGRAM_COUNTER) & !2
        };
        self.write_register(rd, base.wrapping_add(offset));
    }

    pub fn add_offset_sp(&mut self, subtract: bool, offset: u32) {
        let sp = self.read_register(REG_SP);
        let sp = if subtract {
            sp.wrapping_sub(offset)
        } else {
            sp.wrapping_add(offset)
        };
        self.write_register(REG_SP, sp);
    }

    /// PUSH is `STMDB sp!`, POP is `LDMIA sp!`. POP {pc} stays in THUMB.
    pub fn push_pop_register(&mut self, load_store: LoadStoreKind, pc_lr: bool, register_list: u16) {
        match load_store {
            LoadStoreKind::Store => {
                let list = register_list | (u16::from(pc_lr) << REG_LR);
                self.block_data_transfer(
                    Indexing::Pre,
                    Offsetting::Down,
                    false,
                    true,
                    load_store,
                    REG_SP,
                    list,
                );
            }
            LoadStoreKind::Load => {
                let list = register_list | (u16::from(pc_lr) << REG_PROGRAM_COUNTER);
                self.block_data_transfer(
                    Indexing::Post,
                    Offsetting::Up,
                    false,
                    true,
                    load_store,
                    REG_SP,
                    list,
                );
            }
        }
    }

    pub fn cond_branch(&mut self, condition: Condition, offset: u32) {
        if self.cpsr.can_execute(condition) == Some(true) {
            let pc = self.read_register(REG_PROGRAM_COUNTER);
            self.branch_to(pc.wrapping_add(offset));
        }
    }

    pub fn long_branch_link(&mut self, high: bool, offset: u32) {
        if high {
            let target = self
                .read_register(REG_LR)
                .wrapping_add(offset << 1);
            let next = self.next_instruction_address();
            self.write_register(REG_LR, next | 1);
            self.branch_to(target);
        } else {
            let pc = self.read_register(REG_PROGRAM_COUNTER);
            let upper = sign_extended(offset, 11) << 12;
            self.write_register(REG_LR, pc.wrapping_add(upper));
        }
    }
}
