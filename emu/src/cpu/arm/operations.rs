use crate::bitwise::{Bits, sign_extended};
use crate::cpu::arm::alu_instruction::{
    AluInstructionKind, AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction, Kind,
    PsrKind, PsrOpKind, ShiftOperator, add_with_carry, multiplier_cycles, rotated_immediate,
    shift, shift_immediate, sub_with_carry,
};
use crate::cpu::arm::instructions::{ArmModeInstruction, SingleDataTransferOffsetInfo};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting,
    ReadWriteKind,
};
use crate::cpu::psr::Psr;
use crate::cpu::register_bank::SavedStatusFault;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use crate::diagnostics::Diagnostic;

impl Arm7tdmi {
    pub fn execute_arm(&mut self, op_code: ArmModeOpcode) {
        match self.cpsr.can_execute(op_code.condition) {
            Some(true) => {}
            Some(false) => return,
            None => {
                let address = self.current_instruction_address();
                self.bus.diagnostics.record(Diagnostic::ReservedCondition {
                    address,
                    opcode: op_code.raw,
                });
                return;
            }
        }

        let address = self.current_instruction_address();
        let opcode = op_code.raw;

        match op_code.instruction {
            ArmModeInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            ArmModeInstruction::PsrTransfer { psr_kind, kind } => {
                self.psr_transfer(kind, psr_kind);
            }
            ArmModeInstruction::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(accumulate, set_conditions, rd, rn, rs, rm),
            ArmModeInstruction::MultiplyLong {
                signed,
                accumulate,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => self.multiply_long(signed, accumulate, set_conditions, rd_hi, rd_lo, rs, rm),
            ArmModeInstruction::SingleDataSwap { byte, rn, rd, rm } => {
                self.single_data_swap(byte, rn, rd, rm);
            }
            ArmModeInstruction::BranchAndExchange { register } => {
                self.branch_and_exchange(register);
            }
            ArmModeInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmModeInstruction::SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => self.single_data_transfer(
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch { link, offset } => self.branch(link, offset),
            ArmModeInstruction::SoftwareInterrupt { .. } => self.software_interrupt(),
            ArmModeInstruction::Breakpoint => {
                self.undefined_instruction(Diagnostic::Breakpoint { address, opcode });
            }
            ArmModeInstruction::CoprocessorDataTransfer
            | ArmModeInstruction::CoprocessorDataOperation
            | ArmModeInstruction::CoprocessorRegisterTransfer => {
                self.undefined_instruction(Diagnostic::CoprocessorAccess { address, opcode });
            }
            ArmModeInstruction::Undefined => {
                self.undefined_instruction(Diagnostic::UndefinedInstruction { address, opcode });
            }
        }
    }

    /// Evaluates the second operand. Returns the value and the shifter carry.
    fn alu_operand(&mut self, op2: AluSecondOperandInfo) -> (u32, bool) {
        let carry = self.cpsr.carry_flag();
        let result = match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                rotated_immediate(base, shift, carry)
            }
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => shift_immediate(shift_kind, amount, self.read_register(register), carry),
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => {
                // The shift amount is read in an extra internal cycle, by which
                // time r15 has moved one more instruction ahead.
                self.bus.idle(1);
                let mut rm = self.read_register(register);
                if register == REG_PROGRAM_COUNTER {
                    rm = rm.wrapping_add(4);
                }
                let amount = self.read_register(rs) & 0xFF;
                shift(shift_kind, amount, rm, carry)
            }
        };
        (result.result, result.carry)
    }

    pub fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    ) {
        let register_shift = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );
        let (operand, shifter_carry) = self.alu_operand(op2);

        let mut op1 = self.read_register(rn);
        if rn == REG_PROGRAM_COUNTER && register_shift {
            op1 = op1.wrapping_add(4);
        }

        let carry = self.cpsr.carry_flag();

        use ArmModeAluInstruction::*;
        let result = match alu_instruction {
            And | Tst => ArithmeticOpResult::logical(op1 & operand, shifter_carry),
            Eor | Teq => ArithmeticOpResult::logical(op1 ^ operand, shifter_carry),
            Sub | Cmp => sub_with_carry(op1, operand, true),
            Rsb => sub_with_carry(operand, op1, true),
            Add | Cmn => add_with_carry(op1, operand, false),
            Adc => add_with_carry(op1, operand, carry),
            Sbc => sub_with_carry(op1, operand, carry),
            Rsc => sub_with_carry(operand, op1, carry),
            Orr => ArithmeticOpResult::logical(op1 | operand, shifter_carry),
            Mov => ArithmeticOpResult::logical(operand, shifter_carry),
            Bic => ArithmeticOpResult::logical(op1 & !operand, shifter_carry),
            Mvn => ArithmeticOpResult::logical(!operand, shifter_carry),
        };

        // Test instructions never write Rd, not even r15.
        if alu_instruction.is_test() {
            if set_conditions {
                self.set_alu_flags(alu_instruction, &result);
            }
            return;
        }

        if destination == REG_PROGRAM_COUNTER {
            // S with Rd = r15 is the exception return form.
            if set_conditions {
                self.restore_saved_status();
            }
            self.branch_to(result.result);
            return;
        }

        self.write_register(destination, result.result);
        if set_conditions {
            self.set_alu_flags(alu_instruction, &result);
        }
    }

    fn set_alu_flags(&mut self, alu_instruction: ArmModeAluInstruction, result: &ArithmeticOpResult) {
        match alu_instruction.kind() {
            AluInstructionKind::Logical => self.cpsr.set_logical_flags(result),
            AluInstructionKind::Arithmetic => self.cpsr.set_flags(result),
        }
    }

    /// SPSR of the current mode for MRS. Falls back to CPSR when the mode has
    /// no bank.
    fn saved_status(&mut self) -> Psr {
        let mode = self.cpsr.mode();
        match self.register_bank.read(mode) {
            Ok(psr) => psr,
            Err(SavedStatusFault::Stale(psr)) => {
                self.bus
                    .diagnostics
                    .record(Diagnostic::StaleSavedStatus { mode });
                psr
            }
            Err(SavedStatusFault::Unavailable) => {
                self.bus
                    .diagnostics
                    .record(Diagnostic::SavedStatusUnavailable { mode });
                self.cpsr
            }
        }
    }

    fn write_status(&mut self, psr_kind: PsrKind, value: u32, field_mask: u32) {
        let mode = self.cpsr.mode();
        match psr_kind {
            PsrKind::Cpsr => {
                if let Err(invalid) =
                    self.cpsr
                        .write_fields(value, field_mask, mode.is_privileged())
                {
                    self.bus
                        .diagnostics
                        .record(Diagnostic::InvalidModeWrite { bits: invalid.0 });
                }
            }
            PsrKind::Spsr => {
                let current = match self.register_bank.read(mode) {
                    Ok(psr) | Err(SavedStatusFault::Stale(psr)) => psr,
                    Err(SavedStatusFault::Unavailable) => Psr::default(),
                };
                let merged = Psr::from_raw((current.raw() & !field_mask) | (value & field_mask));
                if self.register_bank.write(mode, merged).is_err() {
                    self.bus
                        .diagnostics
                        .record(Diagnostic::SavedStatusUnavailable { mode });
                }
            }
        }
    }

    pub fn psr_transfer(&mut self, op_kind: PsrOpKind, psr_kind: PsrKind) {
        match op_kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.saved_status(),
                };
                self.write_register(destination_register, psr.raw());
            }
            PsrOpKind::Msr {
                source_register,
                field_mask,
            } => {
                let value = self.read_register(source_register);
                self.write_status(psr_kind, value, field_mask);
            }
            PsrOpKind::MsrImmediate {
                operand,
                field_mask,
            } => self.write_status(psr_kind, operand, field_mask),
        }
    }

    pub fn multiply(
        &mut self,
        accumulate: bool,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) {
        let rs_value = self.read_register(rs);
        let mut result = self.read_register(rm).wrapping_mul(rs_value);
        let mut internal = multiplier_cycles(rs_value, true);

        if accumulate {
            result = result.wrapping_add(self.read_register(rn));
            internal += 1;
        }
        self.bus.idle(internal);

        self.write_register(rd, result);
        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn multiply_long(
        &mut self,
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    ) {
        let rs_value = self.read_register(rs);
        let rm_value = self.read_register(rm);

        let mut result = if signed {
            (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64
        } else {
            u64::from(rm_value) * u64::from(rs_value)
        };
        let mut internal = multiplier_cycles(rs_value, signed) + 1;

        if accumulate {
            let hi = u64::from(self.read_register(rd_hi));
            let lo = u64::from(self.read_register(rd_lo));
            result = result.wrapping_add((hi << 32) | lo);
            internal += 1;
        }
        self.bus.idle(internal);

        self.write_register(rd_lo, result as u32);
        self.write_register(rd_hi, (result >> 32) as u32);
        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    pub fn single_data_swap(&mut self, byte: bool, rn: usize, rd: usize, rm: usize) {
        let address = self.read_register(rn);
        let source = self.read_register(rm);

        let value = if byte {
            let value = u32::from(self.bus.read_8(address));
            self.bus.write_8(address, source as u8);
            value
        } else {
            let value = self.load_word(address);
            self.bus.write_32(address, source);
            value
        };
        self.bus.idle(1);

        self.write_register(rd, value);
    }

    pub fn branch_and_exchange(&mut self, register: usize) {
        let target = self.read_register(register);
        self.cpsr.set_cpu_state(target.get_bit(0).into());
        self.branch_to(target);
    }

    pub fn branch(&mut self, link: bool, offset: u32) {
        let pc = self.read_register(REG_PROGRAM_COUNTER);
        if link {
            self.write_register(REG_LR, self.next_instruction_address());
        }
        self.branch_to(pc.wrapping_add(offset));
    }

    pub(crate) fn software_interrupt(&mut self) {
        let return_address = self.next_instruction_address();
        self.enter_exception(Exception::SoftwareInterrupt, return_address);
    }

    pub(crate) fn undefined_instruction(&mut self, diagnostic: Diagnostic) {
        self.bus.diagnostics.record(diagnostic);
        let return_address = self.next_instruction_address();
        self.enter_exception(Exception::Undefined, return_address);
    }

    /// Word load: a misaligned address reads the aligned word rotated so the
    /// addressed byte ends up in the low byte.
    pub(crate) fn load_word(&mut self, address: u32) -> u32 {
        self.bus.read_32(address).rotate_right(8 * (address & 3))
    }

    pub(crate) fn load_half_word(&mut self, address: u32) -> u32 {
        u32::from(self.bus.read_16(address)).rotate_right(8 * (address & 1))
    }

    pub(crate) fn load_signed_byte(&mut self, address: u32) -> u32 {
        sign_extended(u32::from(self.bus.read_8(address)), 8)
    }

    /// An odd address loads the sign-extended byte instead.
    pub(crate) fn load_signed_half_word(&mut self, address: u32) -> u32 {
        if address.get_bit(0) {
            self.load_signed_byte(address)
        } else {
            sign_extended(u32::from(self.bus.read_16(address)), 16)
        }
    }

    /// Value stored for `reg` by STR/STRH/STM: r15 is one word further ahead.
    fn store_value(&self, reg: usize) -> u32 {
        let value = self.read_register(reg);
        if reg == REG_PROGRAM_COUNTER {
            value.wrapping_add(4)
        } else {
            value
        }
    }

    fn write_back_base(&mut self, base_register: usize, value: u32) {
        if base_register != REG_PROGRAM_COUNTER {
            self.registers
                .set_register_at(base_register, value, self.cpsr.mode());
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
    ) {
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => self.read_register(register),
        };

        let base = self.read_register(base_register);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        // Post-indexing always writes back.
        let write_back = write_back || indexing == Indexing::Post;

        match load_store_kind {
            LoadStoreKind::Store => {
                let value = self.store_value(source_destination_register);
                self.bus.write_16(address, value as u16);
                if write_back {
                    self.write_back_base(base_register, effective);
                }
            }
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => self.load_half_word(address),
                    HalfwordTransferKind::SignedByte => self.load_signed_byte(address),
                    HalfwordTransferKind::SignedHalfwords => self.load_signed_half_word(address),
                };
                self.bus.idle(1);

                if write_back {
                    self.write_back_base(base_register, effective);
                }
                self.write_register(source_destination_register, value);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let value = self.read_register(reg_offset);
                shift_immediate(shift_kind, shift_amount, value, self.cpsr.carry_flag()).result
            }
        };

        let base = self.read_register(base_register);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        match load_store {
            LoadStoreKind::Store => {
                let value = self.store_value(rd);
                match quantity {
                    ReadWriteKind::Byte => self.bus.write_8(address, value as u8),
                    ReadWriteKind::Word => self.bus.write_32(address, value),
                }
                if write_back {
                    self.write_back_base(base_register, effective);
                }
            }
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => u32::from(self.bus.read_8(address)),
                    ReadWriteKind::Word => self.load_word(address),
                };
                self.bus.idle(1);

                if write_back {
                    self.write_back_base(base_register, effective);
                }
                self.write_register(rd, value);
            }
        }
    }

    /// LDM/STM.
    ///
    /// Registers are always transferred lowest first to the lowest address.
    /// An empty list transfers r15 alone but moves the base as if all sixteen
    /// registers were listed.
    #[allow(clippy::too_many_arguments)]
    pub fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    ) {
        let (register_list, count) = if register_list == 0 {
            (1 << REG_PROGRAM_COUNTER, 16)
        } else {
            (register_list, register_list.count_ones())
        };

        let base = self.read_register(rn);
        let size = count * 4;
        let (start, new_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(size)),
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(size)),
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(size).wrapping_add(4),
                base.wrapping_sub(size),
            ),
            (Offsetting::Down, Indexing::Pre) => {
                (base.wrapping_sub(size), base.wrapping_sub(size))
            }
        };

        let includes_pc = register_list.get_bit(REG_PROGRAM_COUNTER as u8);
        // S without r15 in an LDM (or any STM) transfers the User bank.
        let user_bank = load_psr && !(load_store == LoadStoreKind::Load && includes_pc);
        let bank = if user_bank {
            Mode::User
        } else {
            self.cpsr.mode()
        };

        let registers = (0..16_u8)
            .filter(|&reg| register_list.get_bit(reg))
            .map(usize::from);
        let mut address = start;

        match load_store {
            LoadStoreKind::Store => {
                let first = register_list.trailing_zeros() as usize;
                for reg in registers {
                    let value = if reg == rn && write_back && reg != first {
                        new_base
                    } else if reg == REG_PROGRAM_COUNTER {
                        self.store_value(reg)
                    } else {
                        self.registers.register_at(reg, bank)
                    };
                    self.bus.write_32(address, value);
                    address = address.wrapping_add(4);
                }

                if write_back {
                    self.write_back_base(rn, new_base);
                }
            }
            LoadStoreKind::Load => {
                // A loaded base wins over the written-back one.
                if write_back && !register_list.get_bit(rn as u8) {
                    self.write_back_base(rn, new_base);
                }

                let mut target = None;
                for reg in registers {
                    let value = self.bus.read_32(address);
                    address = address.wrapping_add(4);
                    if reg == REG_PROGRAM_COUNTER {
                        target = Some(value);
                    } else {
                        self.registers.set_register_at(reg, value, bank);
                    }
                }
                self.bus.idle(1);

                if let Some(target) = target {
                    if load_psr {
                        self.restore_saved_status();
                    }
                    self.branch_to(target);
                }
            }
        }
    }
}
