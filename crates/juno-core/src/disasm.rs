//! Instruction disassembly for the Juno ISA.
//!
//! Operands are printed in assembler order: sources first, destination last.

use crate::decoder::{DecodedInstruction, Decoder};
use crate::encoding::{OpcodeEncoding, OperandForm};
use crate::program::ProgramImage;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the instruction.
    pub pc: u64,
    /// Raw instruction word.
    pub word: u32,
    /// Mnemonic, or `.custom` for opcodes outside the fixed table.
    pub mnemonic: String,
    /// Formatted operands.
    pub operands: String,
    /// True when the opcode is left to custom handlers.
    pub is_custom: bool,
}

impl DisassemblyRow {
    /// Mnemonic and operands joined as one line of assembly.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Renders one instruction word as assembly text.
#[must_use]
pub fn disassemble(word: u32) -> String {
    disassemble_row(0, word).text()
}

/// Disassembles `word` as if it were fetched from `pc`.
#[must_use]
pub fn disassemble_row(pc: u64, word: u32) -> DisassemblyRow {
    let instr = Decoder::decode(word);
    match instr.encoding() {
        Some(encoding) => DisassemblyRow {
            pc,
            word,
            mnemonic: encoding.mnemonic().to_string(),
            operands: format_operands(&instr, encoding),
            is_custom: false,
        },
        None => DisassemblyRow {
            pc,
            word,
            mnemonic: ".custom".to_string(),
            operands: format!(
                "{} {}, {}, {}",
                instr.opcode,
                format_register(instr.reg1),
                format_register(instr.reg2),
                format_register(instr.write_reg)
            ),
            is_custom: true,
        },
    }
}

/// Lists every instruction of the program's instruction stream.
#[must_use]
pub fn disassemble_program(image: &ProgramImage) -> Vec<DisassemblyRow> {
    image
        .instructions()
        .map(|(pc, word)| disassemble_row(pc, word))
        .collect()
}

/// Disassembles up to `before` instructions before `center_pc`, the
/// instruction at `center_pc`, and up to `after` instructions following it.
///
/// Rows outside the instruction stream are omitted.
#[must_use]
pub fn disassemble_window(
    image: &ProgramImage,
    center_pc: u64,
    before: usize,
    after: usize,
) -> Vec<DisassemblyRow> {
    let first = center_pc.saturating_sub(4 * before as u64);
    let last = center_pc.saturating_add(4 * after as u64);
    image
        .instructions()
        .filter(|(pc, _)| (first..=last).contains(pc))
        .map(|(pc, word)| disassemble_row(pc, word))
        .collect()
}

fn format_register(index: u8) -> String {
    format!("r{index}")
}

fn format_operands(instr: &DecodedInstruction, encoding: OpcodeEncoding) -> String {
    let r1 = format_register(instr.reg1);
    let r2 = format_register(instr.reg2);
    let rw = format_register(instr.write_reg);
    match encoding.operand_form() {
        OperandForm::None => String::new(),
        OperandForm::Indirect | OperandForm::Unary => format!("{r1}, {rw}"),
        OperandForm::Absolute => format!("${}, {rw}", instr.abs_addr),
        OperandForm::RegisterPair => format!("{r1}, {r2}"),
        OperandForm::Binary => format!("{r1}, {r2}, {rw}"),
        OperandForm::Jump => format!("{r1}, {}", instr.jump_offset),
    }
}
