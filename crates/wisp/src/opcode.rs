//! The instruction set: a closed opcode enum, its operand-width table, and a
//! disassembler for diagnostics.

use std::fmt;

use strum::Display;

/// One opcode per dispatched instruction. Every variant with a nonzero
/// operand width in [`Opcode::operand_width`] is followed by that many bytes,
/// encoded big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "PascalCase")]
pub enum Opcode {
    Const,
    ConstNull,
    ConstTrue,
    ConstFalse,
    Pop,
    Array,
    Dict,
    AssertType,
    Jump,
    JumpTrue,
    JumpFalse,
    Negate,
    Invert,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Gt,
    Gte,
    Lt,
    Lte,
    Call,
    Return,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    Debug,
}

impl Opcode {
    /// Operand width in bytes. All operands are big-endian unsigned 16-bit.
    #[must_use]
    pub fn operand_width(self) -> usize {
        match self {
            Self::Const
            | Self::AssertType
            | Self::Jump
            | Self::JumpTrue
            | Self::JumpFalse
            | Self::Call
            | Self::GetGlobal
            | Self::SetGlobal
            | Self::GetLocal
            | Self::SetLocal => 2,
            Self::ConstNull
            | Self::ConstTrue
            | Self::ConstFalse
            | Self::Pop
            | Self::Array
            | Self::Dict
            | Self::Negate
            | Self::Invert
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Equal
            | Self::NotEqual
            | Self::Gt
            | Self::Gte
            | Self::Lt
            | Self::Lte
            | Self::Return
            | Self::Debug => 0,
        }
    }

    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Const,
            1 => Self::ConstNull,
            2 => Self::ConstTrue,
            3 => Self::ConstFalse,
            4 => Self::Pop,
            5 => Self::Array,
            6 => Self::Dict,
            7 => Self::AssertType,
            8 => Self::Jump,
            9 => Self::JumpTrue,
            10 => Self::JumpFalse,
            11 => Self::Negate,
            12 => Self::Invert,
            13 => Self::Add,
            14 => Self::Sub,
            15 => Self::Mul,
            16 => Self::Div,
            17 => Self::Mod,
            18 => Self::Equal,
            19 => Self::NotEqual,
            20 => Self::Gt,
            21 => Self::Gte,
            22 => Self::Lt,
            23 => Self::Lte,
            24 => Self::Call,
            25 => Self::Return,
            26 => Self::GetGlobal,
            27 => Self::SetGlobal,
            28 => Self::GetLocal,
            29 => Self::SetLocal,
            30 => Self::Debug,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Disassembles a single instruction starting at `instructions[ip]`, returning
/// the formatted text and the number of bytes consumed (1 + operand width).
#[must_use]
pub fn disassemble_one(instructions: &[u8], ip: usize) -> (String, usize) {
    let Some(opcode) = Opcode::from_byte(instructions[ip]) else {
        return (format!("{ip:04} ILLEGAL {:#04x}", instructions[ip]), 1);
    };
    let width = opcode.operand_width();
    if width == 0 {
        return (format!("{ip:04} {opcode}"), 1);
    }
    let operand = u16::from_be_bytes([instructions[ip + 1], instructions[ip + 2]]);
    (format!("{ip:04} {opcode} {operand}"), 1 + width)
}

/// Disassembles a full instruction stream into human-readable text, one line
/// per instruction.
#[must_use]
pub fn disassemble(instructions: &[u8]) -> String {
    let mut out = String::new();
    let mut ip = 0;
    while ip < instructions.len() {
        let (line, consumed) = disassemble_one(instructions, ip);
        out.push_str(&line);
        out.push('\n');
        ip += consumed;
    }
    out
}

impl fmt::Binary for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.as_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for byte in 0..=30u8 {
            let op = Opcode::from_byte(byte).unwrap();
            assert_eq!(op.as_byte(), byte);
        }
        assert!(Opcode::from_byte(31).is_none());
    }

    #[test]
    fn disassembles_zero_and_two_operand_instructions() {
        let mut bytes = vec![Opcode::Const.as_byte()];
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.push(Opcode::Pop.as_byte());
        let text = disassemble(&bytes);
        assert!(text.contains("Const 5"));
        assert!(text.contains("Pop"));
    }
}
