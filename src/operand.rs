use crate::error::DecodeError;
use crate::fields::{self, MOD_MASK, MOD_SHIFT, REG_MASK, REG_SHIFT, RM_MASK, RM_SHIFT};
use crate::registers::{RegisterCatalog, RegisterDescriptor, Width};
use std::fmt;

/// The 2-bit mod field of an addressing-mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Memory, no displacement (except direct address when r/m is 110)
    Memory,
    /// Memory with 8-bit displacement
    Memory8,
    /// Memory with 16-bit displacement
    Memory16,
    /// Register to register
    Register,
}

impl AddressingMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => AddressingMode::Memory,
            0b01 => AddressingMode::Memory8,
            0b10 => AddressingMode::Memory16,
            0b11 => AddressingMode::Register,
            _ => unreachable!(),
        }
    }

    /// Displacement bytes following the addressing-mode byte
    pub fn displacement_len(&self, rm: u8) -> usize {
        match self {
            AddressingMode::Memory if rm == 0b110 => 2,
            AddressingMode::Memory => 0,
            AddressingMode::Memory8 => 1,
            AddressingMode::Memory16 => 2,
            AddressingMode::Register => 0,
        }
    }
}

/// Decoded addressing-mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub mode: AddressingMode,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn parse(byte: u8) -> Self {
        ModRm {
            mode: AddressingMode::from_bits(fields::extract(byte, MOD_MASK, MOD_SHIFT)),
            reg: fields::extract(byte, REG_MASK, REG_SHIFT),
            rm: fields::extract(byte, RM_MASK, RM_SHIFT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(RegisterDescriptor),
    Immediate(i16),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Immediate(value) => write!(f, "{}", value),
        }
    }
}

/// Resolve the reg and r/m fields of a register-addressing byte into
/// `(destination, source)`.
///
/// With `direction` set the reg field is the destination. Any mode other
/// than register-to-register is reported against `offset` rather than
/// decoded.
pub fn decode_register_form(
    modrm: ModRm,
    direction: bool,
    width: Width,
    catalog: &RegisterCatalog,
    offset: usize,
) -> Result<(Operand, Operand), DecodeError> {
    if modrm.mode != AddressingMode::Register {
        return Err(DecodeError::UnsupportedAddressingMode {
            offset,
            mode: modrm.mode,
        });
    }

    let reg = Operand::Register(catalog.lookup(modrm.reg, width));
    let rm = Operand::Register(catalog.lookup(modrm.rm, width));

    if direction {
        Ok((reg, rm))
    } else {
        Ok((rm, reg))
    }
}
