use crate::opcode_tables::InstructionKind;
use crate::operand::Operand;
use std::fmt::{Display, Error, Formatter};

/// A decoded instruction, produced once per decode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Byte offset of the opcode byte in the input
    pub offset: usize,
    /// Raw bytes making up this instruction
    pub encoding: Vec<u8>,
    pub kind: InstructionKind,
    pub mnemonic: &'static str,
    pub destination: Operand,
    pub source: Operand,
}

impl DecodedInstruction {
    /// Total size of the instruction in bytes
    pub fn size(&self) -> usize {
        self.encoding.len()
    }
}

impl Display for DecodedInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{} {}, {}", self.mnemonic, self.destination, self.source)
    }
}
