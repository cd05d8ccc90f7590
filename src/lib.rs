#![crate_name = "sim8086"]

#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod cursor;
pub mod decoder;
pub mod disassembler;
pub mod error;
pub mod fields;
pub mod immediate;
pub mod instruction;
pub mod opcode_tables;
pub mod operand;
pub mod registers;


pub use decoder::{
    DecodeReport, DecodeTables, Decoder, DecoderConfig, DecoderState, ErrorPolicy, DEFAULT_TABLES,
};
pub use disassembler::{render, Disassembler, OutputOptions};
pub use error::{ConfigError, DecodeError};
pub use instruction::DecodedInstruction;
pub use operand::Operand;

/// Largest program the loader hands to the decoder
pub const MAX_PROGRAM_BYTES: usize = 256;

/// Decode `bytes` with the built-in tables and strict policy, rendering one
/// line per instruction.
pub fn decode_to_lines(bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
    Decoder::new(bytes, &DEFAULT_TABLES, DecoderConfig::default())
        .map(|result| result.map(|instruction| render(&instruction)))
        .collect()
}

/*
Register/memory forms covered by the built-in table

  100010dw  mod reg r/m              mov   r/m <-> reg
  1011wreg  data  [data if w]        mov   reg <- imm
  000000dw  mod reg r/m              add   r/m <-> reg
  001010dw  mod reg r/m              sub   r/m <-> reg
  001110dw  mod reg r/m              cmp   r/m, reg

Recognized but reported as not implemented

  1100011w  1010000w  1010001w  100000sw  0000010w
*/
