//! TOML configuration for the decoder and listing output.
//!
//! Every section is optional:
//!
//! ```toml
//! replace_default_opcodes = false
//!
//! [decoder]
//! policy = "recoverable"
//! max_iterations = 256
//!
//! [output]
//! bits_header = true
//! show_offsets = false
//! dump_hex = false
//!
//! [[opcodes]]
//! pattern = 0b00101000
//! mask = 0b11111100
//! kind = "arithmetic_sub"
//! ```

use crate::decoder::{DecodeTables, DecoderConfig};
use crate::disassembler::OutputOptions;
use crate::error::ConfigError;
use crate::opcode_tables::{OpcodePattern, OpcodeTable};
use crate::registers::RegisterCatalog;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub output: OutputOptions,
    /// Use only `opcodes` instead of appending them to the built-in table
    pub replace_default_opcodes: bool,
    pub opcodes: Vec<OpcodePattern>,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Build the decode tables this configuration describes
    pub fn build_tables(&self) -> Result<DecodeTables, ConfigError> {
        let opcodes = if self.replace_default_opcodes {
            OpcodeTable::new(self.opcodes.clone())?
        } else if self.opcodes.is_empty() {
            OpcodeTable::default()
        } else {
            OpcodeTable::default().extend(&self.opcodes)?
        };

        Ok(DecodeTables {
            opcodes,
            registers: RegisterCatalog::default(),
        })
    }
}
