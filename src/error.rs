// Decoder and configuration error handling

use crate::opcode_tables::InstructionKind;
use crate::operand::AddressingMode;
use std::fmt;

/// Conditions the decoder engine reports while walking a byte stream.
///
/// Every variant carries the byte offset of the instruction (or missing
/// field) it refers to, so the caller can always point at the failing byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Leading byte matched no opcode table entry
    UnknownOpcode { offset: usize, byte: u8 },
    /// Kind was recognized but has no decode rule yet
    NotImplemented { offset: usize, kind: InstructionKind },
    /// Mode field selected a memory operand
    UnsupportedAddressingMode { offset: usize, mode: AddressingMode },
    /// Stream ended before a required field
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// Caller-supplied iteration guard tripped
    IterationLimitExceeded { offset: usize, limit: usize },
    /// A decode step consumed no bytes
    NoProgress { offset: usize },
}

impl DecodeError {
    /// Byte offset the condition occurred at.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::NotImplemented { offset, .. }
            | DecodeError::UnsupportedAddressingMode { offset, .. }
            | DecodeError::TruncatedStream { offset, .. }
            | DecodeError::IterationLimitExceeded { offset, .. }
            | DecodeError::NoProgress { offset } => *offset,
        }
    }

    /// Whether a recoverable policy may skip this instruction and continue.
    ///
    /// Only per-instruction conditions qualify. Anything that leaves the
    /// cursor without a trustworthy next instruction boundary is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecodeError::NotImplemented { .. } | DecodeError::UnsupportedAddressingMode { .. }
        )
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::UnknownOpcode { offset, byte } => {
                write!(f, "unknown opcode {:#010b} at offset {:#06x}", byte, offset)
            }
            DecodeError::NotImplemented { offset, kind } => {
                write!(
                    f,
                    "no decode rule for {} ({}) at offset {:#06x}",
                    kind.name(),
                    kind.mnemonic(),
                    offset
                )
            }
            DecodeError::UnsupportedAddressingMode { offset, mode } => {
                write!(
                    f,
                    "unsupported addressing mode {:?} at offset {:#06x}",
                    mode, offset
                )
            }
            DecodeError::TruncatedStream {
                offset,
                needed,
                available,
            } => {
                write!(
                    f,
                    "truncated stream at offset {:#06x}: need {} byte(s), have {}",
                    offset, needed, available
                )
            }
            DecodeError::IterationLimitExceeded { offset, limit } => {
                write!(
                    f,
                    "iteration limit of {} exceeded at offset {:#06x}",
                    limit, offset
                )
            }
            DecodeError::NoProgress { offset } => {
                write!(f, "decode step consumed no bytes at offset {:#06x}", offset)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Problems building decode tables or reading a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML could not be parsed or did not fit the schema
    Parse(String),
    /// Pattern has bits set outside its mask and can never match
    InvalidPattern { pattern: u8, mask: u8 },
    /// Two entries of different kinds claim the same byte and the first is
    /// not strictly more specific
    AmbiguousPattern {
        byte: u8,
        first: InstructionKind,
        second: InstructionKind,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "configuration error: {}", msg),
            ConfigError::InvalidPattern { pattern, mask } => {
                write!(
                    f,
                    "opcode pattern {:#010b} has bits outside mask {:#010b}",
                    pattern, mask
                )
            }
            ConfigError::AmbiguousPattern {
                byte,
                first,
                second,
            } => {
                write!(
                    f,
                    "byte {:#010b} is claimed by both {} and {}; list the more specific mask first",
                    byte,
                    first.name(),
                    second.name()
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        let recoverable = [
            DecodeError::NotImplemented {
                offset: 0,
                kind: InstructionKind::MemoryToAccumulator,
            },
            DecodeError::UnsupportedAddressingMode {
                offset: 0,
                mode: AddressingMode::Memory8,
            },
        ];
        let fatal = [
            DecodeError::UnknownOpcode { offset: 0, byte: 0xFF },
            DecodeError::TruncatedStream {
                offset: 1,
                needed: 1,
                available: 0,
            },
            DecodeError::IterationLimitExceeded { offset: 4, limit: 2 },
            DecodeError::NoProgress { offset: 0 },
        ];

        assert!(recoverable.iter().all(|e| e.is_recoverable()));
        assert!(fatal.iter().all(|e| !e.is_recoverable()));
    }

    #[test]
    fn test_display_includes_offset() {
        let e = DecodeError::UnknownOpcode {
            offset: 0x12,
            byte: 0xFF,
        };
        let text = e.to_string();
        assert!(text.contains("0x0012"), "{}", text);
        assert!(text.contains("0b11111111"), "{}", text);
        assert_eq!(e.offset(), 0x12);
    }
}
