use crate::error::ConfigError;
use log::trace;
use serde::Deserialize;

/// Instruction kinds the opcode table can classify a leading byte into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// mov register/memory to/from register (100010dw)
    RegisterMemoryMove,
    /// mov immediate to register/memory (1100011w)
    ImmediateToRegisterOrMemory,
    /// mov immediate to register (1011wreg)
    ImmediateToRegister,
    /// mov memory to accumulator (1010000w)
    MemoryToAccumulator,
    /// mov accumulator to memory (1010001w)
    AccumulatorToMemory,
    /// add register/memory with register to either (000000dw)
    ArithmeticAdd,
    /// sub register/memory and register to either (001010dw)
    ArithmeticSub,
    /// cmp register/memory and register (001110dw)
    ArithmeticCmp,
    /// add/sub/cmp immediate to register/memory (100000sw)
    ArithmeticImmediate,
    /// add immediate to accumulator (0000010w)
    ImmediateToAccumulator,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 10] = [
        InstructionKind::RegisterMemoryMove,
        InstructionKind::ImmediateToRegisterOrMemory,
        InstructionKind::ImmediateToRegister,
        InstructionKind::MemoryToAccumulator,
        InstructionKind::AccumulatorToMemory,
        InstructionKind::ArithmeticAdd,
        InstructionKind::ArithmeticSub,
        InstructionKind::ArithmeticCmp,
        InstructionKind::ArithmeticImmediate,
        InstructionKind::ImmediateToAccumulator,
    ];

    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstructionKind::RegisterMemoryMove
            | InstructionKind::ImmediateToRegisterOrMemory
            | InstructionKind::ImmediateToRegister
            | InstructionKind::MemoryToAccumulator
            | InstructionKind::AccumulatorToMemory => "mov",
            InstructionKind::ArithmeticAdd | InstructionKind::ImmediateToAccumulator => "add",
            InstructionKind::ArithmeticSub => "sub",
            InstructionKind::ArithmeticCmp => "cmp",
            // reg field of the second byte selects add/sub/cmp
            InstructionKind::ArithmeticImmediate => "add/sub/cmp",
        }
    }

    /// Name as written in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            InstructionKind::RegisterMemoryMove => "register_memory_move",
            InstructionKind::ImmediateToRegisterOrMemory => "immediate_to_register_or_memory",
            InstructionKind::ImmediateToRegister => "immediate_to_register",
            InstructionKind::MemoryToAccumulator => "memory_to_accumulator",
            InstructionKind::AccumulatorToMemory => "accumulator_to_memory",
            InstructionKind::ArithmeticAdd => "arithmetic_add",
            InstructionKind::ArithmeticSub => "arithmetic_sub",
            InstructionKind::ArithmeticCmp => "arithmetic_cmp",
            InstructionKind::ArithmeticImmediate => "arithmetic_immediate",
            InstructionKind::ImmediateToAccumulator => "immediate_to_accumulator",
        }
    }
}

/// One table entry: a leading byte belongs to `kind` when
/// `byte & mask == pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OpcodePattern {
    pub pattern: u8,
    pub mask: u8,
    pub kind: InstructionKind,
}

impl OpcodePattern {
    pub const fn new(pattern: u8, mask: u8, kind: InstructionKind) -> Self {
        OpcodePattern {
            pattern,
            mask,
            kind,
        }
    }

    pub fn matches(&self, byte: u8) -> bool {
        byte & self.mask == self.pattern
    }

    /// True when this mask tests every bit `other` tests, and more
    fn is_more_specific_than(&self, other: &OpcodePattern) -> bool {
        self.mask != other.mask && self.mask & other.mask == other.mask
    }
}

const DEFAULT_PATTERNS: [OpcodePattern; 10] = [
    OpcodePattern::new(0b1000_1000, 0b1111_1100, InstructionKind::RegisterMemoryMove),
    OpcodePattern::new(0b1100_0110, 0b1111_1110, InstructionKind::ImmediateToRegisterOrMemory),
    OpcodePattern::new(0b1011_0000, 0b1111_0000, InstructionKind::ImmediateToRegister),
    OpcodePattern::new(0b1010_0000, 0b1111_1110, InstructionKind::MemoryToAccumulator),
    OpcodePattern::new(0b1010_0010, 0b1111_1110, InstructionKind::AccumulatorToMemory),
    OpcodePattern::new(0b0000_0000, 0b1111_1100, InstructionKind::ArithmeticAdd),
    OpcodePattern::new(0b0010_1000, 0b1111_1100, InstructionKind::ArithmeticSub),
    OpcodePattern::new(0b0011_1000, 0b1111_1100, InstructionKind::ArithmeticCmp),
    OpcodePattern::new(0b1000_0000, 0b1111_1100, InstructionKind::ArithmeticImmediate),
    OpcodePattern::new(0b0000_0100, 0b1111_1110, InstructionKind::ImmediateToAccumulator),
];

/// Ordered list of opcode patterns.
///
/// Entries are checked in order and the first match wins. Construction
/// rejects tables where a byte could resolve to two different kinds unless
/// the earlier entry has the strictly narrower mask.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    entries: Vec<OpcodePattern>,
}

impl OpcodeTable {
    pub fn new(entries: Vec<OpcodePattern>) -> Result<Self, ConfigError> {
        validate(&entries)?;
        Ok(OpcodeTable { entries })
    }

    /// Append entries after the existing ones and re-validate
    pub fn extend(&self, extra: &[OpcodePattern]) -> Result<Self, ConfigError> {
        let mut entries = self.entries.clone();
        entries.extend_from_slice(extra);
        OpcodeTable::new(entries)
    }

    /// Classify a leading byte. `None` means the byte is unrecognized.
    pub fn classify(&self, byte: u8) -> Option<&OpcodePattern> {
        let found = self.entries.iter().find(|e| e.matches(byte));
        trace!(
            "classify {:08b} -> {}",
            byte,
            found.map(|e| e.kind.name()).unwrap_or("unrecognized")
        );
        found
    }

    pub fn entries(&self) -> &[OpcodePattern] {
        &self.entries
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        OpcodeTable {
            entries: DEFAULT_PATTERNS.to_vec(),
        }
    }
}

fn validate(entries: &[OpcodePattern]) -> Result<(), ConfigError> {
    if let Some(bad) = entries.iter().find(|e| e.pattern & !e.mask != 0) {
        return Err(ConfigError::InvalidPattern {
            pattern: bad.pattern,
            mask: bad.mask,
        });
    }

    for byte in 0..=u8::MAX {
        let mut matching = entries.iter().filter(|e| e.matches(byte));
        let Some(first) = matching.next() else {
            continue;
        };
        for other in matching {
            if other.kind != first.kind && !first.is_more_specific_than(other) {
                return Err(ConfigError::AmbiguousPattern {
                    byte,
                    first: first.kind,
                    second: other.kind,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = OpcodeTable::default();
        assert!(validate(table.entries()).is_ok());
    }

    #[test]
    fn test_classify_known_bytes() {
        let table = OpcodeTable::default();
        let kind = |b: u8| table.classify(b).map(|e| e.kind);

        assert_eq!(kind(0x89), Some(InstructionKind::RegisterMemoryMove));
        assert_eq!(kind(0x8B), Some(InstructionKind::RegisterMemoryMove));
        assert_eq!(kind(0xC6), Some(InstructionKind::ImmediateToRegisterOrMemory));
        assert_eq!(kind(0xB0), Some(InstructionKind::ImmediateToRegister));
        assert_eq!(kind(0xBF), Some(InstructionKind::ImmediateToRegister));
        assert_eq!(kind(0xA1), Some(InstructionKind::MemoryToAccumulator));
        assert_eq!(kind(0xA3), Some(InstructionKind::AccumulatorToMemory));
        assert_eq!(kind(0x01), Some(InstructionKind::ArithmeticAdd));
        assert_eq!(kind(0x2B), Some(InstructionKind::ArithmeticSub));
        assert_eq!(kind(0x39), Some(InstructionKind::ArithmeticCmp));
        assert_eq!(kind(0x83), Some(InstructionKind::ArithmeticImmediate));
        assert_eq!(kind(0x05), Some(InstructionKind::ImmediateToAccumulator));
        assert_eq!(kind(0xFF), None);
        assert_eq!(kind(0x90), None);
    }

    #[test]
    fn test_classify_is_total_and_unambiguous() {
        let table = OpcodeTable::default();
        for byte in 0..=u8::MAX {
            let kinds: Vec<_> = table
                .entries()
                .iter()
                .filter(|e| e.matches(byte))
                .map(|e| e.kind)
                .collect();
            assert!(kinds.len() <= 1, "byte {:08b} matches {:?}", byte, kinds);
            assert_eq!(table.classify(byte).map(|e| e.kind), kinds.first().copied());
        }
    }

    #[test]
    fn test_specific_before_broad_is_accepted() {
        // 0xB0 exactly, ahead of the whole 1011xxxx block
        let table = OpcodeTable::new(vec![
            OpcodePattern::new(0xB0, 0xFF, InstructionKind::MemoryToAccumulator),
            OpcodePattern::new(0xB0, 0xF0, InstructionKind::ImmediateToRegister),
        ])
        .unwrap();
        assert_eq!(
            table.classify(0xB0).map(|e| e.kind),
            Some(InstructionKind::MemoryToAccumulator)
        );
        assert_eq!(
            table.classify(0xB1).map(|e| e.kind),
            Some(InstructionKind::ImmediateToRegister)
        );
    }

    #[test]
    fn test_broad_before_specific_is_rejected() {
        let err = OpcodeTable::new(vec![
            OpcodePattern::new(0xB0, 0xF0, InstructionKind::ImmediateToRegister),
            OpcodePattern::new(0xB0, 0xFF, InstructionKind::MemoryToAccumulator),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmbiguousPattern {
                byte: 0xB0,
                first: InstructionKind::ImmediateToRegister,
                second: InstructionKind::MemoryToAccumulator,
            }
        );
    }

    #[test]
    fn test_pattern_outside_mask_is_rejected() {
        let err = OpcodeTable::new(vec![OpcodePattern::new(
            0b1000_1001,
            0b1111_1100,
            InstructionKind::RegisterMemoryMove,
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_extend_appends_after_defaults() {
        let table = OpcodeTable::default()
            .extend(&[OpcodePattern::new(
                0b1000_1100,
                0b1111_1111,
                InstructionKind::RegisterMemoryMove,
            )])
            .unwrap();
        assert_eq!(table.entries().len(), DEFAULT_PATTERNS.len() + 1);
        assert_eq!(
            table.classify(0x8C).map(|e| e.kind),
            Some(InstructionKind::RegisterMemoryMove)
        );

        // A narrower entry appended behind a broader one would be shadowed
        assert!(OpcodeTable::default()
            .extend(&[OpcodePattern::new(0x89, 0xFF, InstructionKind::ArithmeticSub)])
            .is_err());
    }
}
