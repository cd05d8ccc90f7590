use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::fields::{self, DIRECTION_MASK, IMMEDIATE_REG_MASK, IMMEDIATE_WIDE_MASK, WIDE_MASK};
use crate::immediate::read_immediate;
use crate::instruction::DecodedInstruction;
use crate::opcode_tables::{InstructionKind, OpcodeTable};
use crate::operand::{decode_register_form, ModRm, Operand};
use crate::registers::{RegisterCatalog, Width};
use log::{debug, warn};
use serde::Deserialize;

/// Upper bound on instructions decoded per run unless configured otherwise
pub const DEFAULT_MAX_ITERATIONS: usize = 256;

lazy_static! {
    /// Built-in tables, shared read-only by any number of decoders
    pub static ref DEFAULT_TABLES: DecodeTables = DecodeTables::default();
}

/// Read-only lookup data a decoder works from
#[derive(Debug, Clone, Default)]
pub struct DecodeTables {
    pub opcodes: OpcodeTable,
    pub registers: RegisterCatalog,
}

/// What to do with per-instruction conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run at the first error
    #[default]
    Strict,
    /// Report `NotImplemented` / `UnsupportedAddressingMode` and carry on
    Recoverable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    pub policy: ErrorPolicy,
    pub max_iterations: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            policy: ErrorPolicy::Strict,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingOpcode,
    DecodingOperands(InstructionKind),
    Done,
    Failed(DecodeError),
}

/// How the operands of a kind are laid out in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// d/w in the opcode, then an addressing-mode byte
    RegisterMemory,
    /// w/reg in the opcode, then a 1 or 2 byte immediate
    ImmediateToRegister,
    /// Recognized but not decoded; the layout says how far to skip
    NotImplemented(SkipLayout),
}

impl DecodeRule {
    // No wildcard arm: a new kind must be given a rule here to compile.
    pub fn for_kind(kind: InstructionKind) -> Self {
        match kind {
            InstructionKind::RegisterMemoryMove
            | InstructionKind::ArithmeticAdd
            | InstructionKind::ArithmeticSub
            | InstructionKind::ArithmeticCmp => DecodeRule::RegisterMemory,
            InstructionKind::ImmediateToRegister => DecodeRule::ImmediateToRegister,
            InstructionKind::ImmediateToRegisterOrMemory => {
                DecodeRule::NotImplemented(SkipLayout::ModRmImmediate)
            }
            InstructionKind::MemoryToAccumulator | InstructionKind::AccumulatorToMemory => {
                DecodeRule::NotImplemented(SkipLayout::Address)
            }
            InstructionKind::ArithmeticImmediate => {
                DecodeRule::NotImplemented(SkipLayout::ModRmSignedImmediate)
            }
            InstructionKind::ImmediateToAccumulator => {
                DecodeRule::NotImplemented(SkipLayout::Immediate)
            }
        }
    }
}

/// Byte layout following the opcode of an instruction that is not decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipLayout {
    /// 16-bit direct address
    Address,
    /// Immediate of width w
    Immediate,
    /// Addressing-mode byte, displacement, immediate of width w
    ModRmImmediate,
    /// Addressing-mode byte, displacement, immediate that is 2 bytes only
    /// for s=0 w=1
    ModRmSignedImmediate,
}

impl SkipLayout {
    /// Step `cursor` over the rest of the instruction whose opcode was
    /// `opcode`. Fails with `TruncatedStream` if any part is missing.
    pub fn skip(&self, opcode: u8, cursor: &mut ByteCursor) -> Result<(), DecodeError> {
        let wide = fields::flag(opcode, WIDE_MASK);
        let immediate_len = |wide: bool| if wide { 2 } else { 1 };

        match self {
            SkipLayout::Address => cursor.skip(2),
            SkipLayout::Immediate => cursor.skip(immediate_len(wide)),
            SkipLayout::ModRmImmediate => {
                let modrm = ModRm::parse(cursor.read_u8()?);
                cursor.skip(modrm.mode.displacement_len(modrm.rm))?;
                cursor.skip(immediate_len(wide))
            }
            SkipLayout::ModRmSignedImmediate => {
                let sign_extend = fields::flag(opcode, DIRECTION_MASK);
                let modrm = ModRm::parse(cursor.read_u8()?);
                cursor.skip(modrm.mode.displacement_len(modrm.rm))?;
                cursor.skip(immediate_len(wide && !sign_extend))
            }
        }
    }
}

/// Result of driving a decoder to completion
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub instructions: Vec<DecodedInstruction>,
    /// Instructions skipped under the recoverable policy
    pub skipped: Vec<DecodeError>,
    /// The error that ended the run, if it did not reach the end of input
    pub fatal: Option<DecodeError>,
}

impl DecodeReport {
    pub fn is_complete(&self) -> bool {
        self.fatal.is_none()
    }
}

/// Decoder engine walking one byte buffer.
///
/// Yields one `Result` per instruction. After a fatal error, or at the end
/// of input, the iterator is exhausted.
pub struct Decoder<'a> {
    cursor: ByteCursor<'a>,
    tables: &'a DecodeTables,
    config: DecoderConfig,
    state: DecoderState,
    iterations: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8], tables: &'a DecodeTables, config: DecoderConfig) -> Self {
        Decoder {
            cursor: ByteCursor::new(bytes),
            tables,
            config,
            state: DecoderState::AwaitingOpcode,
            iterations: 0,
        }
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Decode until the end of input or a fatal error
    pub fn run(mut self) -> DecodeReport {
        let mut report = DecodeReport::default();
        while let Some(result) = self.next() {
            match result {
                Ok(instruction) => report.instructions.push(instruction),
                Err(e) if matches!(self.state, DecoderState::Failed(_)) => report.fatal = Some(e),
                Err(e) => report.skipped.push(e),
            }
        }
        report
    }

    fn step(&mut self) -> Option<Result<DecodedInstruction, DecodeError>> {
        match self.state {
            DecoderState::Done | DecoderState::Failed(_) => return None,
            DecoderState::AwaitingOpcode | DecoderState::DecodingOperands(_) => {}
        }

        let start = self.cursor.position();
        if self.cursor.is_at_end() {
            debug!("end of stream at {:#06x}", start);
            self.state = DecoderState::Done;
            return None;
        }

        if self.iterations >= self.config.max_iterations {
            return Some(self.fail(DecodeError::IterationLimitExceeded {
                offset: start,
                limit: self.config.max_iterations,
            }));
        }
        self.iterations += 1;

        let result = self.decode_instruction(start);

        if self.cursor.position() == start {
            // Also covers errors raised before anything was consumed
            return Some(self.fail(match result {
                Err(e) if !e.is_recoverable() => e,
                _ => DecodeError::NoProgress { offset: start },
            }));
        }

        match result {
            Ok(instruction) => {
                debug!(
                    "{:#06x}: {:02x?} {}",
                    instruction.offset, instruction.encoding, instruction
                );
                self.state = DecoderState::AwaitingOpcode;
                Some(Ok(instruction))
            }
            Err(e) if e.is_recoverable() && self.config.policy == ErrorPolicy::Recoverable => {
                warn!(
                    "skipping {} byte(s) at {:#06x}: {}",
                    self.cursor.position() - start,
                    start,
                    e
                );
                self.state = DecoderState::AwaitingOpcode;
                Some(Err(e))
            }
            Err(e) => Some(self.fail(e)),
        }
    }

    fn fail(&mut self, e: DecodeError) -> Result<DecodedInstruction, DecodeError> {
        debug!("decoder halted: {}", e);
        self.state = DecoderState::Failed(e.clone());
        Err(e)
    }

    fn decode_instruction(&mut self, start: usize) -> Result<DecodedInstruction, DecodeError> {
        let opcode = self.cursor.read_u8()?;
        let kind = match self.tables.opcodes.classify(opcode) {
            Some(entry) => entry.kind,
            None => {
                return Err(DecodeError::UnknownOpcode {
                    offset: start,
                    byte: opcode,
                })
            }
        };
        self.state = DecoderState::DecodingOperands(kind);

        let (destination, source) = match DecodeRule::for_kind(kind) {
            DecodeRule::RegisterMemory => self.decode_register_memory(opcode, start)?,
            DecodeRule::ImmediateToRegister => self.decode_immediate_to_register(opcode)?,
            DecodeRule::NotImplemented(layout) => {
                layout.skip(opcode, &mut self.cursor)?;
                return Err(DecodeError::NotImplemented {
                    offset: start,
                    kind,
                })
            }
        };

        Ok(DecodedInstruction {
            offset: start,
            encoding: self.cursor.consumed_since(start).to_vec(),
            kind,
            mnemonic: kind.mnemonic(),
            destination,
            source,
        })
    }

    fn decode_register_memory(
        &mut self,
        opcode: u8,
        start: usize,
    ) -> Result<(Operand, Operand), DecodeError> {
        let direction = fields::flag(opcode, DIRECTION_MASK);
        let width = Width::from_flag(fields::flag(opcode, WIDE_MASK));
        let modrm = ModRm::parse(self.cursor.read_u8()?);

        decode_register_form(modrm, direction, width, &self.tables.registers, start).map_err(
            |e| match self.cursor.skip(modrm.mode.displacement_len(modrm.rm)) {
                // Step over the displacement so the next opcode lines up
                Ok(()) => e,
                Err(truncated) => truncated,
            },
        )
    }

    fn decode_immediate_to_register(&mut self, opcode: u8) -> Result<(Operand, Operand), DecodeError> {
        let width = Width::from_flag(fields::flag(opcode, IMMEDIATE_WIDE_MASK));
        let field = fields::extract(opcode, IMMEDIATE_REG_MASK, 0);
        let register = self.tables.registers.lookup(field, width);
        let value = read_immediate(&mut self.cursor, width)?;
        Ok((Operand::Register(register), Operand::Immediate(value)))
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<DecodedInstruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_rule() {
        let implemented: Vec<_> = InstructionKind::ALL
            .iter()
            .filter(|k| !matches!(DecodeRule::for_kind(**k), DecodeRule::NotImplemented(_)))
            .copied()
            .collect();
        assert_eq!(
            implemented,
            vec![
                InstructionKind::RegisterMemoryMove,
                InstructionKind::ImmediateToRegister,
                InstructionKind::ArithmeticAdd,
                InstructionKind::ArithmeticSub,
                InstructionKind::ArithmeticCmp,
            ]
        );
    }

    #[test]
    fn test_skip_layout_lengths() {
        let cases: [(u8, &[u8]); 8] = [
            (0xA1, &[0x34, 0x12]),
            (0x04, &[0x05]),
            (0x05, &[0x34, 0x12]),
            (0xC6, &[0x46, 0x02, 0x05]),
            (0xC7, &[0x06, 0x34, 0x12, 0x78, 0x56]),
            (0x81, &[0xC0, 0x34, 0x12]),
            (0x83, &[0x86, 0x34, 0x12, 0x05]),
            (0x82, &[0xC0, 0x05]),
        ];
        for (opcode, rest) in cases {
            let kind = DEFAULT_TABLES.opcodes.classify(opcode).unwrap().kind;
            let DecodeRule::NotImplemented(layout) = DecodeRule::for_kind(kind) else {
                panic!("{:02x} should not be decoded", opcode);
            };

            let mut cursor = ByteCursor::new(rest);
            layout.skip(opcode, &mut cursor).unwrap();
            assert!(cursor.is_at_end(), "{:02x}: stopped at {}", opcode, cursor.position());

            let mut short = ByteCursor::new(&rest[..rest.len() - 1]);
            assert!(
                matches!(
                    layout.skip(opcode, &mut short),
                    Err(DecodeError::TruncatedStream { .. })
                ),
                "{:02x}",
                opcode
            );
        }
    }

    #[test]
    fn test_state_transitions() {
        let bytes = [0x89, 0xD9];
        let mut decoder = Decoder::new(&bytes, &DEFAULT_TABLES, DecoderConfig::default());
        assert_eq!(decoder.state(), &DecoderState::AwaitingOpcode);

        let inst = decoder.next().unwrap().unwrap();
        assert_eq!(inst.to_string(), "mov cx, bx");
        assert_eq!(decoder.state(), &DecoderState::AwaitingOpcode);
        assert_eq!(decoder.position(), 2);

        assert!(decoder.next().is_none());
        assert_eq!(decoder.state(), &DecoderState::Done);
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_empty_input_is_done() {
        let mut decoder = Decoder::new(&[], &DEFAULT_TABLES, DecoderConfig::default());
        assert!(decoder.next().is_none());
        assert_eq!(decoder.state(), &DecoderState::Done);
    }

    #[test]
    fn test_failed_state_is_terminal() {
        let bytes = [0xFF, 0x89, 0xD9];
        let mut decoder = Decoder::new(&bytes, &DEFAULT_TABLES, DecoderConfig::default());
        let err = decoder.next().unwrap().unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode { offset: 0, byte: 0xFF });
        assert_eq!(decoder.state(), &DecoderState::Failed(err));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_iteration_guard() {
        let bytes = [0x89, 0xD9, 0x89, 0xD9, 0x89, 0xD9];
        let config = DecoderConfig {
            max_iterations: 2,
            ..DecoderConfig::default()
        };
        let report = Decoder::new(&bytes, &DEFAULT_TABLES, config).run();
        assert_eq!(report.instructions.len(), 2);
        assert_eq!(
            report.fatal,
            Some(DecodeError::IterationLimitExceeded { offset: 4, limit: 2 })
        );
    }

    #[test]
    fn test_zero_iterations_allowed_on_empty_input() {
        let config = DecoderConfig {
            max_iterations: 0,
            ..DecoderConfig::default()
        };
        let report = Decoder::new(&[], &DEFAULT_TABLES, config).run();
        assert!(report.is_complete());
    }
}
