use crate::decoder::{DecodeTables, Decoder, DecoderConfig, ErrorPolicy};
use crate::error::DecodeError;
use crate::instruction::DecodedInstruction;
use log::debug;
use serde::Deserialize;

/// Listing header that lets the output re-assemble with nasm
pub const BITS_HEADER: &str = "bits 16";

/// Output options for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    /// Start the listing with a `bits 16` line so nasm can re-assemble it
    pub bits_header: bool,
    /// Prefix each line with its byte offset
    pub show_offsets: bool,
    /// Append the raw instruction bytes as a comment
    pub dump_hex: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        OutputOptions {
            bits_header: false,
            show_offsets: false,
            dump_hex: false,
        }
    }
}

/// Render an instruction as `mnemonic dst, src`
pub fn render(instruction: &DecodedInstruction) -> String {
    instruction.to_string()
}

/// Render one listing line according to `options`
pub fn format_line(instruction: &DecodedInstruction, options: &OutputOptions) -> String {
    let mut output = String::new();

    if options.show_offsets {
        output.push_str(&format!("{:04x}: ", instruction.offset));
    }

    let text = render(instruction);
    if options.dump_hex {
        let hex = instruction
            .encoding
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        output.push_str(&format!("{:<20} ; {}", text, hex));
    } else {
        output.push_str(&text);
    }

    output
}

/// Comment line standing in for an instruction the decoder skipped
pub fn format_skipped(error: &DecodeError) -> String {
    format!("; skipped at {:#06x}: {}", error.offset(), error)
}

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLine {
    /// Header or instruction text
    Text(String),
    /// Comment standing in for an instruction the decoder skipped
    Skipped(String),
}

impl ListingLine {
    pub fn text(&self) -> &str {
        match self {
            ListingLine::Text(text) | ListingLine::Skipped(text) => text,
        }
    }
}

pub struct Disassembler<'a> {
    tables: &'a DecodeTables,
    config: DecoderConfig,
    options: OutputOptions,
}

impl<'a> Disassembler<'a> {
    pub fn new(tables: &'a DecodeTables, config: DecoderConfig, options: OutputOptions) -> Self {
        Disassembler {
            tables,
            config,
            options,
        }
    }

    /// Stream the listing for `bytes` in byte order.
    ///
    /// Skipped instructions come through as `ListingLine::Skipped`. A fatal
    /// error is yielded last.
    pub fn lines<'b>(
        &'b self,
        bytes: &'b [u8],
    ) -> impl Iterator<Item = Result<ListingLine, DecodeError>> + 'b {
        let header = if self.options.bits_header {
            vec![BITS_HEADER.to_string(), String::new()]
        } else {
            Vec::new()
        };
        let options = self.options;
        let policy = self.config.policy;

        header
            .into_iter()
            .map(|line| Ok(ListingLine::Text(line)))
            .chain(
                Decoder::new(bytes, self.tables, self.config).map(move |result| match result {
                    Ok(instruction) => Ok(ListingLine::Text(format_line(&instruction, &options))),
                    Err(e) if e.is_recoverable() && policy == ErrorPolicy::Recoverable => {
                        Ok(ListingLine::Skipped(format_skipped(&e)))
                    }
                    Err(e) => Err(e),
                }),
            )
    }

    /// Disassemble a whole buffer into listing text.
    ///
    /// A fatal error discards the partial listing and is returned instead.
    pub fn disassemble(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        let mut output = String::new();
        let mut skipped = 0;
        for line in self.lines(bytes) {
            let line = line?;
            if let ListingLine::Skipped(_) = line {
                skipped += 1;
            }
            output.push_str(line.text());
            output.push('\n');
        }

        debug!("disassembled {} bytes, skipped {} instructions", bytes.len(), skipped);
        Ok(output)
    }
}
