use crate::cursor::ByteCursor;
use crate::error::DecodeError;
use crate::registers::Width;

/// Read a signed immediate of the given width, low byte first.
///
/// Byte immediates are sign-extended from 8 bits, so `0xFF` reads as -1.
/// Word immediates combine both bytes little-endian. Nothing is consumed
/// if the stream is too short.
pub fn read_immediate(cursor: &mut ByteCursor<'_>, width: Width) -> Result<i16, DecodeError> {
    match width {
        Width::Byte => {
            let [low] = cursor.take::<1>()?;
            Ok(low as i8 as i16)
        }
        Width::Word => {
            let bytes = cursor.take::<2>()?;
            Ok(i16::from_le_bytes(bytes))
        }
    }
}
