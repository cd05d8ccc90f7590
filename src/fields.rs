//! Bit-field helpers for opcode and addressing-mode bytes.
//!
//! Layout of the bytes this crate decodes:
//!
//! ```text
//! opcode byte (register/memory forms)   1 0 0 0 1 0 d w
//! opcode byte (immediate to register)   1 0 1 1 w r e g
//! addressing-mode byte                  mod | reg | r/m
//!                                       7 6 | 5 4 3 | 2 1 0
//! ```

/// Direction bit: set means the reg field is the destination
pub const DIRECTION_MASK: u8 = 0b0000_0010;
/// Width bit of register/memory opcodes
pub const WIDE_MASK: u8 = 0b0000_0001;

pub const MOD_MASK: u8 = 0b1100_0000;
pub const MOD_SHIFT: u8 = 6;
pub const REG_MASK: u8 = 0b0011_1000;
pub const REG_SHIFT: u8 = 3;
pub const RM_MASK: u8 = 0b0000_0111;
pub const RM_SHIFT: u8 = 0;

/// Width bit of the immediate-to-register opcode
pub const IMMEDIATE_WIDE_MASK: u8 = 0b0000_1000;
/// Register field of the immediate-to-register opcode
pub const IMMEDIATE_REG_MASK: u8 = 0b0000_0111;

/// Extract the field selected by `mask` and shift it down by `shift` bits.
pub fn extract(byte: u8, mask: u8, shift: u8) -> u8 {
    (byte & mask) >> shift
}

/// Read the bit(s) selected by `mask` as a flag.
pub fn flag(byte: u8, mask: u8) -> bool {
    byte & mask != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_modrm_fields() {
        // 11 011 001: register mode, reg=bx, r/m=cx
        let byte = 0b1101_1001;
        assert_eq!(extract(byte, MOD_MASK, MOD_SHIFT), 0b11);
        assert_eq!(extract(byte, REG_MASK, REG_SHIFT), 0b011);
        assert_eq!(extract(byte, RM_MASK, RM_SHIFT), 0b001);
    }

    #[test]
    fn test_flags() {
        assert!(flag(0b1000_1011, DIRECTION_MASK));
        assert!(flag(0b1000_1011, WIDE_MASK));
        assert!(!flag(0b1000_1000, DIRECTION_MASK));
        assert!(!flag(0b1000_1000, WIDE_MASK));
        assert!(flag(0b1011_1001, IMMEDIATE_WIDE_MASK));
        assert!(!flag(0b1011_0001, IMMEDIATE_WIDE_MASK));
    }

    #[test]
    fn test_extract_is_total() {
        for byte in 0..=u8::MAX {
            assert!(extract(byte, MOD_MASK, MOD_SHIFT) <= 3);
            assert!(extract(byte, REG_MASK, REG_SHIFT) <= 7);
            assert!(extract(byte, RM_MASK, RM_SHIFT) <= 7);
            assert!(extract(byte, IMMEDIATE_REG_MASK, 0) <= 7);
        }
    }
}
