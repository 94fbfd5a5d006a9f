//! Variable-width integer tiers
//!
//! Counts and string-pool indices are written with the narrowest of four
//! little-endian widths that can hold the largest value of the collection.

use crate::encoder::{DecodeError, MetadataReader, MetadataWriter};

/// Byte width of an encoded unsigned integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    /// One byte
    U8,
    /// Two bytes
    U16,
    /// Three bytes
    U24,
    /// Four bytes
    U32,
}

impl IntWidth {
    /// All tiers, narrowest first
    pub const ALL: [IntWidth; 4] = [IntWidth::U8, IntWidth::U16, IntWidth::U24, IntWidth::U32];

    /// Pick the narrowest width able to represent `bound`
    pub fn for_upper_bound(bound: u32) -> Self {
        match bound {
            0..=0xFF => IntWidth::U8,
            0x100..=0xFFFF => IntWidth::U16,
            0x1_0000..=0xFF_FFFF => IntWidth::U24,
            _ => IntWidth::U32,
        }
    }

    /// Two-bit selector stored in flag and header bytes
    pub fn id(self) -> u8 {
        match self {
            IntWidth::U8 => 0,
            IntWidth::U16 => 1,
            IntWidth::U24 => 2,
            IntWidth::U32 => 3,
        }
    }

    /// Inverse of [`IntWidth::id`]; only the low two bits are considered
    pub fn from_id(id: u8) -> Self {
        match id & 0b11 {
            0 => IntWidth::U8,
            1 => IntWidth::U16,
            2 => IntWidth::U24,
            _ => IntWidth::U32,
        }
    }

    /// Number of bytes occupied by a value of this width
    pub fn byte_len(self) -> usize {
        self.id() as usize + 1
    }

    /// Largest value representable at this width
    pub fn max_value(self) -> u32 {
        match self {
            IntWidth::U8 => 0xFF,
            IntWidth::U16 => 0xFFFF,
            IntWidth::U24 => 0xFF_FFFF,
            IntWidth::U32 => u32::MAX,
        }
    }

    /// Write `value` using exactly [`IntWidth::byte_len`] bytes
    pub fn write(self, writer: &mut MetadataWriter, value: u32) {
        debug_assert!(value <= self.max_value());
        let bytes = value.to_le_bytes();
        writer.emit_bytes(&bytes[..self.byte_len()]);
    }

    /// Read a value of this width
    pub fn read(self, reader: &mut MetadataReader<'_>) -> Result<u32, DecodeError> {
        let mut bytes = [0u8; 4];
        let raw = reader.read_slice(self.byte_len())?;
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(u32::from_le_bytes(bytes))
    }
}
