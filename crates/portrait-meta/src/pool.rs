//! String pool
//!
//! Every string referenced by a descriptor is stored once per encoded unit and
//! referenced by index. The pool header packs three width selectors so that
//! small descriptors pay one byte per reference.

use crate::encoder::{MetadataReader, MetadataWriter};
use crate::error::{MetadataError, Result};
use crate::width::IntWidth;
use rustc_hash::FxHashMap;

/// Deduplicating string pool used while encoding
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl StringPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its pool index
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&existing) = self.index.get(value) {
            return existing;
        }
        let id = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.index.insert(value.to_string(), id);
        id
    }

    /// Look up the index of an already interned string
    pub fn get(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Number of pooled strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Width used for references into this pool
    pub fn index_width(&self) -> IntWidth {
        IntWidth::for_upper_bound(self.strings.len().saturating_sub(1) as u32)
    }

    /// Write the pool header and all strings
    ///
    /// Header byte layout: bits 0-1 count width, bits 2-3 index width,
    /// bits 4-5 string length width.
    pub fn encode(&self, writer: &mut MetadataWriter) -> Result<()> {
        let count = u32::try_from(self.strings.len())
            .map_err(|_| MetadataError::InvalidDescriptor("string pool too large".to_string()))?;
        let mut longest = 0u32;
        for s in &self.strings {
            let len = u32::try_from(s.len()).map_err(|_| {
                MetadataError::InvalidDescriptor("string longer than u32::MAX bytes".to_string())
            })?;
            longest = longest.max(len);
        }

        let count_width = IntWidth::for_upper_bound(count);
        let length_width = IntWidth::for_upper_bound(longest);
        writer.emit_u8(count_width.id() | self.index_width().id() << 2 | length_width.id() << 4);
        count_width.write(writer, count);
        for s in &self.strings {
            length_width.write(writer, s.len() as u32);
            writer.emit_bytes(s.as_bytes());
        }
        Ok(())
    }
}

/// Read-only pool materialised while decoding
#[derive(Debug, Clone)]
pub struct PoolTable {
    strings: Vec<String>,
    index_width: IntWidth,
}

impl PoolTable {
    /// Decode a pool previously written by [`StringPool::encode`]
    pub fn decode(reader: &mut MetadataReader<'_>) -> Result<Self> {
        let header = reader.read_u8()?;
        if header & 0b1100_0000 != 0 {
            return Err(MetadataError::Malformed(format!(
                "reserved string pool header bits set: {header:#04x}"
            )));
        }
        let count_width = IntWidth::from_id(header);
        let index_width = IntWidth::from_id(header >> 2);
        let length_width = IntWidth::from_id(header >> 4);

        let count = count_width.read(reader)? as usize;
        // Every entry costs at least its length prefix
        if count.saturating_mul(length_width.byte_len()) > reader.remaining() {
            return Err(MetadataError::Malformed(format!(
                "string pool declares {count} entries but only {} bytes remain",
                reader.remaining()
            )));
        }

        let mut strings = Vec::with_capacity(count);
        for _ in 0..count {
            let len = length_width.read(reader)? as usize;
            strings.push(reader.read_utf8(len)?);
        }
        Ok(Self {
            strings,
            index_width,
        })
    }

    /// Width of references into this pool
    pub fn index_width(&self) -> IntWidth {
        self.index_width
    }

    /// Number of pooled strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Resolve a pool index
    pub fn get(&self, index: u32) -> Result<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(MetadataError::StringIndexOutOfRange {
                index,
                size: self.strings.len(),
            })
    }

    /// Read a string reference and resolve it
    pub fn read_ref(&self, reader: &mut MetadataReader<'_>) -> Result<String> {
        let index = self.index_width.read(reader)?;
        self.get(index).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.intern("java.lang.String");
        let b = pool.intern("int");
        let c = pool.intern("java.lang.String");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("int"), Some(b));
        assert_eq!(pool.get("long"), None);
    }

    #[test]
    fn test_index_width_grows_with_pool() {
        let mut pool = StringPool::new();
        for i in 0..256 {
            pool.intern(&format!("s{i}"));
        }
        assert_eq!(pool.index_width(), IntWidth::U8);
        pool.intern("s256");
        assert_eq!(pool.index_width(), IntWidth::U16);
    }

    #[test]
    fn test_pool_round_trip() {
        let mut pool = StringPool::new();
        pool.intern("");
        pool.intern("héllo");
        pool.intern(&"x".repeat(300));

        let mut writer = MetadataWriter::new();
        pool.encode(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = MetadataReader::new(&bytes);
        let table = PoolTable::decode(&mut reader).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0).unwrap(), "");
        assert_eq!(table.get(1).unwrap(), "héllo");
        assert_eq!(table.get(2).unwrap().len(), 300);
        assert!(matches!(
            table.get(3),
            Err(MetadataError::StringIndexOutOfRange { index: 3, size: 3 })
        ));
    }

    #[test]
    fn test_pool_rejects_oversized_count() {
        // count width U8, declares 200 strings with nothing following
        let bytes = [0x00, 200];
        let mut reader = MetadataReader::new(&bytes);
        assert!(matches!(
            PoolTable::decode(&mut reader),
            Err(MetadataError::Malformed(_))
        ));
    }
}
