use super::Offset;
use crate::errors::KmiError;

/// Bounds checked, little-endian access to the bytes of an object file. Every read
/// validates offset + width against the length of the file first so a malformed
/// object turns into a Format error instead of a bad memory access.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn slice(&self, offset: Offset, size: u64) -> Result<&'a [u8], KmiError> {
        let range = offset
            .0
            .checked_add(size)
            .filter(|end| *end <= self.len())
            .and_then(|end| Some(usize::try_from(offset.0).ok()?..usize::try_from(end).ok()?));
        match range {
            Some(range) => Ok(&self.bytes[range]),
            None => Err(KmiError::format(format!(
                "read of {size} bytes at offset {:#x} is outside of file",
                offset.0
            ))),
        }
    }

    pub fn read_byte(&self, offset: Offset) -> Result<u8, KmiError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_half(&self, offset: Offset) -> Result<u16, KmiError> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    pub fn read_word(&self, offset: Offset) -> Result<u32, KmiError> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    pub fn read_xword(&self, offset: Offset) -> Result<u64, KmiError> {
        Ok(u64::from_le_bytes(self.array(offset)?))
    }

    /// Returns the bytes starting at offset up to, but not including, the first nul.
    /// The nul has to appear before end.
    pub fn read_string(&self, offset: Offset, end: Offset) -> Result<&'a [u8], KmiError> {
        let available = end.0.saturating_sub(offset.0);
        let bytes = self.slice(offset, available)?;
        match bytes.iter().position(|b| *b == 0) {
            Some(n) => Ok(&bytes[..n]),
            None => Err(KmiError::format(format!(
                "string at offset {:#x} is not nul terminated",
                offset.0
            ))),
        }
    }

    fn array<const N: usize>(&self, offset: Offset) -> Result<[u8; N], KmiError> {
        let mut result = [0; N];
        result.copy_from_slice(self.slice(offset, N as u64)?);
        Ok(result)
    }
}

/// Cursor used to read the consecutive fields of a record.
pub struct Stream<'a> {
    pub reader: Reader<'a>,
    pub offset: Offset,
}

impl<'a> Stream<'a> {
    pub fn new(reader: Reader<'a>, offset: Offset) -> Self {
        Stream { reader, offset }
    }

    pub fn read_byte(&mut self) -> Result<u8, KmiError> {
        let byte = self.reader.read_byte(self.offset)?;
        self.advance(1)?;
        Ok(byte)
    }

    pub fn read_half(&mut self) -> Result<u16, KmiError> {
        let half = self.reader.read_half(self.offset)?;
        self.advance(2)?;
        Ok(half)
    }

    pub fn read_word(&mut self) -> Result<u32, KmiError> {
        let word = self.reader.read_word(self.offset)?;
        self.advance(4)?;
        Ok(word)
    }

    pub fn read_xword(&mut self) -> Result<u64, KmiError> {
        let xword = self.reader.read_xword(self.offset)?;
        self.advance(8)?;
        Ok(xword)
    }

    pub fn read_sxword(&mut self) -> Result<i64, KmiError> {
        Ok(self.read_xword()? as i64)
    }

    pub fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], KmiError> {
        let bytes = self.reader.array(self.offset)?;
        self.advance(N as u64)?;
        Ok(bytes)
    }

    fn advance(&mut self, n: u64) -> Result<(), KmiError> {
        self.offset = self.offset.checked_add(n).ok_or_else(|| {
            KmiError::format(format!("offset {:#x} overflows", self.offset.0))
        })?;
        Ok(())
    }
}
