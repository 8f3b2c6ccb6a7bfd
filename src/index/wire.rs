//! Big-endian wire helpers shared by the Mapping and Node binary encodings.
//!
//! All length-prefixed reads are bounds-checked; a declared length running
//! past the buffer end is corruption, never a silent truncation.

use crate::core::errors::{Result, TcError};

/// Bounds-checked cursor over a binary payload.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            context,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.corrupt())?;
        if end > self.buf.len() {
            return Err(self.corrupt());
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    /// Read a `{len: u16, bytes}` prefixed UTF-8 string.
    pub(crate) fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TcError::CorruptData {
            context: self.context,
            details: format!("invalid UTF-8 in length-prefixed string: {e}"),
        })
    }

    /// Fail unless every byte of the payload has been consumed.
    pub(crate) fn expect_end(&self) -> Result<()> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(TcError::CorruptData {
                context: self.context,
                details: format!(
                    "{} trailing bytes after declared content",
                    self.buf.len() - self.pos
                ),
            })
        }
    }

    fn corrupt(&self) -> TcError {
        TcError::CorruptData {
            context: self.context,
            details: format!(
                "declared length runs past buffer end (offset {}, len {})",
                self.pos,
                self.buf.len()
            ),
        }
    }
}

/// Append a `{len: u16, bytes}` prefixed string.
pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str, context: &'static str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| TcError::Serialization {
        context,
        details: format!("string of {} bytes exceeds u16 length prefix", s.len()),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}
