use bytes::BufMut;

use crate::errors::PackError;

/// Converts a length to the 32-bit form used by every format in this crate.
pub(crate) fn len_to_u32(what: &str, len: usize) -> Result<u32, PackError> {
    u32::try_from(len).map_err(|_| PackError::TooLarge {
        what: what.to_string(),
        len,
    })
}

pub trait DataWriterExt: BufMut {
    /// Writes a length or offset as a little-endian `u32`.
    fn put_len_u32(&mut self, what: &str, len: usize) -> Result<(), PackError> {
        self.put_u32_le(len_to_u32(what, len)?);
        Ok(())
    }

    /// Writes the bytes followed by a NUL terminator.
    fn put_cstr(&mut self, text: &[u8]) {
        self.put_slice(text);
        self.put_u8(0);
    }
}

impl<B: BufMut> DataWriterExt for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_cstr_with_terminator() {
        let mut out = Vec::new();
        out.put_cstr(b"a.txt");
        assert_eq!(out, b"a.txt\0");
    }

    #[test]
    fn writes_lengths_little_endian() {
        let mut out = Vec::new();
        out.put_len_u32("size", 0x0102).unwrap();
        assert_eq!(out, [0x02, 0x01, 0, 0]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn rejects_lengths_above_u32() {
        let mut out = Vec::new();
        let err = out.put_len_u32("size", 1 << 32).unwrap_err();
        assert!(matches!(err, PackError::TooLarge { len, .. } if len == 1 << 32));
        assert!(out.is_empty());
    }
}
