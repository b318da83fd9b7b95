//! NUL-terminated string tables (`SHT_STRTAB`).

use alloc::borrow::Cow;
use alloc::string::String;

use crate::error::ElfError;

/// A zero-copy view over the bytes of a string table section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Creates a new string table from the raw section data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Returns the raw table bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the size of the table in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the table has no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the string starting at `offset`, up to (not including) the
    /// next NUL byte or the end of the table, whichever comes first.
    ///
    /// Valid UTF-8 is borrowed; anything else is decoded lossily.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::OutOfRange`] if `offset` is not inside the table.
    pub fn lookup(&self, offset: u32) -> Result<Cow<'a, str>, ElfError> {
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(ElfError::out_of_range(offset, self.data.len() as u64));
        }
        let remaining = &self.data[start..];
        let end = remaining
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(remaining.len());
        Ok(String::from_utf8_lossy(&remaining[..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn lookup_at_offsets() {
        let strtab = StringTable::new(b"\0hello\0world\0");
        assert_eq!(strtab.lookup(0).unwrap(), "");
        assert_eq!(strtab.lookup(1).unwrap(), "hello");
        assert_eq!(strtab.lookup(7).unwrap(), "world");
        // Offsets may point into the middle of a string.
        assert_eq!(strtab.lookup(3).unwrap(), "llo");
    }

    #[test]
    fn lookup_borrows_valid_utf8() {
        let strtab = StringTable::new(b"\0main\0");
        assert!(matches!(strtab.lookup(1).unwrap(), Cow::Borrowed("main")));
    }

    #[test]
    fn lookup_out_of_bounds() {
        let strtab = StringTable::new(b"\0hello\0");
        let err = strtab.lookup(100).unwrap_err();
        assert_eq!(err, ElfError::OutOfRange { value: 100, limit: 7 });
        assert_eq!(strtab.lookup(7).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn empty_table_rejects_every_offset() {
        let strtab = StringTable::new(&[]);
        assert!(strtab.is_empty());
        assert_eq!(strtab.lookup(0).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let strtab = StringTable::new(b"\0abc");
        assert_eq!(strtab.lookup(1).unwrap(), "abc");
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let strtab = StringTable::new(b"\0a\xffb\0");
        assert_eq!(strtab.lookup(1).unwrap(), "a\u{fffd}b");
    }
}
