//! Class- and endian-aware primitive decoding.
//!
//! Every multi-byte field in an ELF file is stored in the byte order named by
//! the identification block, and every address-sized field is 4 or 8 bytes
//! wide depending on the file class. [`ByteReader`] hides both so the record
//! parsers above it only say *what* they read, never *how wide* or *which
//! order*.

use core::fmt;

use crate::error::{ElfError, HeaderDefect};

/// `EI_CLASS` value for 32-bit objects.
pub const ELFCLASS32: u8 = 1;

/// `EI_CLASS` value for 64-bit objects.
pub const ELFCLASS64: u8 = 2;

/// `EI_DATA` value for little-endian (LSB first) encoding.
pub const ELFDATA2LSB: u8 = 1;

/// `EI_DATA` value for big-endian (MSB first) encoding.
pub const ELFDATA2MSB: u8 = 2;

/// Word size of an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// 32-bit addresses and offsets.
    Elf32,
    /// 64-bit addresses and offsets.
    Elf64,
}

impl Class {
    /// Size in bytes of an address/offset field (`Elf*_Addr`, `Elf*_Off`).
    #[must_use]
    pub const fn word_size(self) -> usize {
        match self {
            Self::Elf32 => 4,
            Self::Elf64 => 8,
        }
    }
}

impl TryFrom<u8> for Class {
    type Error = ElfError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            ELFCLASS32 => Ok(Self::Elf32),
            ELFCLASS64 => Ok(Self::Elf64),
            other => Err(ElfError::MalformedHeader(HeaderDefect::BadClass(other))),
        }
    }
}

/// Byte order of an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Little-endian.
    Lsb,
    /// Big-endian.
    Msb,
}

impl TryFrom<u8> for Encoding {
    type Error = ElfError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            ELFDATA2LSB => Ok(Self::Lsb),
            ELFDATA2MSB => Ok(Self::Msb),
            other => Err(ElfError::MalformedHeader(HeaderDefect::BadEncoding(other))),
        }
    }
}

/// A positioned cursor over an immutable byte snapshot.
///
/// The reader is `Copy`: [`ByteReader::at`] hands out an independent cursor
/// for each record, so lazily-parsed entities never share position state.
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    class: Class,
    encoding: Encoding,
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at offset 0.
    #[must_use]
    pub fn new(data: &'a [u8], class: Class, encoding: Encoding) -> Self {
        Self {
            data,
            class,
            encoding,
            pos: 0,
        }
    }

    /// Returns the file class this reader decodes words for.
    #[must_use]
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the byte order this reader decodes with.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns the whole backing buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the current absolute position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    /// Returns a copy of this reader positioned at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::OutOfRange`] if `offset` lies past the end of the
    /// backing data. Seeking exactly to the end is allowed; the next read
    /// then fails with [`ElfError::TruncatedInput`].
    pub fn at(&self, offset: u64) -> Result<Self, ElfError> {
        let len = self.data.len() as u64;
        if offset > len {
            return Err(ElfError::out_of_range(offset, len));
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "offset <= data.len(), which fits in usize"
        )]
        let pos = offset as usize;
        Ok(Self { pos, ..*self })
    }

    /// Returns `len` bytes starting at absolute `offset`, without moving.
    ///
    /// # Errors
    ///
    /// [`ElfError::OutOfRange`] if `offset` is past the end, or
    /// [`ElfError::TruncatedInput`] if the range runs off the end.
    pub fn bytes(&self, offset: u64, len: u64) -> Result<&'a [u8], ElfError> {
        let mut cursor = self.at(offset)?;
        cursor.take(len)
    }

    /// Consumes `len` bytes at the current position.
    fn take(&mut self, len: u64) -> Result<&'a [u8], ElfError> {
        let remaining = (self.data.len() - self.pos) as u64;
        if len > remaining {
            return Err(ElfError::TruncatedInput {
                offset: self.pos as u64,
                needed: len,
            });
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "len <= remaining, which fits in usize"
        )]
        let end = self.pos + len as usize;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ElfError> {
        let start = self.pos as u64;
        let bytes = self.take(N as u64)?;
        bytes.try_into().map_err(|_| ElfError::TruncatedInput {
            offset: start,
            needed: N as u64,
        })
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] at end of data.
    pub fn read_u8(&mut self) -> Result<u8, ElfError> {
        let [b] = self.array::<1>()?;
        Ok(b)
    }

    /// Reads an `Elf*_Half`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, ElfError> {
        let b = self.array()?;
        Ok(match self.encoding {
            Encoding::Lsb => u16::from_le_bytes(b),
            Encoding::Msb => u16::from_be_bytes(b),
        })
    }

    /// Reads an `Elf*_Word`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, ElfError> {
        let b = self.array()?;
        Ok(match self.encoding {
            Encoding::Lsb => u32::from_le_bytes(b),
            Encoding::Msb => u32::from_be_bytes(b),
        })
    }

    /// Reads an `Elf64_Xword`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, ElfError> {
        let b = self.array()?;
        Ok(match self.encoding {
            Encoding::Lsb => u64::from_le_bytes(b),
            Encoding::Msb => u64::from_be_bytes(b),
        })
    }

    /// Reads an `Elf*_Sword`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, ElfError> {
        let b = self.array()?;
        Ok(match self.encoding {
            Encoding::Lsb => i32::from_le_bytes(b),
            Encoding::Msb => i32::from_be_bytes(b),
        })
    }

    /// Reads an `Elf64_Sxword`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64, ElfError> {
        let b = self.array()?;
        Ok(match self.encoding {
            Encoding::Lsb => i64::from_le_bytes(b),
            Encoding::Msb => i64::from_be_bytes(b),
        })
    }

    /// Reads an address-sized unsigned field, zero-extended to `u64`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than [`Class::word_size`] bytes remain.
    pub fn read_word(&mut self) -> Result<u64, ElfError> {
        match self.class {
            Class::Elf32 => self.read_u32().map(u64::from),
            Class::Elf64 => self.read_u64(),
        }
    }

    /// Reads an address-sized signed field, sign-extended to `i64`.
    ///
    /// # Errors
    ///
    /// [`ElfError::TruncatedInput`] if fewer than [`Class::word_size`] bytes remain.
    pub fn read_sword(&mut self) -> Result<i64, ElfError> {
        match self.class {
            Class::Elf32 => self.read_i32().map(i64::from),
            Class::Elf64 => self.read_i64(),
        }
    }
}

impl fmt::Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteReader")
            .field("len", &self.data.len())
            .field("class", &self.class)
            .field("encoding", &self.encoding)
            .field("pos", &self.pos)
            .finish()
    }
}
