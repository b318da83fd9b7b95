//! Error types shared by every parsing stage.

use core::fmt;

/// Errors that can occur when parsing or querying an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The identification block is not a valid ELF identification.
    MalformedHeader(HeaderDefect),
    /// The file uses an encoding this parser does not implement.
    UnsupportedFeature(Unsupported),
    /// Fewer bytes are available than the format requires at `offset`.
    TruncatedInput {
        /// Absolute file offset of the read.
        offset: u64,
        /// Number of bytes the read needed.
        needed: u64,
    },
    /// An index or offset lies outside its valid bounds.
    OutOfRange {
        /// The offending index or offset.
        value: u64,
        /// The exclusive upper bound it was checked against.
        limit: u64,
    },
}

/// What exactly is wrong with a malformed identification block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDefect {
    /// The first four bytes are not `\x7fELF`.
    BadMagic([u8; 4]),
    /// The class byte is neither `ELFCLASS32` nor `ELFCLASS64`.
    BadClass(u8),
    /// The encoding byte is neither `ELFDATA2LSB` nor `ELFDATA2MSB`.
    BadEncoding(u8),
    /// The identification version byte is not `EV_CURRENT`.
    BadVersion(u8),
}

/// Header encodings that need a parse path this crate does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    /// `e_shnum` is zero and the real count lives in section 0's `sh_size`.
    ExtendedSectionCount,
    /// `e_shstrndx` is `SHN_XINDEX` and the real index lives in section 0's `sh_link`.
    ExtendedStringIndex,
}

/// Coarse classification of an [`ElfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ElfError::MalformedHeader`].
    MalformedHeader,
    /// See [`ElfError::UnsupportedFeature`].
    UnsupportedFeature,
    /// See [`ElfError::TruncatedInput`].
    TruncatedInput,
    /// See [`ElfError::OutOfRange`].
    OutOfRange,
}

impl ElfError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Self::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
        }
    }

    pub(crate) fn out_of_range(value: impl Into<u64>, limit: impl Into<u64>) -> Self {
        Self::OutOfRange {
            value: value.into(),
            limit: limit.into(),
        }
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader(defect) => write!(f, "malformed ELF header: {defect}"),
            Self::UnsupportedFeature(feature) => write!(f, "unsupported ELF feature: {feature}"),
            Self::TruncatedInput { offset, needed } => {
                write!(f, "input truncated: needed {needed} bytes at offset {offset:#x}")
            }
            Self::OutOfRange { value, limit } => {
                write!(f, "value {value:#x} out of range (limit {limit:#x})")
            }
        }
    }
}

impl fmt::Display for HeaderDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic(bytes) => write!(f, "bad magic number {bytes:02x?}"),
            Self::BadClass(class) => write!(f, "invalid object size class {class}"),
            Self::BadEncoding(encoding) => write!(f, "invalid data encoding {encoding}"),
            Self::BadVersion(version) => write!(f, "invalid ELF version {version}"),
        }
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtendedSectionCount => write!(
                f,
                "e_shnum is SHN_UNDEF (section count stored in section 0 is not supported)"
            ),
            Self::ExtendedStringIndex => write!(
                f,
                "e_shstrndx is SHN_XINDEX (string table index stored in section 0 is not supported)"
            ),
        }
    }
}

impl core::error::Error for ElfError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            ElfError::MalformedHeader(HeaderDefect::BadClass(9)).kind(),
            ErrorKind::MalformedHeader
        );
        assert_eq!(
            ElfError::UnsupportedFeature(Unsupported::ExtendedStringIndex).kind(),
            ErrorKind::UnsupportedFeature
        );
        assert_eq!(
            ElfError::TruncatedInput { offset: 0, needed: 4 }.kind(),
            ErrorKind::TruncatedInput
        );
        assert_eq!(ElfError::out_of_range(5u32, 3u32).kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn display_errors() {
        let errors = [
            ElfError::MalformedHeader(HeaderDefect::BadMagic(*b"\x7fELG")),
            ElfError::MalformedHeader(HeaderDefect::BadEncoding(3)),
            ElfError::MalformedHeader(HeaderDefect::BadVersion(0)),
            ElfError::UnsupportedFeature(Unsupported::ExtendedSectionCount),
            ElfError::TruncatedInput { offset: 0x40, needed: 8 },
            ElfError::out_of_range(10u32, 4u32),
        ];
        for err in &errors {
            let msg = format!("{err}");
            assert!(!msg.is_empty());
        }
        let msg = format!("{}", ElfError::TruncatedInput { offset: 0x40, needed: 8 });
        assert!(msg.contains("0x40"));
    }
}
