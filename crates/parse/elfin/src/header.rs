//! ELF file header parsing.
//!
//! Decodes the 16-byte identification block and the class-dependent header
//! body that follows it, in the format's fixed field order.

use core::fmt;

use crate::error::{ElfError, HeaderDefect, Unsupported};
use crate::reader::{ByteReader, Class, Encoding};
use crate::section::{SHN_UNDEF, SHN_XINDEX};

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of the identification block (`EI_NIDENT`).
pub const EI_NIDENT: usize = 16;

/// The only defined ELF version (`EV_CURRENT`).
pub const EV_CURRENT: u8 = 1;

/// Size of an ELF32 file header (52 bytes).
pub const ELF32_EHDR_SIZE: usize = 52;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;

/// ELF type: no file type.
pub const ET_NONE: u16 = 0;

/// ELF type: relocatable object.
pub const ET_REL: u16 = 1;

/// ELF type: executable.
pub const ET_EXEC: u16 = 2;

/// ELF type: shared object (also PIE executables).
pub const ET_DYN: u16 = 3;

/// ELF type: core dump.
pub const ET_CORE: u16 = 4;

/// Object file type (`e_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// `ET_NONE`.
    None,
    /// `ET_REL`.
    Relocatable,
    /// `ET_EXEC`.
    Executable,
    /// `ET_DYN`.
    SharedObject,
    /// `ET_CORE`.
    Core,
    /// OS- or processor-specific, or unknown.
    Other(u16),
}

impl From<u16> for ObjectType {
    fn from(value: u16) -> Self {
        match value {
            ET_NONE => Self::None,
            ET_REL => Self::Relocatable,
            ET_EXEC => Self::Executable,
            ET_DYN => Self::SharedObject,
            ET_CORE => Self::Core,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Relocatable => f.write_str("REL"),
            Self::Executable => f.write_str("EXEC"),
            Self::SharedObject => f.write_str("DYN"),
            Self::Core => f.write_str("CORE"),
            Self::Other(raw) => write!(f, "{raw:#06x}"),
        }
    }
}

/// Target architecture (`e_machine`).
///
/// Kept open-ended: any code survives a round trip, and [`Machine::name`]
/// labels the ones this crate knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Machine(pub u16);

impl Machine {
    /// No machine.
    pub const NONE: Self = Self(0);
    /// AT&T WE 32100.
    pub const ATT: Self = Self(1);
    /// SPARC.
    pub const SPARC: Self = Self(2);
    /// Intel 80386.
    pub const X86: Self = Self(3);
    /// Motorola 68000.
    pub const M68K: Self = Self(4);
    /// Motorola 88000.
    pub const M88K: Self = Self(5);
    /// Intel 80860.
    pub const I860: Self = Self(7);
    /// MIPS I.
    pub const MIPS: Self = Self(8);
    /// 32-bit ARM.
    pub const ARM: Self = Self(0x28);
    /// AMD x86-64.
    pub const X86_64: Self = Self(0x3e);
    /// 64-bit ARM.
    pub const AARCH64: Self = Self(0xb7);
    /// RISC-V.
    pub const RISCV: Self = Self(0xf3);

    /// Returns a short human-readable name, if the code is known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::NONE => "none",
            Self::ATT => "AT&T WE 32100",
            Self::SPARC => "SPARC",
            Self::X86 => "x86",
            Self::M68K => "m68k",
            Self::M88K => "m88k",
            Self::I860 => "i860",
            Self::MIPS => "MIPS",
            Self::ARM => "ARM",
            Self::X86_64 => "x86-64",
            Self::AARCH64 => "AArch64",
            Self::RISCV => "RISC-V",
            _ => return None,
        })
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

/// Parsed ELF file header, valid for both classes and both encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Word size (`EI_CLASS`).
    pub class: Class,
    /// Byte order (`EI_DATA`).
    pub encoding: Encoding,
    /// Target OS ABI (`EI_OSABI`).
    pub os_abi: u8,
    /// ABI version (`EI_ABIVERSION`).
    pub abi_version: u8,
    /// Object file type.
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file version.
    pub e_version: u32,
    /// Virtual address of the entry point, 0 if none.
    pub e_entry: u64,
    /// File offset of the program header table, 0 if none.
    pub e_phoff: u64,
    /// File offset of the section header table.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of this header in bytes.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries (never 0 after a successful parse).
    pub e_shnum: u16,
    /// Index of the section header string table.
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Parse an ELF file header from the start of `data`.
    ///
    /// The magic is checked before anything else is looked at, then class,
    /// encoding and version; only then is the class-dependent body decoded.
    ///
    /// # Errors
    ///
    /// - [`ElfError::MalformedHeader`] for a bad magic, class, encoding or version.
    /// - [`ElfError::TruncatedInput`] if `data` ends inside the header.
    /// - [`ElfError::UnsupportedFeature`] for extended section numbering.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let magic: [u8; 4] = *data.first_chunk().ok_or(ElfError::TruncatedInput {
            offset: 0,
            needed: ELF_MAGIC.len() as u64,
        })?;
        if magic != ELF_MAGIC {
            return Err(ElfError::MalformedHeader(HeaderDefect::BadMagic(magic)));
        }

        let ident: &[u8; EI_NIDENT] = data.first_chunk().ok_or(ElfError::TruncatedInput {
            offset: 0,
            needed: EI_NIDENT as u64,
        })?;
        let class = Class::try_from(ident[4])?;
        let encoding = Encoding::try_from(ident[5])?;
        if ident[6] != EV_CURRENT {
            return Err(ElfError::MalformedHeader(HeaderDefect::BadVersion(ident[6])));
        }
        // ident[9..16] is EI_PAD.

        let mut r = ByteReader::new(data, class, encoding).at(EI_NIDENT as u64)?;
        let e_type = r.read_u16()?;
        let e_machine = r.read_u16()?;
        let e_version = r.read_u32()?;
        let e_entry = r.read_word()?;
        let e_phoff = r.read_word()?;
        let e_shoff = r.read_word()?;
        let e_flags = r.read_u32()?;
        let e_ehsize = r.read_u16()?;
        let e_phentsize = r.read_u16()?;
        let e_phnum = r.read_u16()?;
        let e_shentsize = r.read_u16()?;
        let e_shnum = r.read_u16()?;
        if e_shnum == SHN_UNDEF {
            return Err(ElfError::UnsupportedFeature(
                Unsupported::ExtendedSectionCount,
            ));
        }
        let e_shstrndx = r.read_u16()?;
        if e_shstrndx == SHN_XINDEX {
            return Err(ElfError::UnsupportedFeature(Unsupported::ExtendedStringIndex));
        }

        Ok(Self {
            class,
            encoding,
            os_abi: ident[7],
            abi_version: ident[8],
            e_type,
            e_machine,
            e_version,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags,
            e_ehsize,
            e_phentsize,
            e_phnum,
            e_shentsize,
            e_shnum,
            e_shstrndx,
        })
    }

    /// Returns the decoded object file type.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        ObjectType::from(self.e_type)
    }

    /// Returns the target architecture.
    #[must_use]
    pub fn machine(&self) -> Machine {
        Machine(self.e_machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{ElfBuilder, LAYOUTS};
    use proptest::prelude::*;

    #[test]
    fn parse_valid_header_all_layouts() {
        for &(class, encoding) in LAYOUTS {
            let buf = ElfBuilder::new(class, encoding).build();
            let hdr = ElfHeader::parse(&buf).expect("valid header");
            assert_eq!(hdr.class, class);
            assert_eq!(hdr.encoding, encoding);
            assert_eq!(hdr.object_type(), ObjectType::Executable);
            assert_eq!(hdr.machine(), Machine::X86_64);
            assert_eq!(hdr.e_entry, 0x0040_1000);
            // Null section plus .shstrtab.
            assert_eq!(hdr.e_shnum, 2);
            assert_eq!(hdr.e_shstrndx, 1);
            let expected_size = match class {
                Class::Elf32 => ELF32_EHDR_SIZE,
                Class::Elf64 => ELF64_EHDR_SIZE,
            };
            assert_eq!(usize::from(hdr.e_ehsize), expected_size);
        }
    }

    #[test]
    fn reject_bad_magic() {
        let mut buf = ElfBuilder::new(Class::Elf64, Encoding::Lsb).build();
        buf[0] = 0x00;
        assert_eq!(
            ElfHeader::parse(&buf),
            Err(ElfError::MalformedHeader(HeaderDefect::BadMagic(*b"\0ELF")))
        );
    }

    #[test]
    fn bad_magic_wins_over_truncation() {
        // Only the magic is present, and it is wrong.
        assert_eq!(
            ElfHeader::parse(b"\x7fELX").unwrap_err().kind(),
            ErrorKind::MalformedHeader
        );
    }

    #[test]
    fn reject_bad_class() {
        let mut buf = ElfBuilder::new(Class::Elf64, Encoding::Lsb).build();
        buf[4] = 3;
        assert_eq!(
            ElfHeader::parse(&buf),
            Err(ElfError::MalformedHeader(HeaderDefect::BadClass(3)))
        );
    }

    #[test]
    fn reject_bad_encoding() {
        let mut buf = ElfBuilder::new(Class::Elf32, Encoding::Lsb).build();
        buf[5] = 0;
        assert_eq!(
            ElfHeader::parse(&buf),
            Err(ElfError::MalformedHeader(HeaderDefect::BadEncoding(0)))
        );
    }

    #[test]
    fn reject_bad_version() {
        let mut buf = ElfBuilder::new(Class::Elf64, Encoding::Msb).build();
        buf[6] = 2;
        assert_eq!(
            ElfHeader::parse(&buf),
            Err(ElfError::MalformedHeader(HeaderDefect::BadVersion(2)))
        );
    }

    #[test]
    fn reject_zero_section_count() {
        for &(class, encoding) in LAYOUTS {
            let buf = ElfBuilder::new(class, encoding).section_count_override(0).build();
            assert_eq!(
                ElfHeader::parse(&buf),
                Err(ElfError::UnsupportedFeature(Unsupported::ExtendedSectionCount))
            );
        }
    }

    #[test]
    fn reject_extended_string_index() {
        let buf = ElfBuilder::new(Class::Elf64, Encoding::Lsb)
            .shstrndx_override(SHN_XINDEX)
            .build();
        assert_eq!(
            ElfHeader::parse(&buf),
            Err(ElfError::UnsupportedFeature(Unsupported::ExtendedStringIndex))
        );
    }

    #[test]
    fn reject_truncated_data() {
        let buf = ElfBuilder::new(Class::Elf64, Encoding::Lsb).build();
        for len in [0, 3, 15, 16, 40, ELF64_EHDR_SIZE - 1] {
            let err = ElfHeader::parse(&buf[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TruncatedInput, "len {len}");
        }
    }

    #[test]
    fn machine_and_type_names() {
        assert_eq!(format!("{}", Machine::AARCH64), "AArch64");
        assert_eq!(format!("{}", Machine(0x1234)), "0x1234");
        assert_eq!(ObjectType::from(ET_CORE), ObjectType::Core);
        assert_eq!(ObjectType::from(0xfe00), ObjectType::Other(0xfe00));
        assert_eq!(format!("{}", ObjectType::SharedObject), "DYN");
    }

    fn any_layout() -> impl Strategy<Value = (Class, Encoding)> {
        prop::sample::select(LAYOUTS.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Decoded header fields equal the values written.
        #[test]
        fn decoded_fields_match_written(
            (class, encoding) in any_layout(),
            entry in any::<u32>(),
            phoff in any::<u32>(),
            shoff in any::<u32>(),
            phnum in any::<u16>(),
            shnum in 1u16..0xff00,
            flags in any::<u32>(),
        ) {
            let buf = ElfBuilder::new(class, encoding)
                .entry(u64::from(entry))
                .raw_table_fields(u64::from(phoff), phnum, u64::from(shoff), shnum)
                .flags(flags)
                .build();
            let hdr = ElfHeader::parse(&buf).unwrap();
            prop_assert_eq!(hdr.e_entry, u64::from(entry));
            prop_assert_eq!(hdr.e_phoff, u64::from(phoff));
            prop_assert_eq!(hdr.e_shoff, u64::from(shoff));
            prop_assert_eq!(hdr.e_phnum, phnum);
            prop_assert_eq!(hdr.e_shnum, shnum);
            prop_assert_eq!(hdr.e_flags, flags);
        }

        /// Corrupting any magic byte fails with MalformedHeader, whatever follows.
        #[test]
        fn magic_corruption_always_malformed(
            (class, encoding) in any_layout(),
            index in 0usize..4,
            delta in 1u8..=255,
            cut in 4usize..=64,
        ) {
            let mut buf = ElfBuilder::new(class, encoding).build();
            buf[index] = buf[index].wrapping_add(delta);
            let cut = cut.min(buf.len());
            let err = ElfHeader::parse(&buf[..cut]).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        }
    }
}
