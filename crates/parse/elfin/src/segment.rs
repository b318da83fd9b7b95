//! Program header (segment) parsing.
//!
//! The two classes store program header fields in different *orders*, not
//! just different widths: ELF64 moves `p_flags` up next to `p_type` so the
//! 8-byte fields stay aligned. [`ProgramHeader::parse`] therefore branches
//! on the class and follows one of two fixed decoding plans.

use alloc::borrow::Cow;
use alloc::string::String;

use bitflags::bitflags;

use crate::error::ElfError;
use crate::reader::{ByteReader, Class};

/// Size of an ELF32 program header entry (32 bytes).
pub const ELF32_PHDR_SIZE: usize = 32;

/// Size of an ELF64 program header entry (56 bytes).
pub const ELF64_PHDR_SIZE: usize = 56;

/// Segment type: unused entry.
pub const PT_NULL: u32 = 0;

/// Segment type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Segment type: dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;

/// Segment type: path of the program interpreter.
pub const PT_INTERP: u32 = 3;

/// Segment type: auxiliary notes.
pub const PT_NOTE: u32 = 4;

/// Segment type: reserved.
pub const PT_SHLIB: u32 = 5;

/// Segment type: the program header table itself.
pub const PT_PHDR: u32 = 6;

/// Segment type: thread-local storage template.
pub const PT_TLS: u32 = 7;

/// Segment type: GNU `.eh_frame_hdr`.
pub const PT_GNU_EH_FRAME: u32 = 0x6474_e550;

/// Segment type: GNU stack executability.
pub const PT_GNU_STACK: u32 = 0x6474_e551;

/// Segment type: GNU read-only after relocation.
pub const PT_GNU_RELRO: u32 = 0x6474_e552;

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        /// Executable.
        const X = 0x1;
        /// Writable.
        const W = 0x2;
        /// Readable.
        const R = 0x4;
    }
}

/// Returns the conventional name of a segment type, if it is a known one.
#[must_use]
pub fn segment_type_name(p_type: u32) -> Option<&'static str> {
    Some(match p_type {
        PT_NULL => "NULL",
        PT_LOAD => "LOAD",
        PT_DYNAMIC => "DYNAMIC",
        PT_INTERP => "INTERP",
        PT_NOTE => "NOTE",
        PT_SHLIB => "SHLIB",
        PT_PHDR => "PHDR",
        PT_TLS => "TLS",
        PT_GNU_EH_FRAME => "GNU_EH_FRAME",
        PT_GNU_STACK => "GNU_STACK",
        PT_GNU_RELRO => "GNU_RELRO",
        _ => return None,
    })
}

/// Parsed program header entry.
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeader<'a> {
    reader: ByteReader<'a>,
    /// Segment type.
    pub p_type: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Physical address, where relevant.
    pub p_paddr: u64,
    /// Size of the segment data in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
    /// Segment flags, see [`ProgramHeader::flags`].
    pub p_flags: u32,
    /// Required alignment.
    pub p_align: u64,
}

impl<'a> ProgramHeader<'a> {
    /// Parse a program header at file offset `offset`.
    pub(crate) fn parse(reader: &ByteReader<'a>, offset: u64) -> Result<Self, ElfError> {
        let mut r = reader.at(offset)?;
        let p_type = r.read_u32()?;
        match r.class() {
            Class::Elf32 => Ok(Self {
                reader: *reader,
                p_type,
                p_offset: r.read_word()?,
                p_vaddr: r.read_word()?,
                p_paddr: r.read_word()?,
                p_filesz: r.read_word()?,
                p_memsz: r.read_word()?,
                p_flags: r.read_u32()?,
                p_align: r.read_word()?,
            }),
            Class::Elf64 => Ok(Self {
                reader: *reader,
                p_type,
                p_flags: r.read_u32()?,
                p_offset: r.read_word()?,
                p_vaddr: r.read_word()?,
                p_paddr: r.read_word()?,
                p_filesz: r.read_word()?,
                p_memsz: r.read_word()?,
                p_align: r.read_word()?,
            }),
        }
    }

    /// Returns the segment flags; unknown bits are preserved.
    #[must_use]
    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_retain(self.p_flags)
    }

    /// Returns the file-backed bytes of the segment (`p_filesz` bytes).
    ///
    /// # Errors
    ///
    /// [`ElfError::OutOfRange`] or [`ElfError::TruncatedInput`] if the
    /// segment does not lie inside the file.
    pub fn data(&self) -> Result<&'a [u8], ElfError> {
        self.reader.bytes(self.p_offset, self.p_filesz)
    }

    /// Returns the interpreter path of a `PT_INTERP` segment, with one
    /// trailing NUL removed. Returns `None` for any other segment type.
    ///
    /// # Errors
    ///
    /// Fails like [`ProgramHeader::data`].
    pub fn interpreter(&self) -> Result<Option<Cow<'a, str>>, ElfError> {
        if self.p_type != PT_INTERP {
            return Ok(None);
        }
        let bytes = self.data()?;
        let path = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        Ok(Some(String::from_utf8_lossy(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::file::ElfFile;
    use crate::reader::Encoding;
    use crate::testutil::{ElfBuilder, LAYOUTS, Segment, encode_phdr};

    #[test]
    fn field_order_differs_by_class() {
        let seg = Segment::new(PT_LOAD, Vec::new())
            .flags(0x5)
            .vaddr(0x40_0000)
            .memsz(0x2000)
            .align(0x1000);

        let b32 = encode_phdr(Class::Elf32, Encoding::Lsb, &seg, 0x100, 0x10);
        assert_eq!(b32.len(), ELF32_PHDR_SIZE);
        // ELF32: p_flags is the 7th word.
        assert_eq!(&b32[24..28], &5u32.to_le_bytes());

        let b64 = encode_phdr(Class::Elf64, Encoding::Lsb, &seg, 0x100, 0x10);
        assert_eq!(b64.len(), ELF64_PHDR_SIZE);
        // ELF64: p_flags directly follows p_type.
        assert_eq!(&b64[4..8], &5u32.to_le_bytes());

        for (class, bytes) in [(Class::Elf32, &b32), (Class::Elf64, &b64)] {
            let reader = ByteReader::new(bytes, class, Encoding::Lsb);
            let phdr = ProgramHeader::parse(&reader, 0).unwrap();
            assert_eq!(phdr.p_type, PT_LOAD);
            assert_eq!(phdr.flags(), SegmentFlags::R | SegmentFlags::X);
            assert_eq!(phdr.p_offset, 0x100);
            assert_eq!(phdr.p_vaddr, 0x40_0000);
            assert_eq!(phdr.p_paddr, 0x40_0000);
            assert_eq!(phdr.p_filesz, 0x10);
            assert_eq!(phdr.p_memsz, 0x2000);
            assert_eq!(phdr.p_align, 0x1000);
        }
    }

    #[test]
    fn interpreter_trims_one_nul() {
        for &(class, encoding) in LAYOUTS {
            let mut builder = ElfBuilder::new(class, encoding);
            builder.add_segment(Segment::new(PT_INTERP, b"/lib/ld.so\0".to_vec()));
            let buf = builder.build();
            let elf = ElfFile::parse(&buf).unwrap();
            let interp = elf.program_header(0).unwrap();
            assert_eq!(interp.interpreter().unwrap().as_deref(), Some("/lib/ld.so"));
        }
    }

    #[test]
    fn interpreter_without_nul() {
        let mut builder = ElfBuilder::new(Class::Elf64, Encoding::Lsb);
        builder.add_segment(Segment::new(PT_INTERP, b"/lib/ld.so".to_vec()));
        let buf = builder.build();
        let elf = ElfFile::parse(&buf).unwrap();
        let interp = elf.program_header(0).unwrap().interpreter().unwrap();
        assert_eq!(interp.as_deref(), Some("/lib/ld.so"));
    }

    #[test]
    fn non_interp_segment_has_no_interpreter() {
        let mut builder = ElfBuilder::new(Class::Elf64, Encoding::Lsb);
        builder.add_segment(Segment::new(PT_LOAD, vec![0xaa; 4]));
        let buf = builder.build();
        let elf = ElfFile::parse(&buf).unwrap();
        let load = elf.program_header(0).unwrap();
        assert_eq!(load.interpreter().unwrap(), None);
        assert_eq!(load.data().unwrap(), &[0xaa; 4]);
    }

    #[test]
    fn segment_outside_file() {
        let mut builder = ElfBuilder::new(Class::Elf32, Encoding::Msb);
        builder.add_segment(Segment::new(PT_INTERP, Vec::new()).filesz_override(0x1000));
        let buf = builder.build();
        let elf = ElfFile::parse(&buf).unwrap();
        let err = elf.program_header(0).unwrap().interpreter().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn type_names() {
        assert_eq!(segment_type_name(PT_INTERP), Some("INTERP"));
        assert_eq!(segment_type_name(PT_GNU_STACK), Some("GNU_STACK"));
        assert_eq!(segment_type_name(0x7000_0000), None);
    }
}
