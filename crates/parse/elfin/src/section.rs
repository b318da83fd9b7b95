//! Section header parsing.
//!
//! A [`SectionHeader`] is parsed on first request and then owns three more
//! lazy slots: its resolved name, its string table view, and the array of
//! symbol slots when the section is a symbol table.

use alloc::borrow::Cow;
use alloc::boxed::Box;

use bitflags::bitflags;

use crate::error::ElfError;
use crate::file::ElfFile;
use crate::lazy::LazyCache;
use crate::reader::ByteReader;
use crate::strtab::StringTable;
use crate::symbol::Symbol;

/// Size of an ELF32 section header entry (40 bytes).
pub const ELF32_SHDR_SIZE: usize = 40;

/// Size of an ELF64 section header entry (64 bytes).
pub const ELF64_SHDR_SIZE: usize = 64;

/// Section type: inactive header.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table.
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: relocation entries with addends.
pub const SHT_RELA: u32 = 4;

/// Section type: symbol hash table.
pub const SHT_HASH: u32 = 5;

/// Section type: dynamic linking information.
pub const SHT_DYNAMIC: u32 = 6;

/// Section type: notes.
pub const SHT_NOTE: u32 = 7;

/// Section type: occupies no file space (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Section type: relocation entries without addends.
pub const SHT_REL: u32 = 9;

/// Section type: reserved.
pub const SHT_SHLIB: u32 = 10;

/// Section type: dynamic symbol table.
pub const SHT_DYNSYM: u32 = 11;

/// Section type: array of constructors.
pub const SHT_INIT_ARRAY: u32 = 14;

/// Section type: array of destructors.
pub const SHT_FINI_ARRAY: u32 = 15;

/// Section type: array of pre-constructors.
pub const SHT_PREINIT_ARRAY: u32 = 16;

/// Section type: section group.
pub const SHT_GROUP: u32 = 17;

/// Section type: extended section indices.
pub const SHT_SYMTAB_SHNDX: u32 = 18;

/// Special section index: undefined.
pub const SHN_UNDEF: u16 = 0;

/// Special section index: absolute values.
pub const SHN_ABS: u16 = 0xfff1;

/// Special section index: common symbols.
pub const SHN_COMMON: u16 = 0xfff2;

/// Special section index: escape to the extended index table.
pub const SHN_XINDEX: u16 = 0xffff;

/// Conventional name of the static symbol string table.
pub const STRING_TABLE_NAME: &str = ".strtab";

/// Conventional name of the dynamic symbol string table.
pub const DYNAMIC_STRING_TABLE_NAME: &str = ".dynstr";

bitflags! {
    /// Section attribute flags (`sh_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        /// Writable during execution.
        const WRITE = 0x1;
        /// Occupies memory during execution.
        const ALLOC = 0x2;
        /// Executable machine instructions.
        const EXECINSTR = 0x4;
        /// Might be merged.
        const MERGE = 0x10;
        /// NUL-terminated strings.
        const STRINGS = 0x20;
        /// `sh_info` holds a section header table index.
        const INFO_LINK = 0x40;
        /// Preserve order after combining.
        const LINK_ORDER = 0x80;
        /// Member of a section group.
        const GROUP = 0x200;
        /// Holds thread-local data.
        const TLS = 0x400;
    }
}

/// Returns the conventional name of a section type, if it is a standard one.
#[must_use]
pub fn section_type_name(sh_type: u32) -> Option<&'static str> {
    Some(match sh_type {
        SHT_NULL => "NULL",
        SHT_PROGBITS => "PROGBITS",
        SHT_SYMTAB => "SYMTAB",
        SHT_STRTAB => "STRTAB",
        SHT_RELA => "RELA",
        SHT_HASH => "HASH",
        SHT_DYNAMIC => "DYNAMIC",
        SHT_NOTE => "NOTE",
        SHT_NOBITS => "NOBITS",
        SHT_REL => "REL",
        SHT_SHLIB => "SHLIB",
        SHT_DYNSYM => "DYNSYM",
        SHT_INIT_ARRAY => "INIT_ARRAY",
        SHT_FINI_ARRAY => "FINI_ARRAY",
        SHT_PREINIT_ARRAY => "PREINIT_ARRAY",
        SHT_GROUP => "GROUP",
        SHT_SYMTAB_SHNDX => "SYMTAB_SHNDX",
        _ => return None,
    })
}

/// Parsed section header entry.
///
/// The on-disk field order is the same for both classes; only the
/// address-sized fields change width.
#[derive(Debug)]
pub struct SectionHeader<'a> {
    reader: ByteReader<'a>,
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_SYMTAB`, `SHT_STRTAB`, etc.).
    pub sh_type: u32,
    /// Section flags, see [`SectionHeader::flags`].
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data.
    pub sh_offset: u64,
    /// Size of the section data in bytes.
    pub sh_size: u64,
    /// Associated section index (e.g. `.strtab` index for `.symtab`).
    pub sh_link: u32,
    /// Extra info (interpretation depends on section type).
    pub sh_info: u32,
    /// Required alignment of the section.
    pub sh_addralign: u64,
    /// Size of each entry for sections holding fixed-size records, else 0.
    pub sh_entsize: u64,
    name: LazyCache<Cow<'a, str>>,
    string_table: LazyCache<StringTable<'a>>,
    symbols: LazyCache<Box<[LazyCache<Symbol<'a>>]>>,
}

impl<'a> SectionHeader<'a> {
    /// Parse a section header at file offset `offset`.
    pub(crate) fn parse(reader: &ByteReader<'a>, offset: u64) -> Result<Self, ElfError> {
        let mut r = reader.at(offset)?;
        Ok(Self {
            reader: *reader,
            sh_name: r.read_u32()?,
            sh_type: r.read_u32()?,
            sh_flags: r.read_word()?,
            sh_addr: r.read_word()?,
            sh_offset: r.read_word()?,
            sh_size: r.read_word()?,
            sh_link: r.read_u32()?,
            sh_info: r.read_u32()?,
            sh_addralign: r.read_word()?,
            sh_entsize: r.read_word()?,
            name: LazyCache::new(),
            string_table: LazyCache::new(),
            symbols: LazyCache::new(),
        })
    }

    /// Returns the section flags; unknown bits are preserved.
    #[must_use]
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.sh_flags)
    }

    /// Returns the section's name from the section header string table.
    ///
    /// A file without a section header string table (`e_shstrndx` is
    /// `SHN_UNDEF`) has only empty names.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving the string table or the name offset.
    pub fn name(&self, elf: &ElfFile<'a>) -> Result<&str, ElfError> {
        self.name
            .get_or_try_init(|| match elf.section_header_string_table()? {
                Some(strtab) => strtab.lookup(self.sh_name),
                None => Ok(Cow::Borrowed("")),
            })
            .map(AsRef::as_ref)
    }

    /// Returns the raw bytes of the section; empty for `SHT_NOBITS`.
    ///
    /// # Errors
    ///
    /// [`ElfError::OutOfRange`] or [`ElfError::TruncatedInput`] if the
    /// section does not lie inside the file.
    pub fn data(&self) -> Result<&'a [u8], ElfError> {
        if self.sh_type == SHT_NOBITS {
            return Ok(&[]);
        }
        self.reader.bytes(self.sh_offset, self.sh_size)
    }

    /// Returns a string table view over this section's bytes.
    ///
    /// # Errors
    ///
    /// Fails like [`SectionHeader::data`].
    pub fn string_table(&self) -> Result<&StringTable<'a>, ElfError> {
        self.string_table
            .get_or_try_init(|| self.data().map(StringTable::new))
    }

    /// Returns the number of fixed-size records, `sh_size / sh_entsize`,
    /// or 0 when the section has no entry size or occupies no file bytes
    /// (`SHT_NOBITS`).
    #[must_use]
    pub fn number_of_symbols(&self) -> usize {
        if self.sh_entsize == 0 || self.sh_type == SHT_NOBITS {
            return 0;
        }
        usize::try_from(self.sh_size / self.sh_entsize).unwrap_or(usize::MAX)
    }

    /// Returns the symbol at `index`, parsing it on first access.
    ///
    /// # Errors
    ///
    /// - [`ElfError::OutOfRange`] if `index >= number_of_symbols()`.
    /// - Whatever [`SectionHeader::data`] reports if the table is not inside
    ///   the file, or a record fails to parse.
    pub fn symbol(&self, index: usize) -> Result<&Symbol<'a>, ElfError> {
        let slots = self.symbols.get_or_try_init(|| {
            // One slot per record the file bytes actually hold.
            let count = if self.number_of_symbols() == 0 {
                0
            } else {
                self.data()?.len() as u64 / self.sh_entsize
            };
            Ok::<_, ElfError>((0..count).map(|_| LazyCache::new()).collect())
        })?;
        let slot = slots
            .get(index)
            .ok_or(ElfError::out_of_range(index as u64, slots.len() as u64))?;
        slot.get_or_try_init(|| {
            let offset = self
                .sh_offset
                .checked_add(index as u64 * self.sh_entsize)
                .ok_or(ElfError::out_of_range(index as u64, slots.len() as u64))?;
            log::trace!("resolving symbol {index} at {offset:#x}");
            Symbol::parse(&self.reader, offset, self.sh_link)
        })
    }

    /// Returns an iterator over every symbol in this section, in index order.
    pub fn symbols(&self) -> impl Iterator<Item = Result<&Symbol<'a>, ElfError>> + '_ {
        (0..self.number_of_symbols()).map(move |index| self.symbol(index))
    }
}
