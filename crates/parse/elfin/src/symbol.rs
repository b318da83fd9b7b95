//! Symbol table entries (`SHT_SYMTAB`, `SHT_DYNSYM`).

use alloc::borrow::Cow;

use crate::error::ElfError;
use crate::file::ElfFile;
use crate::lazy::LazyCache;
use crate::reader::{ByteReader, Class};

/// Size of an ELF32 symbol entry (16 bytes).
pub const ELF32_SYM_SIZE: usize = 16;

/// Size of an ELF64 symbol entry (24 bytes).
pub const ELF64_SYM_SIZE: usize = 24;

/// Symbol type: unspecified.
pub const STT_NOTYPE: u8 = 0;

/// Symbol type: data object.
pub const STT_OBJECT: u8 = 1;

/// Symbol type: function.
pub const STT_FUNC: u8 = 2;

/// Symbol type: section.
pub const STT_SECTION: u8 = 3;

/// Symbol type: source file name.
pub const STT_FILE: u8 = 4;

/// Symbol type: uninitialised common block.
pub const STT_COMMON: u8 = 5;

/// Symbol type: thread-local storage.
pub const STT_TLS: u8 = 6;

/// Symbol binding: local.
pub const STB_LOCAL: u8 = 0;

/// Symbol binding: global.
pub const STB_GLOBAL: u8 = 1;

/// Symbol binding: weak.
pub const STB_WEAK: u8 = 2;

/// Returns the conventional name of a symbol type, if it is a standard one.
#[must_use]
pub fn symbol_type_name(sym_type: u8) -> Option<&'static str> {
    Some(match sym_type {
        STT_NOTYPE => "NOTYPE",
        STT_OBJECT => "OBJECT",
        STT_FUNC => "FUNC",
        STT_SECTION => "SECTION",
        STT_FILE => "FILE",
        STT_COMMON => "COMMON",
        STT_TLS => "TLS",
        _ => return None,
    })
}

/// Returns the conventional name of a symbol binding, if it is a standard one.
#[must_use]
pub fn symbol_binding_name(binding: u8) -> Option<&'static str> {
    Some(match binding {
        STB_LOCAL => "LOCAL",
        STB_GLOBAL => "GLOBAL",
        STB_WEAK => "WEAK",
        _ => return None,
    })
}

/// Parsed symbol table entry.
///
/// Field order on disk differs between classes: ELF32 puts value and size
/// before the info byte, ELF64 puts them last.
#[derive(Debug)]
pub struct Symbol<'a> {
    /// Offset of the name in the string table linked from the owning section.
    pub st_name: u32,
    /// Symbol value (an address for defined symbols).
    pub st_value: u64,
    /// Size in bytes, 0 if unknown or sizeless.
    pub st_size: u64,
    /// Type (low nibble) and binding (high nibble).
    pub st_info: u8,
    /// Visibility in the low two bits; the rest is reserved.
    pub st_other: u8,
    /// Index of the section this symbol is defined relative to.
    pub st_shndx: u16,
    /// `sh_link` of the owning symbol table section.
    strtab_index: u32,
    name: LazyCache<Cow<'a, str>>,
}

impl<'a> Symbol<'a> {
    /// Parse a symbol entry at `offset`; `strtab_index` is the owning
    /// section's `sh_link`.
    pub(crate) fn parse(
        reader: &ByteReader<'a>,
        offset: u64,
        strtab_index: u32,
    ) -> Result<Self, ElfError> {
        let mut r = reader.at(offset)?;
        let st_name = r.read_u32()?;
        let (st_value, st_size, st_info, st_other, st_shndx) = match r.class() {
            Class::Elf32 => {
                let value = r.read_word()?;
                let size = r.read_word()?;
                let info = r.read_u8()?;
                let other = r.read_u8()?;
                let shndx = r.read_u16()?;
                (value, size, info, other, shndx)
            }
            Class::Elf64 => {
                let info = r.read_u8()?;
                let other = r.read_u8()?;
                let shndx = r.read_u16()?;
                let value = r.read_word()?;
                let size = r.read_word()?;
                (value, size, info, other, shndx)
            }
        };
        Ok(Self {
            st_name,
            st_value,
            st_size,
            st_info,
            st_other,
            st_shndx,
            strtab_index,
            name: LazyCache::new(),
        })
    }

    /// Returns the symbol type (lower 4 bits of `st_info`).
    #[must_use]
    pub fn sym_type(&self) -> u8 {
        self.st_info & 0xf
    }

    /// Returns the symbol binding (upper 4 bits of `st_info`).
    #[must_use]
    pub fn binding(&self) -> u8 {
        self.st_info >> 4
    }

    /// Returns the symbol visibility (lower 2 bits of `st_other`).
    #[must_use]
    pub fn visibility(&self) -> u8 {
        self.st_other & 0x3
    }

    /// Returns `true` if `address` lies in `[st_value, st_value + st_size)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.st_value && address - self.st_value < self.st_size
    }

    /// Returns the symbol's name.
    ///
    /// Names come from the string table of the section the owning symbol
    /// table links to, not from the section header string table.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving the linked section or the name offset.
    pub fn name(&self, elf: &ElfFile<'a>) -> Result<&str, ElfError> {
        self.name
            .get_or_try_init(|| {
                let strtab = elf.section_header(self.strtab_index as usize)?.string_table()?;
                strtab.lookup(self.st_name)
            })
            .map(AsRef::as_ref)
    }
}
