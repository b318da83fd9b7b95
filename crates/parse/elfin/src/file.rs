//! The parsed ELF file and its cross-table queries.
//!
//! [`ElfFile::parse`] decodes only the file header. Both header tables get
//! one lazy slot per entry; an entry is decoded the first time it is asked
//! for, at `table_base + index * entry_size`, and kept from then on.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt;

use crate::error::ElfError;
use crate::header::{ElfHeader, Machine, ObjectType};
use crate::lazy::LazyCache;
use crate::reader::{ByteReader, Class, Encoding};
use crate::section::{
    DYNAMIC_STRING_TABLE_NAME, SHN_UNDEF, SHT_DYNAMIC, SHT_DYNSYM, SHT_SYMTAB, STRING_TABLE_NAME,
    SectionHeader,
};
use crate::segment::{PT_INTERP, ProgramHeader};
use crate::strtab::StringTable;
use crate::symbol::Symbol;

/// A parsed ELF image borrowed from an in-memory byte snapshot.
///
/// Lazily resolved entities live inside the file and are handed out as
/// shared references, so the file is `Send` but not `Sync`: resolve
/// everything you need before sharing one across threads.
pub struct ElfFile<'a> {
    reader: ByteReader<'a>,
    header: ElfHeader,
    section_headers: Box<[LazyCache<SectionHeader<'a>>]>,
    program_headers: Box<[LazyCache<ProgramHeader<'a>>]>,
    symbol_table: LazyCache<Option<usize>>,
    dynamic_symbol_table: LazyCache<Option<usize>>,
    dynamic_link: LazyCache<Option<usize>>,
}

fn slots<T>(count: u16) -> Box<[LazyCache<T>]> {
    (0..count).map(|_| LazyCache::new()).collect()
}

/// `base + index * entry_size` for entry `index` of a `count`-entry table,
/// or `OutOfRange` naming the index if that overflows.
fn table_offset(
    base: u64,
    index: usize,
    entry_size: u16,
    count: usize,
) -> Result<u64, ElfError> {
    (index as u64)
        .checked_mul(u64::from(entry_size))
        .and_then(|relative| base.checked_add(relative))
        .ok_or(ElfError::out_of_range(index as u64, count as u64))
}

impl<'a> ElfFile<'a> {
    /// Parse the file header of `data` and prepare the lazy header tables.
    ///
    /// Nothing beyond the file header is read here; malformed tables are
    /// reported by the queries that touch them.
    ///
    /// # Errors
    ///
    /// Any [`ElfHeader::parse`] failure. No partially built file is returned.
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        let header = ElfHeader::parse(data)?;
        log::debug!(
            "parsed {:?}/{:?} {} header for {}: {} sections, {} program headers",
            header.class,
            header.encoding,
            header.object_type(),
            header.machine(),
            header.e_shnum,
            header.e_phnum,
        );
        Ok(Self {
            reader: ByteReader::new(data, header.class, header.encoding),
            section_headers: slots(header.e_shnum),
            program_headers: slots(header.e_phnum),
            header,
            symbol_table: LazyCache::new(),
            dynamic_symbol_table: LazyCache::new(),
            dynamic_link: LazyCache::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Header accessors
    // -----------------------------------------------------------------------

    /// Returns the decoded file header.
    #[must_use]
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Returns the word size.
    #[must_use]
    pub fn class(&self) -> Class {
        self.header.class
    }

    /// Returns the byte order.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.header.encoding
    }

    /// Returns the object file type.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        self.header.object_type()
    }

    /// Returns the target architecture.
    #[must_use]
    pub fn machine(&self) -> Machine {
        self.header.machine()
    }

    /// Returns the entry point virtual address (0 if none).
    #[must_use]
    pub fn entry_point(&self) -> u64 {
        self.header.e_entry
    }

    /// Returns the number of section header entries, including index 0.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.section_headers.len()
    }

    /// Returns the number of program header entries.
    #[must_use]
    pub fn program_header_count(&self) -> usize {
        self.program_headers.len()
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn raw_data(&self) -> &'a [u8] {
        self.reader.data()
    }

    // -----------------------------------------------------------------------
    // Table entries
    // -----------------------------------------------------------------------

    /// Returns the section header at `index`, decoding it on first access.
    ///
    /// # Errors
    ///
    /// - [`ElfError::OutOfRange`] if `index >= section_count()`.
    /// - Any decoding failure of the entry itself. Failures are not cached.
    pub fn section_header(&self, index: usize) -> Result<&SectionHeader<'a>, ElfError> {
        let slot = self.section_headers.get(index).ok_or_else(|| {
            ElfError::out_of_range(index as u64, self.section_headers.len() as u64)
        })?;
        slot.get_or_try_init(|| {
            let offset = table_offset(
                self.header.e_shoff,
                index,
                self.header.e_shentsize,
                self.section_count(),
            )?;
            log::trace!("resolving section header {index} at {offset:#x}");
            SectionHeader::parse(&self.reader, offset)
        })
    }

    /// Returns the program header at `index`, decoding it on first access.
    ///
    /// # Errors
    ///
    /// - [`ElfError::OutOfRange`] if `index >= program_header_count()`.
    /// - Any decoding failure of the entry itself. Failures are not cached.
    pub fn program_header(&self, index: usize) -> Result<&ProgramHeader<'a>, ElfError> {
        let slot = self.program_headers.get(index).ok_or_else(|| {
            ElfError::out_of_range(index as u64, self.program_headers.len() as u64)
        })?;
        slot.get_or_try_init(|| {
            let offset = table_offset(
                self.header.e_phoff,
                index,
                self.header.e_phentsize,
                self.program_header_count(),
            )?;
            log::trace!("resolving program header {index} at {offset:#x}");
            ProgramHeader::parse(&self.reader, offset)
        })
    }

    /// Iterates over every section header, index 0 included.
    pub fn section_headers(
        &self,
    ) -> impl Iterator<Item = Result<&SectionHeader<'a>, ElfError>> + '_ {
        (0..self.section_count()).map(move |index| self.section_header(index))
    }

    /// Iterates over every program header.
    pub fn program_headers(
        &self,
    ) -> impl Iterator<Item = Result<&ProgramHeader<'a>, ElfError>> + '_ {
        (0..self.program_header_count()).map(move |index| self.program_header(index))
    }

    // -----------------------------------------------------------------------
    // String tables
    // -----------------------------------------------------------------------

    /// Returns the section header string table, or `None` when `e_shstrndx`
    /// is `SHN_UNDEF`.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving the section named by `e_shstrndx`.
    pub fn section_header_string_table(&self) -> Result<Option<&StringTable<'a>>, ElfError> {
        if self.header.e_shstrndx == SHN_UNDEF {
            return Ok(None);
        }
        self.section_header(usize::from(self.header.e_shstrndx))?
            .string_table()
            .map(Some)
    }

    /// Returns the first section (after index 0) called `name`.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving a section or its name on the way.
    pub fn section_by_name(&self, name: &str) -> Result<Option<&SectionHeader<'a>>, ElfError> {
        for index in 1..self.section_count() {
            let section = self.section_header(index)?;
            if section.name(self)? == name {
                return Ok(Some(section));
            }
        }
        Ok(None)
    }

    fn string_table_named(&self, name: &str) -> Result<Option<&StringTable<'a>>, ElfError> {
        self.section_by_name(name)?
            .map(SectionHeader::string_table)
            .transpose()
    }

    /// Returns the `.strtab` string table, if the file has one.
    ///
    /// # Errors
    ///
    /// See [`ElfFile::section_by_name`].
    pub fn string_table(&self) -> Result<Option<&StringTable<'a>>, ElfError> {
        self.string_table_named(STRING_TABLE_NAME)
    }

    /// Returns the `.dynstr` string table, if the file has one.
    ///
    /// # Errors
    ///
    /// See [`ElfFile::section_by_name`].
    pub fn dynamic_string_table(&self) -> Result<Option<&StringTable<'a>>, ElfError> {
        self.string_table_named(DYNAMIC_STRING_TABLE_NAME)
    }

    // -----------------------------------------------------------------------
    // Well-known sections
    // -----------------------------------------------------------------------

    /// Scans for the first section of `sh_type` after index 0. The outcome,
    /// found or absent, is cached in `cache`; errors are not.
    fn find_by_type(
        &self,
        cache: &LazyCache<Option<usize>>,
        sh_type: u32,
    ) -> Result<Option<&SectionHeader<'a>>, ElfError> {
        let found = cache.get_or_try_init(|| {
            for index in 1..self.section_count() {
                if self.section_header(index)?.sh_type == sh_type {
                    log::trace!("section type {sh_type} found at index {index}");
                    return Ok(Some(index));
                }
            }
            Ok::<_, ElfError>(None)
        })?;
        found.map(|index| self.section_header(index)).transpose()
    }

    /// Returns the static symbol table section (`SHT_SYMTAB`), if any.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving section headers during the scan.
    pub fn symbol_table_section(&self) -> Result<Option<&SectionHeader<'a>>, ElfError> {
        self.find_by_type(&self.symbol_table, SHT_SYMTAB)
    }

    /// Returns the dynamic symbol table section (`SHT_DYNSYM`), if any.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving section headers during the scan.
    pub fn dynamic_symbol_table_section(&self) -> Result<Option<&SectionHeader<'a>>, ElfError> {
        self.find_by_type(&self.dynamic_symbol_table, SHT_DYNSYM)
    }

    /// Returns the dynamic linking section (`SHT_DYNAMIC`), if any.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving section headers during the scan.
    pub fn dynamic_link_section(&self) -> Result<Option<&SectionHeader<'a>>, ElfError> {
        self.find_by_type(&self.dynamic_link, SHT_DYNAMIC)
    }

    /// Returns the path of the first `PT_INTERP` segment, if any.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving program headers or the segment bytes.
    pub fn interpreter_path(&self) -> Result<Option<Cow<'a, str>>, ElfError> {
        for phdr in self.program_headers() {
            let phdr = phdr?;
            if phdr.p_type == PT_INTERP {
                return phdr.interpreter();
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Symbol queries
    // -----------------------------------------------------------------------

    /// Runs `search` over the dynamic symbol table, then the static one,
    /// returning the first hit.
    fn search_symbol_tables<'s>(
        &'s self,
        mut search: impl FnMut(&'s SectionHeader<'a>) -> Result<Option<&'s Symbol<'a>>, ElfError>,
    ) -> Result<Option<&'s Symbol<'a>>, ElfError> {
        if let Some(dynsym) = self.dynamic_symbol_table_section()? {
            if let Some(symbol) = search(dynsym)? {
                return Ok(Some(symbol));
            }
        }
        match self.symbol_table_section()? {
            Some(symtab) => search(symtab),
            None => Ok(None),
        }
    }

    /// Finds a symbol called `name`, looking in the dynamic symbol table
    /// first and the static one second.
    ///
    /// Each table is searched from both ends at once: step `i` checks index
    /// `i`, then index `n - 1 - i`. When a name occurs more than once, the
    /// hit reported is the first one in that visiting order, so a match at
    /// the very end of a table beats one at index 1. The middle entry of an
    /// odd-length table is visited once, on the last step, so a table with
    /// a single entry is searched too.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving sections, symbols or names.
    pub fn symbol_by_name(&self, name: &str) -> Result<Option<&Symbol<'a>>, ElfError> {
        self.search_symbol_tables(|table| {
            let count = table.number_of_symbols();
            for low in 0..count.div_ceil(2) {
                let high = count - 1 - low;
                let symbol = table.symbol(low)?;
                if symbol.name(self)? == name {
                    return Ok(Some(symbol));
                }
                if high != low {
                    let symbol = table.symbol(high)?;
                    if symbol.name(self)? == name {
                        return Ok(Some(symbol));
                    }
                }
            }
            Ok(None)
        })
    }

    /// Finds the symbol whose `[st_value, st_value + st_size)` range holds
    /// `address`, looking in the dynamic symbol table first. Within a
    /// table the lowest matching index wins.
    ///
    /// # Errors
    ///
    /// Propagates failures resolving sections or symbols.
    pub fn symbol_by_address(&self, address: u64) -> Result<Option<&Symbol<'a>>, ElfError> {
        self.search_symbol_tables(|table| {
            for symbol in table.symbols() {
                let symbol = symbol?;
                if symbol.contains(address) {
                    return Ok(Some(symbol));
                }
            }
            Ok(None)
        })
    }
}

impl fmt::Debug for ElfFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfFile")
            .field("header", &self.header)
            .field("len", &self.reader.data().len())
            .field("section_count", &self.section_count())
            .field("program_header_count", &self.program_header_count())
            .finish_non_exhaustive()
    }
}
