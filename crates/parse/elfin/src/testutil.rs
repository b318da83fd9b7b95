//! Synthetic ELF image builder for tests.
//!
//! [`ElfBuilder`] lays an image out as: file header, program header table,
//! segment and section data (8-byte aligned), `.shstrtab`, then the section
//! header table. Index 0 of the section table is always the null section and
//! `.shstrtab` is always the last one.

#![allow(clippy::cast_possible_truncation, reason = "test images are small")]

use alloc::string::String;
use alloc::vec::Vec;

use crate::header::{ELF_MAGIC, ELF32_EHDR_SIZE, ELF64_EHDR_SIZE, ET_EXEC, EV_CURRENT, Machine};
use crate::reader::{Class, ELFCLASS32, ELFCLASS64, ELFDATA2LSB, ELFDATA2MSB, Encoding};
use crate::section::{ELF32_SHDR_SIZE, ELF64_SHDR_SIZE, SHT_STRTAB};
use crate::segment::{ELF32_PHDR_SIZE, ELF64_PHDR_SIZE};
use crate::symbol::{ELF32_SYM_SIZE, ELF64_SYM_SIZE};

/// Every class/encoding combination.
pub const LAYOUTS: &[(Class, Encoding)] = &[
    (Class::Elf32, Encoding::Lsb),
    (Class::Elf32, Encoding::Msb),
    (Class::Elf64, Encoding::Lsb),
    (Class::Elf64, Encoding::Msb),
];

// ---------------------------------------------------------------------------
// Byte writer
// ---------------------------------------------------------------------------

struct Writer {
    class: Class,
    encoding: Encoding,
    buf: Vec<u8>,
}

impl Writer {
    fn new(class: Class, encoding: Encoding) -> Self {
        Self {
            class,
            encoding,
            buf: Vec::new(),
        }
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        match self.encoding {
            Encoding::Lsb => self.buf.extend_from_slice(&value.to_le_bytes()),
            Encoding::Msb => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u32(&mut self, value: u32) {
        match self.encoding {
            Encoding::Lsb => self.buf.extend_from_slice(&value.to_le_bytes()),
            Encoding::Msb => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u64(&mut self, value: u64) {
        match self.encoding {
            Encoding::Lsb => self.buf.extend_from_slice(&value.to_le_bytes()),
            Encoding::Msb => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn word(&mut self, value: u64) {
        match self.class {
            Class::Elf32 => self.u32(u32::try_from(value).expect("value fits an ELF32 word")),
            Class::Elf64 => self.u64(value),
        }
    }

    fn align(&mut self, align: usize) {
        let len = self.buf.len().next_multiple_of(align);
        self.buf.resize(len, 0);
    }

    fn offset(&self) -> u64 {
        self.buf.len() as u64
    }
}

fn ehdr_size(class: Class) -> usize {
    match class {
        Class::Elf32 => ELF32_EHDR_SIZE,
        Class::Elf64 => ELF64_EHDR_SIZE,
    }
}

fn shdr_size(class: Class) -> usize {
    match class {
        Class::Elf32 => ELF32_SHDR_SIZE,
        Class::Elf64 => ELF64_SHDR_SIZE,
    }
}

fn phdr_size(class: Class) -> usize {
    match class {
        Class::Elf32 => ELF32_PHDR_SIZE,
        Class::Elf64 => ELF64_PHDR_SIZE,
    }
}

fn sym_size(class: Class) -> usize {
    match class {
        Class::Elf32 => ELF32_SYM_SIZE,
        Class::Elf64 => ELF64_SYM_SIZE,
    }
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// A symbol record to encode.
#[derive(Debug, Clone)]
pub struct Sym {
    name: u32,
    value: u64,
    size: u64,
    info: u8,
    other: u8,
    shndx: u16,
}

impl Sym {
    /// A local, untyped symbol defined in section 1.
    #[must_use]
    pub fn new(name: u32, value: u64, size: u64) -> Self {
        Self {
            name,
            value,
            size,
            info: 0,
            other: 0,
            shndx: 1,
        }
    }

    /// The all-zero entry at index 0 of every symbol table.
    #[must_use]
    pub fn null() -> Self {
        Self::new(0, 0, 0).shndx(0)
    }

    /// Sets binding and type.
    #[must_use]
    pub fn info(mut self, binding: u8, sym_type: u8) -> Self {
        self.info = (binding << 4) | (sym_type & 0xf);
        self
    }

    /// Sets `st_other`.
    #[must_use]
    pub fn other(mut self, other: u8) -> Self {
        self.other = other;
        self
    }

    /// Sets `st_shndx`.
    #[must_use]
    pub fn shndx(mut self, shndx: u16) -> Self {
        self.shndx = shndx;
        self
    }
}

fn write_symbol(w: &mut Writer, sym: &Sym) {
    w.u32(sym.name);
    match w.class {
        Class::Elf32 => {
            w.word(sym.value);
            w.word(sym.size);
            w.u8(sym.info);
            w.u8(sym.other);
            w.u16(sym.shndx);
        }
        Class::Elf64 => {
            w.u8(sym.info);
            w.u8(sym.other);
            w.u16(sym.shndx);
            w.word(sym.value);
            w.word(sym.size);
        }
    }
}

/// Encodes `syms` as consecutive symbol table records.
#[must_use]
pub fn encode_symbols(class: Class, encoding: Encoding, syms: &[Sym]) -> Vec<u8> {
    let mut w = Writer::new(class, encoding);
    for sym in syms {
        write_symbol(&mut w, sym);
    }
    w.buf
}

// ---------------------------------------------------------------------------
// Sections and segments
// ---------------------------------------------------------------------------

/// A section to lay out.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    sh_type: u32,
    data: Vec<u8>,
    flags: u64,
    addr: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
    offset_override: Option<u64>,
    size_override: Option<u64>,
}

impl Section {
    /// A section named `name` holding `data`.
    #[must_use]
    pub fn new(name: &str, sh_type: u32, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            sh_type,
            data,
            flags: 0,
            addr: 0,
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
            offset_override: None,
            size_override: None,
        }
    }

    /// Sets `sh_flags`.
    #[must_use]
    pub fn flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    /// Sets `sh_addr`.
    #[must_use]
    pub fn addr(mut self, addr: u64) -> Self {
        self.addr = addr;
        self
    }

    /// Sets `sh_link`.
    #[must_use]
    pub fn link(mut self, link: u32) -> Self {
        self.link = link;
        self
    }

    /// Sets `sh_info`.
    #[must_use]
    pub fn info(mut self, info: u32) -> Self {
        self.info = info;
        self
    }

    /// Sets `sh_addralign`.
    #[must_use]
    pub fn align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    /// Sets `sh_entsize`.
    #[must_use]
    pub fn entsize(mut self, entsize: u64) -> Self {
        self.entsize = entsize;
        self
    }

    /// Writes `offset` as `sh_offset` instead of the real data position.
    #[must_use]
    pub fn offset_override(mut self, offset: u64) -> Self {
        self.offset_override = Some(offset);
        self
    }

    /// Writes `size` as `sh_size` instead of the data length.
    #[must_use]
    pub fn size_override(mut self, size: u64) -> Self {
        self.size_override = Some(size);
        self
    }
}

/// A string table added by [`ElfBuilder::add_string_table`].
#[derive(Debug, Clone)]
pub struct AddedStringTable {
    /// Section index of the table.
    pub index: u32,
    /// Offset of each string, in the order given.
    pub offsets: Vec<u32>,
}

/// A segment to lay out.
#[derive(Debug, Clone)]
pub struct Segment {
    p_type: u32,
    data: Vec<u8>,
    flags: u32,
    vaddr: u64,
    memsz: Option<u64>,
    align: u64,
    filesz_override: Option<u64>,
}

impl Segment {
    /// A segment of type `p_type` whose file contents are `data`.
    #[must_use]
    pub fn new(p_type: u32, data: Vec<u8>) -> Self {
        Self {
            p_type,
            data,
            flags: 0,
            vaddr: 0,
            memsz: None,
            align: 1,
            filesz_override: None,
        }
    }

    /// Sets `p_flags`.
    #[must_use]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Sets `p_vaddr` and `p_paddr`.
    #[must_use]
    pub fn vaddr(mut self, vaddr: u64) -> Self {
        self.vaddr = vaddr;
        self
    }

    /// Sets `p_memsz`; defaults to `p_filesz`.
    #[must_use]
    pub fn memsz(mut self, memsz: u64) -> Self {
        self.memsz = Some(memsz);
        self
    }

    /// Sets `p_align`.
    #[must_use]
    pub fn align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    /// Writes `filesz` as `p_filesz` instead of the data length.
    #[must_use]
    pub fn filesz_override(mut self, filesz: u64) -> Self {
        self.filesz_override = Some(filesz);
        self
    }
}

fn write_phdr(w: &mut Writer, seg: &Segment, offset: u64, filesz: u64) {
    let memsz = seg.memsz.unwrap_or(filesz);
    w.u32(seg.p_type);
    match w.class {
        Class::Elf32 => {
            w.word(offset);
            w.word(seg.vaddr);
            w.word(seg.vaddr);
            w.word(filesz);
            w.word(memsz);
            w.u32(seg.flags);
            w.word(seg.align);
        }
        Class::Elf64 => {
            w.u32(seg.flags);
            w.word(offset);
            w.word(seg.vaddr);
            w.word(seg.vaddr);
            w.word(filesz);
            w.word(memsz);
            w.word(seg.align);
        }
    }
}

/// Encodes one program header for `seg` with the given file placement.
#[must_use]
pub fn encode_phdr(
    class: Class,
    encoding: Encoding,
    seg: &Segment,
    offset: u64,
    filesz: u64,
) -> Vec<u8> {
    let mut w = Writer::new(class, encoding);
    write_phdr(&mut w, seg, offset, filesz);
    w.buf
}

// ---------------------------------------------------------------------------
// Image builder
// ---------------------------------------------------------------------------

/// Builds a complete ELF image for one class and encoding.
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    class: Class,
    encoding: Encoding,
    e_type: u16,
    machine: Machine,
    entry: u64,
    flags: u32,
    sections: Vec<Section>,
    segments: Vec<Segment>,
    phoff: Option<u64>,
    phnum: Option<u16>,
    shoff: Option<u64>,
    shnum: Option<u16>,
    shstrndx: Option<u16>,
}

impl ElfBuilder {
    /// An x86-64 executable with entry `0x401000` and no sections or segments.
    #[must_use]
    pub fn new(class: Class, encoding: Encoding) -> Self {
        Self {
            class,
            encoding,
            e_type: ET_EXEC,
            machine: Machine::X86_64,
            entry: 0x0040_1000,
            flags: 0,
            sections: Vec::new(),
            segments: Vec::new(),
            phoff: None,
            phnum: None,
            shoff: None,
            shnum: None,
            shstrndx: None,
        }
    }

    /// Sets `e_type`.
    #[must_use]
    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    /// Sets `e_machine`.
    #[must_use]
    pub fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine;
        self
    }

    /// Sets `e_entry`.
    #[must_use]
    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    /// Sets `e_flags`.
    #[must_use]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Writes `count` as `e_shnum`.
    #[must_use]
    pub fn section_count_override(mut self, count: u16) -> Self {
        self.shnum = Some(count);
        self
    }

    /// Writes `index` as `e_shstrndx`.
    #[must_use]
    pub fn shstrndx_override(mut self, index: u16) -> Self {
        self.shstrndx = Some(index);
        self
    }

    /// Writes the given table locations and counts into the file header
    /// verbatim, whatever the image actually contains.
    #[must_use]
    pub fn raw_table_fields(mut self, phoff: u64, phnum: u16, shoff: u64, shnum: u16) -> Self {
        self.phoff = Some(phoff);
        self.phnum = Some(phnum);
        self.shoff = Some(shoff);
        self.shnum = Some(shnum);
        self
    }

    /// Appends a section and returns its index.
    pub fn add_section(&mut self, section: Section) -> u32 {
        self.sections.push(section);
        u32::try_from(self.sections.len()).expect("section index fits u32")
    }

    /// Appends a `SHT_STRTAB` section holding `strings`, after a leading NUL.
    pub fn add_string_table(&mut self, name: &str, strings: &[&str]) -> AddedStringTable {
        let mut data = alloc::vec![0u8];
        let mut offsets = Vec::with_capacity(strings.len());
        for s in strings {
            offsets.push(u32::try_from(data.len()).expect("string offset fits u32"));
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        let index = self.add_section(Section::new(name, SHT_STRTAB, data));
        AddedStringTable { index, offsets }
    }

    /// Appends a symbol table of type `sh_type` whose names live in section `link`.
    pub fn add_symbol_table(&mut self, name: &str, sh_type: u32, link: u32, syms: &[Sym]) -> u32 {
        let data = encode_symbols(self.class, self.encoding, syms);
        self.add_section(
            Section::new(name, sh_type, data)
                .link(link)
                .info(1)
                .align(8)
                .entsize(sym_size(self.class) as u64),
        )
    }

    /// Appends a segment and returns its program header index.
    pub fn add_segment(&mut self, segment: Segment) -> usize {
        self.segments.push(segment);
        self.segments.len() - 1
    }

    /// Lays out and encodes the image.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let class = self.class;
        let ehsize = ehdr_size(class);
        let phentsize = phdr_size(class);
        let shentsize = shdr_size(class);

        // Section header string table contents.
        let mut shstrtab = alloc::vec![0u8];
        let mut name_offsets = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");

        // Data region, after the header and program header table.
        let data_start = ehsize + phentsize * self.segments.len();
        let mut body = Writer::new(class, self.encoding);
        body.buf.resize(data_start, 0);

        let mut segment_offsets = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            body.align(8);
            segment_offsets.push(body.offset());
            body.buf.extend_from_slice(&seg.data);
        }
        let mut section_offsets = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            body.align(8);
            section_offsets.push(body.offset());
            body.buf.extend_from_slice(&section.data);
        }
        body.align(8);
        let shstrtab_offset = body.offset();
        body.buf.extend_from_slice(&shstrtab);
        body.align(8);
        let shoff = body.offset();

        // Section header table: null, user sections, .shstrtab.
        let mut sh = Writer::new(class, self.encoding);
        sh.buf.resize(shentsize, 0);
        for ((section, &name), &offset) in self.sections.iter().zip(&name_offsets).zip(&section_offsets) {
            sh.u32(name);
            sh.u32(section.sh_type);
            sh.word(section.flags);
            sh.word(section.addr);
            sh.word(section.offset_override.unwrap_or(offset));
            sh.word(section.size_override.unwrap_or(section.data.len() as u64));
            sh.u32(section.link);
            sh.u32(section.info);
            sh.word(section.align);
            sh.word(section.entsize);
        }
        sh.u32(shstrtab_name);
        sh.u32(SHT_STRTAB);
        sh.word(0);
        sh.word(0);
        sh.word(shstrtab_offset);
        sh.word(shstrtab.len() as u64);
        sh.u32(0);
        sh.u32(0);
        sh.word(1);
        sh.word(0);
        let section_count = u16::try_from(self.sections.len() + 2).expect("section count fits u16");

        // File header.
        let mut w = Writer::new(class, self.encoding);
        w.buf.extend_from_slice(&ELF_MAGIC);
        w.u8(match class {
            Class::Elf32 => ELFCLASS32,
            Class::Elf64 => ELFCLASS64,
        });
        w.u8(match self.encoding {
            Encoding::Lsb => ELFDATA2LSB,
            Encoding::Msb => ELFDATA2MSB,
        });
        w.u8(EV_CURRENT);
        w.buf.resize(16, 0);
        w.u16(self.e_type);
        w.u16(self.machine.0);
        w.u32(u32::from(EV_CURRENT));
        w.word(self.entry);
        let real_phoff = if self.segments.is_empty() { 0 } else { ehsize as u64 };
        w.word(self.phoff.unwrap_or(real_phoff));
        w.word(self.shoff.unwrap_or(shoff));
        w.u32(self.flags);
        w.u16(ehsize as u16);
        w.u16(phentsize as u16);
        w.u16(
            self.phnum
                .unwrap_or(u16::try_from(self.segments.len()).expect("segment count fits u16")),
        );
        w.u16(shentsize as u16);
        w.u16(self.shnum.unwrap_or(section_count));
        w.u16(self.shstrndx.unwrap_or(section_count - 1));
        assert_eq!(w.buf.len(), ehsize);

        // Program header table.
        for (seg, &offset) in self.segments.iter().zip(&segment_offsets) {
            let filesz = seg.filesz_override.unwrap_or(seg.data.len() as u64);
            write_phdr(&mut w, seg, offset, filesz);
        }

        let mut image = body.buf;
        image[..w.buf.len()].copy_from_slice(&w.buf);
        image.extend_from_slice(&sh.buf);
        image
    }
}
