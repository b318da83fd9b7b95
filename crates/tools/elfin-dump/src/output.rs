//! Report records and their text and JSON renderings.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use elfin::section::section_type_name;
use elfin::segment::segment_type_name;
use elfin::symbol::{symbol_binding_name, symbol_type_name};
use elfin::{Class, ElfFile, Encoding, ProgramHeader, SectionHeader, SegmentFlags, Symbol};
use serde::{Deserialize, Serialize};

/// How records are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable line per record.
    #[default]
    Text,
    /// A single pretty-printed JSON document.
    Json,
}

/// Returns `raw`, demangled when asked to. Names that are not mangled Rust
/// symbols come back unchanged.
pub fn display_name(raw: &str, demangle: bool) -> String {
    if demangle {
        format!("{:#}", rustc_demangle::demangle(raw))
    } else {
        raw.to_owned()
    }
}

fn or_hex(name: Option<&'static str>, raw: impl Into<u64>) -> String {
    name.map_or_else(|| format!("{:#x}", raw.into()), str::to_owned)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolRecord {
    /// Symbol name, demangled if requested.
    pub name: String,
    /// Name of the symbol table section the symbol came from, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// `st_value`.
    pub value: u64,
    /// `st_size`.
    pub size: u64,
    /// Symbol type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Symbol binding.
    pub binding: String,
}

impl SymbolRecord {
    /// Builds a record for `symbol`, resolving its name through `elf`.
    pub fn new<'a>(
        elf: &ElfFile<'a>,
        symbol: &Symbol<'a>,
        section: Option<&str>,
        demangle: bool,
    ) -> Result<Self> {
        let raw = symbol
            .name(elf)
            .with_context(|| format!("Failed to resolve symbol name at offset {}", symbol.st_name))?;
        Ok(Self {
            name: display_name(raw, demangle),
            section: section.map(str::to_owned),
            value: symbol.st_value,
            size: symbol.st_size,
            kind: or_hex(symbol_type_name(symbol.sym_type()), symbol.sym_type()),
            binding: or_hex(symbol_binding_name(symbol.binding()), symbol.binding()),
        })
    }
}

/// One section header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRecord {
    /// Index in the section header table.
    pub index: usize,
    /// Section name.
    pub name: String,
    /// Section type.
    #[serde(rename = "type")]
    pub kind: String,
    /// `sh_addr`.
    pub address: u64,
    /// `sh_offset`.
    pub offset: u64,
    /// `sh_size`.
    pub size: u64,
    /// Number of fixed-size entries.
    pub entries: usize,
}

impl SectionRecord {
    /// Builds a record for the section at `index`.
    pub fn new<'a>(elf: &ElfFile<'a>, index: usize, section: &SectionHeader<'a>) -> Result<Self> {
        let name = section
            .name(elf)
            .with_context(|| format!("Failed to resolve the name of section {index}"))?;
        Ok(Self {
            index,
            name: name.to_owned(),
            kind: or_hex(section_type_name(section.sh_type), section.sh_type),
            address: section.sh_addr,
            offset: section.sh_offset,
            size: section.sh_size,
            entries: section.number_of_symbols(),
        })
    }
}

/// One program header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    /// Index in the program header table.
    pub index: usize,
    /// Segment type.
    #[serde(rename = "type")]
    pub kind: String,
    /// `p_offset`.
    pub offset: u64,
    /// `p_vaddr`.
    pub vaddr: u64,
    /// `p_filesz`.
    pub filesz: u64,
    /// `p_memsz`.
    pub memsz: u64,
    /// Permissions as `RWX` letters.
    pub flags: String,
}

impl SegmentRecord {
    /// Builds a record for the program header at `index`.
    pub fn new(index: usize, phdr: &ProgramHeader<'_>) -> Self {
        let flags = phdr.flags();
        let letter = |flag, c| if flags.contains(flag) { c } else { '-' };
        Self {
            index,
            kind: or_hex(segment_type_name(phdr.p_type), phdr.p_type),
            offset: phdr.p_offset,
            vaddr: phdr.p_vaddr,
            filesz: phdr.p_filesz,
            memsz: phdr.p_memsz,
            flags: [
                letter(SegmentFlags::R, 'R'),
                letter(SegmentFlags::W, 'W'),
                letter(SegmentFlags::X, 'X'),
            ]
            .iter()
            .collect(),
        }
    }
}

/// Everything the `headers` subcommand reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderReport {
    /// `ELF32` or `ELF64`.
    pub class: &'static str,
    /// Byte order.
    pub encoding: &'static str,
    /// Object file type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Target architecture.
    pub machine: String,
    /// Entry point address.
    pub entry: u64,
    /// Section headers, index 0 included.
    pub sections: Vec<SectionRecord>,
    /// Program headers.
    pub segments: Vec<SegmentRecord>,
    /// Program interpreter path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

impl HeaderReport {
    /// Collects the report, resolving every section and program header.
    pub fn collect(elf: &ElfFile<'_>) -> Result<Self> {
        let sections = elf
            .section_headers()
            .enumerate()
            .map(|(index, section)| {
                let section =
                    section.with_context(|| format!("Failed to read section header {index}"))?;
                SectionRecord::new(elf, index, section)
            })
            .collect::<Result<Vec<_>>>()?;
        let segments = elf
            .program_headers()
            .enumerate()
            .map(|(index, phdr)| {
                phdr.map(|phdr| SegmentRecord::new(index, phdr))
                    .with_context(|| format!("Failed to read program header {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let interpreter = elf
            .interpreter_path()
            .context("Failed to read the interpreter path")?
            .map(|path| path.into_owned());
        Ok(Self {
            class: match elf.class() {
                Class::Elf32 => "ELF32",
                Class::Elf64 => "ELF64",
            },
            encoding: match elf.encoding() {
                Encoding::Lsb => "little-endian",
                Encoding::Msb => "big-endian",
            },
            kind: elf.object_type().to_string(),
            machine: elf.machine().to_string(),
            entry: elf.entry_point(),
            sections,
            segments,
            interpreter,
        })
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Opens `path` for writing, or stdout when `path` is `None`.
pub fn open_sink(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    })
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes symbol records, one `<name> <section>` line each in text form.
pub fn write_symbols(
    out: &mut dyn Write,
    records: &[SymbolRecord],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for record in records {
                match &record.section {
                    Some(section) => writeln!(out, "{} {section}", record.name)?,
                    None => writeln!(out, "{}", record.name)?,
                }
            }
        }
        OutputFormat::Json => write_json(out, records)?,
    }
    out.flush()?;
    Ok(())
}

/// Writes the result of a lookup.
pub fn write_lookup(out: &mut dyn Write, record: &SymbolRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(
            out,
            "{:#018x} {:>8} {:<7} {:<6} {}",
            record.value, record.size, record.kind, record.binding, record.name
        )?,
        OutputFormat::Json => write_json(out, record)?,
    }
    out.flush()?;
    Ok(())
}

/// Writes the `headers` report.
pub fn write_headers(out: &mut dyn Write, report: &HeaderReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        write_json(out, report)?;
        out.flush()?;
        return Ok(());
    }

    writeln!(out, "Class:       {}", report.class)?;
    writeln!(out, "Encoding:    {}", report.encoding)?;
    writeln!(out, "Type:        {}", report.kind)?;
    writeln!(out, "Machine:     {}", report.machine)?;
    writeln!(out, "Entry:       {:#x}", report.entry)?;
    if let Some(interpreter) = &report.interpreter {
        writeln!(out, "Interpreter: {interpreter}")?;
    }

    writeln!(out)?;
    writeln!(out, "Sections:")?;
    writeln!(
        out,
        "  [Nr] {:<20} {:<12} {:<18} {:<10} {:<10} Entries",
        "Name", "Type", "Address", "Offset", "Size"
    )?;
    for s in &report.sections {
        writeln!(
            out,
            "  [{:>2}] {:<20} {:<12} {:#018x} {:#010x} {:#010x} {}",
            s.index, s.name, s.kind, s.address, s.offset, s.size, s.entries
        )?;
    }

    if !report.segments.is_empty() {
        writeln!(out)?;
        writeln!(out, "Program headers:")?;
        writeln!(
            out,
            "  {:<12} {:<10} {:<18} {:<10} {:<10} Flags",
            "Type", "Offset", "VirtAddr", "FileSiz", "MemSiz"
        )?;
        for p in &report.segments {
            writeln!(
                out,
                "  {:<12} {:#010x} {:#018x} {:#010x} {:#010x} {}",
                p.kind, p.offset, p.vaddr, p.filesz, p.memsz, p.flags
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
