//! ELF inspection tool.
//!
//! Reads a whole file into memory, parses it with `elfin`, and reports
//! symbols, headers, or a single symbol lookup. Settings come from flags,
//! then `elfin.toml`, then built-in defaults.

mod cli;
mod config;
mod filter;
mod output;
mod verbose;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Command, HeadersArgs, LookupArgs, SymbolsArgs};
use config::Config;
use elfin::ElfFile;
use filter::SymbolFilter;
use output::{HeaderReport, SymbolRecord};
use verbose::Timer;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Symbols(ref args) => cmd_symbols(args, &config),
        Command::Headers(ref args) => cmd_headers(args, &config),
        Command::Lookup(ref args) => cmd_lookup(args, &config),
    }
}

// ===========================================================================
// Input
// ===========================================================================

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let _t = Timer::start("read input");
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_input<'a>(path: &Path, data: &'a [u8]) -> Result<ElfFile<'a>> {
    ElfFile::parse(data).with_context(|| format!("{} is not a readable ELF file", path.display()))
}

// ===========================================================================
// symbols
// ===========================================================================

/// Merges `symbols` flags over the configured defaults.
fn resolve_filter(args: &SymbolsArgs, config: &Config) -> SymbolFilter {
    SymbolFilter {
        tables: if args.tables.is_empty() {
            config.symbols.tables.clone()
        } else {
            args.tables.clone()
        },
        kind: args.kind.unwrap_or(config.symbols.kind),
        binding: args.binding.unwrap_or(config.symbols.binding),
    }
}

/// Walks every selected symbol table in section order and keeps the
/// symbols `filter` accepts.
fn collect_symbols(
    elf: &ElfFile<'_>,
    filter: &SymbolFilter,
    demangle: bool,
) -> Result<Vec<SymbolRecord>> {
    let _t = Timer::start("symbol walk");
    let mut records = Vec::new();
    for (index, section) in elf.section_headers().enumerate() {
        let section = section.with_context(|| format!("Failed to read section header {index}"))?;
        if !filter.wants_table(section.sh_type) {
            continue;
        }
        let table = section
            .name(elf)
            .with_context(|| format!("Failed to resolve the name of section {index}"))?;
        log::debug!("walking {} ({} entries)", table, section.number_of_symbols());
        for (sym_index, symbol) in section.symbols().enumerate() {
            let symbol =
                symbol.with_context(|| format!("Failed to read symbol {sym_index} of {table}"))?;
            if filter.matches(symbol) {
                records.push(SymbolRecord::new(elf, symbol, Some(table), demangle)?);
            }
        }
    }
    Ok(records)
}

fn cmd_symbols(args: &SymbolsArgs, config: &Config) -> Result<()> {
    let data = read_input(&args.file)?;
    let elf = parse_input(&args.file, &data)?;
    let filter = resolve_filter(args, config);
    let demangle = args.demangle || config.symbols.demangle;
    let records = collect_symbols(&elf, &filter, demangle)?;

    let format = args.format.unwrap_or(config.output.format);
    let mut out = output::open_sink(args.output.as_deref())?;
    output::write_symbols(&mut *out, &records, format)?;
    if let Some(path) = &args.output {
        log::info!("wrote {} symbols to {}", records.len(), path.display());
    }
    Ok(())
}

// ===========================================================================
// headers
// ===========================================================================

fn cmd_headers(args: &HeadersArgs, config: &Config) -> Result<()> {
    let data = read_input(&args.file)?;
    let elf = parse_input(&args.file, &data)?;
    let report = HeaderReport::collect(&elf)?;
    let format = args.format.unwrap_or(config.output.format);
    let mut out = output::open_sink(None)?;
    output::write_headers(&mut *out, &report, format)
}

// ===========================================================================
// lookup
// ===========================================================================

fn lookup_symbol(elf: &ElfFile<'_>, args: &LookupArgs, demangle: bool) -> Result<SymbolRecord> {
    let found = match (&args.name, args.address) {
        (Some(name), _) => elf
            .symbol_by_name(name)
            .with_context(|| format!("Failed to search for `{name}`"))?
            .with_context(|| format!("no symbol named `{name}`"))?,
        (None, Some(address)) => elf
            .symbol_by_address(address)
            .with_context(|| format!("Failed to search for {address:#x}"))?
            .with_context(|| format!("no symbol contains address {address:#x}"))?,
        (None, None) => bail!("either --name or --address is required"),
    };
    SymbolRecord::new(elf, found, None, demangle)
}

fn cmd_lookup(args: &LookupArgs, config: &Config) -> Result<()> {
    let data = read_input(&args.file)?;
    let elf = parse_input(&args.file, &data)?;
    let demangle = args.demangle || config.symbols.demangle;
    let record = lookup_symbol(&elf, args, demangle)?;
    let format = args.format.unwrap_or(config.output.format);
    let mut out = output::open_sink(None)?;
    output::write_lookup(&mut *out, &record, format)
}
