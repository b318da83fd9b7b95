//! Command-line interface definitions for elfin-dump.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::filter::{BindingFilter, TableKind, TypeFilter, parse_address};
use crate::output::OutputFormat;

/// Inspect ELF headers and symbol tables.
#[derive(Parser)]
#[command(name = "elfin-dump", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Only report warnings and errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report everything, including parser trace output and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Configuration file (default: `elfin.toml` in the current directory, if present).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// List symbols as `<name> <symbol-table-section>` records.
    Symbols(SymbolsArgs),
    /// Summarize the file header, section headers and program headers.
    Headers(HeadersArgs),
    /// Find a symbol by name or by address.
    Lookup(LookupArgs),
}

/// Arguments for the `symbols` subcommand.
#[derive(Parser)]
pub struct SymbolsArgs {
    /// ELF file to read.
    pub file: PathBuf,

    /// Symbol table to walk; may be repeated (default: dynsym).
    #[arg(long = "table", value_enum)]
    pub tables: Vec<TableKind>,

    /// Symbol type to keep (default: func).
    #[arg(long = "type", value_enum)]
    pub kind: Option<TypeFilter>,

    /// Symbol binding to keep (default: global).
    #[arg(long, value_enum)]
    pub binding: Option<BindingFilter>,

    /// Demangle Rust symbol names.
    #[arg(long)]
    pub demangle: bool,

    /// Output format (default: text).
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write records to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the `headers` subcommand.
#[derive(Parser)]
pub struct HeadersArgs {
    /// ELF file to read.
    pub file: PathBuf,

    /// Output format (default: text).
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Arguments for the `lookup` subcommand.
#[derive(Parser)]
#[command(group(ArgGroup::new("query").required(true).args(["name", "address"])))]
pub struct LookupArgs {
    /// ELF file to read.
    pub file: PathBuf,

    /// Symbol name to search for.
    #[arg(long)]
    pub name: Option<String>,

    /// Address to resolve; `0x` hex or decimal.
    #[arg(long, value_parser = parse_address)]
    pub address: Option<u64>,

    /// Demangle the reported name.
    #[arg(long)]
    pub demangle: bool,

    /// Output format (default: text).
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn symbols_flags() {
        let cli = Cli::try_parse_from([
            "elfin-dump",
            "-v",
            "symbols",
            "lib.so",
            "--table",
            "symtab",
            "--table",
            "dynsym",
            "--type",
            "object",
            "--binding",
            "weak",
            "--format",
            "json",
            "-o",
            "out.txt",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Symbols(args) = cli.command else {
            panic!("expected symbols");
        };
        assert_eq!(args.tables, [TableKind::Symtab, TableKind::Dynsym]);
        assert_eq!(args.kind, Some(TypeFilter::Object));
        assert_eq!(args.binding, Some(BindingFilter::Weak));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert!(!args.demangle);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["elfin-dump", "-q", "-v", "headers", "a.out"]).is_err());
    }

    #[test]
    fn lookup_needs_exactly_one_query() {
        assert!(Cli::try_parse_from(["elfin-dump", "lookup", "a.out"]).is_err());
        assert!(
            Cli::try_parse_from(["elfin-dump", "lookup", "a.out", "--name", "x", "--address", "1"])
                .is_err()
        );
        let cli =
            Cli::try_parse_from(["elfin-dump", "lookup", "a.out", "--address", "0x401000"]).unwrap();
        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup");
        };
        assert_eq!(args.address, Some(0x0040_1000));
        assert_eq!(args.name, None);
    }
}
