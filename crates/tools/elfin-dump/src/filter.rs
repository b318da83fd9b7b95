//! Symbol selection shared by command-line flags and the config file.

use clap::ValueEnum;
use elfin::Symbol;
use elfin::section::{SHT_DYNSYM, SHT_SYMTAB};
use elfin::symbol::{
    STB_GLOBAL, STB_LOCAL, STB_WEAK, STT_FILE, STT_FUNC, STT_NOTYPE, STT_OBJECT, STT_SECTION,
    STT_TLS,
};
use serde::Deserialize;

/// A kind of symbol table section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// The static symbol table (`SHT_SYMTAB`).
    Symtab,
    /// The dynamic symbol table (`SHT_DYNSYM`).
    Dynsym,
}

impl TableKind {
    /// Returns the section type this table kind corresponds to.
    pub fn section_type(self) -> u32 {
        match self {
            Self::Symtab => SHT_SYMTAB,
            Self::Dynsym => SHT_DYNSYM,
        }
    }
}

/// Symbol type selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    /// `STT_NOTYPE`.
    Notype,
    /// `STT_OBJECT`.
    Object,
    /// `STT_FUNC`.
    #[default]
    Func,
    /// `STT_SECTION`.
    Section,
    /// `STT_FILE`.
    File,
    /// `STT_TLS`.
    Tls,
    /// Every type.
    Any,
}

impl TypeFilter {
    /// Returns `true` if a symbol of type `sym_type` passes.
    pub fn matches(self, sym_type: u8) -> bool {
        let wanted = match self {
            Self::Notype => STT_NOTYPE,
            Self::Object => STT_OBJECT,
            Self::Func => STT_FUNC,
            Self::Section => STT_SECTION,
            Self::File => STT_FILE,
            Self::Tls => STT_TLS,
            Self::Any => return true,
        };
        sym_type == wanted
    }
}

/// Symbol binding selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingFilter {
    /// `STB_LOCAL`.
    Local,
    /// `STB_GLOBAL`.
    #[default]
    Global,
    /// `STB_WEAK`.
    Weak,
    /// Every binding.
    Any,
}

impl BindingFilter {
    /// Returns `true` if a symbol with `binding` passes.
    pub fn matches(self, binding: u8) -> bool {
        let wanted = match self {
            Self::Local => STB_LOCAL,
            Self::Global => STB_GLOBAL,
            Self::Weak => STB_WEAK,
            Self::Any => return true,
        };
        binding == wanted
    }
}

/// The resolved selection for one `symbols` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFilter {
    /// Tables to walk.
    pub tables: Vec<TableKind>,
    /// Type to keep.
    pub kind: TypeFilter,
    /// Binding to keep.
    pub binding: BindingFilter,
}

impl SymbolFilter {
    /// Returns `true` if sections of type `sh_type` should be walked.
    pub fn wants_table(&self, sh_type: u32) -> bool {
        self.tables.iter().any(|table| table.section_type() == sh_type)
    }

    /// Returns `true` if `symbol` passes both the type and binding selectors.
    pub fn matches(&self, symbol: &Symbol<'_>) -> bool {
        self.kind.matches(symbol.sym_type()) && self.binding.matches(symbol.binding())
    }
}

/// Parses an address given as `0x`-prefixed hex or as decimal.
pub fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid address `{text}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_filter() {
        assert!(TypeFilter::Func.matches(STT_FUNC));
        assert!(!TypeFilter::Func.matches(STT_OBJECT));
        assert!(TypeFilter::Any.matches(STT_SECTION));
        assert!(TypeFilter::Tls.matches(STT_TLS));
    }

    #[test]
    fn binding_filter() {
        assert!(BindingFilter::Global.matches(STB_GLOBAL));
        assert!(!BindingFilter::Global.matches(STB_WEAK));
        assert!(BindingFilter::Any.matches(STB_LOCAL));
    }

    #[test]
    fn table_selection() {
        let filter = SymbolFilter {
            tables: vec![TableKind::Dynsym],
            kind: TypeFilter::default(),
            binding: BindingFilter::default(),
        };
        assert!(filter.wants_table(SHT_DYNSYM));
        assert!(!filter.wants_table(SHT_SYMTAB));
    }

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x401000"), Ok(0x0040_1000));
        assert_eq!(parse_address("0XFF"), Ok(0xff));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("-1").is_err());
        assert!(parse_address("").is_err());
    }
}
