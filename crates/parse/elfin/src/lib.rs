//! Lazy ELF structure parser.
//!
//! Reads ELF32 and ELF64 images in either byte order from an in-memory
//! snapshot. Only the file header is decoded up front; section headers,
//! program headers, symbols, names and string tables are decoded the first
//! time they are requested and cached inside the [`ElfFile`] from then on.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(bytes: &[u8]) -> Result<(), elfin::ElfError> {
//! let elf = elfin::ElfFile::parse(bytes)?;
//! if let Some(symbol) = elf.symbol_by_name("main")? {
//!     assert!(symbol.contains(symbol.st_value) || symbol.st_size == 0);
//! }
//! for section in elf.section_headers() {
//!     let section = section?;
//!     let _name = section.name(&elf)?;
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod error;
pub mod file;
pub mod header;
pub mod lazy;
pub mod reader;
pub mod section;
pub mod segment;
pub mod strtab;
pub mod symbol;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::{ElfError, ErrorKind, HeaderDefect, Unsupported};
pub use file::ElfFile;
pub use header::{ElfHeader, Machine, ObjectType};
pub use lazy::LazyCache;
pub use reader::{ByteReader, Class, Encoding};
pub use section::{SectionFlags, SectionHeader};
pub use segment::{ProgramHeader, SegmentFlags};
pub use strtab::StringTable;
pub use symbol::Symbol;
