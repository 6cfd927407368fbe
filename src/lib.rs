//! Structural inspection of Mach-O images and fat containers.
//!
//! The whole file is handed over as an immutable byte slice. Headers are
//! normalized to the host byte order while decoding, the slice is never written.
//!
//! ```no_run
//! let data = std::fs::read("/bin/ls").unwrap();
//!
//! for image in mach_inspect::inspect(&data).unwrap().images() {
//!     for import in &image.imports {
//!         println!("{}", import.name);
//!     }
//! }
//! ```
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate lazy_static;

mod arch;
mod commands;
mod consts;
#[cfg(feature = "display")]
mod display;
mod errors;
mod inspect;
mod loader;
mod metadata;
mod segment;
mod symbol;
mod view;

#[cfg(test)]
mod testdata;

pub use crate::arch::{all_subtype, ArchDescriber, ArchDescription, KnownArchitectures};
pub use crate::commands::{
    cmd_name, Command, DyLib, DyLibKind, DySymTab, EncryptionInfo, EntryPoint, FixedName, LinkEditData, LoadCommand,
    LoadCommands, Section, Sections, SegmentCommand, SymTab, VersionTag, VmProt,
};
pub use crate::consts::*;
pub use crate::errors::{MachError, Result, MAX_DIAGNOSTICS};
pub use crate::inspect::{inspect, ImageReport, Inspector, Report, SliceReport};
pub use crate::loader::{Container, FatArch, FatHeader, FatSlice, Format, MachFile, MachHeader, MachImage};
pub use crate::metadata::{extract_metadata, Metadata};
pub use crate::segment::{extract_segments, Segment, SegmentInterest, SEGMENTS_OF_INTEREST};
pub use crate::symbol::{
    find_lazy_pointer_section, resolve_lazy_imports, ImportSymbol, SymbolEntry, SymbolTable, SymbolType,
};
pub use crate::view::{BinaryView, BitWidth, Endian, Layout, Reader};
