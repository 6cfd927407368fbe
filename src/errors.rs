use thiserror::Error;

use crate::consts::cpu_type_t;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachError {
    #[error("unrecognized magic 0x{0:08x}, not a mach-o file.")]
    MagicUnrecognized(u32),
    #[error("truncated header, {needed} bytes required but only {available} available.")]
    TruncatedHeader { needed: usize, available: usize },
    #[error("{size} bytes at offset 0x{offset:x} exceed the {limit} bytes bound.")]
    OffsetOutOfBounds { offset: usize, size: usize, limit: usize },
    #[error("symbol index {index} out of range, symbol table has {count} entries.")]
    SymbolIndexOutOfRange { index: u32, count: u32 },
    #[error("string table offset {offset} out of range, string table has {size} bytes.")]
    StringIndexOutOfRange { offset: u32, size: u32 },
    #[error("unknown architecture, cputype {0}.")]
    UnknownArchitecture(cpu_type_t),
}

impl MachError {
    /// Structural failures abort the whole parse, the others only skip a record.
    pub fn is_fatal(&self) -> bool {
        match *self {
            MachError::MagicUnrecognized(_) | MachError::TruncatedHeader { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = ::std::result::Result<T, MachError>;

/// The most recovered errors kept for one image.
pub const MAX_DIAGNOSTICS: usize = 64;

/// Keep a recovered error once, walks repeated over the same commands report it only the first time.
///
/// Errors past `MAX_DIAGNOSTICS` are dropped.
pub(crate) fn push_diagnostic(diagnostics: &mut Vec<MachError>, err: MachError) {
    if diagnostics.len() >= MAX_DIAGNOSTICS {
        trace!("drop diagnostic, {}", err);
    } else if !diagnostics.contains(&err) {
        diagnostics.push(err);
    }
}
