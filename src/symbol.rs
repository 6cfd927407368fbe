use std::convert::TryFrom;
use std::fmt;

use crate::commands::{Command, DySymTab, FixedName, Section, SymTab};
use crate::consts::*;
use crate::errors::{push_diagnostic, MachError, Result};
use crate::loader::MachImage;
use crate::view::{BinaryView, BitWidth, Layout};

// The n_type field really contains four fields:
//  unsigned char N_STAB:3,
//            N_PEXT:1,
//            N_TYPE:3,
//            N_EXT:1;
// which are used via the following masks.
//
pub const N_STAB: u8 = 0xe0; /* if any of these bits set, a symbolic debugging entry */
pub const N_PEXT: u8 = 0x10; /* private external symbol bit */
pub const N_TYPE: u8 = 0x0e; /* mask for the type bits */
pub const N_EXT: u8 = 0x01; /* external symbol bit, set for external symbols */

// Values for N_TYPE bits of the n_type field.
//
pub const N_UNDF: u8 = 0x0; /* undefined, n_sect == NO_SECT */
pub const N_ABS: u8 = 0x2; /* absolute, n_sect == NO_SECT */
pub const N_SECT: u8 = 0xe; /* defined in section number n_sect */
pub const N_PBUD: u8 = 0xc; /* prebound undefined (defined in a dylib) */
pub const N_INDR: u8 = 0xa; /* indirect */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Undefined,
    Absolute,
    Defined { section: u8 },
    Prebound,
    Indirect,
    Debug(u8),
    Unknown(u8),
}

/// An entry of the symbol table, `nlist` or `nlist_64` depending on the image width.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    /// index into the string table
    pub n_strx: u32,
    /// type flag
    pub n_type: u8,
    /// section number or NO_SECT
    pub n_sect: u8,
    /// see <mach-o/stab.h>
    pub n_desc: u16,
    /// value of this symbol (or stab offset)
    pub n_value: u64,
}

impl SymbolEntry {
    pub fn size_of(width: BitWidth) -> usize {
        match width {
            BitWidth::Bits32 => NLIST_SIZE,
            BitWidth::Bits64 => NLIST_64_SIZE,
        }
    }

    pub fn parse(view: &BinaryView, offset: usize, layout: Layout) -> Result<SymbolEntry> {
        let mut r = view.subview(offset, Self::size_of(layout.width))?.reader(0, layout.endian)?;

        Ok(SymbolEntry {
            n_strx: r.read_u32()?,
            n_type: r.read_u8()?,
            n_sect: r.read_u8()?,
            n_desc: r.read_u16()?,
            n_value: r.read_word(layout.width)?,
        })
    }

    pub fn is_external(&self) -> bool {
        (self.n_type & N_EXT) == N_EXT
    }

    pub fn is_private_external(&self) -> bool {
        (self.n_type & N_PEXT) == N_PEXT
    }

    pub fn kind(&self) -> SymbolType {
        if self.n_type & N_STAB != 0 {
            return SymbolType::Debug(self.n_type);
        }

        match self.n_type & N_TYPE {
            N_UNDF => SymbolType::Undefined,
            N_ABS => SymbolType::Absolute,
            N_SECT => SymbolType::Defined { section: self.n_sect },
            N_PBUD => SymbolType::Prebound,
            N_INDR => SymbolType::Indirect,
            typ => SymbolType::Unknown(typ),
        }
    }
}

/// The symbol table of an image and its string table.
#[derive(Debug, Clone)]
pub struct SymbolTable<'a> {
    view: BinaryView<'a>,
    layout: Layout,
    symoff: usize,
    nsyms: u32,
    strings: BinaryView<'a>,
}

impl<'a> SymbolTable<'a> {
    /// The string table must lie within the image, symbol entries are checked one by one.
    pub fn new(image: &MachImage<'a>, symtab: &SymTab) -> Result<SymbolTable<'a>> {
        let strings = image.view().subview(symtab.stroff as usize, symtab.strsize as usize)?;

        Ok(SymbolTable {
            view: *image.view(),
            layout: image.layout(),
            symoff: symtab.symoff as usize,
            nsyms: symtab.nsyms,
            strings,
        })
    }

    pub fn len(&self) -> u32 {
        self.nsyms
    }

    pub fn is_empty(&self) -> bool {
        self.nsyms == 0
    }

    pub fn entry(&self, index: u32) -> Result<SymbolEntry> {
        if index >= self.nsyms {
            return Err(MachError::SymbolIndexOutOfRange {
                index,
                count: self.nsyms,
            });
        }

        let size = SymbolEntry::size_of(self.layout.width);
        let offset = (index as usize)
            .checked_mul(size)
            .and_then(|off| off.checked_add(self.symoff))
            .ok_or_else(|| MachError::OffsetOutOfBounds {
                offset: self.view.base().saturating_add(self.symoff),
                size,
                limit: self.view.base() + self.view.len(),
            })?;

        SymbolEntry::parse(&self.view, offset, self.layout)
    }

    pub fn name(&self, entry: &SymbolEntry) -> Result<String> {
        let size = self.strings.len() as u32;

        if entry.n_strx >= size {
            return Err(MachError::StringIndexOutOfRange {
                offset: entry.n_strx,
                size,
            });
        }

        self.strings.read_cstr(entry.n_strx as usize)
    }

    pub fn symbols(&self) -> impl Iterator<Item = Result<SymbolEntry>> + '_ {
        (0..self.nsyms).map(move |index| self.entry(index))
    }
}

/// An imported symbol bound through a lazy symbol pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSymbol {
    pub segname: FixedName,
    pub sectname: FixedName,
    pub name: String,
}

impl fmt::Display for ImportSymbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{} {}", self.segname, self.sectname, self.name)
    }
}

fn decode_first<T, F>(image: &MachImage, cmd: u32, diagnostics: &mut Vec<MachError>, select: F) -> Option<T>
where
    F: FnOnce(Command) -> Option<T>,
{
    let lc = image.find_command(cmd)?;

    match image.decode(&lc) {
        Ok(command) => select(command),
        Err(err) => {
            warn!("skip malformed {} command #{}, {}", lc.name(), lc.index, err);

            push_diagnostic(diagnostics, err);

            None
        }
    }
}

/// Find the `__la_symbol_ptr` section of the `__DATA` segment.
pub fn find_lazy_pointer_section(image: &MachImage, diagnostics: &mut Vec<MachError>) -> Option<Section> {
    let segment_cmd = image.header.segment_cmd();

    for lc in image.commands() {
        let lc = match lc {
            Ok(lc) => lc,
            Err(err) => {
                push_diagnostic(diagnostics, err);
                break;
            }
        };

        if lc.cmd != segment_cmd {
            continue;
        }

        let cmd = match image.decode(&lc) {
            Ok(Command::Segment(cmd)) => cmd,
            Ok(_) => continue,
            Err(err) => {
                push_diagnostic(diagnostics, err);
                continue;
            }
        };

        if !cmd.segname.matches(SEG_DATA) {
            continue;
        }

        for section in cmd.sections() {
            match section {
                Ok(section) => {
                    if section.sectname.matches(SECT_LA_SYMBOL_PTR) {
                        return Some(section);
                    }
                }
                Err(err) => push_diagnostic(diagnostics, err),
            }
        }
    }

    None
}

/// Recover the names of the lazily bound imports.
///
/// Every pointer slot of the lazy symbol pointer section maps, through the
/// indirect symbol table, to an entry of the symbol table whose name lives in
/// the string table. Slots that can not be resolved are skipped and reported
/// in `diagnostics`, the others are returned in slot order.
pub fn resolve_lazy_imports(image: &MachImage, diagnostics: &mut Vec<MachError>) -> Vec<ImportSymbol> {
    let mut imports = Vec::new();

    let section = match find_lazy_pointer_section(image, diagnostics) {
        Some(section) => section,
        None => {
            debug!("no lazy symbol pointer section");

            return imports;
        }
    };

    let symtab = decode_first(image, LC_SYMTAB, diagnostics, |command| match command {
        Command::SymTab(symtab) => Some(symtab),
        _ => None,
    });
    let dysymtab = decode_first(image, LC_DYSYMTAB, diagnostics, |command| match command {
        Command::DySymTab(dysymtab) => Some(dysymtab),
        _ => None,
    });

    let (symtab, dysymtab): (SymTab, DySymTab) = match (symtab, dysymtab) {
        (Some(symtab), Some(dysymtab)) => (symtab, dysymtab),
        _ => {
            debug!("no symbol table to resolve the lazy symbol pointers");

            return imports;
        }
    };

    let table = match SymbolTable::new(image, &symtab) {
        Ok(table) => table,
        Err(err) => {
            warn!("string table out of bounds, {}", err);

            push_diagnostic(diagnostics, err);

            return imports;
        }
    };

    let view = image.view();
    let endian = image.header.endian;
    let start = u64::from(section.reserved1);
    let slots = section.size / image.header.width.pointer_size() as u64;

    debug!(
        "resolving {} lazy symbol pointers from indirect symbol #{} at 0x{:x}",
        slots, start, dysymtab.indirectsymoff
    );

    for slot in 0..slots {
        let offset = u64::from(dysymtab.indirectsymoff) + (start + slot) * 4;

        let index = match usize::try_from(offset)
            .map_err(|_| MachError::OffsetOutOfBounds {
                offset: usize::max_value(),
                size: 4,
                limit: view.base() + view.len(),
            })
            .and_then(|offset| view.read_u32(offset, endian))
        {
            Ok(index) => index,
            Err(err) => {
                warn!("indirect symbol table ends at slot {}, {}", slot, err);

                push_diagnostic(diagnostics, err);
                break;
            }
        };

        if index & (INDIRECT_SYMBOL_LOCAL | INDIRECT_SYMBOL_ABS) != 0 {
            trace!("skip local or absolute indirect symbol at slot {}", slot);
            continue;
        }

        match table.entry(index).and_then(|entry| table.name(&entry)) {
            Ok(name) => {
                trace!("lazy symbol pointer #{} -> {}", slot, name);

                imports.push(ImportSymbol {
                    segname: section.segname,
                    sectname: section.sectname,
                    name,
                });
            }
            Err(err) => {
                warn!("skip lazy symbol pointer #{}, {}", slot, err);

                push_diagnostic(diagnostics, err);
            }
        }
    }

    imports
}
