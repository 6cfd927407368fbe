use std::fmt;
use std::ops::Range;

use crate::consts::*;
use crate::errors::{MachError, Result};
use crate::loader::MachHeader;
use crate::view::{BinaryView, BitWidth, Endian, Layout, Reader};

/// A segment or section name.
///
/// The name is stored in a fixed 16 bytes array which is only null-terminated
/// when it is shorter than the array, so it is always compared with its explicit length.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FixedName([u8; NAME_SIZE]);

impl FixedName {
    pub fn new(bytes: [u8; NAME_SIZE]) -> Self {
        FixedName(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);

        &self.0[..len]
    }

    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl<'a> From<&'a str> for FixedName {
    fn from(name: &'a str) -> Self {
        let mut bytes = [0; NAME_SIZE];
        let len = name.len().min(NAME_SIZE);

        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);

        FixedName(bytes)
    }
}

impl PartialEq<str> for FixedName {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl<'a> PartialEq<&'a str> for FixedName {
    fn eq(&self, other: &&'a str) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for FixedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for FixedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

bitflags! {
    /// Virtual memory protection of a segment.
    pub struct VmProt: vm_prot_t {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXECUTE = 0x4;
    }
}

impl fmt::Display for VmProt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.contains(VmProt::READ) { 'r' } else { '-' },
            if self.contains(VmProt::WRITE) { 'w' } else { '-' },
            if self.contains(VmProt::EXECUTE) { 'x' } else { '-' }
        )
    }
}

/// The encoded version.
///
///  X.Y.Z is encoded in nibbles xxxx.yy.zz
///
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VersionTag(pub u32);

impl VersionTag {
    pub fn major(self) -> u32 {
        self.0 >> 16
    }

    pub fn minor(self) -> u32 {
        (self.0 >> 8) & 0xFF
    }

    pub fn release(self) -> u32 {
        self.0 & 0xFF
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.release() == 0 {
            write!(f, "{}.{}", self.major(), self.minor())
        } else {
            write!(f, "{}.{}.{}", self.major(), self.minor(), self.release())
        }
    }
}

/// One record of the load command list.
///
/// `offset` is relative to the start of the image, `cmdsize` covers the whole
/// record including the `cmd` and `cmdsize` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCommand {
    /// position of the command in the list
    pub index: u32,
    /// type of load command
    pub cmd: u32,
    /// total size of command in bytes
    pub cmdsize: u32,
    pub offset: usize,
}

impl LoadCommand {
    pub fn payload_offset(&self) -> usize {
        self.offset + LOAD_COMMAND_HEADER_SIZE
    }

    pub fn name(&self) -> &'static str {
        cmd_name(self.cmd)
    }

    /// Decode the command of interest, using the image `layout`.
    ///
    /// Reads never leave the record, a field beyond `cmdsize` fails with `OffsetOutOfBounds`.
    pub fn decode<'a>(&self, view: &BinaryView<'a>, layout: Layout) -> Result<Command<'a>> {
        let cmd_view = view.subview(self.offset, self.cmdsize as usize)?;
        let mut r = cmd_view.reader(LOAD_COMMAND_HEADER_SIZE, layout.endian)?;

        let command = match self.cmd {
            LC_SEGMENT if layout.width == BitWidth::Bits32 => Command::Segment(SegmentCommand::parse(cmd_view, layout)?),
            LC_SEGMENT_64 if layout.width == BitWidth::Bits64 => {
                Command::Segment(SegmentCommand::parse(cmd_view, layout)?)
            }
            LC_SYMTAB => Command::SymTab(SymTab {
                symoff: r.read_u32()?,
                nsyms: r.read_u32()?,
                stroff: r.read_u32()?,
                strsize: r.read_u32()?,
            }),
            LC_DYSYMTAB => Command::DySymTab(DySymTab {
                ilocalsym: r.read_u32()?,
                nlocalsym: r.read_u32()?,
                iextdefsym: r.read_u32()?,
                nextdefsym: r.read_u32()?,
                iundefsym: r.read_u32()?,
                nundefsym: r.read_u32()?,
                tocoff: r.read_u32()?,
                ntoc: r.read_u32()?,
                modtaboff: r.read_u32()?,
                nmodtab: r.read_u32()?,
                extrefsymoff: r.read_u32()?,
                nextrefsyms: r.read_u32()?,
                indirectsymoff: r.read_u32()?,
                nindirectsyms: r.read_u32()?,
                extreloff: r.read_u32()?,
                nextrel: r.read_u32()?,
                locreloff: r.read_u32()?,
                nlocrel: r.read_u32()?,
            }),
            LC_LOAD_DYLIB => Command::DyLib(DyLibKind::Load, DyLib::parse(&cmd_view, &mut r)?),
            LC_LOAD_WEAK_DYLIB => Command::DyLib(DyLibKind::Weak, DyLib::parse(&cmd_view, &mut r)?),
            LC_REEXPORT_DYLIB => Command::DyLib(DyLibKind::Reexport, DyLib::parse(&cmd_view, &mut r)?),
            LC_LOAD_UPWARD_DYLIB => Command::DyLib(DyLibKind::Upward, DyLib::parse(&cmd_view, &mut r)?),
            LC_LAZY_LOAD_DYLIB => Command::DyLib(DyLibKind::Lazy, DyLib::parse(&cmd_view, &mut r)?),
            LC_MAIN => Command::EntryPoint(EntryPoint {
                entryoff: r.read_u64()?,
                stacksize: r.read_u64()?,
            }),
            LC_ENCRYPTION_INFO | LC_ENCRYPTION_INFO_64 => Command::EncryptionInfo(EncryptionInfo {
                cryptoff: r.read_u32()?,
                cryptsize: r.read_u32()?,
                cryptid: r.read_u32()?,
                is_64bit: self.cmd == LC_ENCRYPTION_INFO_64,
            }),
            LC_CODE_SIGNATURE => Command::CodeSignature(LinkEditData {
                off: r.read_u32()?,
                size: r.read_u32()?,
            }),
            cmd => Command::Other(cmd),
        };

        trace!("decoded {} command #{}: {:?}", self.name(), self.index, command);

        Ok(command)
    }
}

/// A restartable walk over the load commands of an image.
///
/// It yields exactly `ncmds` records, each one stepping by its own `cmdsize`.
/// A record that would leave the command list or the buffer is yielded as
/// `OffsetOutOfBounds` and ends the walk, the records before it stay valid.
#[derive(Debug, Clone)]
pub struct LoadCommands<'a> {
    view: BinaryView<'a>,
    endian: Endian,
    offset: usize,
    end: usize,
    index: u32,
    ncmds: u32,
    done: bool,
}

impl<'a> LoadCommands<'a> {
    pub(crate) fn new(view: BinaryView<'a>, header: &MachHeader) -> Self {
        let start = header.size();
        let end = start.saturating_add(header.sizeofcmds as usize).min(view.len());

        LoadCommands {
            view,
            endian: header.endian,
            offset: start,
            end,
            index: 0,
            ncmds: header.ncmds,
            done: false,
        }
    }

    fn read_command(&self) -> Result<LoadCommand> {
        let offset = self.offset;
        let out_of_bounds = |size: usize| MachError::OffsetOutOfBounds {
            offset: self.view.base().saturating_add(offset),
            size,
            limit: self.view.base() + self.end,
        };

        if offset
            .checked_add(LOAD_COMMAND_HEADER_SIZE)
            .map_or(true, |end| end > self.end)
        {
            return Err(out_of_bounds(LOAD_COMMAND_HEADER_SIZE));
        }

        let mut r = self.view.reader(offset, self.endian)?;
        let cmd = r.read_u32()?;
        let cmdsize = r.read_u32()?;
        let size = cmdsize as usize;

        if size < LOAD_COMMAND_HEADER_SIZE || offset.checked_add(size).map_or(true, |end| end > self.end) {
            return Err(out_of_bounds(size));
        }

        Ok(LoadCommand {
            index: self.index,
            cmd,
            cmdsize,
            offset,
        })
    }
}

impl<'a> Iterator for LoadCommands<'a> {
    type Item = Result<LoadCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.ncmds {
            return None;
        }

        match self.read_command() {
            Ok(lc) => {
                trace!("load command #{} {} with {} bytes at 0x{:x}", lc.index, lc.name(), lc.cmdsize, lc.offset);

                self.offset += lc.cmdsize as usize;
                self.index += 1;

                Some(Ok(lc))
            }
            Err(err) => {
                warn!("stop walking load commands at #{}, {}", self.index, err);

                self.done = true;

                Some(Err(err))
            }
        }
    }
}

/// The decoded load commands this crate consumes.
#[derive(Debug, Clone)]
pub enum Command<'a> {
    /// `LC_SEGMENT` or `LC_SEGMENT_64`, whichever matches the image width
    Segment(SegmentCommand<'a>),
    SymTab(SymTab),
    DySymTab(DySymTab),
    DyLib(DyLibKind, DyLib),
    EntryPoint(EntryPoint),
    EncryptionInfo(EncryptionInfo),
    CodeSignature(LinkEditData),
    Other(u32),
}

/// The segment load command indicates that a part of this file is to be
/// mapped into the task's address space.
///
/// If the segment has sections then the section structures directly follow
/// the segment command and their size is reflected in cmdsize.
#[derive(Debug, Clone)]
pub struct SegmentCommand<'a> {
    /// segment name
    pub segname: FixedName,
    /// memory address of this segment
    pub vmaddr: u64,
    /// memory size of this segment
    pub vmsize: u64,
    /// file offset of this segment
    pub fileoff: u64,
    /// amount to map from the file
    pub filesize: u64,
    /// maximum VM protection
    pub maxprot: VmProt,
    /// initial VM protection
    pub initprot: VmProt,
    /// number of sections in segment
    pub nsects: u32,
    /// flags
    pub flags: u32,
    view: BinaryView<'a>,
    layout: Layout,
    sections_offset: usize,
}

impl<'a> SegmentCommand<'a> {
    fn parse(view: BinaryView<'a>, layout: Layout) -> Result<SegmentCommand<'a>> {
        let width = layout.width;
        let mut r = view.reader(LOAD_COMMAND_HEADER_SIZE, layout.endian)?;

        let segname = FixedName::new(r.read_name()?);
        let vmaddr = r.read_word(width)?;
        let vmsize = r.read_word(width)?;
        let fileoff = r.read_word(width)?;
        let filesize = r.read_word(width)?;
        let maxprot = VmProt::from_bits_truncate(r.read_i32()?);
        let initprot = VmProt::from_bits_truncate(r.read_i32()?);
        let nsects = r.read_u32()?;
        let flags = r.read_u32()?;

        Ok(SegmentCommand {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            nsects,
            flags,
            view,
            layout,
            sections_offset: r.position(),
        })
    }

    /// Walk the `nsects` section records following the command.
    pub fn sections(&self) -> Sections<'a> {
        Sections {
            view: self.view,
            layout: self.layout,
            offset: self.sections_offset,
            remaining: self.nsects,
            done: false,
        }
    }
}

/// An iterator over the sections of a segment command, bounded by its `cmdsize`.
#[derive(Debug, Clone)]
pub struct Sections<'a> {
    view: BinaryView<'a>,
    layout: Layout,
    offset: usize,
    remaining: u32,
    done: bool,
}

impl<'a> Iterator for Sections<'a> {
    type Item = Result<Section>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }

        let size = Section::size_of(self.layout.width);
        let section = self
            .view
            .subview(self.offset, size)
            .and_then(|view| view.reader(0, self.layout.endian))
            .and_then(|mut r| Section::parse(&mut r, self.layout.width));

        match section {
            Ok(section) => {
                self.offset += size;
                self.remaining -= 1;

                Some(Ok(section))
            }
            Err(err) => {
                warn!("{} sections left beyond the segment command, {}", self.remaining, err);

                self.done = true;

                Some(Err(err))
            }
        }
    }
}

/// A segment is made up of zero or more sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// name of this section
    pub sectname: FixedName,
    /// segment this section goes in
    pub segname: FixedName,
    /// memory address of this section
    pub addr: u64,
    /// size in bytes of this section
    pub size: u64,
    /// file offset of this section
    pub offset: u32,
    /// section alignment (power of 2)
    pub align: u32,
    /// file offset of relocation entries
    pub reloff: u32,
    /// number of relocation entries
    pub nreloc: u32,
    /// flags (section type and attributes)
    pub flags: u32,
    /// reserved (for offset or index)
    pub reserved1: u32,
    /// reserved (for count or sizeof)
    pub reserved2: u32,
    /// reserved, only present in the 64-bit section
    pub reserved3: u32,
}

impl Section {
    pub fn size_of(width: BitWidth) -> usize {
        match width {
            BitWidth::Bits32 => SECTION_SIZE,
            BitWidth::Bits64 => SECTION_64_SIZE,
        }
    }

    fn parse(r: &mut Reader, width: BitWidth) -> Result<Section> {
        Ok(Section {
            sectname: FixedName::new(r.read_name()?),
            segname: FixedName::new(r.read_name()?),
            addr: r.read_word(width)?,
            size: r.read_word(width)?,
            offset: r.read_u32()?,
            align: r.read_u32()?,
            reloff: r.read_u32()?,
            nreloc: r.read_u32()?,
            flags: r.read_u32()?,
            reserved1: r.read_u32()?,
            reserved2: r.read_u32()?,
            reserved3: match width {
                BitWidth::Bits32 => 0,
                BitWidth::Bits64 => r.read_u32()?,
            },
        })
    }

    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// For symbol pointer and stub sections `reserved1` is the index into the indirect symbol table.
    pub fn indirect_symbol_index(&self) -> Option<u32> {
        match self.section_type() {
            S_NON_LAZY_SYMBOL_POINTERS | S_LAZY_SYMBOL_POINTERS | S_SYMBOL_STUBS => Some(self.reserved1),
            _ => None,
        }
    }
}

/// The symtab_command contains the offsets and sizes of the link-edit 4.3BSD
/// "stab" style symbol table information.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SymTab {
    /// symbol table offset
    pub symoff: u32,
    /// number of symbol table entries
    pub nsyms: u32,
    /// string table offset
    pub stroff: u32,
    /// string table size in bytes
    pub strsize: u32,
}

/// The second set of symbolic information used by the dynamic link editor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DySymTab {
    /// index to local symbols
    pub ilocalsym: u32,
    /// number of local symbols
    pub nlocalsym: u32,
    /// index to externally defined symbols
    pub iextdefsym: u32,
    /// number of externally defined symbols
    pub nextdefsym: u32,
    /// index to undefined symbols
    pub iundefsym: u32,
    /// number of undefined symbols
    pub nundefsym: u32,
    /// file offset to table of contents
    pub tocoff: u32,
    /// number of entries in table of contents
    pub ntoc: u32,
    /// file offset to module table
    pub modtaboff: u32,
    /// number of module table entries
    pub nmodtab: u32,
    /// offset to referenced symbol table
    pub extrefsymoff: u32,
    /// number of referenced symbol table entries
    pub nextrefsyms: u32,
    /// file offset to the indirect symbol table
    pub indirectsymoff: u32,
    /// number of indirect symbol table entries
    pub nindirectsyms: u32,
    /// offset to external relocation entries
    pub extreloff: u32,
    /// number of external relocation entries
    pub nextrel: u32,
    /// offset to local relocation entries
    pub locreloff: u32,
    /// number of local relocation entries
    pub nlocrel: u32,
}

/// Which flavor of command loaded a dynamic library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DyLibKind {
    Load,
    Weak,
    Reexport,
    Upward,
    Lazy,
}

/// Dynamically linked shared libraries are identified by two things.
///
/// The pathname (the name of the library as found for execution), and the
/// compatibility version number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DyLib {
    /// library's path name
    pub name: String,
    /// library's build time stamp
    pub timestamp: u32,
    /// library's current version number
    pub current_version: VersionTag,
    /// library's compatibility vers number
    pub compatibility_version: VersionTag,
}

impl DyLib {
    // the name is stored after the command, at an offset from the start of the command
    fn parse(cmd_view: &BinaryView, r: &mut Reader) -> Result<DyLib> {
        let off = r.read_u32()? as usize;
        let timestamp = r.read_u32()?;
        let current_version = VersionTag(r.read_u32()?);
        let compatibility_version = VersionTag(r.read_u32()?);

        Ok(DyLib {
            name: cmd_view.read_cstr(off)?,
            timestamp,
            current_version,
            compatibility_version,
        })
    }
}

/// The entry point of the main executable, from `LC_MAIN`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// file (__TEXT) offset of main()
    pub entryoff: u64,
    /// if not zero, initial stack size
    pub stacksize: u64,
}

/// The range of the file that is encrypted, from `LC_ENCRYPTION_INFO(_64)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfo {
    /// file offset of encrypted range
    pub cryptoff: u32,
    /// file size of encrypted range
    pub cryptsize: u32,
    /// which enryption system, 0 means not-encrypted yet
    pub cryptid: u32,
    pub is_64bit: bool,
}

impl EncryptionInfo {
    pub fn is_encrypted(&self) -> bool {
        self.cryptid != 0
    }

    pub fn range(&self) -> Range<u64> {
        let start = u64::from(self.cryptoff);

        start..start + u64::from(self.cryptsize)
    }
}

/// The offsets and sizes of a blob of data in the __LINKEDIT segment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkEditData {
    /// file offset of data in __LINKEDIT segment
    pub off: u32,
    /// file size of data in __LINKEDIT segment
    pub size: u32,
}

pub fn cmd_name(cmd: u32) -> &'static str {
    match cmd {
        LC_SEGMENT => "LC_SEGMENT",
        LC_SYMTAB => "LC_SYMTAB",
        LC_SYMSEG => "LC_SYMSEG",
        LC_THREAD => "LC_THREAD",
        LC_UNIXTHREAD => "LC_UNIXTHREAD",
        LC_LOADFVMLIB => "LC_LOADFVMLIB",
        LC_IDFVMLIB => "LC_IDFVMLIB",
        LC_IDENT => "LC_IDENT",
        LC_FVMFILE => "LC_FVMFILE",
        LC_PREPAGE => "LC_PREPAGE",
        LC_DYSYMTAB => "LC_DYSYMTAB",
        LC_LOAD_DYLIB => "LC_LOAD_DYLIB",
        LC_ID_DYLIB => "LC_ID_DYLIB",
        LC_LOAD_DYLINKER => "LC_LOAD_DYLINKER",
        LC_ID_DYLINKER => "LC_ID_DYLINKER",
        LC_PREBOUND_DYLIB => "LC_PREBOUND_DYLIB",
        LC_ROUTINES => "LC_ROUTINES",
        LC_SUB_FRAMEWORK => "LC_SUB_FRAMEWORK",
        LC_SUB_UMBRELLA => "LC_SUB_UMBRELLA",
        LC_SUB_CLIENT => "LC_SUB_CLIENT",
        LC_SUB_LIBRARY => "LC_SUB_LIBRARY",
        LC_TWOLEVEL_HINTS => "LC_TWOLEVEL_HINTS",
        LC_PREBIND_CKSUM => "LC_PREBIND_CKSUM",
        LC_LOAD_WEAK_DYLIB => "LC_LOAD_WEAK_DYLIB",
        LC_SEGMENT_64 => "LC_SEGMENT_64",
        LC_ROUTINES_64 => "LC_ROUTINES_64",
        LC_UUID => "LC_UUID",
        LC_RPATH => "LC_RPATH",
        LC_CODE_SIGNATURE => "LC_CODE_SIGNATURE",
        LC_SEGMENT_SPLIT_INFO => "LC_SEGMENT_SPLIT_INFO",
        LC_REEXPORT_DYLIB => "LC_REEXPORT_DYLIB",
        LC_LAZY_LOAD_DYLIB => "LC_LAZY_LOAD_DYLIB",
        LC_ENCRYPTION_INFO => "LC_ENCRYPTION_INFO",
        LC_DYLD_INFO => "LC_DYLD_INFO",
        LC_DYLD_INFO_ONLY => "LC_DYLD_INFO_ONLY",
        LC_LOAD_UPWARD_DYLIB => "LC_LOAD_UPWARD_DYLIB",
        LC_VERSION_MIN_MACOSX => "LC_VERSION_MIN_MACOSX",
        LC_VERSION_MIN_IPHONEOS => "LC_VERSION_MIN_IPHONEOS",
        LC_FUNCTION_STARTS => "LC_FUNCTION_STARTS",
        LC_DYLD_ENVIRONMENT => "LC_DYLD_ENVIRONMENT",
        LC_MAIN => "LC_MAIN",
        LC_DATA_IN_CODE => "LC_DATA_IN_CODE",
        LC_SOURCE_VERSION => "LC_SOURCE_VERSION",
        LC_DYLIB_CODE_SIGN_DRS => "LC_DYLIB_CODE_SIGN_DRS",
        LC_ENCRYPTION_INFO_64 => "LC_ENCRYPTION_INFO_64",
        LC_LINKER_OPTION => "LC_LINKER_OPTION",
        LC_LINKER_OPTIMIZATION_HINT => "LC_LINKER_OPTIMIZATION_HINT",
        _ => "LC_COMMAND",
    }
}
