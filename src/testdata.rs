//! Synthetic mach-o images for tests.
//!
//! Every multi-byte field is kept typed until the image is built, so the same
//! description can be written in native or swapped byte order.
#![allow(dead_code)]

use byteorder::{NativeEndian, WriteBytesExt};

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const FAT_MAGIC: u32 = 0xcafe_babe;

const MH_EXECUTE: u32 = 0x2;

const CPU_TYPE_I386: i32 = 7;
const CPU_TYPE_X86_64: i32 = 7 | 0x0100_0000;
const CPU_SUBTYPE_X86_ALL: i32 = 3;

const LC_SEGMENT: u32 = 0x1;
const LC_SYMTAB: u32 = 0x2;
const LC_DYSYMTAB: u32 = 0xb;
const LC_LOAD_DYLIB: u32 = 0xc;
const LC_SEGMENT_64: u32 = 0x19;
const LC_CODE_SIGNATURE: u32 = 0x1d;
const LC_ENCRYPTION_INFO: u32 = 0x21;
const LC_MAIN: u32 = 0x28 | 0x8000_0000;
const LC_ENCRYPTION_INFO_64: u32 = 0x2c;

const S_LAZY_SYMBOL_POINTERS: u32 = 0x7;

const FAT_ALIGN: u32 = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
}

impl Field {
    fn size(&self) -> usize {
        match self {
            Field::U8(_) => 1,
            Field::U16(_) => 2,
            Field::U32(_) => 4,
            Field::U64(_) => 8,
            Field::Bytes(b) => b.len(),
        }
    }

    fn write(&self, out: &mut Vec<u8>, swapped: bool) {
        match *self {
            Field::U8(v) => out.push(v),
            Field::U16(v) => out
                .write_u16::<NativeEndian>(if swapped { v.swap_bytes() } else { v })
                .unwrap(),
            Field::U32(v) => out
                .write_u32::<NativeEndian>(if swapped { v.swap_bytes() } else { v })
                .unwrap(),
            Field::U64(v) => out
                .write_u64::<NativeEndian>(if swapped { v.swap_bytes() } else { v })
                .unwrap(),
            Field::Bytes(ref b) => out.extend_from_slice(b),
        }
    }
}

/// A sequence of typed fields, encoded in either byte order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Vec<Field>);

impl Record {
    pub fn new() -> Self {
        Record(Vec::new())
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.0.push(Field::U8(v));
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.0.push(Field::U16(v));
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.push(Field::U32(v));
        self
    }

    pub fn i32(self, v: i32) -> Self {
        self.u32(v as u32)
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.0.push(Field::U64(v));
        self
    }

    /// An address or size word of the image width.
    pub fn word(self, is_64: bool, v: u64) -> Self {
        if is_64 {
            self.u64(v)
        } else {
            self.u32(v as u32)
        }
    }

    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.0.push(Field::Bytes(b.to_vec()));
        self
    }

    /// A fixed 16 bytes name, padded with zeroes.
    pub fn name(self, name: &str) -> Self {
        let mut b = [0u8; 16];
        let len = name.len().min(16);

        b[..len].copy_from_slice(&name.as_bytes()[..len]);

        self.bytes(&b)
    }

    pub fn append(mut self, other: Record) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(Field::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the 32-bit field starting at byte `offset`.
    pub fn set_u32(&mut self, offset: usize, v: u32) {
        let mut pos = 0;

        for field in &mut self.0 {
            if pos == offset {
                if let Field::U32(_) = field {
                    *field = Field::U32(v);
                    return;
                }
            }
            pos += field.size();
        }

        panic!("no 32-bit field at offset {}", offset);
    }

    pub fn encode(&self, swapped: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());

        for field in &self.0 {
            field.write(&mut out, swapped);
        }

        out
    }
}

/// A load command with the given body, `cmdsize` covering the whole record.
pub fn load_command(cmd: u32, body: Record) -> Record {
    let cmdsize = 8 + body.len() as u32;

    Record::new().u32(cmd).u32(cmdsize).append(body)
}

/// A load command with an arbitrary `cmdsize`, whatever its body holds.
pub fn raw_command(_is_64: bool, cmd: u32, cmdsize: u32, body: &[u8]) -> Record {
    Record::new().u32(cmd).u32(cmdsize).bytes(body)
}

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub sectname: String,
    pub segname: String,
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

impl SectionSpec {
    /// Mark the section as lazy symbol pointers, starting at `index` in the indirect symbol table.
    pub fn lazy_pointers(mut self, index: u32) -> Self {
        self.flags = S_LAZY_SYMBOL_POINTERS;
        self.reserved1 = index;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    fn record(&self, is_64: bool) -> Record {
        let r = Record::new()
            .name(&self.sectname)
            .name(&self.segname)
            .word(is_64, self.addr)
            .word(is_64, self.size)
            .u32(self.offset)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(self.flags)
            .u32(self.reserved1)
            .u32(self.reserved2);

        if is_64 {
            r.u32(0)
        } else {
            r
        }
    }
}

pub fn section(sectname: &str, segname: &str, addr: u64, size: u64, offset: u32) -> SectionSpec {
    SectionSpec {
        sectname: sectname.to_owned(),
        segname: segname.to_owned(),
        addr,
        size,
        offset,
        flags: 0,
        reserved1: 0,
        reserved2: 0,
    }
}

/// A segment command, `__TEXT` is mapped r-x and everything else rw-.
pub fn segment_command(
    is_64: bool,
    segname: &str,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    sections: &[SectionSpec],
) -> Record {
    let prot = if segname == "__TEXT" { 5 } else { 3 };
    let mut body = Record::new()
        .name(segname)
        .word(is_64, vmaddr)
        .word(is_64, vmsize)
        .word(is_64, fileoff)
        .word(is_64, filesize)
        .i32(prot)
        .i32(prot)
        .u32(sections.len() as u32)
        .u32(0);

    for section in sections {
        body = body.append(section.record(is_64));
    }

    load_command(if is_64 { LC_SEGMENT_64 } else { LC_SEGMENT }, body)
}

pub fn symtab_command(symoff: u32, nsyms: u32, stroff: u32, strsize: u32) -> Record {
    load_command(
        LC_SYMTAB,
        Record::new().u32(symoff).u32(nsyms).u32(stroff).u32(strsize),
    )
}

/// A dynamic symbol table with `nlocalsym` local symbols and the indirect symbol table at `indirectsymoff`.
pub fn dysymtab_command(nlocalsym: u32, indirectsymoff: u32, nindirectsyms: u32) -> Record {
    let mut body = Record::new().u32(0).u32(nlocalsym);

    for _ in 0..10 {
        body = body.u32(0);
    }

    body = body.u32(indirectsymoff).u32(nindirectsyms);

    for _ in 0..4 {
        body = body.u32(0);
    }

    load_command(LC_DYSYMTAB, body)
}

/// A LC_LOAD_DYLIB command, version 1226.10.1 compatible with 1.0, timestamp 2.
pub fn dylib_command(name: &str) -> Record {
    dylib_command_with(LC_LOAD_DYLIB, name)
}

pub fn dylib_command_with(cmd: u32, name: &str) -> Record {
    let mut s = name.as_bytes().to_vec();

    s.push(0);
    while (24 + s.len()) % 8 != 0 {
        s.push(0);
    }

    load_command(
        cmd,
        Record::new()
            .u32(24)
            .u32(2)
            .u32((1226 << 16) | (10 << 8) | 1)
            .u32(1 << 16)
            .bytes(&s),
    )
}

pub fn main_command(entryoff: u64, stacksize: u64) -> Record {
    load_command(LC_MAIN, Record::new().u64(entryoff).u64(stacksize))
}

pub fn encryption_command(is_64: bool, cryptoff: u32, cryptsize: u32, cryptid: u32) -> Record {
    let body = Record::new().u32(cryptoff).u32(cryptsize).u32(cryptid);

    if is_64 {
        load_command(LC_ENCRYPTION_INFO_64, body.u32(0))
    } else {
        load_command(LC_ENCRYPTION_INFO, body)
    }
}

pub fn code_signature_command(off: u32, size: u32) -> Record {
    load_command(LC_CODE_SIGNATURE, Record::new().u32(off).u32(size))
}

/// A symbol table entry with the given string table index.
pub fn nlist(is_64: bool, strx: u32, n_type: u8, n_value: u64) -> Record {
    Record::new()
        .u32(strx)
        .u8(n_type)
        .u8(0)
        .u16(0)
        .word(is_64, n_value)
}

pub fn indirect_table(indices: &[u32]) -> Record {
    indices.iter().fold(Record::new(), |r, &index| r.u32(index))
}

pub fn string_table(strings: &[(usize, &str)]) -> Record {
    let mut b = Vec::new();

    for &(offset, s) in strings {
        if b.len() < offset {
            b.resize(offset, 0);
        }
        b.extend_from_slice(s.as_bytes());
        b.push(0);
    }

    Record::new().bytes(&b)
}

pub struct ImageBuilder {
    is_64: bool,
    swapped: bool,
    cputype: i32,
    cpusubtype: i32,
    filetype: u32,
    flags: u32,
    ncmds: Option<u32>,
    sizeofcmds: Option<u32>,
    commands: Vec<Record>,
    data: Vec<(usize, Record)>,
    len: usize,
}

impl ImageBuilder {
    pub fn new(is_64: bool) -> Self {
        ImageBuilder {
            is_64,
            swapped: false,
            cputype: if is_64 { CPU_TYPE_X86_64 } else { CPU_TYPE_I386 },
            cpusubtype: CPU_SUBTYPE_X86_ALL,
            filetype: MH_EXECUTE,
            flags: 0,
            ncmds: None,
            sizeofcmds: None,
            commands: Vec::new(),
            data: Vec::new(),
            len: 0,
        }
    }

    pub fn swapped(mut self) -> Self {
        self.swapped = true;
        self
    }

    pub fn cputype(mut self, cputype: i32) -> Self {
        self.cputype = cputype;
        self
    }

    pub fn cpusubtype(mut self, cpusubtype: i32) -> Self {
        self.cpusubtype = cpusubtype;
        self
    }

    pub fn filetype(mut self, filetype: u32) -> Self {
        self.filetype = filetype;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Override the number of commands declared in the header.
    pub fn ncmds(mut self, ncmds: u32) -> Self {
        self.ncmds = Some(ncmds);
        self
    }

    /// Override the size of the command list declared in the header.
    pub fn sizeofcmds(mut self, sizeofcmds: u32) -> Self {
        self.sizeofcmds = Some(sizeofcmds);
        self
    }

    pub fn command(mut self, command: Record) -> Self {
        self.commands.push(command);
        self
    }

    /// Place a record at an absolute file offset, after the command list.
    pub fn data_at(mut self, offset: usize, record: Record) -> Self {
        self.data.push((offset, record));
        self
    }

    /// Pad the image with zeroes up to `len` bytes.
    pub fn min_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    pub fn header_size(&self) -> usize {
        if self.is_64 {
            32
        } else {
            28
        }
    }

    pub fn build(self) -> Vec<u8> {
        let header_size = self.header_size();
        let sizeofcmds = self.commands.iter().map(Record::len).sum::<usize>() as u32;
        let mut header = Record::new()
            .u32(if self.is_64 { MH_MAGIC_64 } else { MH_MAGIC })
            .i32(self.cputype)
            .i32(self.cpusubtype)
            .u32(self.filetype)
            .u32(self.ncmds.unwrap_or(self.commands.len() as u32))
            .u32(self.sizeofcmds.unwrap_or(sizeofcmds))
            .u32(self.flags);

        if self.is_64 {
            header = header.u32(0);
        }

        let mut out = header.encode(self.swapped);

        for command in &self.commands {
            out.extend(command.encode(self.swapped));
        }

        for (offset, record) in &self.data {
            let bytes = record.encode(self.swapped);
            let end = offset + bytes.len();

            assert!(*offset >= header_size + sizeofcmds as usize, "data overlaps the load commands");

            if out.len() < end {
                out.resize(end, 0);
            }
            out[*offset..end].copy_from_slice(&bytes);
        }

        if out.len() < self.len {
            out.resize(self.len, 0);
        }

        out
    }
}

/// A big endian fat container holding `slices`, each one aligned to a 4K page.
pub fn build_fat(slices: &[(i32, i32, Vec<u8>)]) -> Vec<u8> {
    let align = 1usize << FAT_ALIGN;
    let mut out = Vec::new();
    let mut offset = align;

    out.write_u32::<byteorder::BigEndian>(FAT_MAGIC).unwrap();
    out.write_u32::<byteorder::BigEndian>(slices.len() as u32).unwrap();

    for (cputype, cpusubtype, data) in slices {
        out.write_i32::<byteorder::BigEndian>(*cputype).unwrap();
        out.write_i32::<byteorder::BigEndian>(*cpusubtype).unwrap();
        out.write_u32::<byteorder::BigEndian>(offset as u32).unwrap();
        out.write_u32::<byteorder::BigEndian>(data.len() as u32).unwrap();
        out.write_u32::<byteorder::BigEndian>(FAT_ALIGN).unwrap();

        offset += (data.len() + align - 1) / align * align;
    }

    for (_, _, data) in slices {
        let start = (out.len() + align - 1) / align * align;

        out.resize(start, 0);
        out.extend_from_slice(data);
    }

    out
}
