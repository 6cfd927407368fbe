use crate::commands::{Command, LoadCommand, LoadCommands};
use crate::consts::*;
use crate::errors::{MachError, Result};
use crate::view::{BinaryView, BitWidth, Endian, Layout};

/// Whether the file is a single image or a multi-architecture container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Thin,
    Fat,
}

/// The classification of a file from its leading magic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub container: Container,
    pub width: BitWidth,
    pub endian: Endian,
}

impl Format {
    pub fn from_magic(magic: u32) -> Result<Format> {
        let (container, width, endian) = match magic {
            MH_MAGIC => (Container::Thin, BitWidth::Bits32, Endian::Native),
            MH_CIGAM => (Container::Thin, BitWidth::Bits32, Endian::Swapped),
            MH_MAGIC_64 => (Container::Thin, BitWidth::Bits64, Endian::Native),
            MH_CIGAM_64 => (Container::Thin, BitWidth::Bits64, Endian::Swapped),
            FAT_MAGIC => (Container::Fat, BitWidth::Bits32, Endian::Native),
            FAT_CIGAM => (Container::Fat, BitWidth::Bits32, Endian::Swapped),
            _ => return Err(MachError::MagicUnrecognized(magic)),
        };

        Ok(Format {
            container,
            width,
            endian,
        })
    }

    /// Classify the first 4 bytes of the view, read in the host byte order.
    pub fn detect(view: &BinaryView) -> Result<Format> {
        let magic = view
            .read_u32(0, Endian::Native)
            .map_err(|_| MachError::TruncatedHeader {
                needed: 4,
                available: view.len(),
            })?;

        Format::from_magic(magic)
    }

    pub fn layout(&self) -> Layout {
        Layout {
            width: self.width,
            endian: self.endian,
        }
    }
}

/// The normalized mach header of a thin image.
///
/// All fields hold their logical values, whatever the on-disk byte order was;
/// `endian` records that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachHeader {
    /// mach magic number identifier
    pub magic: u32,
    /// cpu specifier
    pub cputype: cpu_type_t,
    /// machine specifier
    pub cpusubtype: cpu_subtype_t,
    /// type of file
    pub filetype: u32,
    /// number of load commands
    pub ncmds: u32,
    /// the size of all the load commands
    pub sizeofcmds: u32,
    /// flags
    pub flags: u32,
    /// reserved, only present in the 64-bit header
    pub reserved: u32,
    pub width: BitWidth,
    pub endian: Endian,
}

impl MachHeader {
    pub fn size_of(width: BitWidth) -> usize {
        match width {
            BitWidth::Bits32 => MACH_HEADER_SIZE,
            BitWidth::Bits64 => MACH_HEADER_64_SIZE,
        }
    }

    pub fn parse(view: &BinaryView, format: Format) -> Result<MachHeader> {
        let needed = Self::size_of(format.width);

        if view.len() < needed {
            return Err(MachError::TruncatedHeader {
                needed,
                available: view.len(),
            });
        }

        let mut r = view.reader(0, format.endian)?;

        let header = MachHeader {
            magic: r.read_u32()?,
            cputype: r.read_i32()?,
            cpusubtype: r.read_i32()?,
            filetype: r.read_u32()?,
            ncmds: r.read_u32()?,
            sizeofcmds: r.read_u32()?,
            flags: r.read_u32()?,
            reserved: match format.width {
                BitWidth::Bits32 => 0,
                BitWidth::Bits64 => r.read_u32()?,
            },
            width: format.width,
            endian: format.endian,
        };

        debug!("parsed mach-o header: {:?}", header);

        Ok(header)
    }

    pub fn size(&self) -> usize {
        Self::size_of(self.width)
    }

    pub fn is_64bit(&self) -> bool {
        self.width == BitWidth::Bits64
    }

    pub fn is_bigend(&self) -> bool {
        self.endian.is_big_endian()
    }

    pub fn layout(&self) -> Layout {
        Layout {
            width: self.width,
            endian: self.endian,
        }
    }

    /// The segment command matching the image width.
    pub fn segment_cmd(&self) -> u32 {
        match self.width {
            BitWidth::Bits32 => LC_SEGMENT,
            BitWidth::Bits64 => LC_SEGMENT_64,
        }
    }

    pub fn file_type_name(&self) -> Option<&'static str> {
        file_type_name(self.filetype)
    }

    /// The same header with every multi-byte field byte-reversed, as it would
    /// read from an image stored in the opposite byte order.
    pub fn swapped(&self) -> MachHeader {
        MachHeader {
            magic: self.magic.swap_bytes(),
            cputype: self.cputype.swap_bytes(),
            cpusubtype: self.cpusubtype.swap_bytes(),
            filetype: self.filetype.swap_bytes(),
            ncmds: self.ncmds.swap_bytes(),
            sizeofcmds: self.sizeofcmds.swap_bytes(),
            flags: self.flags.swap_bytes(),
            reserved: self.reserved.swap_bytes(),
            width: self.width,
            endian: match self.endian {
                Endian::Native => Endian::Swapped,
                Endian::Swapped => Endian::Native,
            },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FatArch {
    /// cpu specifier (int)
    pub cputype: cpu_type_t,
    /// machine specifier (int)
    pub cpusubtype: cpu_subtype_t,
    /// file offset to this object file
    pub offset: u32,
    /// size of this object file
    pub size: u32,
    /// alignment as a power of 2
    pub align: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatHeader {
    pub magic: u32,
    pub endian: Endian,
    pub archs: Vec<FatArch>,
}

impl FatHeader {
    pub fn parse(view: &BinaryView, endian: Endian) -> Result<FatHeader> {
        if view.len() < FAT_HEADER_SIZE {
            return Err(MachError::TruncatedHeader {
                needed: FAT_HEADER_SIZE,
                available: view.len(),
            });
        }

        let mut r = view.reader(0, endian)?;
        let magic = r.read_u32()?;
        let nfat_arch = r.read_u32()?;

        debug!("parsing fat header with {} archs, magic=0x{:x}", nfat_arch, magic);

        let needed = (nfat_arch as usize)
            .checked_mul(FAT_ARCH_SIZE)
            .and_then(|size| size.checked_add(FAT_HEADER_SIZE))
            .unwrap_or(usize::max_value());

        if view.len() < needed {
            return Err(MachError::TruncatedHeader {
                needed,
                available: view.len(),
            });
        }

        let mut archs = Vec::with_capacity(nfat_arch as usize);

        for i in 0..nfat_arch {
            let arch = FatArch {
                cputype: r.read_i32()?,
                cpusubtype: r.read_i32()?,
                offset: r.read_u32()?,
                size: r.read_u32()?,
                align: r.read_u32()?,
            };

            debug!("fat header arch#{}, arch={:?}", i, arch);

            archs.push(arch);
        }

        Ok(FatHeader { magic, endian, archs })
    }
}

/// A thin mach-o image and the bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct MachImage<'a> {
    view: BinaryView<'a>,
    pub header: MachHeader,
}

impl<'a> MachImage<'a> {
    /// Parse a thin image, a fat container is rejected.
    pub fn parse(view: BinaryView<'a>) -> Result<MachImage<'a>> {
        let format = Format::detect(&view)?;

        if format.container == Container::Fat {
            let magic = view.read_u32(0, Endian::Native)?;

            warn!("nested fat container at 0x{:x} is not supported", view.base());

            return Err(MachError::MagicUnrecognized(magic));
        }

        Self::with_format(view, format)
    }

    fn with_format(view: BinaryView<'a>, format: Format) -> Result<MachImage<'a>> {
        let header = MachHeader::parse(&view, format)?;

        Ok(MachImage { view, header })
    }

    pub fn view(&self) -> &BinaryView<'a> {
        &self.view
    }

    pub fn layout(&self) -> Layout {
        self.header.layout()
    }

    /// Walk the load commands from the start, every call begins a new walk.
    pub fn commands(&self) -> LoadCommands<'a> {
        LoadCommands::new(self.view, &self.header)
    }

    pub fn decode(&self, lc: &LoadCommand) -> Result<Command<'a>> {
        lc.decode(&self.view, self.layout())
    }

    /// The first well-formed load command of the given type.
    pub fn find_command(&self, cmd: u32) -> Option<LoadCommand> {
        self.commands()
            .filter_map(|lc| lc.ok())
            .find(|lc| lc.cmd == cmd)
    }
}

/// A nested image of a fat container.
#[derive(Debug, Clone)]
pub struct FatSlice<'a> {
    pub arch: FatArch,
    pub image: Result<MachImage<'a>>,
}

#[derive(Debug, Clone)]
pub enum MachFile<'a> {
    Thin(MachImage<'a>),
    Fat { header: FatHeader, slices: Vec<FatSlice<'a>> },
}

impl<'a> MachFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<MachFile<'a>> {
        let view = BinaryView::new(data);
        let format = Format::detect(&view)?;

        match format.container {
            Container::Thin => Ok(MachFile::Thin(MachImage::with_format(view, format)?)),
            Container::Fat => {
                let header = FatHeader::parse(&view, format.endian)?;

                // each slice carries its own magic, so its width and byte order
                // are classified again rather than inherited from the container
                let slices = header
                    .archs
                    .iter()
                    .map(|arch| {
                        debug!("parsing mach-o file at 0x{:x}, arch={:?}", arch.offset, arch);

                        FatSlice {
                            arch: arch.clone(),
                            image: view
                                .subview(arch.offset as usize, arch.size as usize)
                                .and_then(MachImage::parse),
                        }
                    })
                    .collect();

                Ok(MachFile::Fat { header, slices })
            }
        }
    }

    /// The successfully parsed thin images.
    pub fn images(&self) -> Vec<&MachImage<'a>> {
        match self {
            MachFile::Thin(image) => vec![image],
            MachFile::Fat { slices, .. } => slices.iter().filter_map(|slice| slice.image.as_ref().ok()).collect(),
        }
    }
}
