use std::fmt;

use crate::commands::DyLibKind;
use crate::inspect::{ImageReport, Report, SliceReport};
use crate::loader::{FatHeader, MachHeader};
use crate::segment::Segment;
use crate::view::BitWidth;

const BRANCH: &str = " ┖────";
const LEAF: &str = "       ┖─";

impl fmt::Display for MachHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Mach-O {} bit {} (0x{:08x}, {})",
            self.width.bits(),
            self.file_type_name().unwrap_or("unknown"),
            self.magic,
            if self.is_bigend() { "BE" } else { "LE" }
        )
    }
}

impl fmt::Display for FatHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Universal FAT 32 bit binary (0x{:08x}, {}), consists of:",
            self.magic,
            if self.endian.is_big_endian() { "BE" } else { "LE" }
        )
    }
}

impl ImageReport {
    fn write_summary(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Mach-O {} bit {} (0x{:08x}, {}, {})",
            self.header.width.bits(),
            self.file_type.unwrap_or("unknown"),
            self.header.magic,
            if self.header.is_bigend() { "BE" } else { "LE" },
            if self.stripped { "stripped" } else { "not stripped" }
        )?;

        if let Some(ref arch) = self.architecture {
            write!(f, " with architecture {}", arch)?;
        }

        Ok(())
    }

    fn write_segment(&self, f: &mut fmt::Formatter, seg: &Segment) -> fmt::Result {
        match self.header.width {
            BitWidth::Bits32 => {
                write!(
                    f,
                    "{} LC {} 0x{:08x} - 0x{:08x} {:<16} {}\n",
                    LEAF, seg.command_index, seg.vmaddr, seg.vmsize, seg.segname, seg.initprot
                )?;

                for section in &seg.sections {
                    write!(
                        f,
                        "{:15}0x{:08x} - 0x{:08x} {}\n",
                        "", section.addr, section.size, section.sectname
                    )?;
                }
            }
            BitWidth::Bits64 => {
                write!(
                    f,
                    "{} LC_64 {} 0x{:016x} - 0x{:016x} {:<16} {}\n",
                    LEAF, seg.command_index, seg.vmaddr, seg.vmsize, seg.segname, seg.initprot
                )?;

                for section in &seg.sections {
                    write!(
                        f,
                        "{:18}0x{:016x} - 0x{:016x} {}\n",
                        "", section.addr, section.size, section.sectname
                    )?;
                }
            }
        }

        Ok(())
    }

    fn write_details(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Segments\n")?;
        write!(f, "{} Dumping main segments of {} totals:\n", BRANCH, self.header.ncmds)?;

        for seg in &self.segments {
            self.write_segment(f, seg)?;
        }

        if !self.dylibs.is_empty() {
            write!(f, "{} Dynamically loaded libraries:\n", LEAF)?;

            for (kind, dylib) in &self.dylibs {
                match kind {
                    DyLibKind::Load => write!(f, "{:11}{}\n", "", dylib.name)?,
                    DyLibKind::Weak => write!(f, "{:11}{} (weak)\n", "", dylib.name)?,
                    DyLibKind::Reexport => write!(f, "{:11}{} (reexport)\n", "", dylib.name)?,
                    DyLibKind::Upward => write!(f, "{:11}{} (upward)\n", "", dylib.name)?,
                    DyLibKind::Lazy => write!(f, "{:11}{} (lazy)\n", "", dylib.name)?,
                }
            }
        }

        if let Some(ref entry_point) = self.entry_point {
            write!(f, "{} Entry point address: 0x{:016x}\n", LEAF, entry_point.entryoff)?;
        }

        if self.encrypted {
            write!(f, "{} Binary is encrypted.\n", LEAF)?;
        }

        if self.kext_signed {
            write!(f, "{} Kext signed.\n", LEAF)?;
        }

        write!(f, "Indirect symtable\n")?;
        write!(f, "{} Symbols imported at lazy binding:\n", BRANCH)?;

        for import in &self.imports {
            write!(f, "{:6}{}\n", "", import)?;
        }

        if !self.diagnostics.is_empty() {
            write!(f, "Diagnostics\n")?;
            write!(f, "{} {} malformed records skipped:\n", BRANCH, self.diagnostics.len())?;

            for err in &self.diagnostics {
                write!(f, "{} {}\n", LEAF, err)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Header\n")?;
        write!(f, "{} ", BRANCH)?;
        self.write_summary(f)?;
        write!(f, "\n")?;

        self.write_details(f)
    }
}

impl fmt::Display for SliceReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.image {
            Ok(ref image) => image.write_summary(f),
            Err(ref err) => write!(
                f,
                "cputype {} at offset 0x{:x}, {}",
                self.arch.cputype, self.arch.offset, err
            ),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Report::Thin(image) => write!(f, "{}", image),
            Report::Fat { header, slices } => {
                write!(f, "Header\n")?;
                write!(f, "{} {}\n", BRANCH, header)?;

                for slice in slices {
                    write!(f, "{} {}\n", LEAF, slice)?;
                }

                for image in slices.iter().filter_map(|slice| slice.image.as_ref().ok()) {
                    image.write_details(f)?;
                }

                Ok(())
            }
        }
    }
}
