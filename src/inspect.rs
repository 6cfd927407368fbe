use std::fmt;

use crate::arch::{ArchDescriber, ArchDescription, KnownArchitectures};
use crate::commands::{DyLib, DyLibKind, EncryptionInfo, EntryPoint};
use crate::errors::{MachError, Result};
use crate::loader::{FatArch, FatHeader, MachFile, MachHeader, MachImage};
use crate::metadata::extract_metadata;
use crate::segment::{extract_segments, Segment, SegmentInterest, SEGMENTS_OF_INTEREST};
use crate::symbol::{resolve_lazy_imports, ImportSymbol};

/// Everything extracted from a thin image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    pub header: MachHeader,
    pub file_type: Option<&'static str>,
    pub architecture: Option<ArchDescription>,
    pub stripped: bool,
    pub segments: Vec<Segment>,
    pub dylibs: Vec<(DyLibKind, DyLib)>,
    pub entry_point: Option<EntryPoint>,
    pub encryption_info: Option<EncryptionInfo>,
    pub encrypted: bool,
    pub kext_signed: bool,
    pub imports: Vec<ImportSymbol>,
    /// malformed records skipped while inspecting the image
    pub diagnostics: Vec<MachError>,
}

/// A nested image of a fat container, inspected on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceReport {
    pub arch: FatArch,
    pub image: Result<ImageReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Thin(ImageReport),
    Fat { header: FatHeader, slices: Vec<SliceReport> },
}

impl Report {
    /// The reports of every image that could be parsed.
    pub fn images(&self) -> Vec<&ImageReport> {
        match self {
            Report::Thin(image) => vec![image],
            Report::Fat { slices, .. } => slices.iter().filter_map(|slice| slice.image.as_ref().ok()).collect(),
        }
    }
}

/// Inspects mach-o files with a fixed configuration.
///
/// The configuration is never changed by an inspection, so one inspector can
/// serve any number of files, from any number of threads.
pub struct Inspector {
    segments: Vec<SegmentInterest>,
    describer: Box<dyn ArchDescriber + Send + Sync>,
}

impl Default for Inspector {
    fn default() -> Self {
        Inspector {
            segments: SEGMENTS_OF_INTEREST.to_vec(),
            describer: Box::new(KnownArchitectures),
        }
    }
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Inspector").field("segments", &self.segments).finish()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the segments and sections of interest.
    pub fn with_segments(mut self, table: &[SegmentInterest]) -> Self {
        self.segments = table.to_vec();
        self
    }

    pub fn with_arch_describer<D>(mut self, describer: D) -> Self
    where
        D: ArchDescriber + Send + Sync + 'static,
    {
        self.describer = Box::new(describer);
        self
    }

    /// Parse and inspect a whole file.
    ///
    /// Only structural failures of the outer container are returned as errors;
    /// a fat slice that fails to parse is reported in its own `SliceReport`.
    pub fn inspect(&self, data: &[u8]) -> Result<Report> {
        match MachFile::parse(data)? {
            MachFile::Thin(image) => Ok(Report::Thin(self.inspect_image(&image))),
            MachFile::Fat { header, slices } => {
                let slices = slices
                    .into_iter()
                    .map(|slice| SliceReport {
                        arch: slice.arch,
                        image: slice.image.map(|image| self.inspect_image(&image)),
                    })
                    .collect();

                Ok(Report::Fat { header, slices })
            }
        }
    }

    pub fn inspect_image(&self, image: &MachImage) -> ImageReport {
        let mut diagnostics = Vec::new();
        let header = image.header.clone();

        let architecture = match ArchDescription::describe(self.describer.as_ref(), header.cputype, header.cpusubtype) {
            Ok(arch) => Some(arch),
            Err(err) => {
                debug!("no description, {}", err);

                None
            }
        };

        let segments = extract_segments(image, &self.segments, &mut diagnostics);
        let metadata = extract_metadata(image, &mut diagnostics);
        let imports = resolve_lazy_imports(image, &mut diagnostics);

        if !diagnostics.is_empty() {
            warn!(
                "{} issues found while inspecting the image at 0x{:x}",
                diagnostics.len(),
                image.view().base()
            );
        }

        ImageReport {
            file_type: header.file_type_name(),
            architecture,
            stripped: metadata.is_stripped(),
            segments,
            dylibs: metadata.dylibs,
            entry_point: metadata.entry_point,
            encryption_info: metadata.encryption_info,
            encrypted: metadata.encrypted,
            kext_signed: metadata.kext_signed,
            imports,
            diagnostics,
            header,
        }
    }
}

/// Inspect a file with the default configuration.
pub fn inspect(data: &[u8]) -> Result<Report> {
    Inspector::default().inspect(data)
}
