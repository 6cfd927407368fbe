use crate::commands::{Command, FixedName, Section, SegmentCommand, VmProt};
use crate::consts::*;
use crate::errors::{push_diagnostic, MachError};
use crate::loader::MachImage;

/// A segment to extract, and the sections of it worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInterest {
    pub segname: &'static str,
    pub sections: &'static [&'static str],
}

impl SegmentInterest {
    pub fn wants(&self, section: &Section) -> bool {
        self.sections.iter().any(|name| section.sectname.matches(name))
    }
}

/// The segments reported by default, in the order they are reported.
pub const SEGMENTS_OF_INTEREST: &[SegmentInterest] = &[
    SegmentInterest {
        segname: SEG_PAGEZERO,
        sections: &[],
    },
    SegmentInterest {
        segname: SEG_TEXT,
        sections: &[SECT_TEXT, "__cstring", "__const", "__unwind_info"],
    },
    SegmentInterest {
        segname: SEG_DATA,
        sections: &[SECT_NL_SYMBOL_PTR, SECT_LA_SYMBOL_PTR, "__const", SECT_DATA, SECT_BSS],
    },
    SegmentInterest {
        segname: SEG_OBJC,
        sections: &[SECT_OBJC_SYMBOLS, SECT_OBJC_MODULES, SECT_OBJC_STRINGS],
    },
    SegmentInterest {
        segname: SEG_LINKEDIT,
        sections: &[],
    },
];

/// An extracted segment with its sections of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// index of the segment command in the load command list
    pub command_index: u32,
    pub segname: FixedName,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: VmProt,
    pub initprot: VmProt,
    pub sections: Vec<Section>,
}

impl Segment {
    fn new(command_index: u32, cmd: &SegmentCommand, sections: Vec<Section>) -> Segment {
        Segment {
            command_index,
            segname: cmd.segname,
            vmaddr: cmd.vmaddr,
            vmsize: cmd.vmsize,
            fileoff: cmd.fileoff,
            filesize: cmd.filesize,
            maxprot: cmd.maxprot,
            initprot: cmd.initprot,
            sections,
        }
    }

    pub fn find_section(&self, sectname: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.sectname.matches(sectname))
    }
}

/// Extract the segments named in `table`.
///
/// The output follows the table order, whatever the order of the load commands.
/// Sections keep their file order and are only filtered by the interest list.
/// Malformed records are skipped and reported once in `diagnostics`.
pub fn extract_segments(image: &MachImage, table: &[SegmentInterest], diagnostics: &mut Vec<MachError>) -> Vec<Segment> {
    let segment_cmd = image.header.segment_cmd();
    let mut segments = Vec::new();

    for interest in table {
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
                    warn!("skip malformed segment command #{}, {}", lc.index, err);

                    push_diagnostic(diagnostics, err);
                    continue;
                }
            };

            if !cmd.segname.matches(interest.segname) {
                continue;
            }

            let mut sections = Vec::new();

            for section in cmd.sections() {
                match section {
                    Ok(section) => {
                        if interest.wants(&section) {
                            sections.push(section);
                        }
                    }
                    Err(err) => push_diagnostic(diagnostics, err),
                }
            }

            debug!(
                "found segment {} at #{} with {} of {} sections",
                cmd.segname,
                lc.index,
                sections.len(),
                cmd.nsects
            );

            segments.push(Segment::new(lc.index, &cmd, sections));
        }
    }

    segments
}
