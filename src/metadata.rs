use crate::commands::{Command, DyLib, DyLibKind, DySymTab, EncryptionInfo, EntryPoint, LinkEditData, SymTab};
use crate::consts::MH_KEXT_BUNDLE;
use crate::errors::{push_diagnostic, MachError};
use crate::loader::MachImage;

/// What the load commands tell about an image, besides its segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// every linked dynamic library, in command order
    pub dylibs: Vec<(DyLibKind, DyLib)>,
    /// the first `LC_MAIN` command
    pub entry_point: Option<EntryPoint>,
    /// the first encryption info command
    pub encryption_info: Option<EncryptionInfo>,
    /// any encryption info command has a non-zero crypt id
    pub encrypted: bool,
    pub code_signature: Option<LinkEditData>,
    /// a kernel extension carrying a code signature
    pub kext_signed: bool,
    pub symtab: Option<SymTab>,
    pub dysymtab: Option<DySymTab>,
}

impl Metadata {
    /// Without symbol table, or without any local symbol left in the dynamic symbol table.
    pub fn is_stripped(&self) -> bool {
        self.symtab.is_none() || self.dysymtab.map_or(false, |dysymtab| dysymtab.nlocalsym == 0)
    }

    pub fn dylib_names(&self) -> impl Iterator<Item = &str> {
        self.dylibs.iter().map(|(_, dylib)| dylib.name.as_str())
    }
}

/// Collect the metadata of an image in a single walk over its load commands.
pub fn extract_metadata(image: &MachImage, diagnostics: &mut Vec<MachError>) -> Metadata {
    let mut metadata = Metadata::default();

    for lc in image.commands() {
        let lc = match lc {
            Ok(lc) => lc,
            Err(err) => {
                push_diagnostic(diagnostics, err);
                break;
            }
        };

        let command = match image.decode(&lc) {
            Ok(command) => command,
            Err(err) => {
                warn!("skip malformed {} command #{}, {}", lc.name(), lc.index, err);

                push_diagnostic(diagnostics, err);
                continue;
            }
        };

        match command {
            Command::DyLib(kind, dylib) => metadata.dylibs.push((kind, dylib)),
            Command::EntryPoint(entry_point) => {
                if metadata.entry_point.is_none() {
                    metadata.entry_point = Some(entry_point);
                }
            }
            Command::EncryptionInfo(info) => {
                metadata.encrypted |= info.is_encrypted();

                if metadata.encryption_info.is_none() {
                    metadata.encryption_info = Some(info);
                }
            }
            Command::CodeSignature(sig) => {
                if metadata.code_signature.is_none() {
                    metadata.code_signature = Some(sig);
                }
            }
            Command::SymTab(symtab) => {
                if metadata.symtab.is_none() {
                    metadata.symtab = Some(symtab);
                }
            }
            Command::DySymTab(dysymtab) => {
                if metadata.dysymtab.is_none() {
                    metadata.dysymtab = Some(dysymtab);
                }
            }
            Command::Segment(_) | Command::Other(_) => {}
        }
    }

    metadata.kext_signed = image.header.filetype == MH_KEXT_BUNDLE && metadata.code_signature.is_some();

    debug!(
        "found {} dylibs, entry point {:?}, encrypted {}, kext signed {}",
        metadata.dylibs.len(),
        metadata.entry_point,
        metadata.encrypted,
        metadata.kext_signed
    );

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::testdata::*;
    use crate::view::BinaryView;

    fn extract(data: &[u8]) -> (Metadata, Vec<MachError>) {
        let _ = pretty_env_logger::try_init();

        let image = MachImage::parse(BinaryView::new(data)).unwrap();
        let mut diagnostics = Vec::new();
        let metadata = extract_metadata(&image, &mut diagnostics);

        (metadata, diagnostics)
    }

    #[test]
    fn test_extract_metadata() {
        let data = ImageBuilder::new(true)
            .command(dylib_command("/usr/lib/libSystem.B.dylib"))
            .command(dylib_command_with(LC_LOAD_WEAK_DYLIB, "/usr/lib/libobjc.A.dylib"))
            .command(main_command(0x1f50, 0x10_0000))
            .command(main_command(0x2000, 0))
            .command(encryption_command(true, 0x4000, 0x1000, 0))
            .command(symtab_command(0x3000, 4, 0x3100, 0x40))
            .command(dysymtab_command(2, 0x3200, 2))
            .build();
        let (metadata, diagnostics) = extract(&data);

        assert!(diagnostics.is_empty());
        assert_eq!(
            metadata.dylib_names().collect::<Vec<_>>(),
            vec!["/usr/lib/libSystem.B.dylib", "/usr/lib/libobjc.A.dylib"]
        );
        assert_eq!(metadata.dylibs[1].0, DyLibKind::Weak);
        // the stack size is never added to the entry offset
        assert_eq!(
            metadata.entry_point,
            Some(EntryPoint {
                entryoff: 0x1f50,
                stacksize: 0x10_0000
            })
        );
        assert!(!metadata.encrypted);
        assert_eq!(metadata.encryption_info.unwrap().cryptoff, 0x4000);
        assert!(!metadata.kext_signed);
        assert_eq!(metadata.symtab.unwrap().nsyms, 4);
        assert_eq!(metadata.dysymtab.unwrap().indirectsymoff, 0x3200);
        assert!(!metadata.is_stripped());
    }

    #[test]
    fn test_encrypted_image() {
        let data = ImageBuilder::new(false)
            .swapped()
            .command(encryption_command(false, 0x1000, 0x3000, 0))
            .command(encryption_command(false, 0x1000, 0x3000, 1))
            .build();
        let (metadata, _) = extract(&data);

        assert!(metadata.encrypted);
        assert_eq!(metadata.encryption_info.unwrap().cryptid, 0);
        assert!(metadata.entry_point.is_none());
        assert!(metadata.is_stripped());
    }

    #[test]
    fn test_kext_signature() {
        let signed_kext = ImageBuilder::new(true)
            .filetype(MH_KEXT_BUNDLE)
            .command(code_signature_command(0x8000, 0x200))
            .build();
        let signed_exe = ImageBuilder::new(true)
            .command(code_signature_command(0x8000, 0x200))
            .build();
        let unsigned_kext = ImageBuilder::new(true).filetype(MH_KEXT_BUNDLE).build();

        assert!(extract(&signed_kext).0.kext_signed);
        assert!(!extract(&signed_exe).0.kext_signed);
        assert!(extract(&signed_exe).0.code_signature.is_some());
        assert!(!extract(&unsigned_kext).0.kext_signed);
    }

    #[test]
    fn test_stripped() {
        let stripped = ImageBuilder::new(true)
            .command(symtab_command(0x3000, 4, 0x3100, 0x40))
            .command(dysymtab_command(0, 0x3200, 2))
            .build();

        assert!(extract(&stripped).0.is_stripped());
    }

    #[test]
    fn test_skip_malformed_dylib() {
        let mut broken = dylib_command("/usr/lib/libc++.1.dylib");
        let cmdsize = broken.len() as u32;

        broken.set_u32(8, cmdsize + 8);

        let data = ImageBuilder::new(true)
            .command(broken)
            .command(dylib_command("/usr/lib/libSystem.B.dylib"))
            .build();
        let (metadata, diagnostics) = extract(&data);

        assert_eq!(metadata.dylibs.len(), 1);
        assert_eq!(metadata.dylibs[0].1.name, "/usr/lib/libSystem.B.dylib");
        assert_eq!(diagnostics.len(), 1);
    }
}
