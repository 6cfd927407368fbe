#![allow(dead_code)]
#![allow(non_camel_case_types)]

pub type cpu_type_t = i32;
pub type cpu_subtype_t = i32;
pub type vm_prot_t = i32;

// Capability bits used in the definition of cpu_type.
//

/// mask for architecture bits
pub const CPU_ARCH_MASK: cpu_type_t = 0xff00_0000u32 as cpu_type_t;
/// 64 bit ABI
pub const CPU_ARCH_ABI64: cpu_type_t = 0x0100_0000;
/// ABI for 64-bit hardware with 32-bit types; LP32
pub const CPU_ARCH_ABI64_32: cpu_type_t = 0x0200_0000;

//  Machine types known by all.
//

pub const CPU_TYPE_ANY: cpu_type_t = -1;

pub const CPU_TYPE_VAX: cpu_type_t = 1;
pub const CPU_TYPE_MC680X0: cpu_type_t = 6;
pub const CPU_TYPE_X86: cpu_type_t = 7;
pub const CPU_TYPE_I386: cpu_type_t = CPU_TYPE_X86;
pub const CPU_TYPE_X86_64: cpu_type_t = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_MIPS: cpu_type_t = 8;
pub const CPU_TYPE_MC98000: cpu_type_t = 10;
pub const CPU_TYPE_HPPA: cpu_type_t = 11;
pub const CPU_TYPE_ARM: cpu_type_t = 12;
pub const CPU_TYPE_ARM64: cpu_type_t = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM64_32: cpu_type_t = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;
pub const CPU_TYPE_MC88000: cpu_type_t = 13;
pub const CPU_TYPE_SPARC: cpu_type_t = 14;
pub const CPU_TYPE_I860: cpu_type_t = 15;
pub const CPU_TYPE_ALPHA: cpu_type_t = 16;
pub const CPU_TYPE_POWERPC: cpu_type_t = 18;
pub const CPU_TYPE_POWERPC64: cpu_type_t = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

/// mask for feature flags
pub const CPU_SUBTYPE_MASK: cpu_subtype_t = 0xff00_0000u32 as cpu_subtype_t;
/// 64 bit libraries
pub const CPU_SUBTYPE_LIB64: cpu_subtype_t = 0x8000_0000u32 as cpu_subtype_t;

pub const CPU_SUBTYPE_I386_ALL: cpu_subtype_t = 3;
pub const CPU_SUBTYPE_X86_64_ALL: cpu_subtype_t = 3;
pub const CPU_SUBTYPE_POWERPC_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_ARM_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_ARM64_ALL: cpu_subtype_t = 0;

// Constant for the magic field of the mach_header (32-bit architectures)
//

/// the mach magic number
pub const MH_MAGIC: u32 = 0xfeed_face;
/// NXSwapInt(MH_MAGIC)
pub const MH_CIGAM: u32 = 0xcefa_edfe;

// Constant for the magic field of the mach_header_64 (64-bit architectures)
//

/// the 64-bit mach magic number
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
/// NXSwapInt(MH_MAGIC_64)
pub const MH_CIGAM_64: u32 = 0xcffa_edfe;

// The fat header is always stored big endian; FAT_CIGAM is what a little
// endian host sees when it reads the magic in its own byte order.
//

/// the fat magic number
pub const FAT_MAGIC: u32 = 0xcafe_babe;
/// NXSwapLong(FAT_MAGIC)
pub const FAT_CIGAM: u32 = 0xbeba_feca;

// Constants for the filetype field of the mach_header
//

/// relocatable object file
pub const MH_OBJECT: u32 = 0x1;
/// demand paged executable file
pub const MH_EXECUTE: u32 = 0x2;
/// fixed VM shared library file
pub const MH_FVMLIB: u32 = 0x3;
/// core file
pub const MH_CORE: u32 = 0x4;
/// preloaded executable file
pub const MH_PRELOAD: u32 = 0x5;
/// dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;
/// dynamic link editor
pub const MH_DYLINKER: u32 = 0x7;
/// dynamically bound bundle file
pub const MH_BUNDLE: u32 = 0x8;
/// shared library stub for static linking only, no section contents
pub const MH_DYLIB_STUB: u32 = 0x9;
/// companion file with only debug sections
pub const MH_DSYM: u32 = 0xa;
/// x86_64 kexts
pub const MH_KEXT_BUNDLE: u32 = 0xb;

/// Human readable names of the file types, indexed by `filetype - 1`.
pub const FILE_TYPE_NAMES: &[&str] = &[
    "object",
    "executable",
    "shared library",
    "core file",
    "preloaded executable",
    "dynamic library",
    "dylinker",
    "bundle",
    "dylib_stub",
    "dsym",
    "kernel extension",
];

/// Look up the name of a mach header `filetype`.
pub fn file_type_name(filetype: u32) -> Option<&'static str> {
    (filetype as usize)
        .checked_sub(1)
        .and_then(|idx| FILE_TYPE_NAMES.get(idx))
        .cloned()
}

// After MacOS X 10.1 when a new load command is added that is required to be
// understood by the dynamic linker for the image to execute properly the
// LC_REQ_DYLD bit will be or'ed into the load command constant.
//
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

// load command types
pub const LC_SEGMENT: u32 = 0x1; /* segment of this file to be mapped */
pub const LC_SYMTAB: u32 = 0x2; /* link-edit stab symbol table info */
pub const LC_SYMSEG: u32 = 0x3; /* link-edit gdb symbol table info (obsolete) */
pub const LC_THREAD: u32 = 0x4; /* thread */
pub const LC_UNIXTHREAD: u32 = 0x5; /* unix thread (includes a stack) */
pub const LC_LOADFVMLIB: u32 = 0x6; /* load a specified fixed VM shared library */
pub const LC_IDFVMLIB: u32 = 0x7; /* fixed VM shared library identification */
pub const LC_IDENT: u32 = 0x8; /* object identification info (obsolete) */
pub const LC_FVMFILE: u32 = 0x9; /* fixed VM file inclusion (internal use) */
pub const LC_PREPAGE: u32 = 0xa; /* prepage command (internal use) */
pub const LC_DYSYMTAB: u32 = 0xb; /* dynamic link-edit symbol table info */
pub const LC_LOAD_DYLIB: u32 = 0xc; /* load a dynamically linked shared library */
pub const LC_ID_DYLIB: u32 = 0xd; /* dynamically linked shared lib ident */
pub const LC_LOAD_DYLINKER: u32 = 0xe; /* load a dynamic linker */
pub const LC_ID_DYLINKER: u32 = 0xf; /* dynamic linker identification */
pub const LC_PREBOUND_DYLIB: u32 = 0x10; /* modules prebound for a dynamically linked shared library */
pub const LC_ROUTINES: u32 = 0x11; /* image routines */
pub const LC_SUB_FRAMEWORK: u32 = 0x12; /* sub framework */
pub const LC_SUB_UMBRELLA: u32 = 0x13; /* sub umbrella */
pub const LC_SUB_CLIENT: u32 = 0x14; /* sub client */
pub const LC_SUB_LIBRARY: u32 = 0x15; /* sub library */
pub const LC_TWOLEVEL_HINTS: u32 = 0x16; /* two-level namespace lookup hints */
pub const LC_PREBIND_CKSUM: u32 = 0x17; /* prebind checksum */
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD; /* load a dylib that is allowed to be missing */
pub const LC_SEGMENT_64: u32 = 0x19; /* 64-bit segment of this file to be mapped */
pub const LC_ROUTINES_64: u32 = 0x1a; /* 64-bit image routines */
pub const LC_UUID: u32 = 0x1b; /* the uuid */
pub const LC_RPATH: u32 = 0x1c | LC_REQ_DYLD; /* runpath additions */
pub const LC_CODE_SIGNATURE: u32 = 0x1d; /* local of code signature */
pub const LC_SEGMENT_SPLIT_INFO: u32 = 0x1e; /* local of info to split segments */
pub const LC_REEXPORT_DYLIB: u32 = 0x1f | LC_REQ_DYLD; /* load and re-export dylib */
pub const LC_LAZY_LOAD_DYLIB: u32 = 0x20; /* delay load of dylib until first use */
pub const LC_ENCRYPTION_INFO: u32 = 0x21; /* encrypted segment information */
pub const LC_DYLD_INFO: u32 = 0x22; /* compressed dyld information */
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD; /* compressed dyld information only */
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD; /* load upward dylib */
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24; /* build for MacOSX min OS version */
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25; /* build for iPhoneOS min OS version */
pub const LC_FUNCTION_STARTS: u32 = 0x26; /* compressed table of function start addresses */
pub const LC_DYLD_ENVIRONMENT: u32 = 0x27; /* string for dyld to treat like environment variable */
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD; /* replacement for LC_UNIXTHREAD */
pub const LC_DATA_IN_CODE: u32 = 0x29; /* table of non-instructions in __text */
pub const LC_SOURCE_VERSION: u32 = 0x2A; /* source version used to build binary */
pub const LC_DYLIB_CODE_SIGN_DRS: u32 = 0x2B; /* Code signing DRs copied from linked dylibs */
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2C; /* 64-bit encrypted segment information */
pub const LC_LINKER_OPTION: u32 = 0x2D; /* linker options in MH_OBJECT files */
pub const LC_LINKER_OPTIMIZATION_HINT: u32 = 0x2E; /* optimization hints in MH_OBJECT files */

// The segment names and the section names of interest.
//

/// the pagezero segment which has no protections and catches NULL references for MH_EXECUTE files
pub const SEG_PAGEZERO: &str = "__PAGEZERO";

/// the tradition UNIX text segment
pub const SEG_TEXT: &str = "__TEXT";
/// the real text part of the text section no headers, and no padding
pub const SECT_TEXT: &str = "__text";

/// the tradition UNIX data segment
pub const SEG_DATA: &str = "__DATA";
/// the real initialized data section no padding, no bss overlap
pub const SECT_DATA: &str = "__data";
/// the real uninitialized data section no padding
pub const SECT_BSS: &str = "__bss";
/// lazily bound symbol pointers
pub const SECT_LA_SYMBOL_PTR: &str = "__la_symbol_ptr";
/// non-lazily bound symbol pointers
pub const SECT_NL_SYMBOL_PTR: &str = "__nl_symbol_ptr";

/// objective-C runtime segment
pub const SEG_OBJC: &str = "__OBJC";
/// symbol table
pub const SECT_OBJC_SYMBOLS: &str = "__symbol_table";
/// module information
pub const SECT_OBJC_MODULES: &str = "__module_info";
/// string table
pub const SECT_OBJC_STRINGS: &str = "__selector_strs";

/// the segment containing all structs created and maintained by the link editor.
pub const SEG_LINKEDIT: &str = "__LINKEDIT";

/// the section type part of the flags field of a section
pub const SECTION_TYPE: u32 = 0x0000_00ff;

/// section with only non-lazy symbol pointers
pub const S_NON_LAZY_SYMBOL_POINTERS: u32 = 0x6;
/// section with only lazy symbol pointers
pub const S_LAZY_SYMBOL_POINTERS: u32 = 0x7;
/// section with only symbol stubs, byte size of stub in the reserved2 field
pub const S_SYMBOL_STUBS: u32 = 0x8;

// An indirect symbol table entry is simply a 32bit index into the symbol table
// to the symbol that the pointer or stub is refering to, unless it is for a
// non-lazy symbol pointer section for a defined symbol which strip(1) as
// removed.  In which case it has the value INDIRECT_SYMBOL_LOCAL.  If the
// symbol was also absolute INDIRECT_SYMBOL_ABS is or'ed with that.
//
pub const INDIRECT_SYMBOL_LOCAL: u32 = 0x8000_0000;
pub const INDIRECT_SYMBOL_ABS: u32 = 0x4000_0000;

// Sizes of the on-disk structures.
//

/// magic, nfat_arch
pub const FAT_HEADER_SIZE: usize = 8;
/// cputype, cpusubtype, offset, size, align
pub const FAT_ARCH_SIZE: usize = 20;
/// struct mach_header
pub const MACH_HEADER_SIZE: usize = 28;
/// struct mach_header_64, with its trailing reserved field
pub const MACH_HEADER_64_SIZE: usize = 32;
/// cmd + cmdsize
pub const LOAD_COMMAND_HEADER_SIZE: usize = 8;
/// struct segment_command
pub const SEGMENT_COMMAND_SIZE: usize = 56;
/// struct segment_command_64
pub const SEGMENT_COMMAND_64_SIZE: usize = 72;
/// struct section
pub const SECTION_SIZE: usize = 68;
/// struct section_64
pub const SECTION_64_SIZE: usize = 80;
/// struct nlist
pub const NLIST_SIZE: usize = 12;
/// struct nlist_64
pub const NLIST_64_SIZE: usize = 16;
/// segment and section names are fixed 16 bytes arrays
pub const NAME_SIZE: usize = 16;
