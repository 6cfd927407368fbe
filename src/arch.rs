use std::collections::HashMap;
use std::fmt;

use crate::consts::*;
use crate::errors::{MachError, Result};

/// Names the architecture of a cputype.
pub trait ArchDescriber {
    fn arch_name(&self, cputype: cpu_type_t) -> Option<String>;
}

impl<F> ArchDescriber for F
where
    F: Fn(cpu_type_t) -> Option<String>,
{
    fn arch_name(&self, cputype: cpu_type_t) -> Option<String> {
        self(cputype)
    }
}

lazy_static! {
    static ref ARCH_NAMES: HashMap<cpu_type_t, &'static str> = {
        let mut m = HashMap::new();

        m.insert(CPU_TYPE_VAX, "VAX");
        m.insert(CPU_TYPE_MC680X0, "Motorola 68K");
        m.insert(CPU_TYPE_I386, "Intel 80x86");
        m.insert(CPU_TYPE_X86_64, "Intel x86-64");
        m.insert(CPU_TYPE_MIPS, "MIPS");
        m.insert(CPU_TYPE_MC98000, "Motorola 98K");
        m.insert(CPU_TYPE_HPPA, "HP-PA");
        m.insert(CPU_TYPE_ARM, "ARM");
        m.insert(CPU_TYPE_ARM64, "ARM64");
        m.insert(CPU_TYPE_ARM64_32, "ARM64_32");
        m.insert(CPU_TYPE_MC88000, "Motorola 88K");
        m.insert(CPU_TYPE_SPARC, "SPARC");
        m.insert(CPU_TYPE_I860, "Intel 860");
        m.insert(CPU_TYPE_ALPHA, "Alpha");
        m.insert(CPU_TYPE_POWERPC, "PowerPC");
        m.insert(CPU_TYPE_POWERPC64, "PowerPC 64-bit");

        m
    };
}

/// The architectures known to the system headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct KnownArchitectures;

impl ArchDescriber for KnownArchitectures {
    fn arch_name(&self, cputype: cpu_type_t) -> Option<String> {
        ARCH_NAMES.get(&cputype).map(|name| (*name).to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchDescription {
    pub name: String,
    /// the subtype runs on every member of the cpu family
    pub all_subtypes: bool,
}

impl ArchDescription {
    pub fn describe(describer: &dyn ArchDescriber, cputype: cpu_type_t, cpusubtype: cpu_subtype_t) -> Result<Self> {
        let name = describer
            .arch_name(cputype)
            .ok_or(MachError::UnknownArchitecture(cputype))?;

        Ok(ArchDescription {
            name,
            all_subtypes: (cpusubtype & !CPU_SUBTYPE_MASK) == all_subtype(cputype),
        })
    }
}

impl fmt::Display for ArchDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.all_subtypes {
            write!(f, "{} (ALL)", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// The `*_ALL` subtype of the cpu family.
pub fn all_subtype(cputype: cpu_type_t) -> cpu_subtype_t {
    match cputype & !CPU_ARCH_MASK {
        CPU_TYPE_X86 => CPU_SUBTYPE_X86_64_ALL,
        CPU_TYPE_POWERPC => CPU_SUBTYPE_POWERPC_ALL,
        CPU_TYPE_ARM => CPU_SUBTYPE_ARM_ALL,
        _ => 0,
    }
}
