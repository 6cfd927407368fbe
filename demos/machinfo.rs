#[macro_use]
extern crate log;

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap::Mmap;
use structopt::StructOpt;
use time::{macros::format_description, OffsetDateTime};

use mach_inspect::{inspect, Inspector, SEGMENTS_OF_INTEREST};

#[derive(Debug, StructOpt)]
#[structopt(name = "machinfo", about = "Dump the structure of a Mach-O or universal binary")]
struct Opt {
    /// Skip the file ownership block
    #[structopt(short, long)]
    quiet: bool,

    /// Only dump the named segments, e.g. `-s __TEXT -s __DATA`
    #[structopt(short, long = "segment")]
    segments: Vec<String>,

    /// The binary to inspect
    #[structopt(parse(from_os_str))]
    path: PathBuf,
}

#[cfg(unix)]
fn owner_name(uid: u32) -> Option<String> {
    use std::ffi::CStr;

    unsafe {
        let pwd = libc::getpwuid(uid);

        if pwd.is_null() || (*pwd).pw_name.is_null() {
            None
        } else {
            Some(CStr::from_ptr((*pwd).pw_name).to_string_lossy().into_owned())
        }
    }
}

#[cfg(unix)]
fn print_about(path: &Path, metadata: &fs::Metadata) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let mode = metadata.mode();
    let modified = OffsetDateTime::from(metadata.modified()?)
        .format(format_description!("[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [year]"))?;

    println!("About");
    println!(
        " ┖──── {} owned by {} ({}{}{}), modified at {}",
        path.display(),
        owner_name(metadata.uid()).unwrap_or_else(|| "Unknown".to_owned()),
        if mode & 0o400 != 0 { 'r' } else { '-' },
        if mode & 0o200 != 0 { 'w' } else { '-' },
        if mode & 0o100 != 0 { 'x' } else { '-' },
        modified
    );

    Ok(())
}

#[cfg(not(unix))]
fn print_about(path: &Path, metadata: &fs::Metadata) -> Result<()> {
    println!("About");
    println!(
        " ┖──── {} ({}), {} bytes",
        path.display(),
        if metadata.permissions().readonly() { "r--" } else { "rw-" },
        metadata.len()
    );

    Ok(())
}

fn main() -> Result<()> {
    let _ = pretty_env_logger::try_init();

    let opt = Opt::from_args();

    debug!("parsed options: {:?}", opt);

    let file = File::open(&opt.path).with_context(|| format!("could not open {:?}", opt.path))?;
    let metadata = file.metadata().with_context(|| format!("unable to stat {:?}", opt.path))?;
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("could not mmap {:?}", opt.path))?;

    let report = if opt.segments.is_empty() {
        inspect(&mmap)
    } else {
        let table = SEGMENTS_OF_INTEREST
            .iter()
            .filter(|interest| opt.segments.iter().any(|name| name == interest.segname))
            .cloned()
            .collect::<Vec<_>>();

        Inspector::new().with_segments(&table).inspect(&mmap)
    }
    .with_context(|| format!("{:?} is not a mach-o binary file", opt.path))?;

    if !opt.quiet {
        print_about(&opt.path, &metadata)?;
    }

    print!("{}", report);

    Ok(())
}
