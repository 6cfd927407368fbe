use std::io::{Cursor, Read};

use byteorder::{NativeEndian, ReadBytesExt};

use crate::consts::NAME_SIZE;
use crate::errors::{MachError, Result};

/// The byte order of an image relative to the host.
///
/// `Swapped` images have every multi-byte field byte-reversed; the fields are
/// normalized while decoding, the source bytes are never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Native,
    Swapped,
}

impl Endian {
    pub fn is_swapped(self) -> bool {
        self == Endian::Swapped
    }

    /// Whether the image is stored in big endian order.
    pub fn is_big_endian(self) -> bool {
        cfg!(target_endian = "big") != self.is_swapped()
    }

    pub fn normalize_u16(self, v: u16) -> u16 {
        if self.is_swapped() {
            v.swap_bytes()
        } else {
            v
        }
    }

    pub fn normalize_u32(self, v: u32) -> u32 {
        if self.is_swapped() {
            v.swap_bytes()
        } else {
            v
        }
    }

    pub fn normalize_u64(self, v: u64) -> u64 {
        if self.is_swapped() {
            v.swap_bytes()
        } else {
            v
        }
    }
}

/// The word size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitWidth {
    Bits32,
    Bits64,
}

impl BitWidth {
    pub fn bits(self) -> u32 {
        match self {
            BitWidth::Bits32 => 32,
            BitWidth::Bits64 => 64,
        }
    }

    /// Size in bytes of a pointer, and of the address/size words of the on-disk structures.
    pub fn pointer_size(self) -> usize {
        match self {
            BitWidth::Bits32 => 4,
            BitWidth::Bits64 => 8,
        }
    }
}

/// How the structures of an image are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub width: BitWidth,
    pub endian: Endian,
}

/// An immutable, bounds-known window of the file contents.
///
/// Every access is checked against the window length, so a hostile offset or
/// size degrades to `OffsetOutOfBounds` instead of a read past the buffer.
/// Offsets reported in errors are absolute file offsets.
#[derive(Debug, Clone, Copy)]
pub struct BinaryView<'a> {
    data: &'a [u8],
    base: usize,
}

impl<'a> BinaryView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinaryView { data, base: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The absolute file offset of the first byte of this view.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    fn check(&self, offset: usize, size: usize) -> Result<usize> {
        offset
            .checked_add(size)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| MachError::OffsetOutOfBounds {
                offset: self.base.saturating_add(offset),
                size,
                limit: self.base + self.data.len(),
            })
    }

    pub fn bytes(&self, offset: usize, size: usize) -> Result<&'a [u8]> {
        let end = self.check(offset, size)?;

        Ok(&self.data[offset..end])
    }

    /// Narrow the view to `size` bytes at `offset`.
    pub fn subview(&self, offset: usize, size: usize) -> Result<BinaryView<'a>> {
        Ok(BinaryView {
            data: self.bytes(offset, size)?,
            base: self.base + offset,
        })
    }

    pub fn reader(&self, offset: usize, endian: Endian) -> Result<Reader<'a>> {
        self.check(offset, 0)?;

        let mut cur = Cursor::new(self.data);

        cur.set_position(offset as u64);

        Ok(Reader {
            cur,
            base: self.base,
            endian,
        })
    }

    pub fn read_u32(&self, offset: usize, endian: Endian) -> Result<u32> {
        self.reader(offset, endian)?.read_u32()
    }

    /// Read the null-terminated string at `offset`, stopping at the end of the view.
    pub fn read_cstr(&self, offset: usize) -> Result<String> {
        self.check(offset, 1)?;

        let bytes = &self.data[offset..];
        let s = bytes.split(|&b| b == 0).next().unwrap_or(&[]);

        Ok(String::from_utf8_lossy(s).into_owned())
    }
}

/// A bounds-checked cursor that normalizes every field to the host byte order.
pub struct Reader<'a> {
    cur: Cursor<&'a [u8]>,
    base: usize,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn position(&self) -> usize {
        self.cur.position() as usize
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn out_of_bounds(&self, pos: usize, size: usize) -> MachError {
        MachError::OffsetOutOfBounds {
            offset: self.base.saturating_add(pos),
            size,
            limit: self.base + self.cur.get_ref().len(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let pos = self.position();

        self.cur.read_u8().map_err(|_| self.out_of_bounds(pos, 1))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let pos = self.position();
        let endian = self.endian;

        self.cur
            .read_u16::<NativeEndian>()
            .map(|v| endian.normalize_u16(v))
            .map_err(|_| self.out_of_bounds(pos, 2))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let pos = self.position();
        let endian = self.endian;

        self.cur
            .read_u32::<NativeEndian>()
            .map(|v| endian.normalize_u32(v))
            .map_err(|_| self.out_of_bounds(pos, 4))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let pos = self.position();
        let endian = self.endian;

        self.cur
            .read_u64::<NativeEndian>()
            .map(|v| endian.normalize_u64(v))
            .map_err(|_| self.out_of_bounds(pos, 8))
    }

    /// Read an address or size word, 4 or 8 bytes wide depending on the image.
    pub fn read_word(&mut self, width: BitWidth) -> Result<u64> {
        match width {
            BitWidth::Bits32 => self.read_u32().map(u64::from),
            BitWidth::Bits64 => self.read_u64(),
        }
    }

    /// Read a fixed size name, the bytes are kept as is.
    pub fn read_name(&mut self) -> Result<[u8; NAME_SIZE]> {
        let pos = self.position();
        let mut name = [0; NAME_SIZE];

        self.cur.read_exact(&mut name).map_err(|_| self.out_of_bounds(pos, NAME_SIZE))?;

        Ok(name)
    }

    pub fn skip(&mut self, size: usize) -> Result<()> {
        let pos = self.position();

        match pos.checked_add(size) {
            Some(end) if end <= self.cur.get_ref().len() => {
                self.cur.set_position(end as u64);

                Ok(())
            }
            _ => Err(self.out_of_bounds(pos, size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_checked_access() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let view = BinaryView::new(&data);

        assert_eq!(view.bytes(4, 4).unwrap(), &[5, 6, 7, 8]);
        assert_eq!(
            view.bytes(6, 4),
            Err(MachError::OffsetOutOfBounds {
                offset: 6,
                size: 4,
                limit: 8
            })
        );
        assert!(view.bytes(usize::max_value(), 2).is_err());
        assert!(view.subview(9, 0).is_err());

        let sub = view.subview(2, 4).unwrap();

        assert_eq!(sub.base(), 2);
        assert_eq!(sub.len(), 4);
        assert_eq!(
            sub.bytes(2, 4),
            Err(MachError::OffsetOutOfBounds {
                offset: 4,
                size: 4,
                limit: 6
            })
        );
    }

    #[test]
    fn test_swapped_reads() {
        let data = 0x1122_3344u32.to_ne_bytes();
        let view = BinaryView::new(&data);

        assert_eq!(view.read_u32(0, Endian::Native).unwrap(), 0x1122_3344);
        assert_eq!(view.read_u32(0, Endian::Swapped).unwrap(), 0x4433_2211);
        assert!(view.read_u32(1, Endian::Native).is_err());
    }

    #[test]
    fn test_read_word() {
        let mut data = Vec::new();

        data.extend_from_slice(&0x1000u32.to_ne_bytes());
        data.extend_from_slice(&0x1_0000_2000u64.to_ne_bytes());

        let view = BinaryView::new(&data);
        let mut r = view.reader(0, Endian::Native).unwrap();

        assert_eq!(r.read_word(BitWidth::Bits32).unwrap(), 0x1000);
        assert_eq!(r.read_word(BitWidth::Bits64).unwrap(), 0x1_0000_2000);
        assert!(r.read_u8().is_err());
        assert!(r.skip(1).is_err());
        assert_eq!(r.position(), 12);
    }

    #[test]
    fn test_read_cstr() {
        let view = BinaryView::new(b"\0printf\0malloc");

        assert_eq!(view.read_cstr(0).unwrap(), "");
        assert_eq!(view.read_cstr(1).unwrap(), "printf");
        // unterminated strings stop at the end of the view
        assert_eq!(view.read_cstr(8).unwrap(), "malloc");
        assert!(view.read_cstr(14).is_err());
    }

    #[test]
    fn test_endian() {
        assert!(!Endian::Native.is_swapped());
        assert_eq!(Endian::Swapped.normalize_u32(0xfeed_facf), 0xcffa_edfe);
        assert_eq!(
            Endian::Swapped.normalize_u64(Endian::Swapped.normalize_u64(0x0102_0304_0506_0708)),
            0x0102_0304_0506_0708
        );
        assert_ne!(Endian::Native.is_big_endian(), Endian::Swapped.is_big_endian());
    }
}
