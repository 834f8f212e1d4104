use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use memmap2::Mmap;

use crate::{asar::Archive, error::FormatError, types::*};

/// Location of the archive inside a packed executable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveRegion {
    /// Offset of the first archive byte, equal to the runtime binary length.
    pub start:    u64,
    /// Archive length, footer excluded.
    pub len:      u64,
    pub version:  u8,
    pub file_len: u64,
}

/// Read and validate the footer at the end of `reader`.
pub fn read_footer<R: Read + Seek>(reader: &mut R) -> Result<Footer, FormatError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < FOOTER_SIZE as u64 {
        return Err(FormatError::TooShort(file_len));
    }
    reader.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
    let mut buffer = [0u8; FOOTER_SIZE];
    reader.read_exact(&mut buffer)?;
    let footer = Footer::read_from_bytes(&buffer[..]).map_err(|_| FormatError::TooShort(file_len))?;
    if !footer.has_magic() {
        return Err(FormatError::InvalidMagic);
    }
    if footer.version != FOOTER_VERSION {
        return Err(FormatError::UnsupportedVersion(footer.version));
    }
    Ok(footer)
}

/// Find the archive region from the footer. The archive starts at
/// `file_len - size` and runs up to the footer.
pub fn locate<R: Read + Seek>(reader: &mut R) -> Result<ArchiveRegion, FormatError> {
    let footer = read_footer(reader)?;
    let file_len = reader.seek(SeekFrom::End(0))?;
    let size = footer.region_size();
    if !size.is_finite() || size.fract() != 0.0 || size < FOOTER_SIZE as f64 || size > file_len as f64
    {
        return Err(FormatError::InvalidRegion { size, file_len });
    }
    let size = size as u64;
    Ok(ArchiveRegion {
        start: file_len - size,
        len: size - FOOTER_SIZE as u64,
        version: footer.version,
        file_len,
    })
}

pub fn locate_archive(path: &Path) -> Result<ArchiveRegion, FormatError> {
    let mut file = File::open(path)?;
    locate(&mut file)
}

/// A packed executable mapped into memory.
pub struct PackedExecutable {
    mmap:   Mmap,
    region: ArchiveRegion,
}
impl PackedExecutable {
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let mut file = File::open(path)?;
        let region = locate(&mut file)?;
        let mmap = unsafe { Mmap::map(&file)? };
        if (mmap.len() as u64) < region.file_len {
            return Err(FormatError::TooShort(mmap.len() as u64));
        }
        Ok(PackedExecutable { mmap, region })
    }

    pub fn region(&self) -> &ArchiveRegion { &self.region }

    /// Bytes of the runtime binary in front of the archive.
    pub fn runtime_bytes(&self) -> &[u8] { &self.mmap[..self.region.start as usize] }

    /// Archive bytes without the footer.
    pub fn archive_bytes(&self) -> &[u8] {
        let start = self.region.start as usize;
        &self.mmap[start..start + self.region.len as usize]
    }

    pub fn archive(&self) -> Result<Archive<'_>, FormatError> { Archive::parse(self.archive_bytes()) }
}
