use std::mem::size_of;

pub use zerocopy::{
    byteorder::little_endian::F64, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

pub const FOOTER_MAGIC: [u8; 4] = *b"ASAR";
pub const FOOTER_VERSION: u8 = 2;
pub const FOOTER_SIZE: usize = 13;

/// Marker compiled into runtime binaries. The packer overwrites it with
/// `", <offset>"` padded with spaces to the same width.
pub const OFFSET_PLACEHOLDER: &[u8] = b"/* REPLACE_WITH_OFFSET */";

/// Trailer written after the archive.
///
/// `size` is a little-endian double holding the archive length plus the
/// length of the footer itself, so reading it from the end of a file tells
/// exactly how many trailing bytes belong to the archive region.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
pub struct Footer {
    pub size:    F64,
    pub version: u8,
    pub magic:   [u8; 4],
}

const _: () = assert!(size_of::<Footer>() == FOOTER_SIZE);

impl Footer {
    pub fn new(archive_len: u64) -> Self {
        Footer {
            size:    F64::new((archive_len + FOOTER_SIZE as u64) as f64),
            version: FOOTER_VERSION,
            magic:   FOOTER_MAGIC,
        }
    }

    /// Total trailing byte count, footer included.
    pub fn region_size(&self) -> f64 { self.size.get() }

    pub fn has_magic(&self) -> bool { self.magic == FOOTER_MAGIC }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_layout_is_little_endian() {
        let footer = Footer::new(3);
        let bytes = footer.as_bytes();
        assert_eq!(bytes.len(), FOOTER_SIZE);
        assert_eq!(&bytes[0..8], &16f64.to_le_bytes());
        assert_eq!(bytes[8], 2);
        assert_eq!(&bytes[9..13], b"ASAR");
    }
}
