//! Wire formats shared between the packer and the runtime that reads an
//! archive appended to its own executable.
//!
//! A packed executable is laid out as
//! `[runtime binary][archive][footer]`, where the 13-byte [`Footer`] at the
//! very end records how many trailing bytes (itself included) make up the
//! archive region.

pub mod asar;
pub mod error;
pub mod footer;
pub mod types;

pub use asar::{decode_header, encode_header, Archive, Entry, Header};
pub use error::FormatError;
pub use footer::{locate, locate_archive, read_footer, ArchiveRegion, PackedExecutable};
pub use types::*;
