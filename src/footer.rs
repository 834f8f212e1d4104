use std::{
    fs::{metadata, OpenOptions},
    io::Write,
    path::Path,
};

use trailpe::IntoBytes;

use crate::{
    error::{Error, Result},
    types::Footer,
};

/// Append the footer to the archive at `archive`. Existing bytes are never
/// rewritten.
pub fn write_footer(archive: &Path) -> Result<Footer> {
    let len = metadata(archive)
        .map_err(Error::io("read metadata of", archive))?
        .len();
    let footer = Footer::new(len);
    let mut file = OpenOptions::new()
        .append(true)
        .open(archive)
        .map_err(Error::io("open", archive))?;
    file.write_all(footer.as_bytes())
        .map_err(Error::io("append footer to", archive))?;
    file.flush().map_err(Error::io("append footer to", archive))?;
    Ok(footer)
}
