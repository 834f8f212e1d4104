use std::path::Path;

use crate::error::{Error, Result};

#[cfg(any(unix, target_os = "redox"))]
pub fn set_executable_permissions(path: &Path) -> Result<()> {
    use ::std::{
        fs::{metadata, set_permissions},
        os::unix::prelude::*,
    };
    let mut perm = metadata(path)
        .map_err(Error::io("read metadata of", path))?
        .permissions();
    perm.set_mode(0o755);
    set_permissions(path, perm).map_err(Error::io("set permissions of", path))
}

#[cfg(not(any(unix, target_os = "redox")))]
pub fn set_executable_permissions(_: &Path) -> Result<()> { Ok(()) }
