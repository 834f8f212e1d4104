use std::{
    fs::File,
    io::{copy, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    permissions::set_executable_permissions,
};

/// Write `runtime` followed by `archive` into `output` and make it
/// executable.
///
/// Both inputs are streamed. A partially written output is left in place
/// when a step fails.
pub fn compose(output: &Path, runtime: &Path, archive: &Path) -> Result<PathBuf> {
    let file = File::create(output).map_err(Error::io("create", output))?;
    let mut writer = BufWriter::new(file);
    for input in [runtime, archive] {
        let mut reader = BufReader::new(File::open(input).map_err(Error::io("open", input))?);
        copy(&mut reader, &mut writer).map_err(Error::io("write", output))?;
    }
    writer.flush().map_err(Error::io("write", output))?;
    drop(writer);
    set_executable_permissions(output)?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::fs::{metadata, read, write};

    use super::*;

    #[test]
    fn concatenates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("runtime");
        let archive = dir.path().join("archive");
        let output = dir.path().join("app");
        write(&runtime, b"\x7fELF-runtime").unwrap();
        write(&archive, b"archive+footer").unwrap();
        assert_eq!(compose(&output, &runtime, &archive).unwrap(), output);
        assert_eq!(read(&output).unwrap(), b"\x7fELF-runtimearchive+footer");
    }

    #[cfg(unix)]
    #[test]
    fn output_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("runtime");
        let archive = dir.path().join("archive");
        write(&runtime, b"r").unwrap();
        write(&archive, b"a").unwrap();
        let output = compose(&dir.path().join("app"), &runtime, &archive).unwrap();
        assert_eq!(metadata(output).unwrap().permissions().mode() & 0o777, 0o755);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("runtime");
        write(&runtime, b"r").unwrap();
        let result = compose(&dir.path().join("app"), &runtime, &dir.path().join("missing"));
        assert!(matches!(result, Err(Error::Io { action: "open", .. })));
    }
}
