use std::{
    fs::{read, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::Path,
};

use memchr::memmem;

use crate::{
    error::{Error, Result},
    types::OFFSET_PLACEHOLDER,
};

/// Render `offset` as `", <offset>"` padded with trailing spaces to `width`.
pub fn render_offset(offset: u64, width: usize) -> Result<Vec<u8>> {
    let rendered = format!(", {}", offset);
    if rendered.len() > width {
        return Err(Error::PlaceholderTooNarrow { offset, width });
    }
    Ok(format!("{:<width$}", rendered, width = width).into_bytes())
}

/// Overwrite the first offset placeholder in `binary` with the binary's
/// current size, which is where an archive appended to it will start.
///
/// Returns `false` and leaves the file untouched when there is no
/// placeholder. The file length never changes.
pub fn patch_offset(binary: &Path) -> Result<bool> {
    let data = read(binary).map_err(Error::io("read", binary))?;
    let position = match memmem::find(&data, OFFSET_PLACEHOLDER) {
        Some(position) => position,
        None => return Ok(false),
    };
    let replacement = render_offset(data.len() as u64, OFFSET_PLACEHOLDER.len())?;
    drop(data);
    let mut file = OpenOptions::new()
        .write(true)
        .open(binary)
        .map_err(Error::io("open", binary))?;
    file.seek(SeekFrom::Start(position as u64))
        .map_err(Error::io("patch", binary))?;
    file.write_all(&replacement)
        .map_err(Error::io("patch", binary))?;
    file.flush().map_err(Error::io("patch", binary))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{metadata, write},
        hash::Hasher,
    };

    use twox_hash::XxHash64;

    use super::*;

    fn hash(path: &Path) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&read(path).unwrap());
        hasher.finish()
    }

    #[test]
    fn renders_to_exact_width() {
        assert_eq!(render_offset(1234, 10).unwrap(), b", 1234    ");
        assert_eq!(render_offset(12345678, 10).unwrap(), b", 12345678");
        assert!(matches!(
            render_offset(123456789, 10),
            Err(Error::PlaceholderTooNarrow { .. })
        ));
    }

    #[test]
    fn patches_first_marker_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime");
        let mut data = b"\x7fELF....start(x ".to_vec();
        data.extend_from_slice(OFFSET_PLACEHOLDER);
        data.extend_from_slice(b") and again ");
        data.extend_from_slice(OFFSET_PLACEHOLDER);
        data.extend_from_slice(&[0u8; 64]);
        write(&path, &data).unwrap();

        assert!(patch_offset(&path).unwrap());
        let patched = read(&path).unwrap();
        assert_eq!(patched.len(), data.len());
        let start = 16;
        let expected = format!(", {:<23}", data.len());
        assert_eq!(&patched[start..start + OFFSET_PLACEHOLDER.len()], expected.as_bytes());
        assert_eq!(&patched[..start], &data[..start]);
        assert_eq!(
            &patched[start + OFFSET_PLACEHOLDER.len()..],
            &data[start + OFFSET_PLACEHOLDER.len()..]
        );
        assert_eq!(memmem::find_iter(&patched, OFFSET_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn missing_marker_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime");
        write(&path, vec![0x90u8; 4096]).unwrap();
        let before = hash(&path);
        assert!(!patch_offset(&path).unwrap());
        assert_eq!(hash(&path), before);
        assert_eq!(metadata(&path).unwrap().len(), 4096);
    }
}
