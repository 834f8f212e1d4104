use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is too short to hold an archive footer ({0} bytes)")]
    TooShort(u64),

    #[error("archive footer magic is invalid")]
    InvalidMagic,

    #[error("unsupported archive format version {0}")]
    UnsupportedVersion(u8),

    #[error("archive region of {size} bytes does not fit a {file_len} byte file")]
    InvalidRegion { size: f64, file_len: u64 },

    #[error("archive header is malformed: {0}")]
    MalformedHeader(String),

    #[error("archive index is not valid: {0}")]
    Index(#[from] serde_json::Error),

    #[error("no entry named {0} in archive")]
    NotFound(String),

    #[error("entry {0} is not stored inside the archive")]
    NotPacked(String),

    #[error("entry {0} lies outside the archive")]
    OutOfBounds(String),
}
