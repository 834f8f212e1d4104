//! ASAR archive index.
//!
//! The archive begins with two pickles: an 8-byte size pickle
//! `[4][header_len]` followed by the `header_len` byte header pickle
//! `[payload_len][json_len][json][padding]`. File contents follow the
//! header, and every `offset` in the index is relative to the end of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

const SIZE_PICKLE_LEN: usize = 8;

fn is_false(value: &bool) -> bool { !*value }

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Entry {
    Directory {
        files: BTreeMap<String, Entry>,
    },
    Link {
        link: String,
    },
    File {
        size:       u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset:     Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        unpacked:   bool,
        #[serde(default, skip_serializing_if = "is_false")]
        executable: bool,
    },
}
impl Default for Entry {
    fn default() -> Self {
        Entry::Directory {
            files: BTreeMap::new(),
        }
    }
}
impl Entry {
    pub fn is_unpacked(&self) -> bool { matches!(self, Entry::File { unpacked: true, .. }) }

    /// Look up a slash-separated path below this directory.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        path.split('/')
            .filter(|component| !component.is_empty())
            .try_fold(self, |entry, component| match entry {
                Entry::Directory { files } => files.get(component),
                _ => None,
            })
    }

    /// All non-directory entries below this one, keyed by slash-separated path.
    pub fn flatten(&self) -> Vec<(String, &Entry)> {
        fn visit<'a>(prefix: &str, entry: &'a Entry, out: &mut Vec<(String, &'a Entry)>) {
            match entry {
                Entry::Directory { files } => {
                    for (name, child) in files {
                        let path = if prefix.is_empty() {
                            name.clone()
                        } else {
                            format!("{}/{}", prefix, name)
                        };
                        visit(&path, child, out);
                    }
                }
                _ => out.push((prefix.to_string(), entry)),
            }
        }
        let mut out = Vec::new();
        visit("", self, &mut out);
        out
    }
}

/// Decoded archive header.
#[derive(Clone, Debug)]
pub struct Header {
    pub root:           Entry,
    /// Length of both pickles; file offsets count from here.
    pub content_offset: u64,
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Serialize `root` into the size pickle and header pickle.
pub fn encode_header(root: &Entry) -> Result<Vec<u8>, FormatError> {
    let json = serde_json::to_vec(root)?;
    let padding = (4 - json.len() % 4) % 4;
    let payload_len = 4 + json.len() + padding;
    let header_len = 4 + payload_len;
    let mut out = Vec::with_capacity(SIZE_PICKLE_LEN + header_len);
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(header_len as u32).to_le_bytes());
    out.extend_from_slice(&(payload_len as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&json);
    out.resize(out.len() + padding, 0);
    Ok(out)
}

pub fn decode_header(data: &[u8]) -> Result<Header, FormatError> {
    let malformed = |reason: &str| FormatError::MalformedHeader(reason.to_string());
    if read_u32(data, 0).ok_or_else(|| malformed("missing size pickle"))? != 4 {
        return Err(malformed("size pickle has unexpected payload length"));
    }
    let header_len = read_u32(data, 4).ok_or_else(|| malformed("missing header length"))? as usize;
    let header_end = SIZE_PICKLE_LEN
        .checked_add(header_len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| malformed("header extends past the archive"))?;
    let header = &data[SIZE_PICKLE_LEN..header_end];
    let payload_len = read_u32(header, 0).ok_or_else(|| malformed("missing header payload"))?;
    if payload_len as usize + 4 != header.len() {
        return Err(malformed("header payload length mismatch"));
    }
    let json_len = read_u32(header, 4).ok_or_else(|| malformed("missing index length"))? as usize;
    let json = header
        .get(8..8 + json_len)
        .ok_or_else(|| malformed("index extends past the header"))?;
    let root: Entry = serde_json::from_slice(json)?;
    if !matches!(root, Entry::Directory { .. }) {
        return Err(malformed("index root is not a directory"));
    }
    Ok(Header {
        root,
        content_offset: header_end as u64,
    })
}

/// Read-only view over archive bytes.
pub struct Archive<'a> {
    data:   &'a [u8],
    header: Header,
}
impl<'a> Archive<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, FormatError> {
        let header = decode_header(data)?;
        Ok(Archive { data, header })
    }

    pub fn header(&self) -> &Header { &self.header }

    pub fn files(&self) -> Vec<(String, &Entry)> { self.header.root.flatten() }

    /// Contents of a file stored inside the archive.
    pub fn read(&self, path: &str) -> Result<&'a [u8], FormatError> {
        let entry = self
            .header
            .root
            .find(path)
            .ok_or_else(|| FormatError::NotFound(path.to_string()))?;
        let (size, offset) = match entry {
            Entry::File {
                size,
                offset: Some(offset),
                unpacked: false,
                ..
            } => (*size, offset),
            _ => return Err(FormatError::NotPacked(path.to_string())),
        };
        let offset: u64 = offset
            .parse()
            .map_err(|_| FormatError::MalformedHeader(format!("bad offset for {}", path)))?;
        let out_of_bounds = || FormatError::OutOfBounds(path.to_string());
        let start = self.header.content_offset.checked_add(offset).ok_or_else(out_of_bounds)?;
        let end = start.checked_add(size).ok_or_else(out_of_bounds)?;
        if end > self.data.len() as u64 {
            return Err(out_of_bounds());
        }
        Ok(&self.data[start as usize..end as usize])
    }
}
